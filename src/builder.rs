//! Builders for immutable value objects.
//!
//! Required fields are checked when the builder is created, so a builder that
//! exists is always able to build. Optional setters consume and return the
//! builder; [`ComputerBuilder::build`] and [`UserProfileBuilder::build`] borrow
//! it, so the same builder may produce several equal values.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::DispatchError;

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, DispatchError> {
   value.ok_or(DispatchError::MissingRequired(field))
}

/// An immutable machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Computer {
   cpu: String,
   ram: String,
   storage: Option<String>,
   graphics_card: Option<String>,
   operating_system: String,
   bluetooth_enabled: bool,
}

impl Computer {
   pub const DEFAULT_OPERATING_SYSTEM: &'static str = "Linux (Default)";

   /// Starts a builder; fails if `cpu` or `ram` is absent.
   pub fn builder(cpu: Option<&str>, ram: Option<&str>) -> Result<ComputerBuilder, DispatchError> {
      ComputerBuilder::new(cpu, ram)
   }

   pub fn cpu(&self) -> &str {
      &self.cpu
   }

   pub fn ram(&self) -> &str {
      &self.ram
   }

   pub fn storage(&self) -> Option<&str> {
      self.storage.as_deref()
   }

   pub fn graphics_card(&self) -> Option<&str> {
      self.graphics_card.as_deref()
   }

   pub fn operating_system(&self) -> &str {
      &self.operating_system
   }

   pub fn bluetooth_enabled(&self) -> bool {
      self.bluetooth_enabled
   }
}

impl fmt::Display for Computer {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      writeln!(f, "Computer Specs:")?;
      writeln!(f, "  CPU: {}", self.cpu)?;
      writeln!(f, "  RAM: {}", self.ram)?;
      if let Some(storage) = &self.storage {
         writeln!(f, "  Storage: {storage}")?;
      }
      if let Some(graphics_card) = &self.graphics_card {
         writeln!(f, "  Graphics Card: {graphics_card}")?;
      }
      writeln!(f, "  OS: {}", self.operating_system)?;
      writeln!(f, "  Bluetooth Enabled: {}", self.bluetooth_enabled)
   }
}

#[derive(Debug, Clone)]
pub struct ComputerBuilder {
   cpu: String,
   ram: String,
   storage: Option<String>,
   graphics_card: Option<String>,
   operating_system: String,
   bluetooth_enabled: bool,
}

impl ComputerBuilder {
   pub fn new(cpu: Option<&str>, ram: Option<&str>) -> Result<Self, DispatchError> {
      let cpu = required(cpu, "cpu")?;
      let ram = required(ram, "ram")?;
      tracing::trace!(cpu, ram, "computer builder created");
      Ok(Self {
         cpu: cpu.to_owned(),
         ram: ram.to_owned(),
         storage: None,
         graphics_card: None,
         operating_system: Computer::DEFAULT_OPERATING_SYSTEM.to_owned(),
         bluetooth_enabled: false,
      })
   }

   pub fn storage(mut self, storage: impl Into<String>) -> Self {
      self.storage = Some(storage.into());
      self
   }

   pub fn graphics_card(mut self, graphics_card: impl Into<String>) -> Self {
      self.graphics_card = Some(graphics_card.into());
      self
   }

   pub fn operating_system(mut self, operating_system: impl Into<String>) -> Self {
      self.operating_system = operating_system.into();
      self
   }

   pub fn bluetooth_enabled(mut self, enabled: bool) -> Self {
      self.bluetooth_enabled = enabled;
      self
   }

   pub fn build(&self) -> Computer {
      Computer {
         cpu: self.cpu.clone(),
         ram: self.ram.clone(),
         storage: self.storage.clone(),
         graphics_card: self.graphics_card.clone(),
         operating_system: self.operating_system.clone(),
         bluetooth_enabled: self.bluetooth_enabled,
      }
   }
}

/// A user profile transfer object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
   pub user_id: u64,
   pub username: String,
   pub email: Option<String>,
   pub full_name: Option<String>,
   pub age: Option<u32>,
   pub avatar_url: Option<String>,
   pub active: bool,
   pub preferred_language: String,
   pub roles: BTreeSet<String>,
   pub interests: Vec<String>,
}

impl UserProfile {
   pub const DEFAULT_LANGUAGE: &'static str = "zh-CN";

   pub fn builder(
      user_id: Option<u64>,
      username: Option<&str>,
   ) -> Result<UserProfileBuilder, DispatchError> {
      UserProfileBuilder::new(user_id, username)
   }
}

#[derive(Debug, Clone)]
pub struct UserProfileBuilder {
   profile: UserProfile,
}

impl UserProfileBuilder {
   pub fn new(user_id: Option<u64>, username: Option<&str>) -> Result<Self, DispatchError> {
      let user_id = required(user_id, "user_id")?;
      let username = required(username, "username")?;
      Ok(Self {
         profile: UserProfile {
            user_id,
            username: username.to_owned(),
            email: None,
            full_name: None,
            age: None,
            avatar_url: None,
            active: true,
            preferred_language: UserProfile::DEFAULT_LANGUAGE.to_owned(),
            roles: BTreeSet::new(),
            interests: Vec::new(),
         },
      })
   }

   pub fn email(mut self, email: impl Into<String>) -> Self {
      self.profile.email = Some(email.into());
      self
   }

   pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
      self.profile.full_name = Some(full_name.into());
      self
   }

   pub fn age(mut self, age: u32) -> Self {
      self.profile.age = Some(age);
      self
   }

   pub fn avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
      self.profile.avatar_url = Some(avatar_url.into());
      self
   }

   pub fn active(mut self, active: bool) -> Self {
      self.profile.active = active;
      self
   }

   pub fn preferred_language(mut self, language: impl Into<String>) -> Self {
      self.profile.preferred_language = language.into();
      self
   }

   pub fn role(mut self, role: impl Into<String>) -> Self {
      self.profile.roles.insert(role.into());
      self
   }

   pub fn interest(mut self, interest: impl Into<String>) -> Self {
      self.profile.interests.push(interest.into());
      self
   }

   pub fn build(&self) -> UserProfile {
      self.profile.clone()
   }
}
