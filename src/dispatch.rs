//! Translation of external string codes into registry lookups.
//!
//! [`Dispatcher`] is the only part of the crate meant to face callers such as a
//! request handler: it accepts a free-form code, decodes it case-insensitively
//! into a [`ServiceKey`], and resolves it against a [`ServiceRegistry`]. The
//! registry itself may be built up front or deferred to first use.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::cell::CellState;
use crate::error::DispatchError;
use crate::lazy::{InitMode, Lazy};
use crate::registry::ServiceRegistry;

/// A closed set of registry keys, each with a canonical external code.
pub trait ServiceKey: Copy + Eq + Hash + fmt::Display + 'static {
   /// Every key of the set.
   const ALL: &'static [Self];

   /// Canonical code, e.g. `"alipay"`.
   fn code(self) -> &'static str;
}

/// Case-insensitive code → key table.
#[derive(Debug, Clone)]
pub struct CodeMap<K> {
   codes: HashMap<String, K>,
}

impl<K: ServiceKey> CodeMap<K> {
   /// Maps the canonical code of every key in [`ServiceKey::ALL`].
   pub fn new() -> Self {
      let codes = K::ALL
         .iter()
         .map(|&key| (normalize(key.code()), key))
         .collect();
      Self { codes }
   }

   /// Adds `alias` as another spelling of `key`.
   #[must_use]
   pub fn with_alias(mut self, alias: &str, key: K) -> Self {
      self.codes.insert(normalize(alias), key);
      self
   }

   pub fn decode(&self, code: &str) -> Result<K, DispatchError> {
      if code.trim().is_empty() {
         return Err(DispatchError::InvalidKey(code.to_owned()));
      }
      self
         .codes
         .get(&normalize(code))
         .copied()
         .ok_or_else(|| DispatchError::InvalidKey(code.to_owned()))
   }
}

impl<K: ServiceKey> Default for CodeMap<K> {
   fn default() -> Self {
      Self::new()
   }
}

fn normalize(code: &str) -> String {
   code.to_lowercase()
}

/// Factory producing a registry on first use.
pub type RegistryFactory<K, V> =
   Box<dyn FnOnce() -> Result<ServiceRegistry<K, V>, DispatchError> + Send>;

/// Resolves external codes to providers.
pub struct Dispatcher<K, V> {
   codes: CodeMap<K>,
   registry: Lazy<ServiceRegistry<K, V>, DispatchError, RegistryFactory<K, V>>,
}

impl<K: ServiceKey, V> Dispatcher<K, V> {
   /// Dispatches against an already built registry.
   pub fn new(registry: ServiceRegistry<K, V>) -> Self {
      Self {
         codes: CodeMap::new(),
         registry: Lazy::with_value(registry),
      }
   }

   /// Defers building the registry to `factory`.
   ///
   /// With [`InitMode::Eager`] the factory runs before this returns. If it fails,
   /// the failure is kept and every resolution reports it; the factory is never
   /// retried.
   pub fn deferred<F>(mode: InitMode, factory: F) -> Self
   where
      F: FnOnce() -> Result<ServiceRegistry<K, V>, DispatchError> + Send + 'static,
   {
      let factory: RegistryFactory<K, V> = Box::new(factory);
      Self {
         codes: CodeMap::new(),
         registry: Lazy::with_mode(factory, mode),
      }
   }

   /// Adds `alias` as another code for `key`.
   #[must_use]
   pub fn with_alias(mut self, alias: &str, key: K) -> Self {
      self.codes = self.codes.with_alias(alias, key);
      self
   }

   /// Decodes `code` into a key without touching the registry.
   pub fn decode(&self, code: &str) -> Result<K, DispatchError> {
      self.codes.decode(code).inspect_err(|_| {
         tracing::debug!(code, "rejecting unknown service code");
      })
   }

   /// Returns the registry, building it first if it was deferred.
   pub fn registry(&self) -> Result<&ServiceRegistry<K, V>, DispatchError> {
      self
         .registry
         .force()
         .map_err(|err| err.clone().into_initialization_failure())
   }

   /// Lifecycle of the registry cell; `Ready` once the registry is built.
   pub fn registry_state(&self) -> CellState {
      self.registry.state()
   }

   /// Decodes `code` and resolves it to a provider.
   pub fn resolve_by_code(&self, code: &str) -> Result<V, DispatchError>
   where
      V: Clone,
   {
      let key = self.decode(code)?;
      let provider = self.registry()?.resolve(&key)?;
      tracing::debug!(code, %key, "resolved provider");
      Ok(provider)
   }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Dispatcher<K, V> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Dispatcher")
         .field("codes", &self.codes)
         .field("registry", &self.registry)
         .finish()
   }
}
