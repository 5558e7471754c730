//! Process-wide resources held by an explicit context object.
//!
//! Instead of global statics, a composition root creates one [`AppContext`] at
//! startup and passes it to whatever needs it. Each resource lives in its own
//! [`Lazy`], so it is built exactly once, either eagerly during
//! [`AppContext::new`] or on first access, as chosen by [`ContextOptions`].

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use crate::cell::CellState;
use crate::error::DispatchError;
use crate::lazy::{InitMode, Lazy};
use crate::payment::{self, PaymentDispatcher, SharedPaymentService};

/// Chooses which context resources are built during construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextOptions {
   pub eager_config: bool,
   pub eager_registry: bool,
}

impl ContextOptions {
   pub fn with_eager_config(mut self, eager: bool) -> Self {
      self.eager_config = eager;
      self
   }

   pub fn with_eager_registry(mut self, eager: bool) -> Self {
      self.eager_registry = eager;
      self
   }
}

/// Application settings.
///
/// Only this crate can create one, and an [`AppContext`] creates at most one,
/// so every holder of a context sees the same instance.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
   entries: BTreeMap<String, String>,
}

impl AppConfig {
   fn load() -> Self {
      tracing::debug!("loading application config");
      let entries = [
         ("apiKey", "your_manual_api_key_12345"),
         ("theme", "dark"),
         ("feature.x.enabled", "true"),
      ]
      .into_iter()
      .map(|(key, value)| (key.to_owned(), value.to_owned()))
      .collect();
      Self { entries }
   }

   pub fn get(&self, key: &str) -> Option<&str> {
      self.entries.get(key).map(String::as_str)
   }

   /// Reads `feature.<name>.enabled`; anything but `"true"` is disabled.
   pub fn is_feature_enabled(&self, name: &str) -> bool {
      self
         .get(&format!("feature.{name}.enabled"))
         .is_some_and(|value| value.eq_ignore_ascii_case("true"))
   }

   pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
      self
         .entries
         .iter()
         .map(|(key, value)| (key.as_str(), value.as_str()))
   }
}

impl fmt::Debug for AppConfig {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      // Keys only: values may be secrets.
      f.debug_struct("AppConfig")
         .field("keys", &self.entries.keys().collect::<Vec<_>>())
         .finish()
   }
}

/// The resources of one running application.
pub struct AppContext {
   config: Lazy<AppConfig, Infallible>,
   payments: PaymentDispatcher,
}

impl AppContext {
   /// Creates a context with the built-in payment providers.
   pub fn new(options: ContextOptions) -> Self {
      Self::with_providers(options, payment::default_providers())
   }

   /// Creates a context whose payment registry is built from `providers`.
   pub fn with_providers(options: ContextOptions, providers: Vec<SharedPaymentService>) -> Self {
      let config = Lazy::with_mode(
         (|| Ok(AppConfig::load())) as fn() -> Result<AppConfig, Infallible>,
         InitMode::from(options.eager_config),
      );
      let payments = PaymentDispatcher::deferred(InitMode::from(options.eager_registry), move || {
         Ok(payment::registry(providers))
      })
      .with_alias("wechat", payment::PaymentType::WechatPay);
      Self { config, payments }
   }

   pub fn config(&self) -> &AppConfig {
      match self.config.force() {
         Ok(config) => config,
         Err(never) => match *never {},
      }
   }

   /// `true` once the config has been built.
   pub fn config_loaded(&self) -> bool {
      self.config.get().is_some()
   }

   pub fn payments(&self) -> &PaymentDispatcher {
      &self.payments
   }

   /// `true` once the payment registry has been built.
   pub fn registry_built(&self) -> bool {
      self.payments.registry_state() == CellState::Ready
   }

   /// Shorthand for [`payment::checkout`] against this context's dispatcher.
   pub fn checkout(
      &self,
      code: &str,
      amount: payment::Amount,
   ) -> Result<payment::PaymentReceipt, DispatchError> {
      payment::checkout(&self.payments, code, amount)
   }
}

impl fmt::Debug for AppContext {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("AppContext")
         .field("config", &self.config.state())
         .field("payments", &self.payments.registry_state())
         .finish()
   }
}
