//! Payment providers dispatched by payment type.
//!
//! Each provider reports the [`PaymentType`] it serves. [`default_providers`] is
//! the explicit list a composition root hands to the registry, and [`checkout`]
//! is the whole request path: decode the code, resolve the provider, pay.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::{Dispatcher, ServiceKey};
use crate::error::DispatchError;
use crate::registry::{ProviderDescriptor, ServiceRegistry};

/// Supported payment channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PaymentType {
   Alipay,
   WechatPay,
   CardPay,
}

impl PaymentType {
   pub const fn description(self) -> &'static str {
      match self {
         Self::Alipay => "Alipay",
         Self::WechatPay => "WeChat Pay",
         Self::CardPay => "Bank card",
      }
   }
}

impl ServiceKey for PaymentType {
   const ALL: &'static [Self] = &[Self::Alipay, Self::WechatPay, Self::CardPay];

   fn code(self) -> &'static str {
      match self {
         Self::Alipay => "alipay",
         Self::WechatPay => "wechat_pay",
         Self::CardPay => "card_pay",
      }
   }
}

impl fmt::Display for PaymentType {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.code())
   }
}

/// A monetary amount in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(u64);

impl Amount {
   #[inline]
   pub const fn from_minor(minor: u64) -> Self {
      Self(minor)
   }

   #[inline]
   pub const fn minor(self) -> u64 {
      self.0
   }
}

impl fmt::Display for Amount {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
   }
}

/// What a provider returns after charging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
   pub payment_type: PaymentType,
   pub amount: Amount,
   pub provider: &'static str,
}

impl PaymentReceipt {
   /// User-facing confirmation line.
   pub fn message(&self) -> String {
      format!(
         "{} payment of {} succeeded",
         self.payment_type.description(),
         self.amount
      )
   }
}

/// A payment channel implementation.
pub trait PaymentService: Send + Sync {
   /// Charges `amount`.
   fn pay(&self, amount: Amount) -> PaymentReceipt;

   /// The channel this provider serves; `None` keeps it out of the registry.
   fn service_type(&self) -> Option<PaymentType>;

   /// Provider name used in diagnostics.
   fn name(&self) -> &'static str;
}

pub type SharedPaymentService = Arc<dyn PaymentService>;
pub type PaymentRegistry = ServiceRegistry<PaymentType, SharedPaymentService>;
pub type PaymentDispatcher = Dispatcher<PaymentType, SharedPaymentService>;

fn charge(provider: &'static str, payment_type: PaymentType, amount: Amount) -> PaymentReceipt {
   tracing::info!(provider, %payment_type, %amount, "charging");
   PaymentReceipt {
      payment_type,
      amount,
      provider,
   }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlipayService;

impl PaymentService for AlipayService {
   fn pay(&self, amount: Amount) -> PaymentReceipt {
      charge(self.name(), PaymentType::Alipay, amount)
   }

   fn service_type(&self) -> Option<PaymentType> {
      Some(PaymentType::Alipay)
   }

   fn name(&self) -> &'static str {
      "AlipayService"
   }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WeChatPayService;

impl PaymentService for WeChatPayService {
   fn pay(&self, amount: Amount) -> PaymentReceipt {
      charge(self.name(), PaymentType::WechatPay, amount)
   }

   fn service_type(&self) -> Option<PaymentType> {
      Some(PaymentType::WechatPay)
   }

   fn name(&self) -> &'static str {
      "WeChatPayService"
   }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CardPayService;

impl PaymentService for CardPayService {
   fn pay(&self, amount: Amount) -> PaymentReceipt {
      charge(self.name(), PaymentType::CardPay, amount)
   }

   fn service_type(&self) -> Option<PaymentType> {
      Some(PaymentType::CardPay)
   }

   fn name(&self) -> &'static str {
      "CardPayService"
   }
}

/// Describes `service` for registration under the type it reports.
pub fn descriptor(
   service: SharedPaymentService,
) -> ProviderDescriptor<PaymentType, SharedPaymentService> {
   ProviderDescriptor::new(service.service_type(), service.name(), service)
}

/// Every built-in provider.
pub fn default_providers() -> Vec<SharedPaymentService> {
   vec![
      Arc::new(AlipayService),
      Arc::new(WeChatPayService),
      Arc::new(CardPayService),
   ]
}

/// Builds a registry from `providers`.
pub fn registry<I>(providers: I) -> PaymentRegistry
where
   I: IntoIterator<Item = SharedPaymentService>,
{
   ServiceRegistry::build(providers.into_iter().map(descriptor))
}

/// Resolves the provider for `code` and charges `amount` through it.
pub fn checkout(
   dispatcher: &PaymentDispatcher,
   code: &str,
   amount: Amount,
) -> Result<PaymentReceipt, DispatchError> {
   let service = dispatcher.resolve_by_code(code)?;
   Ok(service.pay(amount))
}
