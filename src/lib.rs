//! Exactly-once initialization of shared resources, and keyed dispatch to the
//! providers of those resources.
//!
//! The crate is built in layers:
//!
//! - [`LazyCell<T, E>`]: a thread-safe cell whose initializer runs at most once.
//!   Every caller receives the same recorded outcome, including the same error
//!   if initialization failed.
//! - [`Lazy<T, E, F>`]: a cell that owns its factory and can run it eagerly at
//!   construction or lazily on first access ([`InitMode`]).
//! - [`ServiceRegistry<K, V>`]: an immutable key → provider table built once from
//!   [`ProviderDescriptor`]s, with non-fatal [`BuildWarning`]s for skipped and
//!   overridden entries.
//! - [`Dispatcher<K, V>`]: decodes external string codes into [`ServiceKey`]s and
//!   resolves them, optionally deferring registry construction to first use.
//!
//! On top of those, [`payment`] wires concrete providers into a dispatcher,
//! [`context`] holds process-wide resources in an explicit [`AppContext`], and
//! [`builder`] contains validated builders for plain value objects.
//!
//! # Examples
//!
//! ## Sharing one outcome
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use lazy_dispatch::LazyCell;
//!
//! let runs = AtomicUsize::new(0);
//! let cell: LazyCell<String, String> = LazyCell::new();
//!
//! let first = cell.get_or_init(|| {
//!    runs.fetch_add(1, Ordering::SeqCst);
//!    Err("backend offline".to_string())
//! });
//! // A failure is final: later factories never run.
//! let second = cell.get_or_init(|| Ok("recovered".to_string()));
//!
//! assert_eq!(first, second);
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//! ```
//!
//! ## Dispatching by code
//!
//! ```rust
//! use lazy_dispatch::payment::{self, Amount, PaymentDispatcher, PaymentType};
//!
//! let dispatcher = PaymentDispatcher::new(payment::registry(payment::default_providers()));
//! let receipt = payment::checkout(&dispatcher, "AliPay", Amount::from_minor(10050)).unwrap();
//! assert_eq!(receipt.payment_type, PaymentType::Alipay);
//! assert_eq!(receipt.message(), "Alipay payment of 100.50 succeeded");
//! ```

/// Internal synchronization state management.
mod state;

/// One-shot cell.
mod cell;

/// Factory-owning lazy values.
mod lazy;

mod dispatch;
mod error;
mod registry;

pub mod builder;
pub mod context;
pub mod payment;

pub use cell::{CellState, LazyCell};
pub use context::{AppConfig, AppContext, ContextOptions};
pub use dispatch::{CodeMap, Dispatcher, RegistryFactory, ServiceKey};
pub use error::{BuildWarning, DispatchError};
pub use lazy::{InitMode, Lazy};
pub use registry::{ProviderDescriptor, ServiceRegistry};
