use core::fmt;

use thiserror::Error;

/// Errors surfaced by the registry, the dispatcher and the value-object builders.
///
/// The type is `Clone` so that a failure recorded once in a lazy cell can be
/// handed to every caller that asks for it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
   /// The external code does not name any known key.
   #[error("unknown service code: {0:?}")]
   InvalidKey(String),

   /// The key is valid but no provider was registered for it.
   #[error("no provider registered for key `{0}`")]
   NotFound(String),

   /// Building a lazily constructed resource failed.
   #[error("initialization failed: {0}")]
   InitializationFailure(String),

   /// A required input was absent.
   #[error("missing required field `{0}`")]
   MissingRequired(&'static str),
}

impl DispatchError {
   /// Wraps `cause` as an [`InitializationFailure`](Self::InitializationFailure).
   pub fn initialization(cause: &(impl fmt::Display + ?Sized)) -> Self {
      Self::InitializationFailure(cause.to_string())
   }

   /// Converts a recorded failure of a lazily built resource into what callers see.
   /// An error that already is an initialization failure is kept as is.
   pub(crate) fn into_initialization_failure(self) -> Self {
      match self {
         Self::InitializationFailure(_) => self,
         other => Self::initialization(&other),
      }
   }

   /// `true` for errors caused by the caller's input rather than by the system.
   pub fn is_rejected_request(&self) -> bool {
      matches!(
         self,
         Self::InvalidKey(_) | Self::NotFound(_) | Self::MissingRequired(_)
      )
   }
}

/// Non-fatal diagnostics recorded while a registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
   /// The descriptor list was empty.
   NoProviders,
   /// A descriptor had no key and was skipped.
   MissingKey { provider: String },
   /// A later descriptor replaced an earlier one under the same key.
   DuplicateKey {
      key: String,
      replaced: String,
      replacement: String,
   },
}

impl fmt::Display for BuildWarning {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Self::NoProviders => f.write_str("no providers were supplied"),
         Self::MissingKey { provider } => {
            write!(f, "provider `{provider}` has no key and was skipped")
         }
         Self::DuplicateKey {
            key,
            replaced,
            replacement,
         } => write!(
            f,
            "key `{key}` is provided by both `{replaced}` and `{replacement}`; `{replacement}` wins"
         ),
      }
   }
}
