//! Lazy values that own their factory.
//!
//! [`Lazy<T, E, F>`] pairs a [`LazyCell`] with the factory that will fill it, so
//! callers only need [`Lazy::force`]. Whether the factory runs on first access or
//! right away at construction is a runtime option ([`InitMode`]) rather than a
//! separate type: eager construction covers the "initialize at startup" and
//! holder-class flavors of a singleton, lazy construction covers the rest.

use core::cell::UnsafeCell;
use core::fmt;

use crate::cell::{CellState, LazyCell};

/// When a [`Lazy`] runs its factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InitMode {
   /// On first access.
   #[default]
   Lazy,
   /// During construction.
   Eager,
}

impl InitMode {
   #[inline]
   pub const fn is_eager(self) -> bool {
      matches!(self, Self::Eager)
   }
}

impl From<bool> for InitMode {
   /// `true` selects [`InitMode::Eager`].
   #[inline]
   fn from(eager: bool) -> Self {
      if eager {
         Self::Eager
      } else {
         Self::Lazy
      }
   }
}

/// A value computed at most once by a stored factory.
///
/// ```rust
/// use lazy_dispatch::{InitMode, Lazy};
///
/// let answer: Lazy<u32, String> = Lazy::with_mode(|| Ok(6 * 7), InitMode::Eager);
/// assert!(answer.get().is_some());
/// assert_eq!(answer.force(), Ok(&42));
/// ```
pub struct Lazy<T, E, F = fn() -> Result<T, E>> {
   cell: LazyCell<T, E>,
   factory: UnsafeCell<Option<F>>,
   mode: InitMode,
}

impl<T, E, F> Lazy<T, E, F>
where
   F: FnOnce() -> Result<T, E>,
{
   /// Creates a lazy value; `factory` runs on the first [`force`](Self::force).
   #[inline]
   #[must_use]
   pub const fn new(factory: F) -> Self {
      Self {
         cell: LazyCell::new(),
         factory: UnsafeCell::new(Some(factory)),
         mode: InitMode::Lazy,
      }
   }

   /// Creates a lazy value, running `factory` immediately if `mode` is eager.
   ///
   /// A failing eager factory does not abort construction: the failure is
   /// recorded and returned by every later [`force`](Self::force).
   pub fn with_mode(factory: F, mode: InitMode) -> Self {
      let mut lazy = Self::new(factory);
      lazy.mode = mode;
      if mode.is_eager() {
         let _ = lazy.force();
      }
      lazy
   }

   /// Returns the outcome, running the factory if this is the first access.
   ///
   /// # Panics
   ///
   /// Panics if the factory panicked on an earlier call.
   #[inline]
   pub fn force(&self) -> Result<&T, &E> {
      self.cell.get_or_init(|| {
         // SAFETY: The cell runs this closure only on the thread holding its
         // initialization lock, and at most once, so access is exclusive.
         let factory = unsafe { (*self.factory.get()).take() };
         let Some(factory) = factory else {
            unreachable!("Lazy factory consumed without a recorded outcome");
         };
         factory()
      })
   }
}

impl<T, E, F> Lazy<T, E, F> {
   /// Creates an already initialized lazy value. No factory is stored.
   #[inline]
   #[must_use]
   pub const fn with_value(value: T) -> Self {
      Self {
         cell: LazyCell::with_value(value),
         factory: UnsafeCell::new(None),
         mode: InitMode::Eager,
      }
   }

   /// Returns the outcome if the factory already ran. Never blocks.
   #[inline]
   pub fn get(&self) -> Option<Result<&T, &E>> {
      self.cell.get()
   }

   #[inline]
   pub fn state(&self) -> CellState {
      self.cell.state()
   }

   #[inline]
   pub fn mode(&self) -> InitMode {
      self.mode
   }
}

// SAFETY: The factory is only touched by the thread holding the cell's lock,
// so sharing `&Lazy` needs `F: Send` (it may run elsewhere) but not `F: Sync`.
unsafe impl<T: Send + Sync, E: Send + Sync, F: Send> Sync for Lazy<T, E, F> {}

impl<T: fmt::Debug, E: fmt::Debug, F> fmt::Debug for Lazy<T, E, F> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Lazy")
         .field("mode", &self.mode)
         .field("cell", &self.cell)
         .finish()
   }
}

impl<T: Default, E> Default for Lazy<T, E> {
   /// A lazy value that builds `T::default()` on first access.
   fn default() -> Self {
      Self::new(|| Ok(T::default()))
   }
}
