//! One-shot cell whose initializer runs at most once.
//!
//! [`LazyCell<T, E>`] records the *outcome* of its initializer, success or
//! failure. Whichever thread wins the initialization race runs its factory;
//! every other caller, present or future, is handed a reference to that same
//! outcome. A failed initialization is terminal: the error is kept and returned
//! to everyone, and no later factory is ever invoked.
//!
//! Reads of a settled cell are a single acquire load. Callers that lose the race
//! park on the state word until the winner publishes its result.

use core::cell::UnsafeCell;
use core::convert::Infallible;
use core::future::Future;
use core::{fmt, mem};
use std::time::{Duration, Instant};

use crate::state::{Acquire, CellLock, Phase, Settled};

/// Observable lifecycle of a [`LazyCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
   /// No factory has started yet.
   Uninitialized,
   /// A factory is running on some thread.
   Initializing,
   /// A value was recorded.
   Ready,
   /// An error was recorded.
   Failed,
   /// A factory panicked; the cell will never hold an outcome.
   Poisoned,
}

impl CellState {
   /// `Ready`, `Failed` and `Poisoned` never change again.
   #[inline]
   pub const fn is_terminal(self) -> bool {
      matches!(self, Self::Ready | Self::Failed | Self::Poisoned)
   }
}

impl fmt::Display for CellState {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(match self {
         Self::Uninitialized => "uninitialized",
         Self::Initializing => "initializing",
         Self::Ready => "ready",
         Self::Failed => "failed",
         Self::Poisoned => "poisoned",
      })
   }
}

/// A thread-safe cell that runs its initializer at most once and shares the outcome.
///
/// ```rust
/// use lazy_dispatch::LazyCell;
///
/// let cell: LazyCell<u32, String> = LazyCell::new();
/// assert_eq!(cell.get_or_init(|| Ok(7)), Ok(&7));
/// // Later factories are ignored.
/// assert_eq!(cell.get_or_init(|| Err("late".to_string())), Ok(&7));
/// ```
pub struct LazyCell<T, E = Infallible> {
   outcome: UnsafeCell<mem::MaybeUninit<Result<T, E>>>,
   lock: CellLock,
}

impl<T, E> LazyCell<T, E> {
   /// Creates an empty cell.
   #[inline]
   #[must_use]
   pub const fn new() -> Self {
      Self {
         lock: CellLock::new(),
         outcome: UnsafeCell::new(mem::MaybeUninit::uninit()),
      }
   }

   /// Creates a cell that is already `Ready` with `value`.
   #[inline]
   #[must_use]
   pub const fn with_value(value: T) -> Self {
      Self::with_outcome(Ok(value))
   }

   /// Creates a cell that is already `Failed` with `error`.
   #[inline]
   #[must_use]
   pub const fn with_error(error: E) -> Self {
      Self::with_outcome(Err(error))
   }

   #[inline]
   const fn with_outcome(outcome: Result<T, E>) -> Self {
      Self {
         lock: CellLock::done(),
         outcome: UnsafeCell::new(mem::MaybeUninit::new(outcome)),
      }
   }

   /// Runs `f` immediately and stores its outcome.
   ///
   /// This is the eager flavor of the cell: construction and initialization
   /// happen together, so the cell is terminal before anyone can observe it.
   #[must_use]
   pub fn eager<F>(f: F) -> Self
   where
      F: FnOnce() -> Result<T, E>,
   {
      Self::with_outcome(f())
   }

   /// Reports the current lifecycle state. Never blocks.
   pub fn state(&self) -> CellState {
      match self.lock.phase() {
         Phase::Idle => CellState::Uninitialized,
         Phase::Locked => CellState::Initializing,
         Phase::Poisoned => CellState::Poisoned,
         // SAFETY: DONE was observed with acquire ordering.
         Phase::Done => match unsafe { self.outcome_unchecked() } {
            Ok(_) => CellState::Ready,
            Err(_) => CellState::Failed,
         },
      }
   }

   /// Returns `true` once an outcome is recorded.
   #[inline]
   pub fn is_terminal(&self) -> bool {
      self.state().is_terminal()
   }

   /// Returns the recorded outcome, or `None` if there is none yet. Never blocks.
   #[inline]
   pub fn get(&self) -> Option<Result<&T, &E>> {
      if self.lock.is_done() {
         // SAFETY: is_done() performed an acquire load that observed DONE.
         Some(unsafe { self.outcome_unchecked() }.as_ref())
      } else {
         None
      }
   }

   /// Returns the value if the cell is `Ready`.
   #[inline]
   pub fn value(&self) -> Option<&T> {
      self.get().and_then(Result::ok)
   }

   /// Returns the error if the cell is `Failed`.
   #[inline]
   pub fn error(&self) -> Option<&E> {
      self.get().and_then(Result::err)
   }

   /// Installs `value` if the cell is empty and nobody is initializing it.
   ///
   /// Never blocks: if the lock is held, or an outcome exists, `value` is handed back.
   pub fn try_set(&self, value: T) -> Result<&T, T> {
      let Some(guard) = self.lock.try_lock() else {
         return Err(value);
      };
      // SAFETY: We hold the lock, so nobody else reads or writes the slot.
      let slot: &Result<T, E> = unsafe { (*self.outcome.get()).write(Ok(value)) };
      guard.commit();
      // SAFETY: The slot was written with `Ok` above and is never written again.
      Ok(unsafe { slot.as_ref().unwrap_unchecked() })
   }

   /// Returns the shared outcome, running `f` first if the cell has none.
   ///
   /// Concurrent callers race for the right to initialize. Exactly one of them runs
   /// its factory; the others park until the outcome is published and then receive
   /// the same reference. If `f` fails, the error is recorded and every caller from
   /// then on receives it.
   ///
   /// # Panics
   ///
   /// Panics if a previous factory panicked (the cell is poisoned). If `f` itself
   /// panics, the panic propagates and the cell becomes poisoned.
   #[inline]
   pub fn get_or_init<F>(&self, f: F) -> Result<&T, &E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      if let Some(outcome) = self.get() {
         return outcome;
      }
      self.initialize(f);
      // SAFETY: initialize() returns only once an outcome is recorded.
      unsafe { self.outcome_unchecked() }.as_ref()
   }

   /// Async flavor of [`get_or_init`](Self::get_or_init).
   ///
   /// Tasks that lose the race yield to the runtime. On a multi-threaded runtime
   /// they fall back to a blocking wait after a while.
   ///
   /// Dropping the returned future while `f` is still pending does not poison
   /// the cell: the lock is released, nothing is recorded, and the next caller
   /// runs its own factory. A panic inside `f` poisons the cell as in
   /// [`get_or_init`](Self::get_or_init).
   pub async fn get_or_init_async<F, Fut>(&self, f: F) -> Result<&T, &E>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = Result<T, E>>,
   {
      if let Some(outcome) = self.get() {
         return outcome;
      }
      self.initialize_async(f).await;
      // SAFETY: initialize_async() returns only once an outcome is recorded.
      unsafe { self.outcome_unchecked() }.as_ref()
   }

   /// Waits up to `timeout` for another thread to record an outcome.
   ///
   /// Never runs a factory. Returns `None` if the timeout elapsed first.
   ///
   /// # Panics
   ///
   /// Panics if the cell is or becomes poisoned.
   pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<&T, &E>> {
      if let Some(outcome) = self.get() {
         return Some(outcome);
      }
      match self.lock.wait_until(Instant::now() + timeout) {
         Settled::Done => self.get(),
         Settled::Poisoned => poisoned(),
         Settled::TimedOut => None,
      }
   }

   /// Consumes the cell, returning the outcome if there is one.
   pub fn into_inner(self) -> Option<Result<T, E>> {
      let this = mem::ManuallyDrop::new(self);
      if this.lock.is_done() {
         // SAFETY: The outcome is initialized and `this` is never dropped,
         // so it is read out exactly once.
         Some(unsafe { (*this.outcome.get()).assume_init_read() })
      } else {
         None
      }
   }

   /// # Safety
   ///
   /// An acquire load must have observed DONE.
   #[inline]
   unsafe fn outcome_unchecked(&self) -> &Result<T, E> {
      debug_assert!(self.lock.is_done(), "outcome read before it was recorded");
      unsafe { (*self.outcome.get()).assume_init_ref() }
   }

   #[cold]
   fn initialize<F>(&self, f: F)
   where
      F: FnOnce() -> Result<T, E>,
   {
      match self.lock.lock() {
         Acquire::Won(guard) => {
            tracing::debug!(cell = core::any::type_name::<T>(), "running initializer");
            let outcome = f();
            if outcome.is_err() {
               tracing::warn!(cell = core::any::type_name::<T>(), "initializer failed");
            }
            // SAFETY: We hold the lock, exclusive access to the slot.
            unsafe { (*self.outcome.get()).write(outcome) };
            guard.commit();
         }
         Acquire::Done => {}
         Acquire::Poisoned => poisoned(),
      }
   }

   #[cold]
   async fn initialize_async<F, Fut>(&self, f: F)
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = Result<T, E>>,
   {
      match self.lock.lock_async().await {
         Acquire::Won(mut guard) => {
            tracing::debug!(cell = core::any::type_name::<T>(), "running async initializer");
            let outcome = guard.drive(f).await;
            if outcome.is_err() {
               tracing::warn!(cell = core::any::type_name::<T>(), "async initializer failed");
            }
            // SAFETY: We hold the lock, exclusive access to the slot.
            unsafe { (*self.outcome.get()).write(outcome) };
            guard.commit();
         }
         Acquire::Done => {}
         Acquire::Poisoned => poisoned(),
      }
   }
}

#[cold]
#[track_caller]
fn poisoned() -> ! {
   panic!("LazyCell instance has previously been poisoned")
}

// SAFETY: The outcome is written once by the lock holder and published with
// release ordering; afterwards it is only shared by reference. Values and errors
// may be produced on one thread and dropped on another, hence `Send`.
unsafe impl<T: Sync + Send, E: Sync + Send> Sync for LazyCell<T, E> {}
// SAFETY: Moving the cell moves the outcome with it.
unsafe impl<T: Send, E: Send> Send for LazyCell<T, E> {}

impl<T, E> Default for LazyCell<T, E> {
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for LazyCell<T, E> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("LazyCell");
      match self.get() {
         Some(Ok(v)) => d.field(v),
         Some(Err(e)) => d.field(&format_args!("<failed: {e:?}>")),
         None => d.field(&format_args!("<{}>", self.state())),
      };
      d.finish()
   }
}

impl<T, E> From<Result<T, E>> for LazyCell<T, E> {
   /// Creates a cell with a pre-recorded outcome.
   fn from(outcome: Result<T, E>) -> Self {
      Self::with_outcome(outcome)
   }
}

impl<T, E> Drop for LazyCell<T, E> {
   #[inline]
   fn drop(&mut self) {
      if self.lock.is_done() {
         // SAFETY: Exclusive access, and the outcome is initialized.
         unsafe { self.outcome.get_mut().assume_init_drop() };
      }
   }
}
