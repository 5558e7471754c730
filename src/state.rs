//! Internal synchronization state for lazy cells.
//!
//! The whole lifecycle of a cell is packed into a single `AtomicU8`:
//! - Bit 0: DONE - An outcome (value or error) has been recorded
//! - Bit 1: LOCKED - A thread is running the initializer
//! - Bit 2: WAITING - At least one thread is parked on the cell
//! - Bit 3: POISONED - The initializer panicked, no outcome will ever be recorded
//! - Bits 4-7: EPOCH - Generation counter, bumped on every release of the lock
//!
//! DONE and POISONED are terminal: once either is set the word never leaves that
//! state again. A lock released without either (a cancelled async initializer)
//! returns the word to idle under a new epoch. Waiting threads park on the address of the atomic through
//! `parking_lot_core`, so losers of the initialization race sleep instead of spinning.

use core::future::{poll_fn, Future};
use core::mem;
use core::pin::pin;
use core::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use parking_lot_core::{ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// Coarse view of the state word, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
   Idle,
   Locked,
   Done,
   Poisoned,
}

/// Result of trying to take the initialization lock.
pub(crate) enum Acquire<'a> {
   /// The caller won the race and must run the initializer.
   Won(InitGuard<'a>),
   /// Another thread already recorded an outcome.
   Done,
   /// A previous initializer panicked.
   Poisoned,
}

/// Result of a bounded wait on the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
   Done,
   Poisoned,
   TimedOut,
}

/// Atomic lifecycle state of a cell.
#[repr(transparent)]
pub(crate) struct CellLock(AtomicU8);

impl CellLock {
   const DONE: u8 = 1;
   const LOCKED: u8 = 2;
   const WAITING: u8 = 4;
   const POISONED: u8 = 8;
   const EPOCH_1: u8 = 16;
   const EPOCH_MASK: u8 = !(Self::DONE | Self::LOCKED | Self::WAITING | Self::POISONED);

   #[inline(always)]
   const fn next_epoch(current_state: u8) -> u8 {
      (current_state & Self::EPOCH_MASK).wrapping_add(Self::EPOCH_1) & Self::EPOCH_MASK
   }

   /// Creates the state of an empty cell.
   #[inline]
   pub(crate) const fn new() -> Self {
      Self(AtomicU8::new(0))
   }

   /// Creates the state of a cell whose outcome is already recorded.
   #[inline]
   pub(crate) const fn done() -> Self {
      Self(AtomicU8::new(Self::DONE))
   }

   #[inline]
   fn notify_all(&self) {
      // SAFETY: park and unpark always key on the address of the inner atomic.
      unsafe {
         parking_lot_core::unpark_all(self.0.as_ptr() as usize, DEFAULT_UNPARK_TOKEN);
      }
   }

   /// Parks the current thread while the state still equals `expected`.
   ///
   /// Returns `false` only if `deadline` passed before a wake-up.
   #[inline]
   fn park(&self, expected: u8, deadline: Option<Instant>) -> bool {
      // SAFETY: See `notify_all`.
      let result = unsafe {
         parking_lot_core::park(
            self.0.as_ptr() as usize,
            || self.0.load(Ordering::Acquire) == expected,
            || {},
            |_, _| {},
            DEFAULT_PARK_TOKEN,
            deadline,
         )
      };
      // Spurious wake-ups and invalid parks are both re-checked by the callers.
      !matches!(result, ParkResult::TimedOut)
   }

   /// Records the outcome: sets DONE, bumps the epoch and wakes any waiters.
   #[inline]
   pub(crate) fn set_done(&self) {
      let current_state = self.0.load(Ordering::Relaxed);
      let new_state = Self::DONE | Self::next_epoch(current_state);

      // Release pairs with the Acquire loads of every reader, so the outcome
      // written before this swap is fully visible to anyone who sees DONE.
      let prev_state = self.0.swap(new_state, Ordering::Release);
      if prev_state & Self::WAITING != 0 {
         self.notify_all();
      }
   }

   /// Marks the cell as poisoned and wakes any waiters.
   #[inline]
   pub(crate) fn set_poisoned(&self) {
      let current_state = self.0.load(Ordering::Relaxed);
      let new_state = Self::POISONED | Self::next_epoch(current_state);
      let prev_state = self.0.swap(new_state, Ordering::Release);
      if prev_state & Self::WAITING != 0 {
         self.notify_all();
      }
   }

   /// Releases the lock without an outcome: clears LOCKED and WAITING, bumps the
   /// epoch and wakes any waiters so they race for the lock again.
   #[inline]
   pub(crate) fn set_idle(&self) {
      let current_state = self.0.load(Ordering::Relaxed);
      let prev_state = self.0.swap(Self::next_epoch(current_state), Ordering::Release);
      if prev_state & Self::WAITING != 0 {
         self.notify_all();
      }
   }

   /// Checks if an outcome has been recorded, with acquire semantics.
   #[inline]
   pub(crate) fn is_done(&self) -> bool {
      self.0.load(Ordering::Acquire) & Self::DONE != 0
   }

   #[inline]
   pub(crate) fn phase(&self) -> Phase {
      let state = self.0.load(Ordering::Acquire);
      if state & Self::DONE != 0 {
         Phase::Done
      } else if state & Self::POISONED != 0 {
         Phase::Poisoned
      } else if state & Self::LOCKED != 0 {
         Phase::Locked
      } else {
         Phase::Idle
      }
   }

   /// Single attempt at the lock.
   ///
   /// Returns `Err(state)` when another thread holds the lock; with `nowait == false`
   /// the returned state has WAITING set so the caller may park on it.
   #[inline]
   fn lock_step(&self, nowait: bool) -> Result<Acquire<'_>, u8> {
      loop {
         let current_state = self.0.load(Ordering::Acquire);
         if current_state & Self::DONE != 0 {
            return Ok(Acquire::Done);
         }
         if current_state & Self::POISONED != 0 {
            return Ok(Acquire::Poisoned);
         }

         if current_state & Self::LOCKED == 0 {
            match self.0.compare_exchange_weak(
               current_state,
               current_state | Self::LOCKED,
               Ordering::Acquire,
               Ordering::Relaxed,
            ) {
               Ok(_) => return Ok(Acquire::Won(InitGuard::new(self))),
               Err(_) => {
                  std::hint::spin_loop();
                  continue;
               }
            }
         }

         if !nowait && (current_state & Self::WAITING == 0) {
            let new_state = current_state | Self::WAITING;
            match self.0.compare_exchange_weak(
               current_state,
               new_state,
               Ordering::Relaxed,
               Ordering::Relaxed,
            ) {
               Ok(_) => return Err(new_state),
               Err(_) => {
                  std::hint::spin_loop();
                  continue;
               }
            }
         }
         return Err(current_state);
      }
   }

   /// Takes the initialization lock, parking while another thread holds it.
   #[inline]
   pub(crate) fn lock(&self) -> Acquire<'_> {
      let mut observed = match self.lock_step(false) {
         Ok(acquired) => return acquired,
         Err(state) => state,
      };
      loop {
         self.park(observed, None);
         match self.lock_step(false) {
            Ok(acquired) => return acquired,
            Err(state) => observed = state,
         }
      }
   }

   /// Takes the initialization lock from an async context.
   ///
   /// Losers yield to the scheduler while the winner runs. On a multi-threaded
   /// tokio runtime they fall back to a blocking park inside `block_in_place`
   /// after a bounded number of yields. On a current-thread runtime they keep
   /// yielding, since parking there would stall the winner as well. Without a
   /// tokio feature there is no scheduler to yield to, and the thread parks as
   /// in `lock`.
   #[inline]
   pub(crate) async fn lock_async(&self) -> Acquire<'_> {
      #[cfg(not(any(feature = "async-tokio", feature = "async-tokio-mt")))]
      {
         self.lock()
      }

      #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
      {
         loop {
            for _ in 0..16 {
               match self.lock_step(false) {
                  Ok(acquired) => return acquired,
                  Err(state) => {
                     for _ in 0..32 {
                        tokio::task::yield_now().await;
                        if self.0.load(Ordering::Relaxed) != state {
                           break;
                        }
                     }
                  }
               }
            }

            #[cfg(feature = "async-tokio-mt")]
            {
               if Self::can_block_in_place() {
                  return match self.lock_step(false) {
                     Ok(acquired) => acquired,
                     Err(state) => tokio::task::block_in_place(|| {
                        self.park(state, None);
                        self.lock()
                     }),
                  };
               }
            }
         }
      }
   }

   /// `block_in_place` panics outside a multi-threaded runtime.
   #[cfg(feature = "async-tokio-mt")]
   fn can_block_in_place() -> bool {
      use tokio::runtime::{Handle, RuntimeFlavor};

      matches!(
         Handle::try_current().map(|handle| handle.runtime_flavor()),
         Ok(RuntimeFlavor::MultiThread)
      )
   }

   /// Takes the lock only if it is free right now.
   #[inline]
   pub(crate) fn try_lock(&self) -> Option<InitGuard<'_>> {
      match self.lock_step(true) {
         Ok(Acquire::Won(guard)) => Some(guard),
         _ => None,
      }
   }

   /// Parks until the cell reaches a terminal state or `deadline` passes.
   ///
   /// Unlike `lock`, this never takes the lock, so it also waits on a cell
   /// nobody has started initializing yet.
   pub(crate) fn wait_until(&self, deadline: Instant) -> Settled {
      loop {
         let current_state = self.0.load(Ordering::Acquire);
         if current_state & Self::DONE != 0 {
            return Settled::Done;
         }
         if current_state & Self::POISONED != 0 {
            return Settled::Poisoned;
         }
         if current_state & Self::WAITING == 0
            && self
               .0
               .compare_exchange_weak(
                  current_state,
                  current_state | Self::WAITING,
                  Ordering::Relaxed,
                  Ordering::Relaxed,
               )
               .is_err()
         {
            std::hint::spin_loop();
            continue;
         }
         if !self.park(current_state | Self::WAITING, Some(deadline)) {
            return match self.phase() {
               Phase::Done => Settled::Done,
               Phase::Poisoned => Settled::Poisoned,
               Phase::Idle | Phase::Locked => Settled::TimedOut,
            };
         }
      }
   }
}

/// RAII guard held by the thread running the initializer.
///
/// `commit` records the outcome. A guard dropped without committing either
/// unwound out of the initializer, which poisons the cell, or belonged to an
/// async initializer whose future was dropped between polls, which hands the
/// lock back.
pub(crate) struct InitGuard<'a> {
   state: &'a CellLock,
   /// Set while `drive` polls the initializer; still set if that poll unwound.
   polling: bool,
}

impl<'a> InitGuard<'a> {
   #[inline(always)]
   const fn new(state: &'a CellLock) -> Self {
      Self {
         state,
         polling: false,
      }
   }

   /// Builds the initializer future with `f` and polls it to completion.
   ///
   /// A runtime may catch a panicking task and drop its future only afterwards,
   /// so the guard remembers a call or poll that never returned instead of
   /// relying on the thread still unwinding when it is dropped.
   pub(crate) async fn drive<F, Fut>(&mut self, f: F) -> Fut::Output
   where
      F: FnOnce() -> Fut,
      Fut: Future,
   {
      self.polling = true;
      let mut future = pin!(f());
      self.polling = false;
      poll_fn(|cx| {
         self.polling = true;
         let poll = future.as_mut().poll(cx);
         self.polling = false;
         poll
      })
      .await
   }

   /// Marks the outcome as recorded and wakes waiters.
   #[inline(always)]
   pub(crate) fn commit(self) {
      self.state.set_done();
      mem::forget(self);
   }
}

impl Drop for InitGuard<'_> {
   #[inline]
   fn drop(&mut self) {
      if self.polling || std::thread::panicking() {
         self.state.set_poisoned();
      } else {
         self.state.set_idle();
      }
   }
}
