use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use lazy_dispatch::{CellState, LazyCell};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
   name: String,
   retries: u32,
   endpoints: Vec<String>,
}

impl Settings {
   fn production() -> Self {
      Self {
         name: "production".to_string(),
         retries: 3,
         endpoints: vec!["a.internal".to_string(), "b.internal".to_string()],
      }
   }
}

#[test]
fn test_new_is_uninitialized() {
   let cell: LazyCell<i32, String> = LazyCell::new();
   assert_eq!(cell.state(), CellState::Uninitialized);
   assert!(!cell.is_terminal());
   assert_eq!(cell.get(), None);
   assert_eq!(cell.value(), None);
   assert_eq!(cell.error(), None);
}

#[test]
fn test_with_value_and_with_error() {
   let ready: LazyCell<i32, String> = LazyCell::with_value(42);
   assert_eq!(ready.state(), CellState::Ready);
   assert_eq!(ready.get(), Some(Ok(&42)));

   let failed: LazyCell<i32, String> = LazyCell::with_error("boom".to_string());
   assert_eq!(failed.state(), CellState::Failed);
   assert_eq!(failed.error(), Some(&"boom".to_string()));
   assert!(failed.is_terminal());
}

#[test]
fn test_get_or_init() {
   let cell: LazyCell<i32, String> = LazyCell::new();
   let counter = AtomicUsize::new(0);
   let value = cell.get_or_init(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(42)
   });
   assert_eq!(value, Ok(&42));
   assert_eq!(cell.state(), CellState::Ready);
   assert_eq!(counter.load(Ordering::SeqCst), 1);

   // Second call should not execute the closure
   let value = cell.get_or_init(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      panic!("Should not be called")
   });
   assert_eq!(value, Ok(&42));
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failure_is_terminal() {
   let cell: LazyCell<i32, String> = LazyCell::new();
   let counter = AtomicUsize::new(0);

   let first = cell.get_or_init(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      Err("init error".to_string())
   });
   assert_eq!(first, Err(&"init error".to_string()));
   assert_eq!(cell.state(), CellState::Failed);

   // A succeeding factory afterwards is ignored; the recorded error stays.
   let second = cell.get_or_init(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(55)
   });
   assert_eq!(second, Err(&"init error".to_string()));
   assert_eq!(counter.load(Ordering::SeqCst), 1);

   // Both callers were handed the very same recorded error.
   assert!(std::ptr::eq(first.unwrap_err(), second.unwrap_err()));
}

#[test]
fn test_eager_runs_immediately() {
   let counter = AtomicUsize::new(0);
   let cell: LazyCell<i32, String> = LazyCell::eager(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(7)
   });
   assert_eq!(counter.load(Ordering::SeqCst), 1);
   assert_eq!(cell.state(), CellState::Ready);
   assert_eq!(cell.get_or_init(|| Ok(8)), Ok(&7));
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_try_set() {
   let cell: LazyCell<i32, String> = LazyCell::new();
   assert_eq!(cell.try_set(42), Ok(&42));
   assert_eq!(cell.try_set(24), Err(24));
   assert_eq!(cell.value(), Some(&42));
}

#[test]
fn test_try_set_recursive() {
   // Calling try_set from inside the initializer must not deadlock; the lock is ours.
   let cell: LazyCell<i32, String> = LazyCell::new();
   let value = cell.get_or_init(|| {
      assert_eq!(cell.state(), CellState::Initializing);
      assert!(
         matches!(cell.try_set(44), Err(44)),
         "Expected try_set to fail while locked"
      );
      Ok(42)
   });
   assert_eq!(value, Ok(&42));
}

#[test]
fn test_single_invocation_under_contention() {
   const CALLERS: usize = 100;
   let cell: Arc<LazyCell<Settings, String>> = Arc::new(LazyCell::new());
   let counter = Arc::new(AtomicUsize::new(0));
   let barrier = Arc::new(Barrier::new(CALLERS));

   let threads: Vec<_> = (0..CALLERS)
      .map(|_| {
         let cell = Arc::clone(&cell);
         let counter = Arc::clone(&counter);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            let settings = cell
               .get_or_init(|| {
                  counter.fetch_add(1, Ordering::SeqCst);
                  // Keep the window open so the other callers pile up.
                  thread::sleep(Duration::from_millis(20));
                  Ok(Settings::production())
               })
               .expect("initialization succeeds");
            // A ready value is always fully built.
            assert_eq!(settings, &Settings::production());
            settings as *const Settings as usize
         })
      })
      .collect();

   let addresses: Vec<usize> = threads.into_iter().map(|h| h.join().unwrap()).collect();
   assert_eq!(counter.load(Ordering::SeqCst), 1);
   // All callers observed the identical value, not just equal ones.
   assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
   assert_eq!(cell.value(), Some(&Settings::production()));
}

#[test]
fn test_failure_under_contention() {
   const CALLERS: usize = 32;
   let cell: Arc<LazyCell<i32, String>> = Arc::new(LazyCell::new());
   let counter = Arc::new(AtomicUsize::new(0));
   let barrier = Arc::new(Barrier::new(CALLERS));

   let threads: Vec<_> = (0..CALLERS)
      .map(|i| {
         let cell = Arc::clone(&cell);
         let counter = Arc::clone(&counter);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            cell
               .get_or_init(|| {
                  counter.fetch_add(1, Ordering::SeqCst);
                  thread::sleep(Duration::from_millis(10));
                  Err(format!("failed in caller {i}"))
               })
               .map(|v| *v)
               .map_err(Clone::clone)
         })
      })
      .collect();

   let results: Vec<_> = threads.into_iter().map(|h| h.join().unwrap()).collect();
   assert_eq!(counter.load(Ordering::SeqCst), 1);
   let first = results[0].clone();
   assert!(first.is_err());
   assert!(results.iter().all(|r| *r == first));

   // Late callers get the same error.
   assert_eq!(cell.get_or_init(|| Ok(1)).map(|v| *v).map_err(Clone::clone), first);
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panic_poisons_cell() {
   let cell: LazyCell<i32, String> = LazyCell::new();
   let counter = AtomicUsize::new(0);

   let result = panic::catch_unwind(AssertUnwindSafe(|| {
      cell.get_or_init(|| {
         counter.fetch_add(1, Ordering::SeqCst);
         panic!("factory exploded")
      })
      .map(|v| *v)
   }));
   assert!(result.is_err());
   assert_eq!(cell.state(), CellState::Poisoned);
   assert_eq!(cell.get(), None);

   // The factory is not retried; later callers panic instead.
   let result = panic::catch_unwind(AssertUnwindSafe(|| {
      cell.get_or_init(|| {
         counter.fetch_add(1, Ordering::SeqCst);
         Ok(1)
      })
      .map(|v| *v)
   }));
   assert!(result.is_err());
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_wait_timeout_returns_outcome_from_other_thread() {
   let cell: Arc<LazyCell<i32, String>> = Arc::new(LazyCell::new());
   let started = Arc::new(Barrier::new(2));

   let initializer = {
      let cell = Arc::clone(&cell);
      let started = Arc::clone(&started);
      thread::spawn(move || {
         cell
            .get_or_init(|| {
               started.wait();
               thread::sleep(Duration::from_millis(50));
               Ok(9)
            })
            .map(|v| *v)
            .map_err(Clone::clone)
      })
   };

   started.wait();
   assert_eq!(cell.state(), CellState::Initializing);
   assert_eq!(cell.wait_timeout(Duration::from_secs(5)), Some(Ok(&9)));
   assert_eq!(initializer.join().unwrap(), Ok(9));
}

#[test]
fn test_wait_timeout_elapses() {
   let cell: LazyCell<i32, String> = LazyCell::new();
   assert_eq!(cell.wait_timeout(Duration::from_millis(20)), None);
   // Waiting never initializes.
   assert_eq!(cell.state(), CellState::Uninitialized);

   let ready: LazyCell<i32, String> = LazyCell::with_value(3);
   assert_eq!(ready.wait_timeout(Duration::ZERO), Some(Ok(&3)));
}

#[test]
fn test_into_inner() {
   let cell: LazyCell<String, String> = LazyCell::new();
   let _ = cell.get_or_init(|| Ok("kept".to_string()));
   assert_eq!(cell.into_inner(), Some(Ok("kept".to_string())));

   let empty: LazyCell<String, String> = LazyCell::new();
   assert_eq!(empty.into_inner(), None);
}

#[test]
fn test_drop_releases_value() {
   let tracker = Arc::new(());
   {
      let cell: LazyCell<Arc<()>, String> = LazyCell::new();
      let _ = cell.get_or_init(|| Ok(Arc::clone(&tracker)));
      assert_eq!(Arc::strong_count(&tracker), 2);
   }
   assert_eq!(Arc::strong_count(&tracker), 1);
}

#[test]
fn test_debug_format() {
   let cell: LazyCell<i32, String> = LazyCell::new();
   assert_eq!(format!("{cell:?}"), "LazyCell(<uninitialized>)");
   let _ = cell.get_or_init(|| Ok(5));
   assert_eq!(format!("{cell:?}"), "LazyCell(5)");

   let failed: LazyCell<i32, &str> = LazyCell::from(Err("nope"));
   assert_eq!(format!("{failed:?}"), "LazyCell(<failed: \"nope\">)");
}

#[tokio::test]
async fn test_get_or_init_async() {
   let cell: LazyCell<i32, String> = LazyCell::new();
   let counter = Arc::new(AtomicUsize::new(0));

   let value = cell
      .get_or_init_async(|| {
         let counter = Arc::clone(&counter);
         async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(42)
         }
      })
      .await;
   assert_eq!(value, Ok(&42));

   // Second call should not execute the future
   let value = cell
      .get_or_init_async(|| async {
         counter.fetch_add(1, Ordering::SeqCst);
         panic!("Should not be called");
      })
      .await;
   assert_eq!(value, Ok(&42));
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_contention_single_invocation() {
   let cell: Arc<LazyCell<String, String>> = Arc::new(LazyCell::new());
   let counter = Arc::new(AtomicUsize::new(0));

   let tasks: Vec<_> = (0..16)
      .map(|_| {
         let cell = Arc::clone(&cell);
         let counter = Arc::clone(&counter);
         tokio::spawn(async move {
            cell
               .get_or_init_async(|| async move {
                  counter.fetch_add(1, Ordering::SeqCst);
                  tokio::time::sleep(Duration::from_millis(20)).await;
                  Err::<String, _>("registry unreachable".to_string())
               })
               .await
               .map(Clone::clone)
               .map_err(Clone::clone)
         })
      })
      .collect();

   for task in tasks {
      assert_eq!(task.await.unwrap(), Err("registry unreachable".to_string()));
   }
   assert_eq!(counter.load(Ordering::SeqCst), 1);
   assert_eq!(cell.state(), CellState::Failed);
}

#[tokio::test]
async fn test_async_contention_current_thread() {
   let cell: Arc<LazyCell<i32, String>> = Arc::new(LazyCell::new());
   let counter = Arc::new(AtomicUsize::new(0));

   let tasks: Vec<_> = (0..4)
      .map(|_| {
         let cell = Arc::clone(&cell);
         let counter = Arc::clone(&counter);
         tokio::spawn(async move {
            cell
               .get_or_init_async(|| async move {
                  counter.fetch_add(1, Ordering::SeqCst);
                  tokio::time::sleep(Duration::from_millis(50)).await;
                  Ok(1)
               })
               .await
               .map(|v| *v)
               .map_err(Clone::clone)
         })
      })
      .collect();

   for task in tasks {
      assert_eq!(task.await.unwrap(), Ok(1));
   }
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_async_initializer_releases_cell() {
   let cell: LazyCell<i32, String> = LazyCell::new();

   let timed_out = tokio::time::timeout(
      Duration::from_millis(10),
      cell.get_or_init_async(|| async {
         tokio::time::sleep(Duration::from_secs(5)).await;
         Ok(1)
      }),
   )
   .await;
   assert!(timed_out.is_err());
   assert_eq!(cell.state(), CellState::Uninitialized);

   assert_eq!(cell.get_or_init(|| Ok(2)), Ok(&2));
   assert_eq!(cell.state(), CellState::Ready);
}

#[tokio::test]
async fn test_waiter_takes_over_after_cancellation() {
   let cell: Arc<LazyCell<i32, String>> = Arc::new(LazyCell::new());
   let started = Arc::new(AtomicUsize::new(0));

   let first = {
      let cell = Arc::clone(&cell);
      let started = Arc::clone(&started);
      tokio::spawn(async move {
         tokio::time::timeout(
            Duration::from_millis(30),
            cell.get_or_init_async(|| async move {
               started.fetch_add(1, Ordering::SeqCst);
               tokio::time::sleep(Duration::from_secs(5)).await;
               Ok(1)
            }),
         )
         .await
         .is_err()
      })
   };
   let second = {
      let cell = Arc::clone(&cell);
      let started = Arc::clone(&started);
      tokio::spawn(async move {
         cell
            .get_or_init_async(|| async move {
               started.fetch_add(1, Ordering::SeqCst);
               Ok(2)
            })
            .await
            .map(|v| *v)
            .map_err(Clone::clone)
      })
   };

   assert!(first.await.unwrap());
   assert_eq!(second.await.unwrap(), Ok(2));
   assert_eq!(started.load(Ordering::SeqCst), 2);
   assert_eq!(cell.get(), Some(Ok(&2)));
}

#[tokio::test]
async fn test_panicking_async_initializer_poisons_spawned_task() {
   let cell: Arc<LazyCell<i32, String>> = Arc::new(LazyCell::new());

   let task = {
      let cell = Arc::clone(&cell);
      tokio::spawn(async move {
         cell
            .get_or_init_async(|| async {
               tokio::task::yield_now().await;
               let corrupted = true;
               if corrupted {
                  panic!("catalog corrupted");
               }
               Ok(1)
            })
            .await
            .is_ok()
      })
   };

   assert!(task.await.unwrap_err().is_panic());
   assert_eq!(cell.state(), CellState::Poisoned);
}

#[test]
fn test_try_set_returns_installed_value() {
   let cell: LazyCell<String, String> = LazyCell::new();
   let installed = cell.try_set("primary".to_string()).unwrap();
   assert_eq!(installed, "primary");
   assert!(std::ptr::eq(installed, cell.value().unwrap()));
   assert_eq!(cell.try_set("backup".to_string()), Err("backup".to_string()));
}
