use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lazy_dispatch::LazyCell;

#[derive(Debug)]
struct ConnectionPool {
   size: usize,
}

fn main() {
   let pool: Arc<LazyCell<ConnectionPool, String>> = Arc::new(LazyCell::new());
   let opened = Arc::new(AtomicUsize::new(0));

   let threads: Vec<_> = (0..5)
      .map(|i| {
         let pool = Arc::clone(&pool);
         let opened = Arc::clone(&opened);
         thread::spawn(move || {
            let pool = pool
               .get_or_init(|| {
                  // Runs on exactly one thread
                  opened.fetch_add(1, Ordering::Relaxed);
                  println!("Opening connection pool...");
                  thread::sleep(Duration::from_millis(50));
                  Ok(ConnectionPool { size: 8 })
               })
               .expect("pool opens");
            println!("Thread {i} sees a pool of {} connections", pool.size);
         })
      })
      .collect();

   for t in threads {
      t.join().unwrap();
   }

   assert_eq!(opened.load(Ordering::Relaxed), 1); // Initializer ran only once
   println!("Final pool: {:?}", pool);
}
