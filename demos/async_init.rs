use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lazy_dispatch::LazyCell;
use tokio::time::{sleep, Duration};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

async fn load_catalog(cell: &LazyCell<Vec<String>, String>) -> &Vec<String> {
   cell
      .get_or_init_async(|| async {
         // This async block runs only once
         COUNTER.fetch_add(1, Ordering::Relaxed);
         println!("Loading catalog...");
         sleep(Duration::from_millis(50)).await;
         Ok(vec!["alipay".to_string(), "wechat_pay".to_string()])
      })
      .await
      .expect("catalog loads")
}

#[tokio::main]
async fn main() {
   let catalog: Arc<LazyCell<Vec<String>, String>> = Arc::new(LazyCell::new());

   let tasks: Vec<_> = (0..5)
      .map(|_| {
         let catalog = Arc::clone(&catalog);
         tokio::spawn(async move {
            println!("Task access: {:?}", load_catalog(&catalog).await);
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }

   assert_eq!(COUNTER.load(Ordering::Relaxed), 1); // Initializer ran only once
   println!("Final catalog: {:?}", load_catalog(&catalog).await);
}
