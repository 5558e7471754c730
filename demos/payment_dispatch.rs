use lazy_dispatch::payment::Amount;
use lazy_dispatch::{AppContext, ContextOptions};
use tracing_subscriber::EnvFilter;

fn main() {
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
      .init();

   let context = AppContext::new(ContextOptions::default().with_eager_config(true));
   println!("Feature X enabled: {}", context.config().is_feature_enabled("x"));

   for (code, minor) in [("alipay", 10050), ("WeChat", 2000), ("CARD_PAY", 99), ("bogus", 1)] {
      match context.checkout(code, Amount::from_minor(minor)) {
         Ok(receipt) => println!("{code}: {}", receipt.message()),
         Err(err) if err.is_rejected_request() => println!("{code}: rejected: {err}"),
         Err(err) => println!("{code}: internal error: {err}"),
      }
   }
}
