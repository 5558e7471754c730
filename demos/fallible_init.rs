use lazy_dispatch::{CellState, LazyCell};

fn connect(cell: &LazyCell<String, String>, fail: bool) -> Result<&String, &String> {
   cell.get_or_init(|| {
      println!("Attempting initialization (fail={fail})...");
      if fail {
         Err("Initialization failed!".to_string())
      } else {
         Ok("Successfully initialized".to_string())
      }
   })
}

fn main() {
   let cell = LazyCell::new();

   // First attempt fails
   match connect(&cell, true) {
      Ok(_) => panic!("Should have failed"),
      Err(e) => println!("Caught error: {e}"),
   }
   assert_eq!(cell.state(), CellState::Failed);

   // The failure is final: the second factory never runs
   match connect(&cell, false) {
      Ok(_) => panic!("A failed cell never recovers"),
      Err(e) => println!("Same error again: {e}"),
   }
   assert_eq!(cell.error(), Some(&"Initialization failed!".to_string()));
}
