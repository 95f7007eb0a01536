//! Flow control: rules, the controller each rule materializes, the slot
//! that runs them during `entry()`, and the process-wide rule store.
pub mod controller;
pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod traffic_shaping;

pub use controller::*;
pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
