//! Basic definitions, traits, and implementations for the slot chain,
//! entry/context call-stack, resource identity, and admission result types.
pub mod block_error;
pub mod context;
pub mod entry;
pub mod registry;
pub mod resource;
pub mod result;
pub mod rule;
pub mod slot_chain;
pub mod stat;

pub use block_error::*;
pub use context::*;
pub(crate) use entry::{exit_with_pairing_check, EntryRecord};
pub use entry::{PairingError, SentinelEntry};
pub use registry::*;
pub use resource::*;
pub use result::*;
pub use rule::*;
pub use slot_chain::*;
pub use stat::*;
