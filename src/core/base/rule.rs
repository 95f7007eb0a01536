//! The external contract every concrete rule type (flow, and in principle
//! any future sibling rule kind) must implement.
use crate::Result;
use std::fmt::Debug;

pub trait SentinelRule: Debug + Send + Sync {
    /// The resource this rule governs.
    fn resource_name(&self) -> String;

    /// Validates the rule's parameters. Returning `Err` here is a
    /// configuration error: it must happen synchronously at rule-load
    /// time, never as a panic later.
    fn is_valid(&self) -> Result<()> {
        Ok(())
    }
}
