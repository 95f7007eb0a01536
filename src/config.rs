//! Inward-facing constants.
//!
//! These are plain constants, not a dynamic configuration surface: loading
//! rules/config from files, environment variables or a datasource is
//! explicitly out of scope for this crate.

/// Hard cap on the number of distinct resources the slot-chain registry will
/// bind. Once reached, new resources bypass rule checking entirely - the
/// registry's safety valve against unbounded resource-name growth.
pub const MAX_SLOT_CHAIN_SIZE: usize = 6000;

/// Name given to a context that is auto-created because the calling thread
/// had none set.
pub const CONTEXT_DEFAULT_NAME: &str = "sentinel_default_context";

/// Default cold factor used by the warm-up controller when a rule does not
/// set one (or sets an invalid one <= 1).
pub const WARM_UP_COLD_FACTOR: u32 = 3;

/// Default warm-up period, in seconds, used when a rule leaves it unset.
pub const DEFAULT_WARM_UP_PERIOD_SEC: u32 = 10;

/// Default queueing time budget for the (unimplemented) rate-limiter
/// control behavior, in milliseconds.
pub const DEFAULT_MAX_QUEUEING_TIME_MS: u32 = 500;

/// Default log level used by the `logger_env` feature.
pub const DEFAULT_LOG_LEVEL: &str = "info";

use std::sync::atomic::{AtomicBool, Ordering};

static GLOBAL_SWITCH: AtomicBool = AtomicBool::new(true);

/// Global on/off switch for rule checking (default on).
pub fn is_global_switch_on() -> bool {
    GLOBAL_SWITCH.load(Ordering::Acquire)
}

/// Flips the global switch. When off, `entry()` always returns a
/// chain-less, unchecked entry.
pub fn set_global_switch(on: bool) {
    GLOBAL_SWITCH.store(on, Ordering::Release);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(MAX_SLOT_CHAIN_SIZE, 6000);
        assert_eq!(CONTEXT_DEFAULT_NAME, "sentinel_default_context");
    }
}
