use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the epoch.
pub fn curr_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

/// Not a general-purpose `f64` successor: only used by the warm-up
/// controller (`core::flow::traffic_shaping::warmup`), which never calls it
/// with values near the edges of the `f64` range.
pub fn next_after(x: f64) -> f64 {
    let bits = x.to_bits();
    let bits = if (bits >> 63) == 0 { bits + 1 } else { bits - 1 };
    f64::from_bits(bits)
}

/// Process-wide monotonically increasing id generator, used for entry and
/// rule identities that never need to leave the process.
pub fn next_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Trait for upcast/downcast of slot and snapshot trait objects.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &(dyn Any + Send + Sync);
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn next_after_moves_forward() {
        let x = 1.0_f64 / 30.0;
        assert!(next_after(x) > x);
    }

    #[test]
    fn next_id_is_monotonic() {
        let a = next_id();
        let b = next_id();
        assert!(b > a);
    }
}
