//! Warm-up shaping controller — the hardest algorithm in the crate: a
//! token bucket whose admission threshold ramps from a cold start up to
//! the steady-state count over `warm_up_period_sec`. Same field set and
//! CAS-refill-then-subtract `sync_token` shape as a classic warm-up
//! rate limiter. Two choices worth calling out explicitly (see
//! DESIGN.md):
//!   1. `cool_down` keeps an explicit three-branch form (`<`, `>`, and a
//!      no-op on `==`) rather than a merged condition.
//!   2. `stored_tokens` starts at `max_token` (fully cold), not `0`.
use crate::base::StatNode;
use crate::core::flow::rule::FlowRule;
use crate::{config, utils, Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct WarmUpState {
    count: f64,
    cold_factor: u32,
    warning_token: u64,
    max_token: u64,
    slope: f64,
    stored_tokens: AtomicU64,
    last_filled_time: AtomicU64,
}

impl WarmUpState {
    /// Derives {warning_token, max_token, slope} from {count, cold_factor,
    /// warm_up_period_sec}. Rejects `cold_factor <= 1` with a configuration
    /// error rather than defaulting silently; defaulting is the
    /// rule-manager's job before this is ever built, not this
    /// constructor's.
    pub fn new(rule: &FlowRule) -> Result<Self> {
        let cold_factor = rule.warm_up_cold_factor;
        if cold_factor <= 1 {
            return Err(Error::msg(
                "warm_up_cold_factor must be greater than 1 for a WarmUp controller",
            ));
        }
        let count = rule.count;
        let warm_up_period = rule.warm_up_period_sec as f64;

        let warning_token = (warm_up_period * count / (cold_factor - 1) as f64) as u64;
        let max_token =
            warning_token + (2.0 * warm_up_period * count / (cold_factor + 1) as f64) as u64;
        let slope = (cold_factor - 1) as f64 / (count * (max_token - warning_token) as f64);

        let now_ms = utils::curr_time_millis();
        Ok(WarmUpState {
            count,
            cold_factor,
            warning_token,
            max_token,
            slope,
            stored_tokens: AtomicU64::new(max_token),
            last_filled_time: AtomicU64::new(now_ms - now_ms % 1000),
        })
    }

    pub fn warning_token(&self) -> u64 {
        self.warning_token
    }

    pub fn max_token(&self) -> u64 {
        self.max_token
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn stored_tokens(&self) -> u64 {
        self.stored_tokens.load(Ordering::SeqCst)
    }

    /// Snapshot-clone for test convenience: copies the current token state
    /// into fresh atomics rather than sharing them.
    pub fn snapshot_clone(&self) -> Self {
        WarmUpState {
            count: self.count,
            cold_factor: self.cold_factor,
            warning_token: self.warning_token,
            max_token: self.max_token,
            slope: self.slope,
            stored_tokens: AtomicU64::new(self.stored_tokens.load(Ordering::SeqCst)),
            last_filled_time: AtomicU64::new(self.last_filled_time.load(Ordering::SeqCst)),
        }
    }

    /// Test helper: forces the token state directly, bypassing `sync_token`.
    /// Also resets `last_filled_time` to now, so the next `can_pass` doesn't
    /// treat the gap since construction as elapsed time to refill over.
    pub fn set_stored_tokens_for_test(&self, tokens: u64) {
        self.stored_tokens
            .store(tokens.min(self.max_token), Ordering::SeqCst);
        let now_ms = utils::curr_time_millis();
        self.last_filled_time
            .store(now_ms - now_ms % 1000, Ordering::SeqCst);
    }

    pub fn can_pass(&self, node: &dyn StatNode, acquire_count: u32) -> bool {
        let previous_qps = node.previous_pass_qps() as f64;
        self.sync_token(previous_qps);

        let rest = self.stored_tokens.load(Ordering::SeqCst);
        let pass_qps = node.pass_qps() as f64;
        let acquire_count = acquire_count as f64;

        if rest >= self.warning_token {
            let above = (rest - self.warning_token) as f64;
            let warning_qps = utils::next_after(1.0 / (above * self.slope + 1.0 / self.count));
            pass_qps + acquire_count <= warning_qps
        } else {
            pass_qps + acquire_count <= self.count
        }
    }

    /// Advances token state to the current second. Concurrent racers may
    /// lose the CAS and simply skip refill for this tick; refill is
    /// idempotent up to at-most-once per second, so this is harmless.
    fn sync_token(&self, previous_qps: f64) {
        let now_ms = utils::curr_time_millis();
        let now_sec = now_ms - now_ms % 1000;

        let last = self.last_filled_time.load(Ordering::SeqCst);
        if now_sec <= last {
            return;
        }

        let old = self.stored_tokens.load(Ordering::SeqCst);
        let refilled = self.cool_down(old, now_sec, previous_qps);

        if self
            .stored_tokens
            .compare_exchange(old, refilled, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            // Decrement by previous_qps, clamped at 0. Two sequential
            // atomic updates (refill, then subtract) rather than one CAS
            // over the combined delta.
            let decrement = previous_qps as u64;
            let prev = self.stored_tokens.fetch_sub(decrement, Ordering::SeqCst);
            if prev < decrement {
                self.stored_tokens.store(0, Ordering::SeqCst);
            }
            self.last_filled_time.store(now_sec, Ordering::SeqCst);
        }
    }

    /// Refill schedule. Tokens only accumulate above the warning line when
    /// the system is genuinely under-used (`prev_qps < floor(count /
    /// cold_factor)`); a brief dip in traffic does not reinstate warm-up.
    /// `old == warning_token` is a deliberate no-op (neither branch fires)
    /// — see DESIGN.md's Open Questions.
    fn cool_down(&self, old: u64, now_sec: u64, prev_qps: f64) -> u64 {
        let last = self.last_filled_time.load(Ordering::SeqCst);
        let elapsed_ms = now_sec.saturating_sub(last);
        let refill = |base: u64| -> u64 {
            base + (elapsed_ms as f64 * self.count / 1000.0) as u64
        };

        let new_value = if old < self.warning_token {
            refill(old)
        } else if old > self.warning_token {
            let under_used = prev_qps < (self.count / self.cold_factor as f64).floor();
            if under_used {
                refill(old)
            } else {
                old
            }
        } else {
            old
        };

        new_value.min(self.max_token)
    }
}
