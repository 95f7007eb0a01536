//! Pipeline abstraction the registry-bound chain is built from. `SlotChain`
//! always runs `Arc`/`RwLock`-backed contexts: this crate targets the
//! shared-memory-parallel model unconditionally, so there is only one
//! context flavor, not a single-threaded `Rc`/`RefCell` variant gated
//! behind a feature flag alongside it.
use super::{BlockError, ContextPtr, TokenResult};
use crate::logging;
use crate::utils::AsAny;
use std::any::Any;
use std::sync::Arc;

const SLOT_INIT: usize = 8;

/// `PartialOrd` is not object safe, so slots are sorted by `order()` into
/// per-kind buckets instead of compared directly.
pub trait BaseSlot: Any + AsAny + Sync + Send {
    fn order(&self) -> u32 {
        0
    }
}

/// Runs before rule checking; reserved for bookkeeping a production
/// statistics backend would need (node interning, warm buffers, ...).
/// This crate installs none by default.
pub trait StatPrepareSlot: BaseSlot {
    fn prepare(&self, ctx: ContextPtr) {
        let _ = ctx;
    }
}

/// A rule-based admission check. All checking rule kinds implement this;
/// the only one this crate ships is `flow::slot::FlowCheckSlot`.
pub trait RuleCheckSlot: BaseSlot {
    fn check(&self, ctx: &ContextPtr) -> TokenResult;
}

/// Counts/logs outcomes. `on_completed` only fires for entries that were
/// never blocked.
pub trait StatSlot: BaseSlot {
    fn on_entry_pass(&self, ctx: ContextPtr) {
        let _ = ctx;
    }
    fn on_entry_blocked(&self, ctx: ContextPtr, block_error: Option<BlockError>) {
        let (_, _) = (ctx, block_error);
    }
    fn on_completed(&self, ctx: ContextPtr) {
        let _ = ctx;
    }
}

/// An ordered sequence of slots, built once per unique resource and shared
/// for its lifetime.
pub struct SlotChain {
    stat_pres: Vec<Arc<dyn StatPrepareSlot>>,
    rule_checks: Vec<Arc<dyn RuleCheckSlot>>,
    stats: Vec<Arc<dyn StatSlot>>,
}

impl Default for SlotChain {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotChain {
    pub fn new() -> Self {
        Self {
            stat_pres: Vec::with_capacity(SLOT_INIT),
            rule_checks: Vec::with_capacity(SLOT_INIT),
            stats: Vec::with_capacity(SLOT_INIT),
        }
    }

    pub fn add_stat_prepare_slot(&mut self, s: Arc<dyn StatPrepareSlot>) {
        self.stat_pres.push(s);
        self.stat_pres.sort_unstable_by_key(|a| a.order());
    }

    pub fn add_rule_check_slot(&mut self, s: Arc<dyn RuleCheckSlot>) {
        self.rule_checks.push(s);
        self.rule_checks.sort_unstable_by_key(|a| a.order());
    }

    pub fn add_stat_slot(&mut self, s: Arc<dyn StatSlot>) {
        self.stats.push(s);
        self.stats.sort_unstable_by_key(|a| a.order());
    }

    /// Runs the chain for one admission attempt, returning its
    /// `TokenResult`. The first blocking `RuleCheckSlot` short-circuits the
    /// remaining checks.
    pub fn entry(&self, ctx: &ContextPtr) -> TokenResult {
        for s in &self.stat_pres {
            s.prepare(ctx.clone());
        }

        let mut result = TokenResult::new_pass();
        for s in &self.rule_checks {
            let res = s.check(ctx);
            if res.is_blocked() {
                result = res;
                break;
            }
        }

        for s in &self.stats {
            if result.is_pass() {
                s.on_entry_pass(ctx.clone());
            } else {
                s.on_entry_blocked(ctx.clone(), result.block_err());
            }
        }
        result
    }

    /// Runs on a well-formed exit. Stat slots are expected not to panic;
    /// any panic here is the embedder's bug to fix, not something this
    /// chain papers over.
    pub fn exit(&self, ctx: &ContextPtr, was_blocked: bool) {
        if was_blocked {
            return;
        }
        for s in &self.stats {
            s.on_completed(ctx.clone());
        }
    }
}

#[cfg(test)]
pub(crate) use test::aggregation::{MockRuleCheckSlot, MockStatSlot};
