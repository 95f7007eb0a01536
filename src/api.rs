//! The topmost API: ties the slot-chain registry, the context call-stack,
//! and the flow rule-check slot together into the `entry()`/`exit()`
//! contract (spec'd in the crate's design notes as "Entry and Call-Stack").
//!
//! Typical use:
//!
//! ```no_run
//! use flow_admission::api::EntryBuilder;
//! use flow_admission::base::TrafficType;
//!
//! match EntryBuilder::new("my_resource", TrafficType::Inbound).build() {
//!     Ok(entry) => {
//!         // protected logic goes here
//!         entry.exit().unwrap_or_else(|e| flow_admission::logging::error!("{}", e));
//!     }
//!     Err(blocked) => {
//!         // the call was rejected by a flow rule; nothing to exit.
//!         flow_admission::logging::warn!("blocked: {}", blocked);
//!     }
//! }
//! ```
use crate::base::{
    self, ChainRegistry, ContextPtr, EntryContext, EntryRecord, ResourceId, SentinelEntry,
    SentinelInput, SlotChain, SlotChainBuilder, TrafficType,
};
use crate::core::flow::slot::FlowCheckSlot;
use crate::{config, logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

/// Produces the one slot chain every resource shares: just the flow
/// rule-check slot, in the documented order. A sibling rule kind (circuit
/// breaking, isolation, ...) would register its own `RuleCheckSlot` here
/// too, were one in scope.
#[derive(Debug, Default)]
pub struct DefaultSlotChainBuilder;

impl SlotChainBuilder for DefaultSlotChainBuilder {
    fn build(&self) -> SlotChain {
        let mut chain = SlotChain::new();
        chain.add_rule_check_slot(Arc::new(FlowCheckSlot::new()));
        chain
    }
}

lazy_static! {
    /// The process-wide resource → chain registry (spec.md §4.C). A single
    /// instance backs every `EntryBuilder::build()` call in the process.
    static ref REGISTRY: ChainRegistry = ChainRegistry::new(Arc::new(DefaultSlotChainBuilder));
}

/// Builder for one admission attempt against a resource. Mirrors the
/// `EntryBuilder` shape embedding applications of the reference
/// implementation already know, adapted to build directly against this
/// crate's own registry instead of a single always-on global chain.
pub struct EntryBuilder {
    resource: ResourceId,
    batch_count: u32,
    flag: i32,
    args: Option<Vec<String>>,
    attachments: Option<HashMap<String, String>>,
}

impl EntryBuilder {
    /// Starts building an entry for a string-identified resource.
    pub fn new(resource_name: impl Into<String>, traffic_type: TrafficType) -> Self {
        EntryBuilder {
            resource: ResourceId::new(resource_name, traffic_type),
            batch_count: 1,
            flag: 0,
            args: None,
            attachments: None,
        }
    }

    /// Starts building an entry against an already-constructed
    /// `ResourceId` (e.g. a `Method`-kind one).
    pub fn for_resource(resource: ResourceId) -> Self {
        EntryBuilder {
            resource,
            batch_count: 1,
            flag: 0,
            args: None,
            attachments: None,
        }
    }

    /// Sets the `acquireCount` the rule controllers check `passQps + count`
    /// against. Defaults to 1.
    pub fn with_batch_count(mut self, batch_count: u32) -> Self {
        self.batch_count = batch_count;
        self
    }

    pub fn with_flag(mut self, flag: i32) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_attachments(mut self, attachments: HashMap<String, String>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    /// Runs the `entry()` contract and returns the built entry, or `Err`
    /// when a flow rule denied the call. The denied case has already
    /// unwound whatever call-stack state it pushed; the caller must not
    /// call `exit()` on it.
    pub fn build(self) -> Result<Arc<SentinelEntry>> {
        let mut input = SentinelInput::new(self.batch_count, self.flag);
        if let Some(args) = self.args {
            input.set_args(args);
        }
        if let Some(attachments) = self.attachments {
            input.set_attachments(attachments);
        }
        entry(self.resource, self.batch_count, input)
    }
}

/// Convenience free function equivalent to
/// `EntryBuilder::new(resource_name, traffic_type).build()`.
pub fn entry_for(resource_name: impl Into<String>, traffic_type: TrafficType) -> Result<Arc<SentinelEntry>> {
    EntryBuilder::new(resource_name, traffic_type).build()
}

fn entry(resource: ResourceId, batch_count: u32, input: SentinelInput) -> Result<Arc<SentinelEntry>> {
    // 1. A null context (the sentinel installed via
    // `base::set_null_context`) disables all rule checking.
    if let Some(ctx) = base::current_context() {
        if base::is_null_context(&ctx) {
            return Ok(SentinelEntry::detached());
        }
    }

    // 2. No context set at all: auto-create the default one.
    let ctx: ContextPtr = match base::current_context() {
        Some(ctx) => ctx,
        None => {
            let ctx: ContextPtr = Arc::new(RwLock::new(EntryContext::new_auto_created()));
            base::set_current_context(ctx.clone());
            ctx
        }
    };

    // 3. The global on/off switch.
    if !config::is_global_switch_on() {
        return Ok(SentinelEntry::detached());
    }

    // 4. Chain lookup; at MAX_SLOT_CHAIN_SIZE this resource bypasses rule
    // checking entirely (the registry's documented safety valve).
    let chain = match REGISTRY.look_chain(&resource) {
        Some(chain) => chain,
        None => return Ok(SentinelEntry::detached()),
    };

    // 5. Push the new entry onto the context's call-stack.
    let id = utils::next_id();
    ctx.write().unwrap().push_entry(EntryRecord {
        id,
        resource: resource.clone(),
        chain: Some(chain.clone()),
        count: batch_count,
        input,
    });
    let sentinel_entry = SentinelEntry::new(ctx.clone(), id);

    // 6. Run the chain. An unexpected panic inside a slot is the "internal
    // fault" failure kind: logged and swallowed, the call is admitted
    // (fail-open) rather than propagated to the caller.
    let result = match panic::catch_unwind(AssertUnwindSafe(|| chain.entry(&ctx))) {
        Ok(result) => result,
        Err(_) => {
            logging::info!(
                "[api::entry] slot chain panicked for resource {}; admitting (fail-open)",
                resource
            );
            base::TokenResult::new_pass()
        }
    };

    if result.is_blocked() {
        let block_err = result.block_err();
        // The block signal is raised to the caller; the entry this attempt
        // pushed is unwound immediately rather than handed back.
        base::exit_with_pairing_check(&ctx, id, true)?;
        return Err(Error::msg(
            block_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "blocked by a flow rule".to_string()),
        ));
    }

    Ok(sentinel_entry)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::flow::rule::{FlowRule, Grade};
    use crate::core::flow::rule_manager::{append_rule, clear_rules};

    fn unique_resource(tag: &str) -> String {
        format!("api-test-{}-{}", tag, utils::next_id())
    }

    #[test]
    fn unruled_resource_is_admitted_and_exits_cleanly() {
        base::clear_current_context();
        let name = unique_resource("unruled");
        let entry = EntryBuilder::new(name, TrafficType::Inbound).build().unwrap();
        entry.exit().unwrap();
    }

    #[test]
    fn flow_rule_blocks_over_threshold() {
        base::clear_current_context();
        clear_rules();
        let name = unique_resource("blocked");
        let res = ResourceId::new(name.clone(), TrafficType::Inbound);
        append_rule(FlowRule::new(res.clone(), Grade::Qps, 1.0));

        let a = EntryBuilder::new(name.clone(), TrafficType::Inbound).build();
        assert!(a.is_ok());
        a.unwrap().exit().unwrap();

        // `entry()` doesn't record passes itself (statistics collection is
        // out of scope); seed the node directly the way every other
        // threshold test in this crate does.
        base::get_or_create_resource_node(&res).add_pass(1);
        let b = EntryBuilder::new(name.clone(), TrafficType::Inbound).build();
        assert!(b.is_err());
        clear_rules();
    }

    #[test]
    fn null_context_bypasses_even_a_denying_rule() {
        base::clear_current_context();
        clear_rules();
        let name = unique_resource("null-ctx");
        let res = ResourceId::new(name.clone(), TrafficType::Inbound);
        append_rule(FlowRule::new(res, Grade::Qps, 0.0));

        base::set_null_context();
        let entry = EntryBuilder::new(name, TrafficType::Inbound).build().unwrap();
        entry.exit().unwrap();
        base::clear_current_context();
        clear_rules();
    }

    #[test]
    fn global_switch_off_bypasses_rule_checking() {
        base::clear_current_context();
        clear_rules();
        let name = unique_resource("switch-off");
        let res = ResourceId::new(name.clone(), TrafficType::Inbound);
        append_rule(FlowRule::new(res, Grade::Qps, 0.0));

        config::set_global_switch(false);
        let entry = EntryBuilder::new(name, TrafficType::Inbound).build();
        config::set_global_switch(true);
        assert!(entry.is_ok());
        entry.unwrap().exit().unwrap();
        clear_rules();
    }

    #[test]
    fn no_context_set_auto_creates_one() {
        base::clear_current_context();
        assert!(base::current_context().is_none());
        let name = unique_resource("auto-ctx");
        let entry = EntryBuilder::new(name, TrafficType::Inbound).build().unwrap();
        assert!(base::current_context().is_some());
        entry.exit().unwrap();
        // the outermost entry exiting destroys the auto-created context
        assert!(base::current_context().is_none());
    }

    #[test]
    fn out_of_order_exit_across_nested_entries_reports_pairing_error() {
        base::clear_current_context();
        let outer = EntryBuilder::new(unique_resource("outer"), TrafficType::Inbound)
            .build()
            .unwrap();
        let _inner = EntryBuilder::new(unique_resource("inner"), TrafficType::Inbound)
            .build()
            .unwrap();
        let err = outer.exit().unwrap_err();
        assert!(err.to_string().contains("SentinelPairingError"));
        base::clear_current_context();
    }
}
