//! The flow rule-check slot: for each rule on the current resource, picks
//! the node to meter against and asks the rule's controller whether the
//! call passes.
use super::rule::{FlowRule, Strategy, LIMIT_APP_DEFAULT, LIMIT_APP_OTHER};
use super::rule_manager;
use crate::base::{
    get_or_create_origin_node, get_or_create_resource_node, BaseSlot, BlockType, ContextPtr,
    ResourceId, RuleCheckSlot, StatNode, TokenResult,
};
use crate::logging;
use std::sync::{Arc, Once};

/// Matches the upstream Sentinel implementations this crate is API-
/// compatible with: flow checking runs early in the chain, before any
/// heavier rule kind an embedder might install alongside it.
pub const RULE_CHECK_SLOT_ORDER: u32 = 2000;

#[derive(Debug, Default)]
pub struct FlowCheckSlot {
    missing_resource_warned: Once,
}

impl FlowCheckSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaseSlot for FlowCheckSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for FlowCheckSlot {
    fn check(&self, ctx: &ContextPtr) -> TokenResult {
        let guard = ctx.read().unwrap();
        let resource = match guard.curr_resource() {
            Some(r) => r,
            None => {
                self.missing_resource_warned.call_once(|| {
                    logging::warn!(
                        "[FlowCheckSlot::check] entry has no current resource; skipping flow check"
                    );
                });
                return TokenResult::new_pass();
            }
        };
        let origin = guard.origin().to_string();
        let origin_node = guard.origin_node();
        let name = guard.name().to_string();
        let acquire_count = guard.curr_count();
        drop(guard);

        for rule in rule_manager::rules_for_resource(resource.name()) {
            let applies = rule.limit_app == origin
                || rule.limit_app == LIMIT_APP_DEFAULT
                || (rule.limit_app == LIMIT_APP_OTHER
                    && rule_manager::is_other_origin(&origin, resource.name()));
            if !applies {
                continue;
            }

            let node = select_node(&rule, &resource, &name, &origin, origin_node.clone());
            let node = match node {
                Some(n) => n,
                None => continue,
            };

            if !rule.controller.can_pass(node.as_ref(), acquire_count) {
                return TokenResult::new_blocked_with_cause(
                    BlockType::Flow,
                    format!("flow rule blocked resource {}", resource.name()),
                    rule.clone(),
                    Arc::new(rule.count),
                );
            }
        }
        TokenResult::new_pass()
    }
}

/// Selects the `StatNode` `rule`'s controller should meter, per the
/// `(limit_app, origin, strategy, ref_resource)` matrix: a targeted rule
/// (`limit_app == origin`) meters the caller's own node, a default rule
/// meters the resource's cluster-wide node, and an "other" rule applies
/// only when no sibling rule explicitly targets this origin. `None` means
/// the rule does not apply to this call and it should be admitted
/// unconditionally.
fn select_node(
    rule: &FlowRule,
    resource: &ResourceId,
    ctx_name: &str,
    origin: &str,
    origin_node: Option<Arc<dyn StatNode>>,
) -> Option<Arc<dyn StatNode>> {
    let targets_this_origin = !origin.is_empty() && rule.limit_app == origin;
    let targets_default = rule.limit_app == LIMIT_APP_DEFAULT;
    let targets_other =
        rule.limit_app == LIMIT_APP_OTHER && rule_manager::is_other_origin(origin, resource.name());

    if !(targets_this_origin || targets_default || targets_other) {
        return None;
    }

    match rule.strategy {
        Strategy::Direct => {
            if targets_default {
                Some(get_or_create_resource_node(resource))
            } else {
                origin_node.or_else(|| Some(get_or_create_origin_node(resource, origin)))
            }
        }
        Strategy::Relate => {
            if rule.ref_resource.is_empty() {
                None
            } else {
                let ref_resource = ResourceId::new(rule.ref_resource.clone(), resource.traffic_type());
                Some(get_or_create_resource_node(&ref_resource))
            }
        }
        Strategy::Chain => {
            if rule.ref_resource == ctx_name {
                Some(get_or_create_resource_node(resource))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{EntryContext, EntryRecord, TrafficType};
    use crate::core::flow::rule::{ControlBehavior, Grade};
    use crate::core::flow::rule_manager::{append_rule, clear_rules};
    use std::sync::RwLock;

    fn resource(name: &str) -> ResourceId {
        ResourceId::new(name, TrafficType::Inbound)
    }

    fn push_entry(ctx: &ContextPtr, resource: ResourceId) {
        push_entry_with_count(ctx, resource, 1);
    }

    fn push_entry_with_count(ctx: &ContextPtr, resource: ResourceId, count: u32) {
        ctx.write().unwrap().push_entry(EntryRecord {
            id: crate::utils::next_id(),
            resource,
            chain: None,
            count,
            input: crate::base::SentinelInput::default(),
        });
    }

    #[test]
    fn no_rules_admits() {
        clear_rules();
        let slot = FlowCheckSlot::new();
        let ctx: ContextPtr = Arc::new(RwLock::new(EntryContext::new_default()));
        push_entry(&ctx, resource("flow-slot-unruled"));
        assert!(slot.check(&ctx).is_pass());
    }

    #[test]
    fn direct_default_rule_blocks_over_threshold() {
        clear_rules();
        let res = resource("flow-slot-direct");
        append_rule(FlowRule::new(res.clone(), Grade::Qps, 1.0));
        let node = get_or_create_resource_node(&res);
        node.add_pass(5);

        let slot = FlowCheckSlot::new();
        let ctx: ContextPtr = Arc::new(RwLock::new(EntryContext::new_default()));
        push_entry(&ctx, res);
        assert!(slot.check(&ctx).is_blocked());
        clear_rules();
    }

    #[test]
    fn direct_default_rule_admits_under_threshold() {
        clear_rules();
        let res = resource("flow-slot-direct-under");
        append_rule(FlowRule::new(res.clone(), Grade::Qps, 10.0));

        let slot = FlowCheckSlot::new();
        let ctx: ContextPtr = Arc::new(RwLock::new(EntryContext::new_default()));
        push_entry(&ctx, res);
        assert!(slot.check(&ctx).is_pass());
        clear_rules();
    }

    #[test]
    fn acquire_count_above_one_can_tip_an_otherwise_passing_call() {
        clear_rules();
        let res = resource("flow-slot-batch-count");
        append_rule(FlowRule::new(res.clone(), Grade::Qps, 5.0));

        let slot = FlowCheckSlot::new();
        let ctx: ContextPtr = Arc::new(RwLock::new(EntryContext::new_default()));
        push_entry_with_count(&ctx, res, 6);
        assert!(slot.check(&ctx).is_blocked());
        clear_rules();
    }

    #[test]
    fn chain_strategy_mismatch_admits_unconditionally() {
        clear_rules();
        let res = resource("flow-slot-chain");
        let mut r = FlowRule::new(res.clone(), Grade::Qps, 0.0);
        r.strategy = Strategy::Chain;
        r.ref_resource = "some-other-context".to_string();
        r.control_behavior = ControlBehavior::Default;
        append_rule(r);

        let slot = FlowCheckSlot::new();
        let ctx: ContextPtr = Arc::new(RwLock::new(EntryContext::new("this-context", "")));
        push_entry(&ctx, res);
        assert!(slot.check(&ctx).is_pass());
        clear_rules();
    }
}
