//! Process-wide flow-rule store. Rules are grouped by resource name behind
//! a single `RwLock`, mirroring how the slot-chain registry keeps readers
//! lock-free at the cost of a shared writer lock on update.
use super::rule::FlowRule;
use crate::base::SentinelRule;
use crate::logging;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref RULE_MAP: RwLock<HashMap<String, Vec<Arc<FlowRule>>>> = RwLock::new(HashMap::new());
}

/// Replaces all rules for every resource named in `rules`. Resources not
/// named in `rules` keep whatever they already had; this mirrors how a
/// datasource would push an incremental rule-set update rather than wiping
/// the whole store on every reload.
pub fn load_rules(rules: Vec<FlowRule>) {
    let mut by_resource: HashMap<String, Vec<Arc<FlowRule>>> = HashMap::new();
    for mut rule in rules {
        if let Err(e) = rule.is_valid() {
            logging::warn!(
                "[FlowRuleManager::load_rules] dropping invalid rule for resource {}: {}",
                rule.resource_name(),
                e
            );
            continue;
        }
        if let Err(e) = rule.build_controller() {
            logging::warn!(
                "[FlowRuleManager::load_rules] dropping rule with unbuildable controller for resource {}: {}",
                rule.resource_name(),
                e
            );
            continue;
        }
        by_resource
            .entry(rule.resource_name())
            .or_default()
            .push(Arc::new(rule));
    }

    let mut map = RULE_MAP.write().unwrap();
    for (resource, rule_set) in by_resource {
        logging::info!(
            "[FlowRuleManager::load_rules] updating {} rule(s) for resource {}",
            rule_set.len(),
            resource
        );
        map.insert(resource, rule_set);
    }
}

/// Adds `rule` to its resource's rule set if an equal rule (by
/// `FlowRule`'s value equality, which ignores `id` and `controller`) is
/// not already present. Returns `false` without installing the rule if it
/// fails validation or the controller cannot be built - an invalid rule
/// must never reach `rules_for_resource`.
pub fn append_rule(mut rule: FlowRule) -> bool {
    if rule.is_valid().is_err() {
        return false;
    }
    if rule.build_controller().is_err() {
        return false;
    }

    let resource = rule.resource_name();
    let mut map = RULE_MAP.write().unwrap();
    let rule_set = map.entry(resource.clone()).or_default();
    if rule_set.iter().any(|r| r.as_ref() == &rule) {
        return false;
    }
    rule_set.push(Arc::new(rule));
    logging::info!("[FlowRuleManager::append_rule] added rule for resource {}", resource);
    true
}

/// Removes every rule for every resource.
pub fn clear_rules() {
    RULE_MAP.write().unwrap().clear();
}

/// Removes every rule for one resource.
pub fn clear_rules_for_resource(resource: &str) {
    RULE_MAP.write().unwrap().remove(resource);
}

/// The current rule set for `resource`, or empty if none are loaded.
pub fn rules_for_resource(resource: &str) -> Vec<Arc<FlowRule>> {
    RULE_MAP
        .read()
        .unwrap()
        .get(resource)
        .cloned()
        .unwrap_or_default()
}

/// True when `origin` is not explicitly targeted (`limit_app == origin`)
/// by any rule on `resource` - the precondition the `"other"` targeting
/// value needs before it applies.
pub fn is_other_origin(origin: &str, resource: &str) -> bool {
    if origin.is_empty() {
        return false;
    }
    let map = RULE_MAP.read().unwrap();
    match map.get(resource) {
        None => true,
        Some(rules) => !rules.iter().any(|r| r.limit_app == origin),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ResourceId, TrafficType};
    use crate::core::flow::rule::{ControlBehavior, Grade};

    fn resource(name: &str) -> ResourceId {
        ResourceId::new(name, TrafficType::Inbound)
    }

    #[test]
    fn append_then_lookup() {
        clear_rules();
        let r = FlowRule::new(resource("svc-a"), Grade::Qps, 10.0);
        assert!(append_rule(r));
        assert_eq!(rules_for_resource("svc-a").len(), 1);
        clear_rules();
    }

    #[test]
    fn append_rejects_duplicate() {
        clear_rules();
        let r = FlowRule::new(resource("svc-b"), Grade::Qps, 10.0);
        assert!(append_rule(r.clone()));
        assert!(!append_rule(r));
        assert_eq!(rules_for_resource("svc-b").len(), 1);
        clear_rules();
    }

    #[test]
    fn append_rejects_invalid_warmup_rule() {
        clear_rules();
        let mut r = FlowRule::new(resource("svc-c"), Grade::Qps, 10.0);
        r.control_behavior = ControlBehavior::WarmUp;
        r.warm_up_cold_factor = 1;
        assert!(!append_rule(r));
        assert!(rules_for_resource("svc-c").is_empty());
        clear_rules();
    }

    #[test]
    fn is_other_origin_true_when_unmatched() {
        clear_rules();
        let mut r = FlowRule::new(resource("svc-d"), Grade::Qps, 10.0);
        r.limit_app = "caller-a".to_string();
        append_rule(r);
        assert!(is_other_origin("caller-b", "svc-d"));
        assert!(!is_other_origin("caller-a", "svc-d"));
        clear_rules();
    }

    #[test]
    fn is_other_origin_true_for_unknown_resource() {
        clear_rules();
        assert!(is_other_origin("caller-a", "svc-unknown"));
    }

    #[test]
    fn load_rules_replaces_named_resources_only() {
        clear_rules();
        append_rule(FlowRule::new(resource("svc-e"), Grade::Qps, 10.0));
        append_rule(FlowRule::new(resource("svc-f"), Grade::Qps, 10.0));
        load_rules(vec![FlowRule::new(resource("svc-e"), Grade::Qps, 99.0)]);
        assert_eq!(rules_for_resource("svc-e").len(), 1);
        assert_eq!(rules_for_resource("svc-e")[0].count, 99.0);
        assert_eq!(rules_for_resource("svc-f").len(), 1);
        clear_rules();
    }
}
