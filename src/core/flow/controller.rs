//! Polymorphic controller: a closed three-variant enum rather than a
//! trait-object hierarchy, since the control-behavior space is closed and
//! each variant needs only one operation.
use super::rule::FlowRule;
use super::traffic_shaping::warmup::WarmUpState;
use crate::base::StatNode;
use crate::Result;

#[derive(Debug, Clone)]
pub struct DefaultController {
    pub threshold: f64,
}

impl DefaultController {
    pub fn can_pass(&self, node: &dyn StatNode, acquire_count: u32) -> bool {
        node.pass_qps() as f64 + acquire_count as f64 <= self.threshold
    }
}

/// The rate-limiter control behavior's queueing/wait-time schedule is out
/// of scope here. This variant materializes the same immediate admit/deny
/// check as `Default` and keeps `max_queueing_time_ms` around for a future
/// queueing controller to consume, without implementing queueing itself.
#[derive(Debug, Clone)]
pub struct RateLimiterController {
    pub threshold: f64,
    #[allow(dead_code)]
    pub max_queueing_time_ms: u32,
}

impl RateLimiterController {
    pub fn can_pass(&self, node: &dyn StatNode, acquire_count: u32) -> bool {
        node.pass_qps() as f64 + acquire_count as f64 <= self.threshold
    }
}

#[derive(Debug)]
pub enum Controller {
    Default(DefaultController),
    WarmUp(WarmUpState),
    RateLimiter(RateLimiterController),
}

impl Default for Controller {
    fn default() -> Self {
        Controller::Default(DefaultController { threshold: 0.0 })
    }
}

impl Clone for Controller {
    fn clone(&self) -> Self {
        match self {
            Controller::Default(c) => Controller::Default(c.clone()),
            Controller::WarmUp(w) => Controller::WarmUp(w.snapshot_clone()),
            Controller::RateLimiter(c) => Controller::RateLimiter(c.clone()),
        }
    }
}

impl Controller {
    pub fn from_rule(rule: &FlowRule) -> Result<Self> {
        use super::rule::ControlBehavior;
        match rule.control_behavior {
            ControlBehavior::Default => Ok(Controller::Default(DefaultController {
                threshold: rule.count,
            })),
            ControlBehavior::WarmUp => Ok(Controller::WarmUp(WarmUpState::new(rule)?)),
            ControlBehavior::RateLimiter => Ok(Controller::RateLimiter(RateLimiterController {
                threshold: rule.count,
                max_queueing_time_ms: rule.max_queueing_time_ms,
            })),
        }
    }

    /// The one operation every control behavior exposes:
    /// `can_pass(node, acquire_count) -> bool`.
    pub fn can_pass(&self, node: &dyn StatNode, acquire_count: u32) -> bool {
        match self {
            Controller::Default(c) => c.can_pass(node, acquire_count),
            Controller::WarmUp(w) => w.can_pass(node, acquire_count),
            Controller::RateLimiter(c) => c.can_pass(node, acquire_count),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{CountingStatNode, ResourceId, TrafficType};
    use crate::core::flow::rule::Grade;

    #[test]
    fn default_controller_admits_up_to_threshold() {
        let rule = FlowRule::new(ResourceId::new("svc", TrafficType::Inbound), Grade::Qps, 5.0);
        let controller = Controller::from_rule(&rule).unwrap();
        let node = CountingStatNode::new();
        node.add_pass(4);
        assert!(controller.can_pass(node.as_ref(), 1));
        assert!(!controller.can_pass(node.as_ref(), 2));
    }
}
