//! Flow rule: grade, strategy, control behavior, and the per-origin
//! targeting fields a rule author sets on it.
use super::controller::Controller;
use crate::base::{ResourceId, SentinelRule};
use crate::config;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-form caller-identity targeting value meaning "any caller not
/// matched by a more specific rule on this resource".
pub const LIMIT_APP_DEFAULT: &str = "default";
/// Free-form caller-identity targeting value meaning "whichever caller
/// isn't explicitly targeted by a sibling rule".
pub const LIMIT_APP_OTHER: &str = "other";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Thread,
    Qps,
}

impl Grade {
    pub fn wire_value(self) -> u8 {
        match self {
            Grade::Thread => 0,
            Grade::Qps => 1,
        }
    }
}

impl Default for Grade {
    fn default() -> Self {
        Grade::Qps
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    Direct,
    Relate,
    Chain,
}

impl Strategy {
    pub fn wire_value(self) -> u8 {
        match self {
            Strategy::Direct => 0,
            Strategy::Relate => 1,
            Strategy::Chain => 2,
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Direct
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlBehavior {
    Default,
    WarmUp,
    RateLimiter,
}

impl ControlBehavior {
    pub fn wire_value(self) -> u8 {
        match self {
            ControlBehavior::Default => 0,
            ControlBehavior::WarmUp => 1,
            ControlBehavior::RateLimiter => 2,
        }
    }
}

impl Default for ControlBehavior {
    fn default() -> Self {
        ControlBehavior::Default
    }
}

fn default_limit_app() -> String {
    LIMIT_APP_DEFAULT.to_string()
}

fn default_warm_up_period_sec() -> u32 {
    config::DEFAULT_WARM_UP_PERIOD_SEC
}

fn default_cold_factor() -> u32 {
    config::WARM_UP_COLD_FACTOR
}

fn default_max_queueing_time_ms() -> u32 {
    config::DEFAULT_MAX_QUEUEING_TIME_MS
}

/// A flow-control rule. `controller` is materialized from
/// `control_behavior` at rule-load time and is excluded from equality: two
/// rules are "the same rule" for `append_rule`/`is_other_origin` purposes
/// when their declarative fields match, regardless of the controller's own
/// runtime token state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRule {
    #[serde(default = "crate::utils::next_id")]
    pub id: u64,
    pub resource: ResourceId,
    #[serde(default = "default_limit_app")]
    pub limit_app: String,
    #[serde(default)]
    pub grade: Grade,
    pub count: f64,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub ref_resource: String,
    #[serde(default)]
    pub control_behavior: ControlBehavior,
    #[serde(default = "default_warm_up_period_sec")]
    pub warm_up_period_sec: u32,
    #[serde(default = "default_cold_factor")]
    pub warm_up_cold_factor: u32,
    #[serde(default = "default_max_queueing_time_ms")]
    pub max_queueing_time_ms: u32,
    #[serde(skip, default)]
    pub controller: Controller,
}

impl PartialEq for FlowRule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.limit_app == other.limit_app
            && self.grade == other.grade
            && self.count == other.count
            && self.strategy == other.strategy
            && self.ref_resource == other.ref_resource
            && self.control_behavior == other.control_behavior
            && self.warm_up_period_sec == other.warm_up_period_sec
            && self.warm_up_cold_factor == other.warm_up_cold_factor
            && self.max_queueing_time_ms == other.max_queueing_time_ms
    }
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

impl FlowRule {
    pub fn new(resource: ResourceId, grade: Grade, count: f64) -> Self {
        FlowRule {
            id: crate::utils::next_id(),
            resource,
            limit_app: default_limit_app(),
            grade,
            count,
            strategy: Strategy::default(),
            ref_resource: String::new(),
            control_behavior: ControlBehavior::default(),
            warm_up_period_sec: default_warm_up_period_sec(),
            warm_up_cold_factor: default_cold_factor(),
            max_queueing_time_ms: default_max_queueing_time_ms(),
            controller: Controller::default(),
        }
    }

    /// Materializes `self.controller` from `self.control_behavior`. Returns
    /// a configuration error if the warm-up parameters are invalid, without
    /// installing the rule.
    pub fn build_controller(&mut self) -> Result<()> {
        self.controller = Controller::from_rule(self)?;
        Ok(())
    }
}

impl SentinelRule for FlowRule {
    fn resource_name(&self) -> String {
        self.resource.name().to_string()
    }

    fn is_valid(&self) -> Result<()> {
        if self.resource.name().is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.count < 0.0 {
            return Err(Error::msg("negative count"));
        }
        if self.strategy == Strategy::Relate && self.ref_resource.is_empty() {
            return Err(Error::msg(
                "ref_resource must be non-empty when strategy is Relate",
            ));
        }
        if self.strategy == Strategy::Chain && self.ref_resource.is_empty() {
            return Err(Error::msg(
                "ref_resource must be non-empty when strategy is Chain",
            ));
        }
        if self.control_behavior == ControlBehavior::WarmUp {
            if self.warm_up_period_sec == 0 {
                return Err(Error::msg("warm_up_period_sec must be greater than 0"));
            }
            if self.warm_up_cold_factor <= 1 {
                return Err(Error::msg("warm_up_cold_factor must be greater than 1"));
            }
        }
        Ok(())
    }
}
