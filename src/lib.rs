//! # flow-admission
//!
//! An in-process admission guard: on every call to a named resource it
//! decides, synchronously and without blocking on I/O, whether the call is
//! admitted, based on configured flow rules (QPS/concurrency thresholds,
//! warm-up shaping, relational strategies). Embed it in a process that
//! wants to protect itself — and whatever it calls downstream — from
//! overload.
//!
//! Statistics collection (the sliding-window counters behind `passQps`),
//! dynamic rule reloading from a datasource, and distributed/cluster-wide
//! rate limiting are explicitly out of scope: this crate is the admission
//! core, not a full observability or configuration platform.
//!
//! ## Quick start
//!
//! ```no_run
//! use flow_admission::api::EntryBuilder;
//! use flow_admission::base::TrafficType;
//! use flow_admission::flow::{load_rules, FlowRule, Grade};
//! use flow_admission::base::ResourceId;
//!
//! let resource = ResourceId::new("my_resource", TrafficType::Inbound);
//! load_rules(vec![FlowRule::new(resource, Grade::Qps, 10.0)]);
//!
//! match EntryBuilder::new("my_resource", TrafficType::Inbound).build() {
//!     Ok(entry) => {
//!         // protected logic goes here
//!         entry.exit().unwrap_or_else(|e| flow_admission::logging::error!("{}", e));
//!     }
//!     Err(blocked) => {
//!         // the call was rejected by a flow rule
//!         flow_admission::logging::warn!("blocked: {}", blocked);
//!     }
//! }
//! ```
//!
//! ## Loading rules
//!
//! `flow::load_rules()` replaces the rule sets named in its argument;
//! `flow::append_rule()` adds one rule incrementally if an equal one isn't
//! already present. Both validate the rule and materialize its
//! `control_behavior` into a concrete controller before installing it — an
//! invalid rule (e.g. a warm-up rule with `cold_factor <= 1`) is rejected
//! synchronously and never reaches the admission path.
//!
//! ## Layout
//!
//! - [`core::base`] — resource identity, the slot-chain registry, the
//!   entry/context call-stack, and the pipeline (`SlotChain`) abstraction.
//! - [`core::flow`] — flow rules, the controller each rule materializes
//!   (`Default`/`WarmUp`/`RateLimiter`), the rule-check slot, and the
//!   process-wide rule store.
//! - [`api`] — the `EntryBuilder` most callers use directly.
//! - [`config`] — the crate's inward-facing constants (cap, default names,
//!   warm-up defaults, the global on/off switch).
//! - [`logging`] — adapter over the `log` facade, with optional
//!   `env_logger`/`log4rs` initializers behind the `logger_env`/
//!   `logger_log4rs` features.

/// The topmost API: `EntryBuilder`, the default slot-chain builder, and the
/// process-wide chain registry it's backed by.
pub mod api;
/// Core implementations: resource identity, the slot chain/context/entry
/// primitives, and the flow-rule evaluator plus its controllers.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
/// Inward-facing configuration constants (not a dynamic config surface).
pub mod config;
/// Utility functions shared across the crate.
pub mod utils;

// Re-exported so callers can write `flow_admission::base::X` and
// `flow_admission::flow::X` instead of reaching through `core`.
pub use crate::core::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
