//! Statistics node contract plus an in-memory test double.
//!
//! Real sliding-window statistics collection is explicitly out of scope:
//! production embedders supply their own `StatNode` impl backed by a
//! leap-array / sliding-window counter. `CountingStatNode` here exists
//! only so this crate's own tests can drive warm-up and flow-slot
//! scenarios without depending on that machinery.
use super::ResourceId;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// External statistics collaborator.
pub trait StatNode: Send + Sync + std::fmt::Debug {
    /// Admitted count observed in the current second.
    fn pass_qps(&self) -> u32;
    /// Admitted count observed in the previous (just-elapsed) second.
    fn previous_pass_qps(&self) -> u32;
    /// Aggregated node across all contexts for the resource.
    fn cluster_node(&self) -> Arc<dyn StatNode>;
    /// The per-context node.
    fn cur_node(&self) -> Arc<dyn StatNode>;
}

/// External collaborator: resolves a resource's cluster-wide node.
pub trait ClusterNodeBuilder: Send + Sync {
    fn get_cluster_node(&self, resource: &str) -> Option<Arc<dyn StatNode>>;
}

/// A minimal, thread-safe `StatNode`. Tracks admitted calls in the current
/// wall-clock second and the previous one; `add_pass` rotates the counters
/// when the second has advanced since the last observation, mirroring how
/// a real sliding-window bucket would be read. `cluster_node`/`cur_node`
/// both return a handle to the node itself, since this test double does
/// not distinguish per-context from cluster-aggregated statistics.
#[derive(Debug)]
pub struct CountingStatNode {
    current_second: AtomicU64,
    current_count: AtomicU32,
    previous_count: AtomicU32,
    self_ref: RwLock<Option<Arc<CountingStatNode>>>,
}

impl CountingStatNode {
    pub fn new() -> Arc<Self> {
        let node = Arc::new(CountingStatNode {
            current_second: AtomicU64::new(crate::utils::curr_time_millis() / 1000),
            current_count: AtomicU32::new(0),
            previous_count: AtomicU32::new(0),
            self_ref: RwLock::new(None),
        });
        *node.self_ref.write().unwrap() = Some(node.clone());
        node
    }

    fn rotate_if_needed(&self) {
        let now_sec = crate::utils::curr_time_millis() / 1000;
        let last = self.current_second.load(Ordering::SeqCst);
        if now_sec == last {
            return;
        }
        if now_sec == last + 1 {
            let cur = self.current_count.swap(0, Ordering::SeqCst);
            self.previous_count.store(cur, Ordering::SeqCst);
        } else {
            // More than one second elapsed with no traffic: both buckets go cold.
            self.current_count.store(0, Ordering::SeqCst);
            self.previous_count.store(0, Ordering::SeqCst);
        }
        self.current_second.store(now_sec, Ordering::SeqCst);
    }

    /// Records `count` admitted calls in the current second.
    pub fn add_pass(&self, count: u32) {
        self.rotate_if_needed();
        self.current_count.fetch_add(count, Ordering::SeqCst);
    }

    /// Test helper: forces the previous-second counter without waiting on
    /// the wall clock, used to exercise warm-up scenarios deterministically.
    pub fn set_previous_pass_qps(&self, count: u32) {
        self.previous_count.store(count, Ordering::SeqCst);
    }
}

impl StatNode for CountingStatNode {
    fn pass_qps(&self) -> u32 {
        self.rotate_if_needed();
        self.current_count.load(Ordering::SeqCst)
    }

    fn previous_pass_qps(&self) -> u32 {
        self.rotate_if_needed();
        self.previous_count.load(Ordering::SeqCst)
    }

    fn cluster_node(&self) -> Arc<dyn StatNode> {
        self.self_ref.read().unwrap().clone().unwrap()
    }

    fn cur_node(&self) -> Arc<dyn StatNode> {
        self.self_ref.read().unwrap().clone().unwrap()
    }
}

lazy_static! {
    static ref RESOURCE_NODE_MAP: RwLock<HashMap<ResourceId, Arc<dyn StatNode>>> =
        RwLock::new(HashMap::new());
    static ref ORIGIN_NODE_MAP: RwLock<HashMap<(ResourceId, String), Arc<dyn StatNode>>> =
        RwLock::new(HashMap::new());
}

/// Lazily creates (or returns the existing) cluster node for `resource`.
pub fn get_or_create_resource_node(resource: &ResourceId) -> Arc<dyn StatNode> {
    if let Some(node) = RESOURCE_NODE_MAP.read().unwrap().get(resource) {
        return node.clone();
    }
    let mut map = RESOURCE_NODE_MAP.write().unwrap();
    map.entry(resource.clone())
        .or_insert_with(|| CountingStatNode::new() as Arc<dyn StatNode>)
        .clone()
}

/// Lazily creates (or returns the existing) per-origin node for
/// `(resource, origin)`.
pub fn get_or_create_origin_node(resource: &ResourceId, origin: &str) -> Arc<dyn StatNode> {
    let key = (resource.clone(), origin.to_string());
    if let Some(node) = ORIGIN_NODE_MAP.read().unwrap().get(&key) {
        return node.clone();
    }
    let mut map = ORIGIN_NODE_MAP.write().unwrap();
    map.entry(key)
        .or_insert_with(|| CountingStatNode::new() as Arc<dyn StatNode>)
        .clone()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::TrafficType;

    #[test]
    fn add_pass_accumulates_in_current_second() {
        let node = CountingStatNode::new();
        node.add_pass(3);
        node.add_pass(4);
        assert_eq!(node.pass_qps(), 7);
    }

    #[test]
    fn set_previous_pass_qps_is_observable() {
        let node = CountingStatNode::new();
        node.set_previous_pass_qps(42);
        assert_eq!(node.previous_pass_qps(), 42);
    }

    #[test]
    fn resource_node_registry_is_stable() {
        let r = ResourceId::new("svc", TrafficType::Inbound);
        let a = get_or_create_resource_node(&r);
        let b = get_or_create_resource_node(&r);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn origin_node_registry_keys_by_resource_and_origin() {
        let r = ResourceId::new("svc", TrafficType::Inbound);
        let a = get_or_create_origin_node(&r, "caller-a");
        let b = get_or_create_origin_node(&r, "caller-b");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
