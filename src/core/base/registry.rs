//! Resource → slot-chain registry.
//!
//! Readers (every `entry()` call) must be lock-free; the only writers are
//! first-time resource insertions, which become rare after warmup. A
//! copy-on-write snapshot publishes a fresh immutable map on each insert so
//! prior readers never observe a torn state, without per-read
//! synchronization.
use super::{ResourceId, SlotChain};
use crate::config::MAX_SLOT_CHAIN_SIZE;
use crate::logging;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// External collaborator: produces a fresh chain containing the standard
/// slot order.
pub trait SlotChainBuilder: Send + Sync {
    fn build(&self) -> SlotChain;
}

type Snapshot = Arc<HashMap<ResourceId, Arc<SlotChain>>>;

pub struct ChainRegistry {
    snapshot: RwLock<Snapshot>,
    write_lock: Mutex<()>,
    builder: Arc<dyn SlotChainBuilder>,
}

impl ChainRegistry {
    pub fn new(builder: Arc<dyn SlotChainBuilder>) -> Self {
        ChainRegistry {
            snapshot: RwLock::new(Arc::new(HashMap::new())),
            write_lock: Mutex::new(()),
            builder,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the chain bound to `resource`, building and interning one if
    /// this is the first call for it. Returns `None` once the registry is
    /// at capacity and `resource` was never seen before - the caller must
    /// treat `None` as "bypass rule checking, admit unconditionally".
    pub fn look_chain(&self, resource: &ResourceId) -> Option<Arc<SlotChain>> {
        if let Some(chain) = self.snapshot.read().unwrap().get(resource) {
            return Some(chain.clone());
        }

        let _guard = self.write_lock.lock().unwrap();
        // Double-checked: another thread may have inserted while we waited.
        if let Some(chain) = self.snapshot.read().unwrap().get(resource) {
            return Some(chain.clone());
        }

        let current_len = self.snapshot.read().unwrap().len();
        if current_len >= MAX_SLOT_CHAIN_SIZE {
            logging::warn!(
                "[ChainRegistry::look_chain] reached MAX_SLOT_CHAIN_SIZE ({}), resource {} bypasses rule checking",
                MAX_SLOT_CHAIN_SIZE,
                resource
            );
            return None;
        }

        let chain = Arc::new(self.builder.build());
        let mut next: HashMap<ResourceId, Arc<SlotChain>> =
            (**self.snapshot.read().unwrap()).clone();
        next.insert(resource.clone(), chain.clone());
        *self.snapshot.write().unwrap() = Arc::new(next);
        Some(chain)
    }
}
