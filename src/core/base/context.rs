//! Per-logical-invocation context and its entry call-stack. A context is
//! confined to one thread; propagation across thread or task boundaries is
//! the embedder's responsibility, handed off at framework-integration
//! boundaries rather than carried automatically by this crate.
use super::{EntryRecord, StatNode};
use crate::config::CONTEXT_DEFAULT_NAME;
use lazy_static::lazy_static;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type ContextPtr = Arc<RwLock<EntryContext>>;

pub struct EntryContext {
    name: String,
    origin: String,
    origin_node: Option<Arc<dyn StatNode>>,
    /// Call-stack of active entries; the last element is the current one,
    /// the top of a singly linked call-stack.
    stack: Vec<EntryRecord>,
    /// True only if this crate auto-created the context because the
    /// calling thread had none; decides whether the context is cleared
    /// from thread-local storage when its outermost entry exits (see
    /// DESIGN.md "Context lifecycle" open question).
    auto_created: bool,
    /// Marks the null-context sentinel: entries obtained while this is
    /// current perform no rule checking.
    is_null: bool,
}

impl EntryContext {
    pub fn new(name: impl Into<String>, origin: impl Into<String>) -> Self {
        EntryContext {
            name: name.into(),
            origin: origin.into(),
            origin_node: None,
            stack: Vec::new(),
            auto_created: false,
            is_null: false,
        }
    }

    pub fn new_default() -> Self {
        Self::new(CONTEXT_DEFAULT_NAME, "")
    }

    pub(crate) fn new_auto_created() -> Self {
        let mut ctx = Self::new_default();
        ctx.auto_created = true;
        ctx
    }

    pub(crate) fn new_null() -> Self {
        let mut ctx = Self::new("sentinel_null_context", "");
        ctx.is_null = true;
        ctx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn set_origin_node(&mut self, node: Arc<dyn StatNode>) {
        self.origin_node = Some(node);
    }

    pub fn origin_node(&self) -> Option<Arc<dyn StatNode>> {
        self.origin_node.clone()
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    pub fn is_auto_created(&self) -> bool {
        self.auto_created
    }

    pub fn is_empty_stack(&self) -> bool {
        self.stack.is_empty()
    }

    pub(crate) fn push_entry(&mut self, record: EntryRecord) {
        self.stack.push(record);
    }

    pub(crate) fn pop_entry(&mut self) -> Option<EntryRecord> {
        self.stack.pop()
    }

    pub(crate) fn current_entry_id(&self) -> Option<u64> {
        self.stack.last().map(|r| r.id)
    }

    /// The resource of the innermost active entry, if any - what a
    /// `RuleCheckSlot` metering this context's current call needs to look
    /// up applicable rules.
    pub fn curr_resource(&self) -> Option<super::ResourceId> {
        self.stack.last().map(|r| r.resource.clone())
    }

    /// The `acquireCount` of the innermost active entry (spec.md §4.B's
    /// `acquireCount` argument to `controller.canPass`). Defaults to 1 when
    /// there is no active entry, matching `SentinelInput`'s own default.
    pub fn curr_count(&self) -> u32 {
        self.stack.last().map(|r| r.count).unwrap_or(1)
    }

    /// The `SentinelInput` the innermost active entry was built with.
    pub fn curr_input(&self) -> Option<SentinelInput> {
        self.stack.last().map(|r| r.input.clone())
    }
}

/// Input of policy algorithms.
#[derive(Debug, Clone)]
pub struct SentinelInput {
    batch_count: u32,
    flag: i32,
    args: Option<Vec<String>>,
    attachments: Option<HashMap<String, String>>,
}

impl Default for SentinelInput {
    fn default() -> Self {
        SentinelInput {
            batch_count: 1,
            flag: 0,
            args: None,
            attachments: None,
        }
    }
}

impl SentinelInput {
    pub fn new(batch_count: u32, flag: i32) -> Self {
        SentinelInput {
            batch_count,
            flag,
            ..Default::default()
        }
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn flag(&self) -> i32 {
        self.flag
    }

    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = Some(args);
    }

    pub fn args(&self) -> Option<&Vec<String>> {
        self.args.as_ref()
    }

    pub fn set_attachments(&mut self, attachments: HashMap<String, String>) {
        self.attachments = Some(attachments);
    }

    pub fn attachments(&self) -> Option<&HashMap<String, String>> {
        self.attachments.as_ref()
    }
}

lazy_static! {
    static ref NULL_CONTEXT: ContextPtr = Arc::new(RwLock::new(EntryContext::new_null()));
}

thread_local! {
    static CURRENT_CTX: RefCell<Option<ContextPtr>> = RefCell::new(None);
}

/// Returns the thread's current context, if one has been set.
pub fn current_context() -> Option<ContextPtr> {
    CURRENT_CTX.with(|c| c.borrow().clone())
}

/// Installs `ctx` as the thread's current context.
pub fn set_current_context(ctx: ContextPtr) {
    CURRENT_CTX.with(|c| *c.borrow_mut() = Some(ctx));
}

/// Installs the null-context sentinel as the thread's current context,
/// disabling rule checking for subsequent `entry()` calls on this thread.
pub fn set_null_context() {
    CURRENT_CTX.with(|c| *c.borrow_mut() = Some(NULL_CONTEXT.clone()));
}

/// Removes whatever context is installed on this thread.
pub fn clear_current_context() {
    CURRENT_CTX.with(|c| *c.borrow_mut() = None);
}

pub fn is_null_context(ctx: &ContextPtr) -> bool {
    Arc::ptr_eq(ctx, &NULL_CONTEXT)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_context_has_no_origin_node() {
        let ctx = EntryContext::new_default();
        assert!(ctx.origin_node().is_none());
        assert!(!ctx.is_null());
    }

    #[test]
    fn null_context_is_marked() {
        let ctx = EntryContext::new_null();
        assert!(ctx.is_null());
    }

    #[test]
    fn thread_local_roundtrip() {
        clear_current_context();
        assert!(current_context().is_none());
        let ctx = Arc::new(RwLock::new(EntryContext::new_default()));
        set_current_context(ctx.clone());
        assert!(Arc::ptr_eq(&current_context().unwrap(), &ctx));
        clear_current_context();
        assert!(current_context().is_none());
    }

    #[test]
    fn null_context_sentinel_is_singleton_per_process() {
        clear_current_context();
        set_null_context();
        let ctx = current_context().unwrap();
        assert!(is_null_context(&ctx));
        clear_current_context();
    }
}
