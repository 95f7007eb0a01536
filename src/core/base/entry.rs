//! Call-stack entries and the LIFO pairing-violation recovery `exit()`
//! must perform.
use super::{ContextPtr, ResourceId, SentinelInput, SlotChain};
use crate::logging;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Raised when `exit()` is called on an entry that is not the current top
/// of its context's call-stack. The library force-unwinds the intervening
/// entries before raising this, but the caller's own call graph is
/// considered corrupt past this point.
#[derive(Debug, Clone)]
pub struct PairingError {
    msg: String,
}

impl PairingError {
    pub fn new(msg: impl Into<String>) -> Self {
        PairingError { msg: msg.into() }
    }
}

impl std::fmt::Display for PairingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SentinelPairingError: {}", self.msg)
    }
}

impl std::error::Error for PairingError {}

/// One call-stack slot. Holds everything needed to run the chain's exit
/// side without looking anything else up.
pub(crate) struct EntryRecord {
    pub(crate) id: u64,
    pub(crate) resource: ResourceId,
    pub(crate) chain: Option<Arc<SlotChain>>,
    /// The `acquireCount` a rule's controller checks `passQps + count` against
    /// (spec.md §4.B); defaults to 1 when built via `SentinelInput::default()`.
    pub(crate) count: u32,
    pub(crate) input: SentinelInput,
}

/// A caller-held admission record for one in-flight invocation. Carries no
/// parent/child pointers of its own: the context owns the actual stack,
/// and this handle is just `(context, id)`.
pub struct SentinelEntry {
    inner: Mutex<Option<(ContextPtr, u64)>>,
    exited: AtomicBool,
}

impl SentinelEntry {
    pub(crate) fn new(ctx: ContextPtr, id: u64) -> Arc<Self> {
        Arc::new(SentinelEntry {
            inner: Mutex::new(Some((ctx, id))),
            exited: AtomicBool::new(false),
        })
    }

    /// A chain-less entry: produced whenever rule checking is bypassed
    /// (null context, global switch off, registry at capacity). `exit()` on
    /// it is a pure no-op.
    pub(crate) fn detached() -> Arc<Self> {
        Arc::new(SentinelEntry {
            inner: Mutex::new(None),
            exited: AtomicBool::new(true),
        })
    }

    pub fn context(&self) -> Option<ContextPtr> {
        self.inner.lock().unwrap().as_ref().map(|(ctx, _)| ctx.clone())
    }

    /// Pops this entry (and, on a pairing violation, every entry above it)
    /// off its context's call-stack. Double-exit is a no-op: the entry's
    /// context pointer is cleared on first exit.
    pub fn exit(&self) -> Result<()> {
        if self.exited.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let (ctx, id) = match self.inner.lock().unwrap().take() {
            Some(v) => v,
            None => return Ok(()),
        };
        exit_with_pairing_check(&ctx, id, false)
    }
}

/// Pops `id` (and, if it is not the current top, every entry above it) off
/// `ctx`'s call-stack, running each popped record's chain exit along the
/// way. `blocked` suppresses `on_completed` for the record being exited
/// deliberately from inside `entry()`'s own block path - a blocked call
/// never reaches `on_completed`; force-unwound intervening entries above
/// it did pass, so they still get `on_completed`.
pub(crate) fn exit_with_pairing_check(ctx: &ContextPtr, id: u64, blocked: bool) -> Result<()> {
    if super::is_null_context(ctx) {
        return Ok(());
    }

    let mut popped: Vec<EntryRecord> = Vec::new();
    loop {
        let rec = {
            let mut guard = ctx.write().unwrap();
            guard.pop_entry()
        };
        match rec {
            None => break,
            Some(rec) => {
                let matched = rec.id == id;
                popped.push(rec);
                if matched {
                    break;
                }
            }
        }
    }

    let violated = popped.len() > 1;
    for (i, rec) in popped.iter().enumerate() {
        let is_target = i == popped.len() - 1;
        if let Some(chain) = &rec.chain {
            chain.exit(ctx, blocked && is_target);
        }
    }

    let stack_emptied = ctx.read().unwrap().is_empty_stack();
    if stack_emptied {
        destroy_if_auto_created(ctx);
    }

    if violated {
        logging::error!(
            "[SentinelEntry::exit] context pairing violated: force-exited {} intervening entr{}",
            popped.len() - 1,
            if popped.len() - 1 == 1 { "y" } else { "ies" }
        );
        return Err(Error::new(PairingError::new(
            "exit() called out of LIFO order; intervening entries were force-exited",
        )));
    }
    if popped.is_empty() {
        // Nothing left to pop: either already exited or never pushed. Not
        // an error - callers may exit chain-less entries defensively.
        return Ok(());
    }
    Ok(())
}

fn destroy_if_auto_created(ctx: &ContextPtr) {
    let auto_created = ctx.read().unwrap().is_auto_created();
    if !auto_created {
        return;
    }
    if let Some(current) = super::current_context() {
        if Arc::ptr_eq(&current, ctx) {
            super::clear_current_context();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{EntryContext, TrafficType};
    use std::sync::RwLock;

    fn new_ctx() -> ContextPtr {
        Arc::new(RwLock::new(EntryContext::new_default()))
    }

    fn push(ctx: &ContextPtr, name: &str) -> Arc<SentinelEntry> {
        let id = crate::utils::next_id();
        ctx.write().unwrap().push_entry(EntryRecord {
            id,
            resource: ResourceId::new(name, TrafficType::Inbound),
            chain: None,
            count: 1,
            input: SentinelInput::default(),
        });
        SentinelEntry::new(ctx.clone(), id)
    }

    #[test]
    fn lifo_exit_is_clean() {
        let ctx = new_ctx();
        let a = push(&ctx, "a");
        let b = push(&ctx, "b");
        b.exit().unwrap();
        a.exit().unwrap();
        assert!(ctx.read().unwrap().is_empty_stack());
    }

    #[test]
    fn out_of_order_exit_forces_unwind_and_errors() {
        let ctx = new_ctx();
        let a = push(&ctx, "a");
        let _b = push(&ctx, "b");
        let err = a.exit().unwrap_err();
        assert!(err.to_string().contains("SentinelPairingError"));
        assert!(ctx.read().unwrap().is_empty_stack());
    }

    #[test]
    fn double_exit_is_a_no_op() {
        let ctx = new_ctx();
        let a = push(&ctx, "a");
        a.exit().unwrap();
        a.exit().unwrap();
    }

    #[test]
    fn detached_entry_exit_is_a_no_op() {
        let e = SentinelEntry::detached();
        e.exit().unwrap();
    }
}
