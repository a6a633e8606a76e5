//! Hierarchical memory regions.
//!
//! A [`MemoryContext`] does not own allocations itself; it accounts for the
//! bytes charged to it and releases them all at once when it is reset or
//! deleted, together with every child region. Rendering and hook code switch
//! the thread's current region with [`switch_to`], whose guard restores the
//! previous region on every exit path.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{PlanError, Result};

/// Block size regions grow by.
pub const BLOCK_SIZE: usize = 8192;

type ResetCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct ContextState {
    children: Vec<MemoryContext>,
    used: usize,
    allocated: usize,
    callbacks: Vec<ResetCallback>,
    deleted: bool,
}

struct ContextInner {
    name: String,
    parent: Option<Weak<ContextInner>>,
    state: Mutex<ContextState>,
}

/// Handle to a memory region. Clones refer to the same region.
#[derive(Clone)]
pub struct MemoryContext(Arc<ContextInner>);

/// Space accounted to a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryCounters {
    /// Bytes reserved in blocks.
    pub total_space: usize,
    /// Reserved bytes not handed out.
    pub free_space: usize,
}

impl MemoryCounters {
    /// Bytes handed out.
    pub fn used(&self) -> usize {
        self.total_space - self.free_space
    }

    /// Adds `other` into `self`.
    pub fn add(&mut self, other: &MemoryCounters) {
        self.total_space += other.total_space;
        self.free_space += other.free_space;
    }
}

impl MemoryContext {
    /// A new top-level region.
    pub fn root(name: impl Into<String>) -> Self {
        MemoryContext(Arc::new(ContextInner {
            name: name.into(),
            parent: None,
            state: Mutex::new(ContextState::default()),
        }))
    }

    /// A new region released whenever `self` is reset or deleted.
    pub fn create_child(&self, name: impl Into<String>) -> Result<MemoryContext> {
        let child = MemoryContext(Arc::new(ContextInner {
            name: name.into(),
            parent: Some(Arc::downgrade(&self.0)),
            state: Mutex::new(ContextState::default()),
        }));
        let mut state = self.0.state.lock();
        if state.deleted {
            return Err(self.deleted_error());
        }
        state.children.push(child.clone());
        trace!(parent = %self.0.name, child = %child.0.name, "memory context created");
        Ok(child)
    }

    /// Region name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Parent region, if it still exists.
    pub fn parent(&self) -> Option<MemoryContext> {
        self.0
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(MemoryContext)
    }

    /// True once [`MemoryContext::delete`] has run.
    pub fn is_deleted(&self) -> bool {
        self.0.state.lock().deleted
    }

    /// Charges `bytes` to this region.
    pub fn alloc(&self, bytes: usize) -> Result<()> {
        let mut state = self.0.state.lock();
        if state.deleted {
            return Err(self.deleted_error());
        }
        state.used += bytes;
        if state.used > state.allocated {
            let short = state.used - state.allocated;
            state.allocated += short.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        }
        Ok(())
    }

    /// Runs `f` when the region is next reset or deleted. Callbacks run in
    /// reverse registration order.
    pub fn register_reset_callback(&self, f: impl FnOnce() + Send + 'static) -> Result<()> {
        let mut state = self.0.state.lock();
        if state.deleted {
            return Err(self.deleted_error());
        }
        state.callbacks.push(Box::new(f));
        Ok(())
    }

    /// Releases everything charged to this region and deletes its children.
    pub fn reset(&self) {
        let (children, callbacks) = {
            let mut state = self.0.state.lock();
            state.used = 0;
            state.allocated = 0;
            (
                std::mem::take(&mut state.children),
                std::mem::take(&mut state.callbacks),
            )
        };
        for child in children {
            child.delete_detached();
        }
        for callback in callbacks.into_iter().rev() {
            callback();
        }
    }

    /// Releases the region and its children and detaches it from its parent.
    pub fn delete(&self) {
        if let Some(parent) = self.parent() {
            parent
                .0
                .state
                .lock()
                .children
                .retain(|c| !Arc::ptr_eq(&c.0, &self.0));
        }
        self.delete_detached();
    }

    fn delete_detached(&self) {
        self.reset();
        self.0.state.lock().deleted = true;
        trace!(context = %self.0.name, "memory context deleted");
    }

    /// Space of this region, and of its descendants when `recurse` is set.
    pub fn counters(&self, recurse: bool) -> MemoryCounters {
        let state = self.0.state.lock();
        let mut counters = MemoryCounters {
            total_space: state.allocated,
            free_space: state.allocated - state.used,
        };
        if recurse {
            for child in &state.children {
                counters.add(&child.counters(true));
            }
        }
        counters
    }

    /// Bytes reserved by this region, optionally including descendants.
    pub fn mem_allocated(&self, recurse: bool) -> usize {
        self.counters(recurse).total_space
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.0.state.lock().children.len()
    }

    fn deleted_error(&self) -> PlanError {
        PlanError::internal(format!("memory context \"{}\" used after delete", self.0.name))
    }
}

impl PartialEq for MemoryContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContext")
            .field("name", &self.0.name)
            .field("counters", &self.counters(false))
            .finish()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<MemoryContext>> = const { RefCell::new(None) };
    static TOP: MemoryContext = MemoryContext::root("TopMemoryContext");
}

/// The process-lifetime region of this thread.
pub fn top_memory_context() -> MemoryContext {
    TOP.with(Clone::clone)
}

/// The region allocations are currently charged to.
pub fn current_memory_context() -> MemoryContext {
    CURRENT
        .with(|cur| cur.borrow().clone())
        .unwrap_or_else(top_memory_context)
}

/// Restores the previous current region when dropped.
#[must_use = "the previous region is restored when the guard is dropped"]
pub struct ContextGuard {
    previous: Option<MemoryContext>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|cur| *cur.borrow_mut() = previous);
    }
}

/// Makes `ctx` the current region until the guard is dropped.
pub fn switch_to(ctx: &MemoryContext) -> ContextGuard {
    let previous = CURRENT.with(|cur| cur.borrow_mut().replace(ctx.clone()));
    ContextGuard { previous }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn allocations_grow_in_blocks() {
        let ctx = MemoryContext::root("test");
        ctx.alloc(100).unwrap();
        let c = ctx.counters(false);
        assert_eq!(c.total_space, BLOCK_SIZE);
        assert_eq!(c.used(), 100);
        ctx.alloc(BLOCK_SIZE).unwrap();
        assert_eq!(ctx.mem_allocated(false), 2 * BLOCK_SIZE);
    }

    #[test]
    fn reset_releases_children_and_runs_callbacks_in_reverse() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let ctx = MemoryContext::root("query");
        let child = ctx.create_child("render").unwrap();
        child.alloc(10).unwrap();
        for i in 0..3 {
            let order = Arc::clone(&order);
            ctx.register_reset_callback(move || order.lock().push(i)).unwrap();
        }
        assert_eq!(ctx.counters(true).used(), 10);
        ctx.reset();
        assert_eq!(*order.lock(), vec![2, 1, 0]);
        assert!(child.is_deleted());
        assert!(child.alloc(1).is_err());
        assert_eq!(ctx.child_count(), 0);
        assert!(ctx.alloc(1).is_ok());
    }

    #[test]
    fn delete_detaches_from_parent() {
        let parent = MemoryContext::root("parent");
        let child = parent.create_child("child").unwrap();
        assert_eq!(child.parent(), Some(parent.clone()));
        child.delete();
        assert_eq!(parent.child_count(), 0);
        assert!(child.is_deleted());
        assert!(!parent.is_deleted());
    }

    #[test]
    fn switch_guard_restores_previous_on_unwind() {
        let outer = MemoryContext::root("outer");
        let inner = MemoryContext::root("inner");
        let _g = switch_to(&outer);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g = switch_to(&inner);
            assert_eq!(current_memory_context(), inner);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(current_memory_context(), outer);
    }

    #[test]
    fn callbacks_run_once_on_delete() {
        let hits = Arc::new(AtomicUsize::new(0));
        let ctx = MemoryContext::root("once");
        let h = Arc::clone(&hits);
        ctx.register_reset_callback(move || {
            h.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        ctx.delete();
        ctx.reset();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
