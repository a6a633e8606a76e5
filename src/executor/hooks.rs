//! The four executor hook slots.
//!
//! Each slot holds at most one interceptor. A module installing itself keeps
//! the value it replaced and forwards to it, so the installed hooks form a
//! chain that ends in the `standard_executor_*` functions.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::nodes::plannodes::ScanDirection;

use super::{ExecFlags, QueryDesc};

/// Replaces `ExecutorStart`. Returns false when the plan is no longer valid.
pub type ExecutorStartHook = Arc<dyn Fn(&mut QueryDesc, ExecFlags) -> Result<bool> + Send + Sync>;
/// Replaces `ExecutorRun`. `count` of zero means "all rows".
pub type ExecutorRunHook =
    Arc<dyn Fn(&mut QueryDesc, ScanDirection, u64) -> Result<()> + Send + Sync>;
/// Replaces `ExecutorFinish`.
pub type ExecutorFinishHook = Arc<dyn Fn(&mut QueryDesc) -> Result<()> + Send + Sync>;
/// Replaces `ExecutorEnd`.
pub type ExecutorEndHook = Arc<dyn Fn(&mut QueryDesc) -> Result<()> + Send + Sync>;

/// Contents of all four slots at one point in time.
#[derive(Clone, Default)]
pub struct SavedExecutorHooks {
    /// Start slot.
    pub start: Option<ExecutorStartHook>,
    /// Run slot.
    pub run: Option<ExecutorRunHook>,
    /// Finish slot.
    pub finish: Option<ExecutorFinishHook>,
    /// End slot.
    pub end: Option<ExecutorEndHook>,
}

fn same<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

impl SavedExecutorHooks {
    /// True when every slot holds the very same hook as in `other`.
    pub fn same_as(&self, other: &SavedExecutorHooks) -> bool {
        same(&self.start, &other.start)
            && same(&self.run, &other.run)
            && same(&self.finish, &other.finish)
            && same(&self.end, &other.end)
    }
}

impl std::fmt::Debug for SavedExecutorHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedExecutorHooks")
            .field("start", &self.start.is_some())
            .field("run", &self.run.is_some())
            .field("finish", &self.finish.is_some())
            .field("end", &self.end.is_some())
            .finish()
    }
}

/// Hook slots consulted by [`super::executor_start`] and friends.
#[derive(Default)]
pub struct ExecutorHooks {
    start: RwLock<Option<ExecutorStartHook>>,
    run: RwLock<Option<ExecutorRunHook>>,
    finish: RwLock<Option<ExecutorFinishHook>>,
    end: RwLock<Option<ExecutorEndHook>>,
}

impl ExecutorHooks {
    /// Empty slots, independent of the process-wide ones.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slots.
    pub fn global() -> &'static Arc<ExecutorHooks> {
        static GLOBAL: OnceLock<Arc<ExecutorHooks>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ExecutorHooks::new()))
    }

    /// Installs a start hook, returning the one it replaced.
    pub fn install_start(&self, hook: Option<ExecutorStartHook>) -> Option<ExecutorStartHook> {
        debug!(installed = hook.is_some(), "executor start hook");
        std::mem::replace(&mut *self.start.write(), hook)
    }

    /// Installs a run hook, returning the one it replaced.
    pub fn install_run(&self, hook: Option<ExecutorRunHook>) -> Option<ExecutorRunHook> {
        debug!(installed = hook.is_some(), "executor run hook");
        std::mem::replace(&mut *self.run.write(), hook)
    }

    /// Installs a finish hook, returning the one it replaced.
    pub fn install_finish(&self, hook: Option<ExecutorFinishHook>) -> Option<ExecutorFinishHook> {
        debug!(installed = hook.is_some(), "executor finish hook");
        std::mem::replace(&mut *self.finish.write(), hook)
    }

    /// Installs an end hook, returning the one it replaced.
    pub fn install_end(&self, hook: Option<ExecutorEndHook>) -> Option<ExecutorEndHook> {
        debug!(installed = hook.is_some(), "executor end hook");
        std::mem::replace(&mut *self.end.write(), hook)
    }

    /// Current start hook.
    pub fn start_hook(&self) -> Option<ExecutorStartHook> {
        self.start.read().clone()
    }

    /// Current run hook.
    pub fn run_hook(&self) -> Option<ExecutorRunHook> {
        self.run.read().clone()
    }

    /// Current finish hook.
    pub fn finish_hook(&self) -> Option<ExecutorFinishHook> {
        self.finish.read().clone()
    }

    /// Current end hook.
    pub fn end_hook(&self) -> Option<ExecutorEndHook> {
        self.end.read().clone()
    }

    /// Copies all four slots.
    pub fn snapshot(&self) -> SavedExecutorHooks {
        SavedExecutorHooks {
            start: self.start_hook(),
            run: self.run_hook(),
            finish: self.finish_hook(),
            end: self.end_hook(),
        }
    }

    /// Puts back slots taken with [`ExecutorHooks::snapshot`].
    pub fn restore(&self, saved: SavedExecutorHooks) {
        *self.start.write() = saved.start;
        *self.run.write() = saved.run;
        *self.finish.write() = saved.finish;
        *self.end.write() = saved.end;
        debug!("executor hooks restored");
    }
}

impl std::fmt::Debug for ExecutorHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_restore_round_trips_identity() {
        let hooks = ExecutorHooks::new();
        let before = hooks.snapshot();
        let finish: ExecutorFinishHook = Arc::new(|_qd: &mut QueryDesc| -> Result<()> { Ok(()) });
        assert!(hooks.install_finish(Some(Arc::clone(&finish))).is_none());
        assert!(!hooks.snapshot().same_as(&before));
        hooks.restore(before.clone());
        assert!(hooks.snapshot().same_as(&before));
        assert!(hooks.finish_hook().is_none());
    }
}
