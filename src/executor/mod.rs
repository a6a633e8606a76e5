//! Bridge between EXPLAIN and the execution engine.
//!
//! The engine itself is external and plugs in through [`PlanExecutor`].
//! Statements go through [`executor_start`], [`executor_run`],
//! [`executor_finish`] and [`executor_end`], each of which calls the hook
//! installed in [`ExecutorHooks`] or, when the slot is empty, the matching
//! `standard_executor_*` function. Every executor call runs with the
//! statement's query region as the current memory region.

mod hooks;
mod planstate;
mod replay;

use std::fmt;
use std::ops::{BitOr, BitOrAssign, Deref, DerefMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::catalog::CatalogLookup;
use crate::error::{PlanError, Result};
use crate::instrument::{BufferUsage, InstrumentOption, Instrumentation, JitInstrumentation};
use crate::memctx::{current_memory_context, switch_to, MemoryContext};
use crate::nodes::plannodes::{CmdType, PlannedStmt, ScanDirection};
use crate::nodes::{Index, Oid};
use crate::params::ParamListInfo;

pub use hooks::{
    ExecutorEndHook, ExecutorFinishHook, ExecutorHooks, ExecutorRunHook, ExecutorStartHook,
    SavedExecutorHooks,
};
pub use planstate::{
    BitmapHeapStats, HashAggStats, HashStats, IncrementalSortGroupInfo, IncrementalSortStats,
    MemoizeStats, MergeStats, PlanState, RuntimeStats, SortMethod, SortSpaceType, SortStats,
    StorageStats, SubPlanState,
};
pub use replay::{RecordedNode, RecordedRun, ReplayExecutor};

/// Flags passed to `ExecutorStart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct ExecFlags(pub u32);

impl ExecFlags {
    /// No flags.
    pub const NONE: ExecFlags = ExecFlags(0);
    /// Set up for EXPLAIN without running the plan.
    pub const EXPLAIN_ONLY: ExecFlags = ExecFlags(0x0001);
    /// EXPLAIN of a generic plan; parameters are unbound.
    pub const EXPLAIN_GENERIC: ExecFlags = ExecFlags(0x0002);
    /// The plan may be rescanned.
    pub const REWIND: ExecFlags = ExecFlags(0x0004);
    /// The plan may be run backwards.
    pub const BACKWARD: ExecFlags = ExecFlags(0x0008);
    /// Mark and restore are needed.
    pub const MARK: ExecFlags = ExecFlags(0x0010);
    /// Do not fire triggers.
    pub const SKIP_TRIGGERS: ExecFlags = ExecFlags(0x0020);
    /// `WITH NO DATA` on a table-creating statement.
    pub const WITH_NO_DATA: ExecFlags = ExecFlags(0x0040);

    /// True when every flag of `other` is set.
    pub fn contains(self, other: ExecFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ExecFlags {
    type Output = ExecFlags;

    fn bitor(self, rhs: ExecFlags) -> ExecFlags {
        ExecFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ExecFlags {
    fn bitor_assign(&mut self, rhs: ExecFlags) {
        self.0 |= rhs.0;
    }
}

/// Counters of one trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerInstr {
    /// Trigger name.
    pub tgname: String,
    /// Constraint the trigger implements, if any.
    pub constraint_name: Option<String>,
    /// Calls and time.
    pub instr: Instrumentation,
}

/// A relation modified by the statement and the triggers fired on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultRelInfo {
    /// Relation oid.
    pub relid: Oid,
    /// Range table index, `0` for relations outside the range table.
    pub rti: Index,
    /// Triggers in firing order.
    pub triggers: Vec<TriggerInstr>,
}

/// What serializing the result rows cost.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeMetrics {
    /// Bytes that would have been sent to the client.
    pub bytes_sent: u64,
    /// Time spent, in seconds.
    pub time_spent: f64,
    /// Buffers touched while detoasting.
    pub buffer_usage: BufferUsage,
}

/// Per-statement executor state.
#[derive(Debug)]
pub struct EState {
    /// Rows processed so far.
    pub processed: u64,
    /// Flags `ExecutorStart` was called with.
    pub top_eflags: ExecFlags,
    /// Instrumentation requested for plan nodes.
    pub instrument: InstrumentOption,
    /// JIT flags of the plan.
    pub jit_flags: i32,
    /// Leader JIT counters.
    pub jit: Option<JitInstrumentation>,
    /// JIT counters reported by workers, merged.
    pub worker_jit: Option<JitInstrumentation>,
    /// Result relations of the statement.
    pub result_relations: Vec<ResultRelInfo>,
    /// Partitions tuples were routed to.
    pub tuple_routing: Vec<ResultRelInfo>,
    /// Relations that only had after-triggers fired.
    pub trig_target: Vec<ResultRelInfo>,
    /// Set when `SERIALIZE` measured the output.
    pub serialize_metrics: Option<SerializeMetrics>,
    /// `ExecutorFinish` has run.
    pub finished: bool,
    /// Region holding everything allocated for this statement.
    pub query_context: MemoryContext,
}

impl EState {
    fn new(
        query_context: MemoryContext,
        stmt: &PlannedStmt,
        instrument: InstrumentOption,
        eflags: ExecFlags,
    ) -> Self {
        EState {
            processed: 0,
            top_eflags: eflags,
            instrument,
            jit_flags: stmt.jit_flags,
            jit: None,
            worker_jit: None,
            result_relations: Vec::new(),
            tuple_routing: Vec::new(),
            trig_target: Vec::new(),
            serialize_metrics: None,
            finished: false,
            query_context,
        }
    }
}

/// The external engine that actually runs plans.
///
/// Only [`PlanExecutor::run`] is mandatory. Implementations fill in
/// `qd.estate` counters and the instrumentation of `qd.planstate`.
pub trait PlanExecutor: Send + Sync {
    /// Called after the state tree is built. Returning false reports that
    /// the plan is no longer valid.
    fn start(&self, _qd: &mut QueryDesc, _eflags: ExecFlags) -> Result<bool> {
        Ok(true)
    }

    /// Produces up to `count` rows, all of them when `count` is zero.
    fn run(&self, qd: &mut QueryDesc, direction: ScanDirection, count: u64) -> Result<()>;

    /// Runs deferred work such as after-triggers.
    fn finish(&self, _qd: &mut QueryDesc) -> Result<()> {
        Ok(())
    }

    /// Releases engine resources.
    fn end(&self, _qd: &mut QueryDesc) -> Result<()> {
        Ok(())
    }
}

/// An engine that produces no rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExecutor;

impl PlanExecutor for NullExecutor {
    fn run(&self, _qd: &mut QueryDesc, _direction: ScanDirection, _count: u64) -> Result<()> {
        Ok(())
    }
}

/// Everything the executor knows about one statement.
pub struct QueryDesc {
    /// Statement kind.
    pub operation: CmdType,
    /// The plan.
    pub planned_stmt: Arc<PlannedStmt>,
    /// Source text of the statement.
    pub source_text: String,
    /// Bound parameters.
    pub params: Option<ParamListInfo>,
    /// Instrumentation to allocate for plan nodes.
    pub instrument_options: InstrumentOption,
    /// Executor state, present between start and end.
    pub estate: Option<EState>,
    /// State tree, present between start and end.
    pub planstate: Option<PlanState>,
    /// Whole-statement counters, allocated by whoever wants them.
    pub totaltime: Option<Instrumentation>,
    /// Catalog for names.
    pub catalog: Arc<dyn CatalogLookup>,
    /// Engine running the plan.
    pub engine: Arc<dyn PlanExecutor>,
    /// Running inside a parallel worker rather than the leader.
    pub in_parallel_worker: bool,
}

impl QueryDesc {
    /// A descriptor for `stmt`, not yet started.
    pub fn new(
        stmt: Arc<PlannedStmt>,
        source_text: impl Into<String>,
        params: Option<ParamListInfo>,
        catalog: Arc<dyn CatalogLookup>,
        engine: Arc<dyn PlanExecutor>,
    ) -> Self {
        QueryDesc {
            operation: stmt.command_type,
            planned_stmt: stmt,
            source_text: source_text.into(),
            params,
            instrument_options: InstrumentOption::NONE,
            estate: None,
            planstate: None,
            totaltime: None,
            catalog,
            engine,
            in_parallel_worker: false,
        }
    }

    pub(crate) fn estate(&self) -> Result<&EState> {
        self.estate
            .as_ref()
            .ok_or_else(|| PlanError::internal("executor has not been started"))
    }

    /// Drops the executor state and deletes the query region without
    /// calling the engine or any end hook. Used when a statement fails
    /// between start and end.
    pub fn release(&mut self) {
        if let Some(estate) = self.estate.take() {
            estate.query_context.delete();
            warn!(operation = self.operation.name(), "executor state released without end");
        }
        self.planstate = None;
    }
}

/// A statement on its way through the executor.
///
/// If the guard is dropped before [`ActiveQuery::end`] ran, the executor
/// state is released so the query region never outlives an error.
#[must_use = "the executor state is released when the guard is dropped"]
pub struct ActiveQuery<'a> {
    hooks: &'a ExecutorHooks,
    qd: &'a mut QueryDesc,
}

impl<'a> ActiveQuery<'a> {
    /// Wraps `qd`, which is either not started yet or started via `hooks`.
    pub fn new(hooks: &'a ExecutorHooks, qd: &'a mut QueryDesc) -> Self {
        ActiveQuery { hooks, qd }
    }

    /// Starts the statement through the hook chain.
    pub fn start(&mut self, eflags: ExecFlags) -> Result<bool> {
        executor_start(self.hooks, self.qd, eflags)
    }

    /// Runs the statement through the hook chain.
    pub fn run(&mut self, direction: ScanDirection, count: u64) -> Result<()> {
        executor_run(self.hooks, self.qd, direction, count)
    }

    /// Finishes the statement through the hook chain.
    pub fn finish(&mut self) -> Result<()> {
        executor_finish(self.hooks, self.qd)
    }

    /// Ends the statement through the hook chain.
    pub fn end(mut self) -> Result<()> {
        executor_end(self.hooks, self.qd)
    }
}

impl Deref for ActiveQuery<'_> {
    type Target = QueryDesc;

    fn deref(&self) -> &QueryDesc {
        &*self.qd
    }
}

impl DerefMut for ActiveQuery<'_> {
    fn deref_mut(&mut self) -> &mut QueryDesc {
        &mut *self.qd
    }
}

impl Drop for ActiveQuery<'_> {
    fn drop(&mut self) {
        self.qd.release();
    }
}

impl fmt::Debug for QueryDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDesc")
            .field("operation", &self.operation)
            .field("source_text", &self.source_text)
            .field("instrument_options", &self.instrument_options)
            .field("started", &self.estate.is_some())
            .finish_non_exhaustive()
    }
}

/// Starts `qd` through the installed hook chain.
pub fn executor_start(hooks: &ExecutorHooks, qd: &mut QueryDesc, eflags: ExecFlags) -> Result<bool> {
    match hooks.start_hook() {
        Some(hook) => hook(qd, eflags),
        None => standard_executor_start(qd, eflags),
    }
}

/// Runs `qd` through the installed hook chain.
pub fn executor_run(
    hooks: &ExecutorHooks,
    qd: &mut QueryDesc,
    direction: ScanDirection,
    count: u64,
) -> Result<()> {
    match hooks.run_hook() {
        Some(hook) => hook(qd, direction, count),
        None => standard_executor_run(qd, direction, count),
    }
}

/// Finishes `qd` through the installed hook chain.
pub fn executor_finish(hooks: &ExecutorHooks, qd: &mut QueryDesc) -> Result<()> {
    match hooks.finish_hook() {
        Some(hook) => hook(qd),
        None => standard_executor_finish(qd),
    }
}

/// Ends `qd` through the installed hook chain.
pub fn executor_end(hooks: &ExecutorHooks, qd: &mut QueryDesc) -> Result<()> {
    match hooks.end_hook() {
        Some(hook) => hook(qd),
        None => standard_executor_end(qd),
    }
}

/// Creates the query region, the executor state and the state tree, then
/// lets the engine prepare. On failure the region is deleted again.
pub fn standard_executor_start(qd: &mut QueryDesc, eflags: ExecFlags) -> Result<bool> {
    if qd.estate.is_some() {
        return Err(PlanError::internal("executor already started"));
    }
    let query_context = current_memory_context().create_child("ExecutorState")?;
    let started = start_in_region(qd, eflags, &query_context);
    if started.is_err() {
        query_context.delete();
        qd.estate = None;
        qd.planstate = None;
    }
    started
}

fn start_in_region(
    qd: &mut QueryDesc,
    eflags: ExecFlags,
    query_context: &MemoryContext,
) -> Result<bool> {
    let _guard = switch_to(query_context);

    let stmt = Arc::clone(&qd.planned_stmt);
    let planstate = PlanState::init(&stmt.plan_tree, &stmt, qd.instrument_options)?;
    query_context.alloc(planstate.node_count() * std::mem::size_of::<PlanState>())?;

    qd.estate = Some(EState::new(
        query_context.clone(),
        &stmt,
        qd.instrument_options,
        eflags,
    ));
    qd.planstate = Some(planstate);
    debug!(
        operation = qd.operation.name(),
        eflags = eflags.0,
        instrument = qd.instrument_options.0,
        "executor started"
    );

    let engine = Arc::clone(&qd.engine);
    engine.start(qd, eflags)
}

/// Lets the engine produce rows, timing the call in `qd.totaltime`.
pub fn standard_executor_run(
    qd: &mut QueryDesc,
    direction: ScanDirection,
    count: u64,
) -> Result<()> {
    let estate = qd.estate()?;
    if estate.top_eflags.contains(ExecFlags::EXPLAIN_ONLY) {
        return Err(PlanError::internal(
            "cannot run a plan started for EXPLAIN only",
        ));
    }
    let query_context = estate.query_context.clone();
    let _guard = switch_to(&query_context);

    if let Some(total) = qd.totaltime.as_mut() {
        total.start_node();
    }
    let engine = Arc::clone(&qd.engine);
    let result = engine.run(qd, direction, count);
    let processed = qd.estate.as_ref().map_or(0, |e| e.processed);
    if let Some(total) = qd.totaltime.as_mut() {
        total.stop_node(processed as f64);
    }
    trace!(processed, "executor run");
    result
}

/// Lets the engine run deferred work, timing the call in `qd.totaltime`.
pub fn standard_executor_finish(qd: &mut QueryDesc) -> Result<()> {
    let estate = qd.estate()?;
    if estate.finished || estate.top_eflags.contains(ExecFlags::EXPLAIN_ONLY) {
        return Ok(());
    }
    let query_context = estate.query_context.clone();
    let _guard = switch_to(&query_context);

    if let Some(total) = qd.totaltime.as_mut() {
        total.start_node();
    }
    let engine = Arc::clone(&qd.engine);
    let result = engine.finish(qd);
    if let Some(total) = qd.totaltime.as_mut() {
        total.stop_node(0.0);
    }
    if let Some(estate) = qd.estate.as_mut() {
        estate.finished = true;
    }
    result
}

/// Lets the engine clean up, then releases the query region and drops the
/// executor state. The region is released even when the engine fails.
pub fn standard_executor_end(qd: &mut QueryDesc) -> Result<()> {
    let query_context = qd.estate()?.query_context.clone();
    let result = {
        let _guard = switch_to(&query_context);
        let engine = Arc::clone(&qd.engine);
        engine.end(qd)
    };
    query_context.delete();
    qd.estate = None;
    qd.planstate = None;
    debug!(operation = qd.operation.name(), "executor ended");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::nodes::plannodes::{Plan, PlanKind, ResultPlan};

    struct CountingEngine;

    impl PlanExecutor for CountingEngine {
        fn run(&self, qd: &mut QueryDesc, _d: ScanDirection, _count: u64) -> Result<()> {
            if let Some(estate) = qd.estate.as_mut() {
                estate.processed += 3;
            }
            if let Some(instr) = qd.planstate.as_mut().and_then(|p| p.instrument.as_mut()) {
                instr.stop_node(3.0);
            }
            Ok(())
        }
    }

    fn query(engine: Arc<dyn PlanExecutor>) -> QueryDesc {
        let plan = Plan::new(PlanKind::Result(ResultPlan::default()));
        QueryDesc::new(
            Arc::new(PlannedStmt::new(CmdType::Select, plan)),
            "select 1",
            None,
            Arc::new(InMemoryCatalog::new()),
            engine,
        )
    }

    #[test]
    fn standard_lifecycle_counts_rows_and_releases_region() {
        let hooks = ExecutorHooks::new();
        let mut qd = query(Arc::new(CountingEngine));
        qd.instrument_options = InstrumentOption::ROWS;
        qd.totaltime = Some(Instrumentation::new(InstrumentOption::ALL, false));

        assert!(executor_start(&hooks, &mut qd, ExecFlags::NONE).unwrap());
        let region = qd.estate.as_ref().unwrap().query_context.clone();
        assert!(region.mem_allocated(false) > 0);
        executor_run(&hooks, &mut qd, ScanDirection::Forward, 0).unwrap();
        executor_finish(&hooks, &mut qd).unwrap();
        assert_eq!(qd.estate.as_ref().unwrap().processed, 3);
        assert_eq!(qd.totaltime.as_ref().unwrap().tuplecount, 3.0);
        executor_end(&hooks, &mut qd).unwrap();
        assert!(region.is_deleted());
        assert!(qd.planstate.is_none());
    }

    #[test]
    fn explain_only_plans_cannot_run() {
        let hooks = ExecutorHooks::new();
        let mut qd = query(Arc::new(NullExecutor));
        executor_start(&hooks, &mut qd, ExecFlags::EXPLAIN_ONLY).unwrap();
        let err = executor_run(&hooks, &mut qd, ScanDirection::Forward, 0).unwrap_err();
        assert!(err.is_internal());
        executor_end(&hooks, &mut qd).unwrap();
    }

    #[test]
    fn hooks_replace_and_chain() {
        let hooks = Arc::new(ExecutorHooks::new());
        let prev = hooks.install_start(None);
        let start: ExecutorStartHook = Arc::new(move |qd: &mut QueryDesc, eflags: ExecFlags| {
            qd.instrument_options |= InstrumentOption::TIMER;
            match &prev {
                Some(h) => h(qd, eflags),
                None => standard_executor_start(qd, eflags),
            }
        });
        hooks.install_start(Some(start));
        let mut qd = query(Arc::new(NullExecutor));
        executor_start(&hooks, &mut qd, ExecFlags::NONE).unwrap();
        assert!(qd
            .planstate
            .as_ref()
            .and_then(|p| p.instrument.as_ref())
            .is_some_and(|i| i.need_timer));
        executor_end(&hooks, &mut qd).unwrap();
    }

    struct FailingStart;

    impl PlanExecutor for FailingStart {
        fn start(&self, _qd: &mut QueryDesc, _eflags: ExecFlags) -> Result<bool> {
            Err(PlanError::internal("engine refused the plan"))
        }

        fn run(&self, _qd: &mut QueryDesc, _d: ScanDirection, _count: u64) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_start_deletes_the_region() {
        let parent = MemoryContext::root("caller");
        let _current = switch_to(&parent);
        let hooks = ExecutorHooks::new();
        let mut qd = query(Arc::new(FailingStart));

        let err = executor_start(&hooks, &mut qd, ExecFlags::NONE).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(parent.child_count(), 0);
        assert!(qd.estate.is_none());
        assert!(qd.planstate.is_none());
    }

    #[test]
    fn dropped_active_query_releases_the_region() {
        let parent = MemoryContext::root("caller");
        let _current = switch_to(&parent);
        let hooks = ExecutorHooks::new();
        let mut qd = query(Arc::new(NullExecutor));
        let region = {
            let mut active = ActiveQuery::new(&hooks, &mut qd);
            assert!(active.start(ExecFlags::NONE).unwrap());
            assert_eq!(parent.child_count(), 1);
            active.estate.as_ref().unwrap().query_context.clone()
        };
        assert!(region.is_deleted());
        assert_eq!(parent.child_count(), 0);
        assert!(qd.estate.is_none());
    }

    #[test]
    fn ended_active_query_keeps_nothing() {
        let hooks = ExecutorHooks::new();
        let mut qd = query(Arc::new(CountingEngine));
        let mut active = ActiveQuery::new(&hooks, &mut qd);
        assert!(active.start(ExecFlags::NONE).unwrap());
        active.run(ScanDirection::Forward, 0).unwrap();
        active.finish().unwrap();
        active.end().unwrap();
        assert!(qd.estate.is_none());
    }

    #[test]
    fn flags_combine() {
        let flags = ExecFlags::EXPLAIN_ONLY | ExecFlags::EXPLAIN_GENERIC;
        assert!(flags.contains(ExecFlags::EXPLAIN_ONLY));
        assert!(!flags.contains(ExecFlags::REWIND));
    }
}
