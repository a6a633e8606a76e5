//! An engine that replays counters recorded from an earlier execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::instrument::{Instrumentation, JitInstrumentation};
use crate::nodes::plannodes::ScanDirection;

use super::{PlanExecutor, QueryDesc, ResultRelInfo, RuntimeStats, SerializeMetrics};

/// Recorded counters of one plan node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordedNode {
    /// Node the counters belong to.
    pub plan_node_id: i32,
    /// Leader counters.
    pub instrument: Option<Instrumentation>,
    /// Per-worker counters.
    pub workers: Vec<Instrumentation>,
    /// Node-type specific statistics.
    pub runtime: RuntimeStats,
}

/// A whole recorded execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordedRun {
    /// Rows the statement processed.
    pub processed: u64,
    /// Wall-clock time of the run, in milliseconds.
    pub elapsed_ms: f64,
    /// Per-node counters.
    pub nodes: Vec<RecordedNode>,
    /// Leader JIT counters.
    pub jit: Option<JitInstrumentation>,
    /// Worker JIT counters.
    pub worker_jit: Option<JitInstrumentation>,
    /// Result relations with their trigger counters.
    pub result_relations: Vec<ResultRelInfo>,
    /// Serialization cost.
    pub serialize: Option<SerializeMetrics>,
}

/// Fills the state tree from a [`RecordedRun`] instead of executing.
///
/// Recorded counters replace the allocated ones but keep the options the
/// executor allocated them with, so a node that was not instrumented stays
/// that way.
#[derive(Debug, Clone, Default)]
pub struct ReplayExecutor {
    recorded: RecordedRun,
}

impl ReplayExecutor {
    /// Replays `recorded` on every run.
    pub fn new(recorded: RecordedRun) -> Self {
        ReplayExecutor { recorded }
    }

    /// The recording.
    pub fn recorded(&self) -> &RecordedRun {
        &self.recorded
    }
}

fn replace_counters(dst: &mut Instrumentation, src: &Instrumentation) {
    let (timer, buffers, wal) = (dst.need_timer, dst.need_bufusage, dst.need_walusage);
    *dst = src.clone();
    dst.need_timer = timer;
    dst.need_bufusage = buffers;
    dst.need_walusage = wal;
}

impl PlanExecutor for ReplayExecutor {
    fn run(&self, qd: &mut QueryDesc, _direction: ScanDirection, _count: u64) -> Result<()> {
        let rec = &self.recorded;
        if let Some(total) = qd.totaltime.as_mut() {
            let elapsed = Duration::try_from_secs_f64(rec.elapsed_ms / 1000.0).unwrap_or_default();
            total.add_elapsed(elapsed);
        }
        if let Some(estate) = qd.estate.as_mut() {
            estate.processed += rec.processed;
            estate.jit = rec.jit;
            estate.worker_jit = rec.worker_jit;
            estate.result_relations = rec.result_relations.clone();
            estate.serialize_metrics = rec.serialize;
        }
        let Some(planstate) = qd.planstate.as_mut() else {
            return Ok(());
        };
        for node in &rec.nodes {
            let Some(state) = planstate.find_mut(node.plan_node_id) else {
                warn!(plan_node_id = node.plan_node_id, "recorded node not in plan");
                continue;
            };
            if let (Some(dst), Some(src)) = (state.instrument.as_mut(), node.instrument.as_ref()) {
                replace_counters(dst, src);
                state.worker_instrument = node
                    .workers
                    .iter()
                    .map(|w| {
                        let mut worker = dst.clone();
                        replace_counters(&mut worker, w);
                        worker
                    })
                    .collect();
            }
            state.runtime = node.runtime.clone();
        }
        Ok(())
    }
}
