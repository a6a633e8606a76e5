//! Run-time mirror of a plan tree.
//!
//! A [`PlanState`] exists for every plan node once the executor has started.
//! It holds the node's instrumentation and whatever run-time statistics the
//! node type reports (sort method, hash buckets, cache hits, ...). EXPLAIN
//! walks the plan and the state tree side by side.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::instrument::{InstrumentOption, Instrumentation};
use crate::nodes::nodefuncs::plan_subplans;
use crate::nodes::plannodes::{Plan, PlannedStmt};

/// How a sort was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    /// The sort had not finished when statistics were taken.
    StillInProgress,
    /// Bounded in-memory heap.
    TopNHeapsort,
    /// In-memory quicksort.
    Quicksort,
    /// External sort with a single merge pass.
    ExternalSort,
    /// External sort with several merge passes.
    ExternalMerge,
}

impl SortMethod {
    /// Name printed by EXPLAIN.
    pub fn name(self) -> &'static str {
        match self {
            SortMethod::StillInProgress => "still in progress",
            SortMethod::TopNHeapsort => "top-N heapsort",
            SortMethod::Quicksort => "quicksort",
            SortMethod::ExternalSort => "external sort",
            SortMethod::ExternalMerge => "external merge",
        }
    }
}

/// Where sort space was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortSpaceType {
    /// Temporary files.
    Disk,
    /// Work memory.
    #[default]
    Memory,
}

impl SortSpaceType {
    /// Name printed by EXPLAIN.
    pub fn name(self) -> &'static str {
        match self {
            SortSpaceType::Disk => "Disk",
            SortSpaceType::Memory => "Memory",
        }
    }
}

/// Outcome of one sort.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SortStats {
    /// Method used.
    pub method: SortMethod,
    /// Where the space was used.
    pub space_type: SortSpaceType,
    /// Space used, in kilobytes.
    pub space_used: i64,
}

/// Hash table shape of a Hash node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HashStats {
    /// Final bucket count.
    pub nbuckets: i32,
    /// Bucket count planned at start.
    pub nbuckets_original: i32,
    /// Final batch count.
    pub nbatch: i32,
    /// Batch count planned at start.
    pub nbatch_original: i32,
    /// Peak memory, in bytes.
    pub space_peak: u64,
}

/// Cache counters of a Memoize node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoizeStats {
    /// Lookups answered from the cache.
    pub cache_hits: u64,
    /// Lookups that had to run the subnode.
    pub cache_misses: u64,
    /// Entries evicted to make room.
    pub cache_evictions: u64,
    /// Entries that did not fit at all.
    pub cache_overflows: u64,
    /// Peak memory, in bytes; zero when nothing was ever freed.
    pub mem_peak: u64,
    /// Memory in use at the end, in bytes.
    pub mem_used: u64,
}

/// Spill counters of a hashed aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HashAggStats {
    /// Partitions the planner expected.
    pub planned_partitions: i32,
    /// Batches actually used.
    pub batches_used: i32,
    /// Peak memory, in bytes.
    pub mem_peak: u64,
    /// Disk used, in kilobytes.
    pub disk_used: u64,
}

/// Page counts of a bitmap heap scan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BitmapHeapStats {
    /// Pages fetched with exact tuple bitmaps.
    pub exact_pages: u64,
    /// Pages fetched with lossy bitmaps.
    pub lossy_pages: u64,
}

/// Tuple store usage of Material, CTE scan and window nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageStats {
    /// `Memory` or `Disk`.
    pub storage_type: String,
    /// Peak space, in bytes.
    pub max_space_used: i64,
}

/// Sort groups of one kind inside an incremental sort.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalSortGroupInfo {
    /// Groups sorted.
    pub group_count: i64,
    /// Methods seen, in any order.
    pub sort_methods: Vec<SortMethod>,
    /// Sum of disk space over groups, in kilobytes.
    pub total_disk_space_used: i64,
    /// Largest disk space of one group, in kilobytes.
    pub max_disk_space_used: i64,
    /// Sum of memory over groups, in kilobytes.
    pub total_memory_space_used: i64,
    /// Largest memory of one group, in kilobytes.
    pub max_memory_space_used: i64,
}

/// Both group kinds of an incremental sort.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalSortStats {
    /// Groups sorted on all keys.
    pub full: IncrementalSortGroupInfo,
    /// Groups sorted on the non-presorted suffix.
    pub prefix: IncrementalSortGroupInfo,
}

/// Outcome counts of a MERGE.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeStats {
    /// Rows inserted.
    pub inserted: f64,
    /// Rows updated.
    pub updated: f64,
    /// Rows deleted.
    pub deleted: f64,
}

/// Node-type specific statistics. Worker vectors are indexed by worker
/// number; an empty vector means no worker reported.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeStats {
    /// Sort and incremental-sort fallback.
    pub sort: Option<SortStats>,
    /// Per-worker sorts.
    pub worker_sort: Vec<Option<SortStats>>,
    /// Hash node.
    pub hash: Option<HashStats>,
    /// Memoize node.
    pub memoize: Option<MemoizeStats>,
    /// Per-worker Memoize counters.
    pub worker_memoize: Vec<MemoizeStats>,
    /// Hashed aggregate.
    pub hash_agg: Option<HashAggStats>,
    /// Per-worker hashed aggregates.
    pub worker_hash_agg: Vec<HashAggStats>,
    /// Bitmap heap scan.
    pub bitmap: Option<BitmapHeapStats>,
    /// Per-worker bitmap heap scans.
    pub worker_bitmap: Vec<BitmapHeapStats>,
    /// Tuple store usage.
    pub storage: Option<StorageStats>,
    /// Incremental sort groups.
    pub incremental_sort: Option<IncrementalSortStats>,
    /// Per-worker incremental sort groups.
    pub worker_incremental_sort: Vec<IncrementalSortStats>,
    /// Workers a Gather or Gather Merge actually started.
    pub workers_launched: Option<i32>,
    /// MERGE outcome counts.
    pub merge: Option<MergeStats>,
}

/// State of an init plan or sub-plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubPlanState {
    /// One-based id into `PlannedStmt::subplans`.
    pub plan_id: i32,
    /// State of the sub-plan's tree.
    pub planstate: PlanState,
}

/// Run-time state of one plan node.
///
/// Children follow the plan: `lefttree` and `righttree` mirror the plan's
/// outer and inner children, `members` mirrors [`Plan::member_plans`],
/// `init_plan` mirrors `Plan::init_plan` and `sub_plan` the sub-plan
/// references found in the node's expressions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanState {
    /// Id of the plan node this state belongs to.
    pub plan_node_id: i32,
    /// Leader counters, when instrumentation was requested.
    pub instrument: Option<Instrumentation>,
    /// Counters reported by parallel workers.
    pub worker_instrument: Vec<Instrumentation>,
    /// Outer child.
    pub lefttree: Option<Box<PlanState>>,
    /// Inner child.
    pub righttree: Option<Box<PlanState>>,
    /// Member children.
    pub members: Vec<PlanState>,
    /// Init plans attached to this node.
    pub init_plan: Vec<SubPlanState>,
    /// Sub-plans referenced from this node's expressions.
    pub sub_plan: Vec<SubPlanState>,
    /// Node-type specific statistics.
    pub runtime: RuntimeStats,
}

impl PlanState {
    /// Builds the state tree for `plan`, allocating counters when
    /// `options` asks for any.
    pub fn init(plan: &Plan, stmt: &PlannedStmt, options: InstrumentOption) -> Result<PlanState> {
        let instrument =
            (!options.is_empty()).then(|| Instrumentation::new(options, plan.async_capable));
        let init_plan = plan
            .init_plan
            .iter()
            .map(|sp| Self::init_subplan(sp.plan_id, stmt, options))
            .collect::<Result<Vec<_>>>()?;
        let sub_plan = plan_subplans(plan)
            .into_iter()
            .map(|sp| Self::init_subplan(sp.plan_id, stmt, options))
            .collect::<Result<Vec<_>>>()?;
        let child = |p: Option<&Plan>| -> Result<Option<Box<PlanState>>> {
            p.map(|p| Self::init(p, stmt, options).map(Box::new))
                .transpose()
        };
        Ok(PlanState {
            plan_node_id: plan.plan_node_id,
            instrument,
            worker_instrument: Vec::new(),
            lefttree: child(plan.outer_plan())?,
            righttree: child(plan.inner_plan())?,
            members: plan
                .member_plans()
                .into_iter()
                .map(|p| Self::init(p, stmt, options))
                .collect::<Result<Vec<_>>>()?,
            init_plan,
            sub_plan,
            runtime: RuntimeStats::default(),
        })
    }

    fn init_subplan(
        plan_id: i32,
        stmt: &PlannedStmt,
        options: InstrumentOption,
    ) -> Result<SubPlanState> {
        let plan = stmt
            .subplan(plan_id)
            .ok_or_else(|| PlanError::internal(format!("subplan {plan_id} not found")))?;
        Ok(SubPlanState {
            plan_id,
            planstate: Self::init(plan, stmt, options)?,
        })
    }

    /// Calls `f` on this state and every state below it, sub-plans
    /// included, in pre-order.
    pub fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut PlanState)) {
        f(self);
        for sp in &mut self.init_plan {
            sp.planstate.for_each_mut(f);
        }
        if let Some(left) = self.lefttree.as_deref_mut() {
            left.for_each_mut(f);
        }
        if let Some(right) = self.righttree.as_deref_mut() {
            right.for_each_mut(f);
        }
        for member in &mut self.members {
            member.for_each_mut(f);
        }
        for sp in &mut self.sub_plan {
            sp.planstate.for_each_mut(f);
        }
    }

    /// First state, in pre-order, for plan node `plan_node_id`.
    pub fn find_mut(&mut self, plan_node_id: i32) -> Option<&mut PlanState> {
        if self.plan_node_id == plan_node_id {
            return Some(self);
        }
        let subs = self
            .init_plan
            .iter_mut()
            .chain(self.sub_plan.iter_mut())
            .map(|sp| &mut sp.planstate);
        let children = self
            .lefttree
            .as_deref_mut()
            .into_iter()
            .chain(self.righttree.as_deref_mut())
            .chain(self.members.iter_mut());
        subs.chain(children)
            .find_map(|state| state.find_mut(plan_node_id))
    }

    /// Number of states in this tree.
    pub fn node_count(&self) -> usize {
        1 + self
            .init_plan
            .iter()
            .chain(&self.sub_plan)
            .map(|sp| sp.planstate.node_count())
            .sum::<usize>()
            + self.lefttree.as_ref().map_or(0, |s| s.node_count())
            + self.righttree.as_ref().map_or(0, |s| s.node_count())
            + self.members.iter().map(PlanState::node_count).sum::<usize>()
    }

    /// Folds the current loop of every instrumented node into its totals.
    pub fn end_all_loops(&mut self) {
        self.for_each_mut(&mut |state| {
            if let Some(instr) = state.instrument.as_mut() {
                instr.end_loop();
            }
            for worker in &mut state.worker_instrument {
                worker.end_loop();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::plannodes::{Append, CmdType, PlanKind, Scan, SeqScan};
    use crate::nodes::primnodes::{Expr, SubPlan};

    fn scan(id: i32) -> Plan {
        let mut plan = Plan::new(PlanKind::SeqScan(SeqScan {
            scan: Scan { scanrelid: 1 },
        }));
        plan.plan_node_id = id;
        plan
    }

    fn stmt_with_subplans() -> PlannedStmt {
        let mut root = Plan::new(PlanKind::Append(Append {
            appendplans: vec![scan(1), scan(2)],
            ..Append::default()
        }));
        root.init_plan.push(SubPlan {
            plan_id: 1,
            ..SubPlan::default()
        });
        root.qual.push(Expr::SubPlan(Box::new(SubPlan {
            plan_id: 2,
            ..SubPlan::default()
        })));
        let mut stmt = PlannedStmt::new(CmdType::Select, root);
        stmt.subplans = vec![scan(3), scan(4)];
        stmt
    }

    #[test]
    fn mirrors_children_and_subplans() {
        let stmt = stmt_with_subplans();
        let state = PlanState::init(&stmt.plan_tree, &stmt, InstrumentOption::ALL).unwrap();
        assert_eq!(state.members.len(), 2);
        assert_eq!(state.init_plan[0].planstate.plan_node_id, 3);
        assert_eq!(state.sub_plan[0].planstate.plan_node_id, 4);
        assert_eq!(state.node_count(), 5);
        assert!(state.instrument.as_ref().is_some_and(|i| i.need_timer));
    }

    #[test]
    fn uninstrumented_states_have_no_counters() {
        let stmt = stmt_with_subplans();
        let state = PlanState::init(&stmt.plan_tree, &stmt, InstrumentOption::NONE).unwrap();
        assert!(state.instrument.is_none());
        assert!(state.members.iter().all(|m| m.instrument.is_none()));
    }

    #[test]
    fn missing_subplan_is_internal() {
        let mut stmt = stmt_with_subplans();
        stmt.subplans.pop();
        let err = PlanState::init(&stmt.plan_tree, &stmt, InstrumentOption::NONE).unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("subplan 2 not found"));
    }

    #[test]
    fn find_reaches_members_and_subplans() {
        let stmt = stmt_with_subplans();
        let mut state = PlanState::init(&stmt.plan_tree, &stmt, InstrumentOption::ROWS).unwrap();
        state.find_mut(2).unwrap().runtime.workers_launched = Some(2);
        assert_eq!(state.members[1].runtime.workers_launched, Some(2));
        assert!(state.find_mut(4).is_some());
        assert!(state.find_mut(99).is_none());
    }
}
