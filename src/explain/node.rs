//! Per-node rendering of a plan tree.
//!
//! [`PlanWalker`] visits the plan and its run-time state side by side and
//! emits, for every node: the header (type, target, costs, actuals), the
//! output list and qualifiers, node-type statistics, buffer and WAL usage,
//! the per-node hook, and then its children.

use std::borrow::Cow;

use crate::catalog::{get_collation_name, get_func_name, get_namespace_name_or_temp, get_opname};
use crate::error::{PlanError, Result};
use crate::executor::{
    IncrementalSortGroupInfo, IncrementalSortStats, PlanState, SortMethod, SortSpaceType,
    SortStats,
};
use crate::instrument::{BufferUsage, Instrumentation, WalUsage};
use crate::memctx::MemoryCounters;
use crate::nodes::nodefuncs::{expr_type, plan_subplans};
use crate::nodes::parsenodes::{JoinType, RteKind, TableFuncType};
use crate::nodes::plannodes::{
    AggStrategy, CmdType, GroupColumn, OnConflictAction, Plan, PlanKind, PlannedStmt,
    ScanDirection, SetOpCmd, SetOpStrategy, SortColumn,
};
use crate::nodes::primnodes::{Expr, SubPlan, TargetEntry};
use crate::nodes::{AttrNumber, Bitmapset, Index, Oid, INVALID_OID};
use crate::ruleutils::{deparse_expression, deparse_qual_list, quote_identifier, Ancestor, DeparseContext};

use super::format::WorkersState;
use super::state::{ExplainFormat, ExplainState};

const FRAMEOPTION_NONDEFAULT: i32 = 0x00001;
const FRAMEOPTION_RANGE: i32 = 0x00002;
const FRAMEOPTION_ROWS: i32 = 0x00004;
const FRAMEOPTION_GROUPS: i32 = 0x00008;
const FRAMEOPTION_BETWEEN: i32 = 0x00010;
const FRAMEOPTION_START_UNBOUNDED_PRECEDING: i32 = 0x00020;
const FRAMEOPTION_END_UNBOUNDED_FOLLOWING: i32 = 0x00100;
const FRAMEOPTION_START_CURRENT_ROW: i32 = 0x00200;
const FRAMEOPTION_END_CURRENT_ROW: i32 = 0x00400;
const FRAMEOPTION_START_OFFSET_PRECEDING: i32 = 0x00800;
const FRAMEOPTION_END_OFFSET_PRECEDING: i32 = 0x01000;
const FRAMEOPTION_START_OFFSET_FOLLOWING: i32 = 0x02000;
const FRAMEOPTION_END_OFFSET_FOLLOWING: i32 = 0x04000;
const FRAMEOPTION_EXCLUDE_CURRENT_ROW: i32 = 0x08000;
const FRAMEOPTION_EXCLUDE_GROUP: i32 = 0x10000;
const FRAMEOPTION_EXCLUDE_TIES: i32 = 0x20000;

/// Rounds a byte count up to kilobytes.
pub(crate) fn bytes_to_kb(bytes: u64) -> u64 {
    bytes.div_ceil(1024)
}

/// Collects the range table indexes the plan tree scans or targets, so
/// reference names are only assigned to those.
pub(crate) fn prescan_rels(stmt: &PlannedStmt, plan: &Plan, rels_used: &mut Bitmapset) {
    match &plan.kind {
        PlanKind::SeqScan(_)
        | PlanKind::SampleScan(_)
        | PlanKind::IndexScan(_)
        | PlanKind::IndexOnlyScan(_)
        | PlanKind::BitmapHeapScan(_)
        | PlanKind::TidScan(_)
        | PlanKind::TidRangeScan(_)
        | PlanKind::SubqueryScan(_)
        | PlanKind::FunctionScan(_)
        | PlanKind::TableFuncScan(_)
        | PlanKind::ValuesScan(_)
        | PlanKind::CteScan(_)
        | PlanKind::NamedTuplestoreScan(_)
        | PlanKind::WorkTableScan(_) => {
            if let Some(scan) = plan.as_scan() {
                rels_used.add_member(scan.scanrelid);
            }
        }
        PlanKind::ForeignScan(f) => *rels_used = rels_used.union(&f.fs_base_relids),
        PlanKind::CustomScan(c) => *rels_used = rels_used.union(&c.custom_relids),
        PlanKind::ModifyTable(m) => {
            rels_used.add_member(m.nominal_relation);
            if m.excl_rel_rti != 0 {
                rels_used.add_member(m.excl_rel_rti);
            }
            if !plan.targetlist.is_empty() {
                if let Some(&first) = m.result_relations.first() {
                    rels_used.add_member(first);
                }
            }
        }
        PlanKind::Append(a) => *rels_used = rels_used.union(&a.apprelids),
        PlanKind::MergeAppend(m) => *rels_used = rels_used.union(&m.apprelids),
        _ => {}
    }
    for init in &plan.init_plan {
        if let Some(sub) = stmt.subplan(init.plan_id) {
            prescan_rels(stmt, sub, rels_used);
        }
    }
    for child in plan.child_plans() {
        prescan_rels(stmt, child, rels_used);
    }
    for sp in plan_subplans(plan) {
        if let Some(sub) = stmt.subplan(sp.plan_id) {
            prescan_rels(stmt, sub, rels_used);
        }
    }
}

struct NodeNames<'p> {
    pname: Cow<'static, str>,
    sname: &'static str,
    strategy: Option<&'static str>,
    partial_mode: Option<&'static str>,
    operation: Option<&'static str>,
    custom_name: Option<&'p str>,
}

impl<'p> NodeNames<'p> {
    fn simple(name: &'static str) -> Self {
        NodeNames {
            pname: Cow::Borrowed(name),
            sname: name,
            strategy: None,
            partial_mode: None,
            operation: None,
            custom_name: None,
        }
    }

    fn of(plan: &'p Plan) -> Self {
        match &plan.kind {
            PlanKind::Result(_) => Self::simple("Result"),
            PlanKind::ProjectSet => Self::simple("ProjectSet"),
            PlanKind::ModifyTable(m) => {
                let op = match m.operation {
                    CmdType::Insert => Some("Insert"),
                    CmdType::Update => Some("Update"),
                    CmdType::Delete => Some("Delete"),
                    CmdType::Merge => Some("Merge"),
                    _ => None,
                };
                NodeNames {
                    pname: Cow::Borrowed(op.unwrap_or("???")),
                    operation: op,
                    ..Self::simple("ModifyTable")
                }
            }
            PlanKind::Append(_) => Self::simple("Append"),
            PlanKind::MergeAppend(_) => Self::simple("Merge Append"),
            PlanKind::RecursiveUnion(_) => Self::simple("Recursive Union"),
            PlanKind::BitmapAnd(_) => Self::simple("BitmapAnd"),
            PlanKind::BitmapOr(_) => Self::simple("BitmapOr"),
            PlanKind::NestLoop(_) => Self::simple("Nested Loop"),
            // "Join" is appended along with the join type.
            PlanKind::MergeJoin(_) => NodeNames {
                pname: Cow::Borrowed("Merge"),
                ..Self::simple("Merge Join")
            },
            PlanKind::HashJoin(_) => NodeNames {
                pname: Cow::Borrowed("Hash"),
                ..Self::simple("Hash Join")
            },
            PlanKind::SeqScan(_) => Self::simple("Seq Scan"),
            PlanKind::SampleScan(_) => Self::simple("Sample Scan"),
            PlanKind::Gather(_) => Self::simple("Gather"),
            PlanKind::GatherMerge(_) => Self::simple("Gather Merge"),
            PlanKind::IndexScan(_) => Self::simple("Index Scan"),
            PlanKind::IndexOnlyScan(_) => Self::simple("Index Only Scan"),
            PlanKind::BitmapIndexScan(_) => Self::simple("Bitmap Index Scan"),
            PlanKind::BitmapHeapScan(_) => Self::simple("Bitmap Heap Scan"),
            PlanKind::TidScan(_) => Self::simple("Tid Scan"),
            PlanKind::TidRangeScan(_) => Self::simple("Tid Range Scan"),
            PlanKind::SubqueryScan(_) => Self::simple("Subquery Scan"),
            PlanKind::FunctionScan(_) => Self::simple("Function Scan"),
            PlanKind::TableFuncScan(_) => Self::simple("Table Function Scan"),
            PlanKind::ValuesScan(_) => Self::simple("Values Scan"),
            PlanKind::CteScan(_) => Self::simple("CTE Scan"),
            PlanKind::NamedTuplestoreScan(_) => Self::simple("Named Tuplestore Scan"),
            PlanKind::WorkTableScan(_) => Self::simple("WorkTable Scan"),
            PlanKind::ForeignScan(f) => {
                let (pname, op) = match f.operation {
                    CmdType::Select => ("Foreign Scan", Some("Select")),
                    CmdType::Insert => ("Foreign Insert", Some("Insert")),
                    CmdType::Update => ("Foreign Update", Some("Update")),
                    CmdType::Delete => ("Foreign Delete", Some("Delete")),
                    _ => ("???", None),
                };
                NodeNames {
                    pname: Cow::Borrowed(pname),
                    operation: op,
                    ..Self::simple("Foreign Scan")
                }
            }
            PlanKind::CustomScan(c) => {
                if c.methods_name.is_empty() {
                    Self::simple("Custom Scan")
                } else {
                    NodeNames {
                        pname: Cow::Owned(format!("Custom Scan ({})", c.methods_name)),
                        custom_name: Some(c.methods_name.as_str()),
                        ..Self::simple("Custom Scan")
                    }
                }
            }
            PlanKind::Material => Self::simple("Materialize"),
            PlanKind::Memoize(_) => Self::simple("Memoize"),
            PlanKind::Sort(_) => Self::simple("Sort"),
            PlanKind::IncrementalSort(_) => Self::simple("Incremental Sort"),
            PlanKind::Group(_) => Self::simple("Group"),
            PlanKind::Agg(agg) => {
                let (pname, strategy) = match agg.aggstrategy {
                    AggStrategy::Plain => ("Aggregate", "Plain"),
                    AggStrategy::Sorted => ("GroupAggregate", "Sorted"),
                    AggStrategy::Hashed => ("HashAggregate", "Hashed"),
                    AggStrategy::Mixed => ("MixedAggregate", "Mixed"),
                };
                let (pname, partial) = if agg.aggsplit.skip_final() {
                    (Cow::Owned(format!("Partial {pname}")), "Partial")
                } else if agg.aggsplit.combine() {
                    (Cow::Owned(format!("Finalize {pname}")), "Finalize")
                } else {
                    (Cow::Borrowed(pname), "Simple")
                };
                NodeNames {
                    pname,
                    strategy: Some(strategy),
                    partial_mode: Some(partial),
                    ..Self::simple("Aggregate")
                }
            }
            PlanKind::WindowAgg(_) => Self::simple("WindowAgg"),
            PlanKind::Unique(_) => Self::simple("Unique"),
            PlanKind::SetOp(s) => {
                let (pname, strategy) = match s.strategy {
                    SetOpStrategy::Sorted => ("SetOp", "Sorted"),
                    SetOpStrategy::Hashed => ("HashSetOp", "Hashed"),
                };
                NodeNames {
                    pname: Cow::Borrowed(pname),
                    strategy: Some(strategy),
                    ..Self::simple("SetOp")
                }
            }
            PlanKind::LockRows(_) => Self::simple("LockRows"),
            PlanKind::Limit(_) => Self::simple("Limit"),
            PlanKind::Hash(_) => Self::simple("Hash"),
        }
    }
}

fn get_tle_by_resno(tlist: &[TargetEntry], resno: AttrNumber) -> Result<&TargetEntry> {
    tlist
        .iter()
        .find(|tle| tle.resno == resno)
        .ok_or_else(|| PlanError::internal(format!("no tlist entry for key {resno}")))
}

fn index_name(es: &ExplainState, indexid: Oid) -> Result<String> {
    es.catalog
        .rel_name(indexid)
        .ok_or_else(|| PlanError::catalog("index", indexid))
}

/// Walks one plan tree, keeping the deparse context and the ancestor list
/// (innermost first) in step with the node being printed.
pub(crate) struct PlanWalker<'a> {
    stmt: &'a PlannedStmt,
    ctx: DeparseContext<'a>,
    ancestors: Vec<Ancestor<'a>>,
}

impl<'a> PlanWalker<'a> {
    pub(crate) fn new(stmt: &'a PlannedStmt, ctx: DeparseContext<'a>) -> Self {
        PlanWalker {
            stmt,
            ctx,
            ancestors: Vec::new(),
        }
    }

    /// Prints `plan` and everything below it.
    pub(crate) fn explain_node(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        state: Option<&PlanState>,
        relationship: Option<&str>,
        plan_name: Option<&str>,
    ) -> Result<()> {
        let save_workers_state = es.workers_state.take();
        let save_indent = es.indent;
        if let Some(ps) = state {
            if !ps.worker_instrument.is_empty() && es.analyze && !es.hide_workers {
                es.workers_state = Some(WorkersState::new(ps.worker_instrument.len()));
            }
        }

        let names = NodeNames::of(plan);
        let plan_label = if relationship.is_some() { None } else { Some("Plan") };
        es.open_group("Plan", plan_label, true);

        if es.format == ExplainFormat::Text {
            if let Some(name) = plan_name {
                es.indent_text();
                es.output.push_str(name);
                es.output.push('\n');
                es.indent += 1;
            }
            if es.indent > 0 {
                es.indent_text();
                es.output.push_str("->  ");
                es.indent += 2;
            }
            if plan.parallel_aware {
                es.output.push_str("Parallel ");
            }
            if plan.async_capable {
                es.output.push_str("Async ");
            }
            es.output.push_str(&names.pname);
            es.indent += 1;
        } else {
            es.property_text("Node Type", names.sname);
            if let Some(strategy) = names.strategy {
                es.property_text("Strategy", strategy);
            }
            if let Some(mode) = names.partial_mode {
                es.property_text("Partial Mode", mode);
            }
            if let Some(op) = names.operation {
                es.property_text("Operation", op);
            }
            if let Some(rel) = relationship {
                es.property_text("Parent Relationship", rel);
            }
            if let Some(name) = plan_name {
                es.property_text("Subplan Name", name);
            }
            if let Some(custom) = names.custom_name {
                es.property_text("Custom Plan Provider", custom);
            }
            es.property_bool("Parallel Aware", plan.parallel_aware);
            es.property_bool("Async Capable", plan.async_capable);
        }

        self.explain_target(es, plan)?;

        if es.costs {
            if es.format == ExplainFormat::Text {
                es.output.push_str(&format!(
                    "  (cost={:.2}..{:.2} rows={:.0} width={})",
                    plan.startup_cost, plan.total_cost, plan.plan_rows, plan.plan_width
                ));
            } else {
                es.property_float("Startup Cost", None, plan.startup_cost, 2);
                es.property_float("Total Cost", None, plan.total_cost, 2);
                es.property_float("Plan Rows", None, plan.plan_rows, 0);
                es.property_integer("Plan Width", None, i64::from(plan.plan_width));
            }
        }

        let instrument = state.and_then(|ps| ps.instrument.as_ref());
        show_actuals(es, instrument);

        if es.format == ExplainFormat::Text {
            es.output.push('\n');
        }

        let disabled = plan.is_disabled();
        if es.format != ExplainFormat::Text || disabled {
            es.property_bool("Disabled", disabled);
        }

        if es.workers_state.is_some() && es.verbose {
            if let Some(ps) = state {
                for (n, w) in ps.worker_instrument.iter().enumerate() {
                    if w.nloops <= 0.0 {
                        continue;
                    }
                    es.open_worker(n);
                    show_worker_actuals(es, w);
                    es.close_worker(n);
                }
            }
        }

        if es.verbose {
            self.show_plan_tlist(es, plan)?;
        }

        if let Some(join) = plan.as_join() {
            if es.format != ExplainFormat::Text || (es.verbose && join.inner_unique) {
                es.property_bool("Inner Unique", join.inner_unique);
            }
        }

        self.show_node_details(es, plan, state)?;

        if es.buffers {
            if let Some(instr) = instrument {
                show_buffer_usage(es, &instr.bufusage);
            }
        }
        if es.wal {
            if let Some(instr) = instrument {
                show_wal_usage(es, &instr.walusage);
            }
        }
        if es.workers_state.is_some() && (es.buffers || es.wal) && es.verbose {
            if let Some(ps) = state {
                for (n, w) in ps.worker_instrument.iter().enumerate() {
                    if w.nloops <= 0.0 {
                        continue;
                    }
                    es.open_worker(n);
                    if es.buffers {
                        show_buffer_usage(es, &w.bufusage);
                    }
                    if es.wal {
                        show_wal_usage(es, &w.walusage);
                    }
                    es.close_worker(n);
                }
            }
        }

        if es.workers_state.is_some() {
            es.flush_workers_state();
        }
        es.workers_state = save_workers_state;

        if let Some(hook) = es.registry.hooks.per_node_hook() {
            hook(plan, state, &self.ancestors, relationship, plan_name, es)?;
        }

        let members = plan.member_plans();
        if matches!(plan.kind, PlanKind::Append(_) | PlanKind::MergeAppend(_)) {
            let nplans = state.map_or(members.len(), |ps| ps.members.len());
            if nplans < members.len() || es.format != ExplainFormat::Text {
                es.property_integer("Subplans Removed", None, (members.len() - nplans.min(members.len())) as i64);
            }
        }

        let subplan_refs = plan_subplans(plan);
        let has_children = !plan.init_plan.is_empty()
            || plan.lefttree.is_some()
            || plan.righttree.is_some()
            || matches!(
                plan.kind,
                PlanKind::Append(_)
                    | PlanKind::MergeAppend(_)
                    | PlanKind::BitmapAnd(_)
                    | PlanKind::BitmapOr(_)
                    | PlanKind::SubqueryScan(_)
            )
            || matches!(&plan.kind, PlanKind::CustomScan(c) if !c.custom_plans.is_empty())
            || !subplan_refs.is_empty();

        if has_children {
            es.open_group("Plans", Some("Plans"), false);
            self.ancestors.insert(0, Ancestor::Plan(plan));
        }

        let init_refs: Vec<&'a SubPlan> = plan.init_plan.iter().collect();
        let init_states = state.map(|ps| ps.init_plan.as_slice()).unwrap_or_default();
        self.explain_subplans(es, &init_refs, init_states, "InitPlan")?;

        if let Some(outer) = plan.lefttree.as_deref() {
            let child = state.and_then(|ps| ps.lefttree.as_deref());
            self.explain_node(es, outer, child, Some("Outer"), None)?;
        }
        if let Some(inner) = plan.righttree.as_deref() {
            let child = state.and_then(|ps| ps.righttree.as_deref());
            self.explain_node(es, inner, child, Some("Inner"), None)?;
        }

        let member_rel = match &plan.kind {
            PlanKind::SubqueryScan(_) => "Subquery",
            PlanKind::CustomScan(c) if c.custom_plans.len() != 1 => "children",
            PlanKind::CustomScan(_) => "child",
            _ => "Member",
        };
        for (i, member) in members.into_iter().enumerate() {
            let child = state.and_then(|ps| ps.members.get(i));
            if state.is_some() && child.is_none() {
                // Pruned at executor start.
                continue;
            }
            self.explain_node(es, member, child, Some(member_rel), None)?;
        }

        let sub_states = state.map(|ps| ps.sub_plan.as_slice()).unwrap_or_default();
        self.explain_subplans(es, &subplan_refs, sub_states, "SubPlan")?;

        if has_children {
            self.ancestors.remove(0);
            es.close_group("Plans", Some("Plans"), false);
        }

        if es.format == ExplainFormat::Text {
            es.indent = save_indent;
        }
        es.close_group("Plan", plan_label, true);
        Ok(())
    }

    fn explain_subplans(
        &mut self,
        es: &mut ExplainState,
        refs: &[&'a SubPlan],
        states: &[crate::executor::SubPlanState],
        relationship: &str,
    ) -> Result<()> {
        for (i, sp) in refs.iter().copied().enumerate() {
            let plan_id = u32::try_from(sp.plan_id)
                .map_err(|_| PlanError::internal(format!("invalid subplan id {}", sp.plan_id)))?;
            // The same physical sub-plan may be referenced from several
            // expressions; it is printed once.
            if es.printed_subplans.is_member(plan_id) {
                continue;
            }
            es.printed_subplans.add_member(plan_id);
            let sub = self
                .stmt
                .subplan(sp.plan_id)
                .ok_or_else(|| PlanError::internal(format!("subplan {} not found", sp.plan_id)))?;
            let sub_state = states.get(i).map(|s| &s.planstate);
            self.ancestors.insert(0, Ancestor::SubPlan(sp));
            let result = self.explain_node(es, sub, sub_state, Some(relationship), Some(sp.plan_name.as_str()));
            self.ancestors.remove(0);
            result?;
        }
        Ok(())
    }

    fn explain_target(&mut self, es: &mut ExplainState, plan: &'a Plan) -> Result<()> {
        match &plan.kind {
            PlanKind::SeqScan(_)
            | PlanKind::SampleScan(_)
            | PlanKind::BitmapHeapScan(_)
            | PlanKind::TidScan(_)
            | PlanKind::TidRangeScan(_)
            | PlanKind::SubqueryScan(_)
            | PlanKind::FunctionScan(_)
            | PlanKind::TableFuncScan(_)
            | PlanKind::ValuesScan(_)
            | PlanKind::CteScan(_)
            | PlanKind::NamedTuplestoreScan(_)
            | PlanKind::WorkTableScan(_) => self.explain_scan_target(es, plan),
            PlanKind::ForeignScan(_) | PlanKind::CustomScan(_) => {
                if plan.as_scan().is_some_and(|s| s.scanrelid > 0) {
                    self.explain_scan_target(es, plan)?;
                }
                Ok(())
            }
            PlanKind::IndexScan(s) => {
                explain_index_scan_details(es, s.indexid, s.indexorderdir)?;
                self.explain_scan_target(es, plan)
            }
            PlanKind::IndexOnlyScan(s) => {
                explain_index_scan_details(es, s.indexid, s.indexorderdir)?;
                self.explain_scan_target(es, plan)
            }
            PlanKind::BitmapIndexScan(s) => {
                let name = index_name(es, s.indexid)?;
                if es.format == ExplainFormat::Text {
                    es.output.push_str(&format!(" on {}", quote_identifier(&name)));
                } else {
                    es.property_text("Index Name", &name);
                }
                Ok(())
            }
            PlanKind::ModifyTable(m) => self.explain_target_rel(es, plan, m.nominal_relation),
            PlanKind::NestLoop(_) | PlanKind::MergeJoin(_) | PlanKind::HashJoin(_) => {
                if let Some(join) = plan.as_join() {
                    let jointype = join.jointype.display_name();
                    if es.format == ExplainFormat::Text {
                        if join.jointype != JoinType::Inner {
                            es.output.push_str(&format!(" {jointype} Join"));
                        } else if !matches!(plan.kind, PlanKind::NestLoop(_)) {
                            es.output.push_str(" Join");
                        }
                    } else {
                        es.property_text("Join Type", jointype);
                    }
                }
                Ok(())
            }
            PlanKind::SetOp(s) => {
                let cmd = match s.cmd {
                    SetOpCmd::Intersect => "Intersect",
                    SetOpCmd::IntersectAll => "Intersect All",
                    SetOpCmd::Except => "Except",
                    SetOpCmd::ExceptAll => "Except All",
                };
                if es.format == ExplainFormat::Text {
                    es.output.push(' ');
                    es.output.push_str(cmd);
                } else {
                    es.property_text("Command", cmd);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn explain_scan_target(&mut self, es: &mut ExplainState, plan: &'a Plan) -> Result<()> {
        match plan.as_scan() {
            Some(scan) => self.explain_target_rel(es, plan, scan.scanrelid),
            None => Ok(()),
        }
    }

    fn explain_target_rel(&mut self, es: &mut ExplainState, plan: &'a Plan, rti: Index) -> Result<()> {
        let rte = self.stmt.rtable.rt_fetch(rti)?;
        let refname = self
            .ctx
            .refname(rti)
            .map(str::to_string)
            .unwrap_or_else(|| rte.eref.aliasname.clone());
        let catalog = &*es.catalog;

        let mut objectname: Option<String> = None;
        let mut namespace: Option<String> = None;
        let mut objecttag: Option<&str> = None;
        match (&plan.kind, &rte.kind) {
            (
                PlanKind::SeqScan(_)
                | PlanKind::SampleScan(_)
                | PlanKind::IndexScan(_)
                | PlanKind::IndexOnlyScan(_)
                | PlanKind::BitmapHeapScan(_)
                | PlanKind::TidScan(_)
                | PlanKind::TidRangeScan(_)
                | PlanKind::ForeignScan(_)
                | PlanKind::CustomScan(_)
                | PlanKind::ModifyTable(_),
                RteKind::Relation { relid, .. },
            ) => {
                objectname = Some(crate::catalog::get_rel_name(catalog, *relid)?);
                if es.verbose {
                    let nsp = crate::catalog::get_rel_namespace(catalog, *relid)?;
                    namespace = Some(get_namespace_name_or_temp(catalog, nsp)?);
                }
                objecttag = Some("Relation Name");
            }
            (PlanKind::FunctionScan(fscan), _) => {
                if let [rtfunc] = fscan.functions.as_slice() {
                    if let Expr::FuncExpr(f) = &rtfunc.funcexpr {
                        objectname = Some(get_func_name(catalog, f.funcid)?);
                        if es.verbose {
                            if let Some(nsp) = catalog.func_namespace(f.funcid) {
                                namespace = Some(get_namespace_name_or_temp(catalog, nsp)?);
                            }
                        }
                    }
                }
                objecttag = Some("Function Name");
            }
            (PlanKind::TableFuncScan(t), _) => {
                objectname = Some(
                    match t.tablefunc.functype {
                        TableFuncType::XmlTable => "xmltable",
                        TableFuncType::JsonTable => "json_table",
                    }
                    .to_string(),
                );
                objecttag = Some("Table Function Name");
            }
            (PlanKind::CteScan(_) | PlanKind::WorkTableScan(_), RteKind::Cte { ctename, .. }) => {
                objectname = Some(ctename.clone());
                objecttag = Some("CTE Name");
            }
            (PlanKind::NamedTuplestoreScan(_), RteKind::NamedTuplestore { enrname, .. }) => {
                objectname = Some(enrname.clone());
                objecttag = Some("Tuplestore Name");
            }
            _ => {}
        }

        if es.format == ExplainFormat::Text {
            es.output.push_str(" on");
            match (&namespace, &objectname) {
                (Some(nsp), Some(obj)) => es.output.push_str(&format!(
                    " {}.{}",
                    quote_identifier(nsp),
                    quote_identifier(obj)
                )),
                (None, Some(obj)) => {
                    es.output.push(' ');
                    es.output.push_str(&quote_identifier(obj));
                }
                _ => {}
            }
            if objectname.as_deref() != Some(refname.as_str()) {
                es.output.push(' ');
                es.output.push_str(&quote_identifier(&refname));
            }
        } else {
            if let (Some(tag), Some(obj)) = (objecttag, &objectname) {
                es.property_text(tag, obj);
            }
            if let Some(nsp) = &namespace {
                es.property_text("Schema", nsp);
            }
            es.property_text("Alias", &refname);
        }
        Ok(())
    }

    fn focus(&mut self, plan: &'a Plan) {
        self.ctx.set_plan(plan, &self.ancestors);
    }

    /// Focuses on `child` with `parent` pushed as the innermost ancestor,
    /// for keys that refer to the child's output.
    fn focus_child(&mut self, parent: &'a Plan, child: &'a Plan) {
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.push(Ancestor::Plan(parent));
        ancestors.extend(self.ancestors.iter().cloned());
        self.ctx.set_plan(child, &ancestors);
    }

    fn show_plan_tlist(&mut self, es: &mut ExplainState, plan: &'a Plan) -> Result<()> {
        if plan.targetlist.is_empty() {
            return Ok(());
        }
        match &plan.kind {
            PlanKind::Append(_) | PlanKind::MergeAppend(_) | PlanKind::RecursiveUnion(_) => {
                return Ok(())
            }
            PlanKind::ForeignScan(f) if f.operation != CmdType::Select => return Ok(()),
            _ => {}
        }
        self.focus(plan);
        let useprefix = es.rtable_size > 1;
        let mut result = Vec::with_capacity(plan.targetlist.len());
        for tle in &plan.targetlist {
            result.push(deparse_expression(&tle.expr, &self.ctx, useprefix, false)?);
        }
        es.property_list("Output", &result);
        Ok(())
    }

    fn show_qual(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        quals: &'a [Expr],
        label: &str,
        useprefix: bool,
    ) -> Result<()> {
        if quals.is_empty() {
            return Ok(());
        }
        self.focus(plan);
        let text = deparse_qual_list(quals, &self.ctx, useprefix)?;
        es.property_text(label, &text);
        Ok(())
    }

    fn show_scan_qual(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        quals: &'a [Expr],
        label: &str,
    ) -> Result<()> {
        let useprefix = matches!(plan.kind, PlanKind::SubqueryScan(_)) || es.verbose;
        self.show_qual(es, plan, quals, label, useprefix)
    }

    fn show_upper_qual(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        quals: &'a [Expr],
        label: &str,
    ) -> Result<()> {
        let useprefix = es.rtable_size > 1 || es.verbose;
        self.show_qual(es, plan, quals, label, useprefix)
    }

    /// `Filter` plus its removed-rows counter, the pattern most scans share.
    fn show_filter(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        state: Option<&PlanState>,
        which: u8,
        upper: bool,
    ) -> Result<()> {
        if upper {
            self.show_upper_qual(es, plan, &plan.qual, "Filter")?;
        } else {
            self.show_scan_qual(es, plan, &plan.qual, "Filter")?;
        }
        if !plan.qual.is_empty() {
            show_instrumentation_count(es, "Rows Removed by Filter", which, state);
        }
        Ok(())
    }

    fn show_node_details(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        state: Option<&PlanState>,
    ) -> Result<()> {
        let runtime = state.map(|ps| &ps.runtime);
        match &plan.kind {
            PlanKind::IndexScan(s) => {
                self.show_scan_qual(es, plan, &s.indexqualorig, "Index Cond")?;
                if !s.indexqualorig.is_empty() {
                    show_instrumentation_count(es, "Rows Removed by Index Recheck", 2, state);
                }
                self.show_scan_qual(es, plan, &s.indexorderbyorig, "Order By")?;
                self.show_filter(es, plan, state, 1, false)?;
            }
            PlanKind::IndexOnlyScan(s) => {
                self.show_scan_qual(es, plan, &s.indexqual, "Index Cond")?;
                if !s.recheckqual.is_empty() {
                    show_instrumentation_count(es, "Rows Removed by Index Recheck", 2, state);
                }
                self.show_scan_qual(es, plan, &s.indexorderby, "Order By")?;
                self.show_filter(es, plan, state, 1, false)?;
                if es.analyze {
                    if let Some(instr) = state.and_then(|ps| ps.instrument.as_ref()) {
                        es.property_float("Heap Fetches", None, instr.ntuples2, 0);
                    }
                }
            }
            PlanKind::BitmapIndexScan(s) => {
                self.show_scan_qual(es, plan, &s.indexqualorig, "Index Cond")?;
            }
            PlanKind::BitmapHeapScan(s) => {
                self.show_scan_qual(es, plan, &s.bitmapqualorig, "Recheck Cond")?;
                if !s.bitmapqualorig.is_empty() {
                    show_instrumentation_count(es, "Rows Removed by Index Recheck", 2, state);
                }
                self.show_filter(es, plan, state, 1, false)?;
                if let Some(rt) = runtime {
                    show_tidbitmap_info(es, rt.bitmap.unwrap_or_default(), &rt.worker_bitmap);
                }
            }
            PlanKind::SampleScan(s) => {
                self.show_tablesample(es, plan, &s.tablesample)?;
                self.show_filter(es, plan, state, 1, false)?;
            }
            PlanKind::SeqScan(_)
            | PlanKind::ValuesScan(_)
            | PlanKind::NamedTuplestoreScan(_)
            | PlanKind::WorkTableScan(_)
            | PlanKind::SubqueryScan(_) => {
                self.show_filter(es, plan, state, 1, false)?;
            }
            PlanKind::CteScan(_) => {
                self.show_filter(es, plan, state, 1, false)?;
                show_storage_info(es, state);
            }
            PlanKind::Gather(g) => {
                self.show_filter(es, plan, state, 1, false)?;
                es.property_integer("Workers Planned", None, i64::from(g.num_workers));
                if es.analyze {
                    let launched = runtime.and_then(|rt| rt.workers_launched).unwrap_or(0);
                    es.property_integer("Workers Launched", None, i64::from(launched));
                }
                if g.single_copy || es.format != ExplainFormat::Text {
                    es.property_bool("Single Copy", g.single_copy);
                }
            }
            PlanKind::GatherMerge(g) => {
                self.show_filter(es, plan, state, 1, false)?;
                es.property_integer("Workers Planned", None, i64::from(g.num_workers));
                if es.analyze {
                    let launched = runtime.and_then(|rt| rt.workers_launched).unwrap_or(0);
                    es.property_integer("Workers Launched", None, i64::from(launched));
                }
            }
            PlanKind::FunctionScan(f) => {
                if es.verbose {
                    self.focus(plan);
                    let mut calls = Vec::with_capacity(f.functions.len());
                    for rtfunc in &f.functions {
                        calls.push(deparse_expression(&rtfunc.funcexpr, &self.ctx, es.verbose, false)?);
                    }
                    es.property_text("Function Call", &calls.join(", "));
                }
                self.show_filter(es, plan, state, 1, false)?;
            }
            PlanKind::TableFuncScan(_) => {
                self.show_filter(es, plan, state, 1, false)?;
            }
            PlanKind::TidScan(t) => {
                if t.tidquals.len() > 1 {
                    // Several TID conditions are alternatives.
                    self.focus(plan);
                    let useprefix = es.verbose;
                    let mut arms = Vec::with_capacity(t.tidquals.len());
                    for q in &t.tidquals {
                        arms.push(deparse_expression(q, &self.ctx, useprefix, false)?);
                    }
                    es.property_text("TID Cond", &format!("({})", arms.join(" OR ")));
                } else {
                    self.show_scan_qual(es, plan, &t.tidquals, "TID Cond")?;
                }
                self.show_filter(es, plan, state, 1, false)?;
            }
            PlanKind::TidRangeScan(t) => {
                self.show_scan_qual(es, plan, &t.tidrangequals, "TID Cond")?;
                self.show_filter(es, plan, state, 1, false)?;
            }
            PlanKind::ForeignScan(_) | PlanKind::CustomScan(_) => {
                self.show_filter(es, plan, state, 1, false)?;
            }
            PlanKind::NestLoop(n) => {
                self.show_join_filters(es, plan, state, &n.join.joinqual)?;
            }
            PlanKind::MergeJoin(m) => {
                self.show_upper_qual(es, plan, &m.mergeclauses, "Merge Cond")?;
                self.show_join_filters(es, plan, state, &m.join.joinqual)?;
            }
            PlanKind::HashJoin(h) => {
                self.show_upper_qual(es, plan, &h.hashclauses, "Hash Cond")?;
                self.show_join_filters(es, plan, state, &h.join.joinqual)?;
            }
            PlanKind::Agg(agg) => {
                if let Some(child) = plan.outer_plan() {
                    self.show_group_keys(es, plan, child, "Group Key", &agg.grp_cols)?;
                }
                self.show_upper_qual(es, plan, &plan.qual, "Filter")?;
                if matches!(agg.aggstrategy, AggStrategy::Hashed | AggStrategy::Mixed) {
                    let rt = runtime.cloned().unwrap_or_default();
                    show_hashagg_info(es, rt.hash_agg.unwrap_or_default(), &rt.worker_hash_agg);
                }
                if !plan.qual.is_empty() {
                    show_instrumentation_count(es, "Rows Removed by Filter", 1, state);
                }
            }
            PlanKind::WindowAgg(w) => {
                self.show_window_def(es, plan, w)?;
                self.show_upper_qual(es, plan, &w.run_condition_orig, "Run Condition")?;
                self.show_filter(es, plan, state, 1, true)?;
                show_storage_info(es, state);
            }
            PlanKind::Group(g) => {
                if let Some(child) = plan.outer_plan() {
                    self.show_group_keys(es, plan, child, "Group Key", &g.grp_cols)?;
                }
                self.show_filter(es, plan, state, 1, true)?;
            }
            PlanKind::Sort(s) => {
                self.show_sort_keys(es, plan, &s.sort_cols, 0)?;
                if let Some(rt) = runtime {
                    show_sort_info(es, rt.sort, &rt.worker_sort);
                }
            }
            PlanKind::IncrementalSort(s) => {
                self.show_sort_keys(es, plan, &s.sort.sort_cols, s.n_presorted_cols)?;
                if let Some(rt) = runtime {
                    show_incremental_sort_info(
                        es,
                        rt.incremental_sort.as_ref(),
                        &rt.worker_incremental_sort,
                    );
                }
            }
            PlanKind::MergeAppend(m) => {
                self.show_sort_keys(es, plan, &m.sort_cols, 0)?;
            }
            PlanKind::Result(r) => {
                self.show_upper_qual(es, plan, &r.resconstantqual, "One-Time Filter")?;
                self.show_filter(es, plan, state, 1, true)?;
            }
            PlanKind::ModifyTable(_) => self.show_modifytable_info(es, plan, state)?,
            PlanKind::Hash(_) => {
                let rt = runtime.cloned().unwrap_or_default();
                show_hash_info(es, rt.hash.unwrap_or_default());
            }
            PlanKind::Material | PlanKind::RecursiveUnion(_) => show_storage_info(es, state),
            PlanKind::Memoize(m) => {
                self.focus(plan);
                let useprefix = es.rtable_size > 1 || es.verbose;
                let mut keys = Vec::with_capacity(m.param_exprs.len());
                for expr in &m.param_exprs {
                    keys.push(deparse_expression(expr, &self.ctx, useprefix, false)?);
                }
                es.property_text("Cache Key", &keys.join(", "));
                es.property_text("Cache Mode", if m.binary_mode { "binary" } else { "logical" });
                if es.costs {
                    if es.format == ExplainFormat::Text {
                        es.indent_text();
                        es.output.push_str(&format!(
                            "Estimates: capacity={} distinct keys={:.0} lookups={:.0} hit percent={:.2}%\n",
                            m.est_entries,
                            m.est_unique_keys,
                            m.est_calls,
                            m.est_hit_ratio * 100.0
                        ));
                    } else {
                        es.property_uinteger("Estimated Capacity", None, u64::from(m.est_entries));
                        es.property_float("Estimated Distinct Lookup Keys", None, m.est_unique_keys, 0);
                        es.property_float("Estimated Lookups", None, m.est_calls, 0);
                        es.property_float("Estimated Hit Percent", None, m.est_hit_ratio * 100.0, 2);
                    }
                }
                if es.analyze {
                    if let Some(rt) = runtime {
                        show_memoize_info(es, rt.memoize.unwrap_or_default(), &rt.worker_memoize);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn show_join_filters(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        state: Option<&PlanState>,
        joinqual: &'a [Expr],
    ) -> Result<()> {
        self.show_upper_qual(es, plan, joinqual, "Join Filter")?;
        if !joinqual.is_empty() {
            show_instrumentation_count(es, "Rows Removed by Join Filter", 1, state);
        }
        self.show_upper_qual(es, plan, &plan.qual, "Filter")?;
        if !plan.qual.is_empty() {
            show_instrumentation_count(es, "Rows Removed by Filter", 2, state);
        }
        Ok(())
    }

    fn show_sort_keys(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        cols: &[SortColumn],
        n_presorted: usize,
    ) -> Result<()> {
        if cols.is_empty() {
            return Ok(());
        }
        self.focus(plan);
        let useprefix = es.rtable_size > 1 || es.verbose;
        let mut result = Vec::with_capacity(cols.len());
        let mut presorted = Vec::new();
        for (keyno, col) in cols.iter().enumerate() {
            let target = get_tle_by_resno(&plan.targetlist, col.col_idx)?;
            let exprstr = deparse_expression(&target.expr, &self.ctx, useprefix, true)?;
            let mut key = exprstr.clone();
            sort_order_options(es, &mut key, &target.expr, col)?;
            result.push(key);
            if keyno < n_presorted {
                presorted.push(exprstr);
            }
        }
        es.property_list("Sort Key", &result);
        if n_presorted > 0 {
            es.property_list("Presorted Key", &presorted);
        }
        Ok(())
    }

    fn show_group_keys(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        child: &'a Plan,
        label: &str,
        cols: &[GroupColumn],
    ) -> Result<()> {
        if cols.is_empty() {
            return Ok(());
        }
        self.focus_child(plan, child);
        let useprefix = es.rtable_size > 1 || es.verbose;
        let mut result = Vec::with_capacity(cols.len());
        for col in cols {
            let target = get_tle_by_resno(&child.targetlist, col.col_idx)?;
            result.push(deparse_expression(&target.expr, &self.ctx, useprefix, true)?);
        }
        es.property_list(label, &result);
        Ok(())
    }

    fn window_keys(
        &mut self,
        es: &ExplainState,
        plan: &'a Plan,
        child: &'a Plan,
        cols: &[GroupColumn],
        buf: &mut String,
    ) -> Result<()> {
        self.focus_child(plan, child);
        let useprefix = es.rtable_size > 1 || es.verbose;
        for (keyno, col) in cols.iter().enumerate() {
            let target = get_tle_by_resno(&child.targetlist, col.col_idx)?;
            if keyno > 0 {
                buf.push_str(", ");
            }
            buf.push_str(&deparse_expression(&target.expr, &self.ctx, useprefix, false)?);
        }
        Ok(())
    }

    fn show_window_def(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        w: &'a crate::nodes::plannodes::WindowAgg,
    ) -> Result<()> {
        let winname = w.winname.clone().unwrap_or_else(|| format!("w{}", w.winref));
        let mut buf = format!("{} AS (", quote_identifier(&winname));
        let mut needspace = false;
        if let Some(child) = plan.outer_plan() {
            if !w.part_cols.is_empty() {
                buf.push_str("PARTITION BY ");
                self.window_keys(es, plan, child, &w.part_cols, &mut buf)?;
                needspace = true;
            }
            if !w.ord_cols.is_empty() {
                if needspace {
                    buf.push(' ');
                }
                buf.push_str("ORDER BY ");
                self.window_keys(es, plan, child, &w.ord_cols, &mut buf)?;
                needspace = true;
            }
        }
        if w.frame_options & FRAMEOPTION_NONDEFAULT != 0 {
            self.focus(plan);
            let useprefix = es.rtable_size > 1 || es.verbose;
            let frame = self.window_frame(w, useprefix)?;
            if needspace {
                buf.push(' ');
            }
            buf.push_str(&frame);
        }
        buf.push(')');
        es.property_text("Window", &buf);
        Ok(())
    }

    fn window_frame(&self, w: &'a crate::nodes::plannodes::WindowAgg, useprefix: bool) -> Result<String> {
        let opts = w.frame_options;
        let mut buf = String::new();
        if opts & FRAMEOPTION_RANGE != 0 {
            buf.push_str("RANGE ");
        } else if opts & FRAMEOPTION_ROWS != 0 {
            buf.push_str("ROWS ");
        } else if opts & FRAMEOPTION_GROUPS != 0 {
            buf.push_str("GROUPS ");
        }
        if opts & FRAMEOPTION_BETWEEN != 0 {
            buf.push_str("BETWEEN ");
        }
        if opts & FRAMEOPTION_START_UNBOUNDED_PRECEDING != 0 {
            buf.push_str("UNBOUNDED PRECEDING ");
        } else if opts & FRAMEOPTION_START_CURRENT_ROW != 0 {
            buf.push_str("CURRENT ROW ");
        } else if opts & (FRAMEOPTION_START_OFFSET_PRECEDING | FRAMEOPTION_START_OFFSET_FOLLOWING) != 0 {
            if let Some(offset) = &w.start_offset {
                buf.push_str(&deparse_expression(offset, &self.ctx, useprefix, false)?);
            }
            if opts & FRAMEOPTION_START_OFFSET_PRECEDING != 0 {
                buf.push_str(" PRECEDING ");
            } else {
                buf.push_str(" FOLLOWING ");
            }
        }
        if opts & FRAMEOPTION_BETWEEN != 0 {
            buf.push_str("AND ");
            if opts & FRAMEOPTION_END_UNBOUNDED_FOLLOWING != 0 {
                buf.push_str("UNBOUNDED FOLLOWING ");
            } else if opts & FRAMEOPTION_END_CURRENT_ROW != 0 {
                buf.push_str("CURRENT ROW ");
            } else if opts & (FRAMEOPTION_END_OFFSET_PRECEDING | FRAMEOPTION_END_OFFSET_FOLLOWING) != 0 {
                if let Some(offset) = &w.end_offset {
                    buf.push_str(&deparse_expression(offset, &self.ctx, useprefix, false)?);
                }
                if opts & FRAMEOPTION_END_OFFSET_PRECEDING != 0 {
                    buf.push_str(" PRECEDING ");
                } else {
                    buf.push_str(" FOLLOWING ");
                }
            }
        }
        if opts & FRAMEOPTION_EXCLUDE_CURRENT_ROW != 0 {
            buf.push_str("EXCLUDE CURRENT ROW ");
        } else if opts & FRAMEOPTION_EXCLUDE_GROUP != 0 {
            buf.push_str("EXCLUDE GROUP ");
        } else if opts & FRAMEOPTION_EXCLUDE_TIES != 0 {
            buf.push_str("EXCLUDE TIES ");
        }
        buf.truncate(buf.trim_end().len());
        Ok(buf)
    }

    fn show_tablesample(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        tsc: &'a crate::nodes::parsenodes::TableSampleClause,
    ) -> Result<()> {
        self.focus(plan);
        let useprefix = es.rtable_size > 1;
        let method = get_func_name(&*es.catalog, tsc.tsmhandler)?;
        let mut params = Vec::with_capacity(tsc.args.len());
        for arg in &tsc.args {
            params.push(deparse_expression(arg, &self.ctx, useprefix, false)?);
        }
        let repeatable = tsc
            .repeatable
            .as_ref()
            .map(|r| deparse_expression(r, &self.ctx, useprefix, false))
            .transpose()?;
        if es.format == ExplainFormat::Text {
            es.indent_text();
            es.output.push_str(&format!("Sampling: {method} ({})", params.join(", ")));
            if let Some(seed) = repeatable {
                es.output.push_str(&format!(" REPEATABLE ({seed})"));
            }
            es.output.push('\n');
        } else {
            es.property_text("Sampling Method", &method);
            es.property_list("Sampling Parameters", &params);
            if let Some(seed) = repeatable {
                es.property_text("Repeatable Seed", &seed);
            }
        }
        Ok(())
    }

    fn show_modifytable_info(
        &mut self,
        es: &mut ExplainState,
        plan: &'a Plan,
        state: Option<&PlanState>,
    ) -> Result<()> {
        let PlanKind::ModifyTable(node) = &plan.kind else {
            return Ok(());
        };
        let (operation, foperation) = match node.operation {
            CmdType::Insert => ("Insert", "Foreign Insert"),
            CmdType::Update => ("Update", "Foreign Update"),
            CmdType::Delete => ("Delete", "Foreign Delete"),
            CmdType::Merge => ("Merge", "Foreign Merge"),
            _ => ("???", "Foreign ???"),
        };
        let labeltargets = node.result_relations.len() > 1
            || (node.result_relations.len() == 1
                && node.result_relations[0] != node.nominal_relation);
        if labeltargets {
            es.open_group("Target Tables", Some("Target Tables"), false);
        }
        if labeltargets {
            for &rti in &node.result_relations {
                es.open_group("Target Table", None, true);
                if es.format == ExplainFormat::Text {
                    es.indent_text();
                    let foreign = matches!(
                        self.stmt.rtable.fetch(rti).map(|rte| &rte.kind),
                        Some(RteKind::Relation { relkind: 'f', .. })
                    );
                    es.output.push_str(if foreign { foperation } else { operation });
                }
                self.explain_target_rel(es, plan, rti)?;
                if es.format == ExplainFormat::Text {
                    es.output.push('\n');
                }
                es.close_group("Target Table", None, true);
            }
        }

        let outer_ntuples = || {
            state
                .and_then(|ps| ps.lefttree.as_deref())
                .and_then(|child| child.instrument.as_ref())
                .map_or(0.0, |instr| instr.ntuples)
        };
        let instrument = state.and_then(|ps| ps.instrument.as_ref());

        if node.on_conflict_action != OnConflictAction::None {
            es.property_text(
                "Conflict Resolution",
                if node.on_conflict_action == OnConflictAction::Nothing {
                    "NOTHING"
                } else {
                    "UPDATE"
                },
            );
            if !node.arbiter_indexes.is_empty() {
                let mut names = Vec::with_capacity(node.arbiter_indexes.len());
                for &idx in &node.arbiter_indexes {
                    names.push(index_name(es, idx)?);
                }
                es.property_list("Conflict Arbiter Indexes", &names);
            }
            if let Some(qual) = &node.on_conflict_where {
                self.show_upper_qual(es, plan, std::slice::from_ref(qual), "Conflict Filter")?;
                show_instrumentation_count(es, "Rows Removed by Conflict Filter", 1, state);
            }
            if es.analyze {
                if let Some(instr) = instrument {
                    let total = outer_ntuples();
                    let other_path = instr.ntuples2;
                    es.property_float("Tuples Inserted", None, total - other_path, 0);
                    es.property_float("Conflicting Tuples", None, other_path, 0);
                }
            }
        } else if node.operation == CmdType::Merge && es.analyze && instrument.is_some() {
            let total = outer_ntuples();
            let merge = state.and_then(|ps| ps.runtime.merge).unwrap_or_default();
            let skipped = total - merge.inserted - merge.updated - merge.deleted;
            if es.format == ExplainFormat::Text {
                if total > 0.0 {
                    es.indent_text();
                    es.output.push_str("Tuples:");
                    for (label, value) in [
                        ("inserted", merge.inserted),
                        ("updated", merge.updated),
                        ("deleted", merge.deleted),
                        ("skipped", skipped),
                    ] {
                        if value > 0.0 {
                            es.output.push_str(&format!(" {label}={value:.0}"));
                        }
                    }
                    es.output.push('\n');
                }
            } else {
                es.property_float("Tuples Inserted", None, merge.inserted, 0);
                es.property_float("Tuples Updated", None, merge.updated, 0);
                es.property_float("Tuples Deleted", None, merge.deleted, 0);
                es.property_float("Tuples Skipped", None, skipped, 0);
            }
        }

        if labeltargets {
            es.close_group("Target Tables", Some("Target Tables"), false);
        }
        Ok(())
    }
}

fn explain_index_scan_details(es: &mut ExplainState, indexid: Oid, dir: ScanDirection) -> Result<()> {
    let name = index_name(es, indexid)?;
    if es.format == ExplainFormat::Text {
        if dir == ScanDirection::Backward {
            es.output.push_str(" Backward");
        }
        es.output.push_str(&format!(" using {}", quote_identifier(&name)));
    } else {
        let scandir = match dir {
            ScanDirection::Backward => "Backward",
            ScanDirection::Forward => "Forward",
            ScanDirection::NoMovement => "???",
        };
        es.property_text("Scan Direction", scandir);
        es.property_text("Index Name", &name);
    }
    Ok(())
}

fn sort_order_options(es: &ExplainState, buf: &mut String, expr: &Expr, col: &SortColumn) -> Result<()> {
    let catalog = &*es.catalog;
    let typid = expr_type(expr);
    let (lt_opr, gt_opr) = catalog.ordering_operators(typid).unwrap_or((INVALID_OID, INVALID_OID));
    let mut reverse = false;

    if col.collation != INVALID_OID && col.collation != catalog.type_collation(typid) {
        let collname = get_collation_name(catalog, col.collation)?;
        buf.push_str(&format!(" COLLATE {}", quote_identifier(&collname)));
    }
    if col.sort_operator == gt_opr && gt_opr != INVALID_OID {
        buf.push_str(" DESC");
        reverse = true;
    } else if col.sort_operator != lt_opr || lt_opr == INVALID_OID {
        let opname = get_opname(catalog, col.sort_operator)?;
        buf.push_str(&format!(" USING {opname}"));
        reverse = opname.starts_with('>');
    }
    if col.nulls_first && !reverse {
        buf.push_str(" NULLS FIRST");
    } else if !col.nulls_first && reverse {
        buf.push_str(" NULLS LAST");
    }
    Ok(())
}

fn show_actuals(es: &mut ExplainState, instrument: Option<&Instrumentation>) {
    match instrument {
        Some(instr) if es.analyze && instr.nloops > 0.0 => {
            let nloops = instr.nloops;
            let startup_ms = 1000.0 * instr.startup / nloops;
            let total_ms = 1000.0 * instr.total / nloops;
            let rows = instr.ntuples / nloops;
            if es.format == ExplainFormat::Text {
                es.output.push_str(" (actual ");
                if es.timing {
                    es.output.push_str(&format!("time={startup_ms:.3}..{total_ms:.3} "));
                }
                es.output.push_str(&format!("rows={rows:.2} loops={nloops:.0})"));
            } else {
                if es.timing {
                    es.property_float("Actual Startup Time", Some("ms"), startup_ms, 3);
                    es.property_float("Actual Total Time", Some("ms"), total_ms, 3);
                }
                es.property_float("Actual Rows", None, rows, 2);
                es.property_float("Actual Loops", None, nloops, 0);
            }
        }
        _ if es.analyze => {
            if es.format == ExplainFormat::Text {
                es.output.push_str(" (never executed)");
            } else {
                if es.timing {
                    es.property_float("Actual Startup Time", Some("ms"), 0.0, 3);
                    es.property_float("Actual Total Time", Some("ms"), 0.0, 3);
                }
                es.property_float("Actual Rows", None, 0.0, 0);
                es.property_float("Actual Loops", None, 0.0, 0);
            }
        }
        _ => {}
    }
}

fn show_worker_actuals(es: &mut ExplainState, instr: &Instrumentation) {
    let nloops = instr.nloops;
    let startup_ms = 1000.0 * instr.startup / nloops;
    let total_ms = 1000.0 * instr.total / nloops;
    let rows = instr.ntuples / nloops;
    if es.format == ExplainFormat::Text {
        es.indent_text();
        es.output.push_str("actual ");
        if es.timing {
            es.output.push_str(&format!("time={startup_ms:.3}..{total_ms:.3} "));
        }
        es.output.push_str(&format!("rows={rows:.2} loops={nloops:.0}\n"));
    } else {
        if es.timing {
            es.property_float("Actual Startup Time", Some("ms"), startup_ms, 3);
            es.property_float("Actual Total Time", Some("ms"), total_ms, 3);
        }
        es.property_float("Actual Rows", None, rows, 2);
        es.property_float("Actual Loops", None, nloops, 0);
    }
}

/// Per-loop count of rows a qualifier removed. `which` picks the counter:
/// 1 for the node's own filter, 2 for the secondary one.
fn show_instrumentation_count(es: &mut ExplainState, label: &str, which: u8, state: Option<&PlanState>) {
    if !es.analyze {
        return;
    }
    let Some(instr) = state.and_then(|ps| ps.instrument.as_ref()) else {
        return;
    };
    let nfiltered = if which == 2 { instr.nfiltered2 } else { instr.nfiltered1 };
    // Zero counts are noise in text output.
    if nfiltered > 0.0 || es.format != ExplainFormat::Text {
        let value = if instr.nloops > 0.0 { nfiltered / instr.nloops } else { 0.0 };
        es.property_float(label, None, value, 0);
    }
}

fn sort_line(es: &mut ExplainState, stats: &SortStats) {
    if es.format == ExplainFormat::Text {
        es.indent_text();
        es.output.push_str(&format!(
            "Sort Method: {}  {}: {}kB\n",
            stats.method.name(),
            stats.space_type.name(),
            stats.space_used
        ));
    } else {
        es.property_text("Sort Method", stats.method.name());
        es.property_integer("Sort Space Used", Some("kB"), stats.space_used);
        es.property_text("Sort Space Type", stats.space_type.name());
    }
}

fn show_sort_info(es: &mut ExplainState, leader: Option<SortStats>, workers: &[Option<SortStats>]) {
    if !es.analyze {
        return;
    }
    if let Some(stats) = leader {
        sort_line(es, &stats);
    }
    // With hidden workers the first worker's data reads as the node's own.
    for (n, stats) in workers.iter().enumerate() {
        let Some(stats) = stats else { continue };
        if stats.method == SortMethod::StillInProgress {
            continue;
        }
        es.open_worker(n);
        sort_line(es, stats);
        es.close_worker(n);
    }
}

fn incremental_group_info(es: &mut ExplainState, info: &IncrementalSortGroupInfo, label: &str, indent: bool) {
    let methods: Vec<String> = [
        SortMethod::TopNHeapsort,
        SortMethod::Quicksort,
        SortMethod::ExternalSort,
        SortMethod::ExternalMerge,
    ]
    .into_iter()
    .filter(|m| info.sort_methods.contains(m))
    .map(|m| m.name().to_string())
    .collect();
    let groups = info.group_count.max(1);

    if es.format == ExplainFormat::Text {
        if indent {
            es.output.push_str(&" ".repeat(es.indent * 2));
        }
        es.output.push_str(&format!("{label} Groups: {}  Sort Method", info.group_count));
        es.output.push_str(if methods.len() > 1 { "s: " } else { ": " });
        es.output.push_str(&methods.join(", "));
        for (space, total, max) in [
            (SortSpaceType::Memory, info.total_memory_space_used, info.max_memory_space_used),
            (SortSpaceType::Disk, info.total_disk_space_used, info.max_disk_space_used),
        ] {
            if max > 0 {
                let name = space.name();
                es.output.push_str(&format!(
                    "  Average {name}: {}kB  Peak {name}: {max}kB",
                    total / groups
                ));
            }
        }
    } else {
        let group_name = format!("{label} Groups");
        es.open_group("Incremental Sort Groups", Some(&group_name), true);
        es.property_integer("Group Count", None, info.group_count);
        es.property_list("Sort Methods Used", &methods);
        for (space, total, max) in [
            (SortSpaceType::Memory, info.total_memory_space_used, info.max_memory_space_used),
            (SortSpaceType::Disk, info.total_disk_space_used, info.max_disk_space_used),
        ] {
            if max > 0 {
                let space_name = format!("Sort Space {}", space.name());
                es.open_group("Sort Space", Some(&space_name), true);
                es.property_integer("Average Sort Space Used", Some("kB"), total / groups);
                es.property_integer("Peak Sort Space Used", Some("kB"), max);
                es.close_group("Sort Space", Some(&space_name), true);
            }
        }
        es.close_group("Incremental Sort Groups", Some(&group_name), true);
    }
}

fn incremental_sort_block(es: &mut ExplainState, stats: &IncrementalSortStats, indent_first: bool) {
    incremental_group_info(es, &stats.full, "Full-sort", indent_first);
    if stats.prefix.group_count > 0 {
        if es.format == ExplainFormat::Text {
            es.output.push('\n');
        }
        incremental_group_info(es, &stats.prefix, "Pre-sorted", true);
    }
    if es.format == ExplainFormat::Text {
        es.output.push('\n');
    }
}

fn show_incremental_sort_info(
    es: &mut ExplainState,
    leader: Option<&IncrementalSortStats>,
    workers: &[IncrementalSortStats],
) {
    if !es.analyze {
        return;
    }
    // Prefix groups only exist after a full group, so no full groups means
    // nothing to show.
    if let Some(stats) = leader.filter(|s| s.full.group_count > 0) {
        incremental_sort_block(es, stats, true);
    }
    for (n, stats) in workers.iter().enumerate() {
        if stats.full.group_count == 0 {
            continue;
        }
        es.open_worker(n);
        let indent_first = es.workers_state.is_none() || es.verbose;
        incremental_sort_block(es, stats, indent_first);
        es.close_worker(n);
    }
}

fn show_hash_info(es: &mut ExplainState, h: crate::executor::HashStats) {
    if h.nbatch <= 0 {
        return;
    }
    let peak_kb = bytes_to_kb(h.space_peak);
    if es.format != ExplainFormat::Text {
        es.property_integer("Hash Buckets", None, i64::from(h.nbuckets));
        es.property_integer("Original Hash Buckets", None, i64::from(h.nbuckets_original));
        es.property_integer("Hash Batches", None, i64::from(h.nbatch));
        es.property_integer("Original Hash Batches", None, i64::from(h.nbatch_original));
        es.property_uinteger("Peak Memory Usage", Some("kB"), peak_kb);
    } else if h.nbatch_original != h.nbatch || h.nbuckets_original != h.nbuckets {
        es.indent_text();
        es.output.push_str(&format!(
            "Buckets: {} (originally {})  Batches: {} (originally {})  Memory Usage: {}kB\n",
            h.nbuckets, h.nbuckets_original, h.nbatch, h.nbatch_original, peak_kb
        ));
    } else {
        es.indent_text();
        es.output.push_str(&format!(
            "Buckets: {}  Batches: {}  Memory Usage: {}kB\n",
            h.nbuckets, h.nbatch, peak_kb
        ));
    }
}

fn memoize_line(es: &mut ExplainState, m: &crate::executor::MemoizeStats, peak_kb: u64) {
    if es.format != ExplainFormat::Text {
        es.property_uinteger("Cache Hits", None, m.cache_hits);
        es.property_uinteger("Cache Misses", None, m.cache_misses);
        es.property_uinteger("Cache Evictions", None, m.cache_evictions);
        es.property_uinteger("Cache Overflows", None, m.cache_overflows);
        es.property_uinteger("Peak Memory Usage", Some("kB"), peak_kb);
    } else {
        es.indent_text();
        es.output.push_str(&format!(
            "Hits: {}  Misses: {}  Evictions: {}  Overflows: {}  Memory Usage: {}kB\n",
            m.cache_hits, m.cache_misses, m.cache_evictions, m.cache_overflows, peak_kb
        ));
    }
}

fn show_memoize_info(
    es: &mut ExplainState,
    leader: crate::executor::MemoizeStats,
    workers: &[crate::executor::MemoizeStats],
) {
    if leader.cache_misses > 0 {
        let peak = if leader.mem_peak > 0 { leader.mem_peak } else { leader.mem_used };
        memoize_line(es, &leader, bytes_to_kb(peak));
    }
    // A worker that never missed never did any work.
    for (n, w) in workers.iter().enumerate() {
        if w.cache_misses == 0 {
            continue;
        }
        es.open_worker(n);
        memoize_line(es, w, bytes_to_kb(w.mem_peak));
        es.close_worker(n);
    }
}

fn show_hashagg_info(
    es: &mut ExplainState,
    leader: crate::executor::HashAggStats,
    workers: &[crate::executor::HashAggStats],
) {
    let peak_kb = bytes_to_kb(leader.mem_peak);
    if es.format != ExplainFormat::Text {
        if es.costs {
            es.property_integer("Planned Partitions", None, i64::from(leader.planned_partitions));
        }
        // The leader may not have helped out in a parallel query.
        if es.analyze && leader.mem_peak > 0 {
            es.property_integer("HashAgg Batches", None, i64::from(leader.batches_used));
            es.property_uinteger("Peak Memory Usage", Some("kB"), peak_kb);
            es.property_uinteger("Disk Usage", Some("kB"), leader.disk_used);
        }
    } else {
        let mut gotone = false;
        if es.costs && leader.planned_partitions > 0 {
            es.indent_text();
            es.output
                .push_str(&format!("Planned Partitions: {}", leader.planned_partitions));
            gotone = true;
        }
        if es.analyze && leader.mem_peak > 0 {
            if gotone {
                es.output.push_str("  ");
            } else {
                es.indent_text();
            }
            es.output.push_str(&format!(
                "Batches: {}  Memory Usage: {}kB",
                leader.batches_used, peak_kb
            ));
            gotone = true;
            if leader.batches_used > 1 {
                es.output.push_str(&format!("  Disk Usage: {}kB", leader.disk_used));
            }
        }
        if gotone {
            es.output.push('\n');
        }
    }

    if !es.analyze {
        return;
    }
    for (n, w) in workers.iter().enumerate() {
        if w.mem_peak == 0 {
            continue;
        }
        let peak_kb = bytes_to_kb(w.mem_peak);
        es.open_worker(n);
        if es.format == ExplainFormat::Text {
            es.indent_text();
            es.output
                .push_str(&format!("Batches: {}  Memory Usage: {}kB", w.batches_used, peak_kb));
            if w.batches_used > 1 {
                es.output.push_str(&format!("  Disk Usage: {}kB", w.disk_used));
            }
            es.output.push('\n');
        } else {
            es.property_integer("HashAgg Batches", None, i64::from(w.batches_used));
            es.property_uinteger("Peak Memory Usage", Some("kB"), peak_kb);
            es.property_uinteger("Disk Usage", Some("kB"), w.disk_used);
        }
        es.close_worker(n);
    }
}

fn heap_blocks_line(es: &mut ExplainState, b: &crate::executor::BitmapHeapStats) {
    if es.format == ExplainFormat::Text {
        if b.exact_pages > 0 || b.lossy_pages > 0 {
            es.indent_text();
            es.output.push_str("Heap Blocks:");
            if b.exact_pages > 0 {
                es.output.push_str(&format!(" exact={}", b.exact_pages));
            }
            if b.lossy_pages > 0 {
                es.output.push_str(&format!(" lossy={}", b.lossy_pages));
            }
            es.output.push('\n');
        }
    } else {
        es.property_uinteger("Exact Heap Blocks", None, b.exact_pages);
        es.property_uinteger("Lossy Heap Blocks", None, b.lossy_pages);
    }
}

fn show_tidbitmap_info(
    es: &mut ExplainState,
    leader: crate::executor::BitmapHeapStats,
    workers: &[crate::executor::BitmapHeapStats],
) {
    if !es.analyze {
        return;
    }
    heap_blocks_line(es, &leader);
    for (n, w) in workers.iter().enumerate() {
        if w.exact_pages == 0 && w.lossy_pages == 0 {
            continue;
        }
        es.open_worker(n);
        heap_blocks_line(es, w);
        es.close_worker(n);
    }
}

fn show_storage_info(es: &mut ExplainState, state: Option<&PlanState>) {
    if !es.analyze {
        return;
    }
    let Some(storage) = state.and_then(|ps| ps.runtime.storage.as_ref()) else {
        return;
    };
    let max_kb = (storage.max_space_used + 1023) / 1024;
    if es.format != ExplainFormat::Text {
        es.property_text("Storage", &storage.storage_type);
        es.property_integer("Maximum Storage", Some("kB"), max_kb);
    } else {
        es.indent_text();
        es.output.push_str(&format!(
            "Storage: {}  Maximum Storage: {}kB\n",
            storage.storage_type, max_kb
        ));
    }
}

/// True when [`show_buffer_usage`] would print anything.
pub(crate) fn peek_buffer_usage(es: &ExplainState, usage: &BufferUsage) -> bool {
    if es.format != ExplainFormat::Text {
        return true;
    }
    usage.has_shared()
        || usage.has_local()
        || usage.has_temp()
        || usage.shared_blk_read_time != 0.0
        || usage.shared_blk_write_time != 0.0
        || usage.local_blk_read_time != 0.0
        || usage.local_blk_write_time != 0.0
        || usage.temp_blk_read_time != 0.0
        || usage.temp_blk_write_time != 0.0
}

fn push_counts(out: &mut String, group: &str, counts: &[(&str, i64)]) {
    out.push(' ');
    out.push_str(group);
    for (label, value) in counts {
        if *value > 0 {
            out.push_str(&format!(" {label}={value}"));
        }
    }
}

fn push_timings(out: &mut String, group: &str, read: f64, write: f64) {
    out.push(' ');
    out.push_str(group);
    if read != 0.0 {
        out.push_str(&format!(" read={:.3}", read * 1000.0));
    }
    if write != 0.0 {
        out.push_str(&format!(" write={:.3}", write * 1000.0));
    }
}

/// Buffer counters. Text output shows only positive values.
pub(crate) fn show_buffer_usage(es: &mut ExplainState, u: &BufferUsage) {
    if es.format == ExplainFormat::Text {
        let has_shared = u.has_shared();
        let has_local = u.has_local();
        let has_temp = u.has_temp();
        let has_shared_timing = u.shared_blk_read_time != 0.0 || u.shared_blk_write_time != 0.0;
        let has_local_timing = u.local_blk_read_time != 0.0 || u.local_blk_write_time != 0.0;
        let has_temp_timing = u.temp_blk_read_time != 0.0 || u.temp_blk_write_time != 0.0;

        if has_shared || has_local || has_temp {
            es.indent_text();
            let mut line = String::from("Buffers:");
            if has_shared {
                push_counts(
                    &mut line,
                    "shared",
                    &[
                        ("hit", u.shared_blks_hit),
                        ("read", u.shared_blks_read),
                        ("dirtied", u.shared_blks_dirtied),
                        ("written", u.shared_blks_written),
                    ],
                );
                if has_local || has_temp {
                    line.push(',');
                }
            }
            if has_local {
                push_counts(
                    &mut line,
                    "local",
                    &[
                        ("hit", u.local_blks_hit),
                        ("read", u.local_blks_read),
                        ("dirtied", u.local_blks_dirtied),
                        ("written", u.local_blks_written),
                    ],
                );
                if has_temp {
                    line.push(',');
                }
            }
            if has_temp {
                push_counts(
                    &mut line,
                    "temp",
                    &[("read", u.temp_blks_read), ("written", u.temp_blks_written)],
                );
            }
            es.output.push_str(&line);
            es.output.push('\n');
        }

        if has_shared_timing || has_local_timing || has_temp_timing {
            es.indent_text();
            let mut line = String::from("I/O Timings:");
            if has_shared_timing {
                push_timings(&mut line, "shared", u.shared_blk_read_time, u.shared_blk_write_time);
                if has_local_timing || has_temp_timing {
                    line.push(',');
                }
            }
            if has_local_timing {
                push_timings(&mut line, "local", u.local_blk_read_time, u.local_blk_write_time);
                if has_temp_timing {
                    line.push(',');
                }
            }
            if has_temp_timing {
                push_timings(&mut line, "temp", u.temp_blk_read_time, u.temp_blk_write_time);
            }
            es.output.push_str(&line);
            es.output.push('\n');
        }
    } else {
        es.property_integer("Shared Hit Blocks", None, u.shared_blks_hit);
        es.property_integer("Shared Read Blocks", None, u.shared_blks_read);
        es.property_integer("Shared Dirtied Blocks", None, u.shared_blks_dirtied);
        es.property_integer("Shared Written Blocks", None, u.shared_blks_written);
        es.property_integer("Local Hit Blocks", None, u.local_blks_hit);
        es.property_integer("Local Read Blocks", None, u.local_blks_read);
        es.property_integer("Local Dirtied Blocks", None, u.local_blks_dirtied);
        es.property_integer("Local Written Blocks", None, u.local_blks_written);
        es.property_integer("Temp Read Blocks", None, u.temp_blks_read);
        es.property_integer("Temp Written Blocks", None, u.temp_blks_written);
        if es.track_io_timing {
            es.property_float("Shared I/O Read Time", Some("ms"), u.shared_blk_read_time * 1000.0, 3);
            es.property_float("Shared I/O Write Time", Some("ms"), u.shared_blk_write_time * 1000.0, 3);
            es.property_float("Local I/O Read Time", Some("ms"), u.local_blk_read_time * 1000.0, 3);
            es.property_float("Local I/O Write Time", Some("ms"), u.local_blk_write_time * 1000.0, 3);
            es.property_float("Temp I/O Read Time", Some("ms"), u.temp_blk_read_time * 1000.0, 3);
            es.property_float("Temp I/O Write Time", Some("ms"), u.temp_blk_write_time * 1000.0, 3);
        }
    }
}

/// WAL counters. Text output shows only positive values.
pub(crate) fn show_wal_usage(es: &mut ExplainState, u: &WalUsage) {
    if es.format == ExplainFormat::Text {
        if u.is_empty() {
            return;
        }
        es.indent_text();
        es.output.push_str("WAL:");
        if u.wal_records > 0 {
            es.output.push_str(&format!(" records={}", u.wal_records));
        }
        if u.wal_fpi > 0 {
            es.output.push_str(&format!(" fpi={}", u.wal_fpi));
        }
        if u.wal_bytes > 0 {
            es.output.push_str(&format!(" bytes={}", u.wal_bytes));
        }
        if u.wal_buffers_full > 0 {
            es.output.push_str(&format!(" buffers full={}", u.wal_buffers_full));
        }
        es.output.push('\n');
    } else {
        es.property_integer("WAL Records", None, u.wal_records);
        es.property_integer("WAL FPI", None, u.wal_fpi);
        es.property_uinteger("WAL Bytes", None, u.wal_bytes);
        es.property_integer("WAL Buffers Full", None, u.wal_buffers_full);
    }
}

/// Memory used by a region, in kilobytes.
pub(crate) fn show_memory_counters(es: &mut ExplainState, counters: &MemoryCounters) {
    let used_kb = bytes_to_kb(counters.used() as u64);
    let allocated_kb = bytes_to_kb(counters.total_space as u64);
    if es.format == ExplainFormat::Text {
        es.indent_text();
        es.output
            .push_str(&format!("Memory: used={used_kb}kB  allocated={allocated_kb}kB\n"));
    } else {
        es.property_uinteger("Memory Used", Some("kB"), used_kb);
        es.property_uinteger("Memory Allocated", Some("kB"), allocated_kb);
    }
}
