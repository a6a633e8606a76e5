#![allow(dead_code)]

use std::sync::Arc;

use plantree::catalog::{InMemoryCatalog, BOOLOID, INT4OID};
use plantree::executor::{ExecutorHooks, PlanExecutor, QueryDesc};
use plantree::explain::{ExplainEnv, ExplainRegistry};
use plantree::nodes::makefuncs::{make_int4_const, make_op_expr, make_var};
use plantree::nodes::plannodes::{
    CmdType, Plan, PlanKind, PlannedStmt, ResultPlan, Scan, ScanDirection, SeqScan,
};
use plantree::nodes::RangeTblEntry;
use plantree::params::ParamListInfo;
use plantree::Result;

pub const VEGETABLES: u32 = 16384;

pub fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new().with_relation(VEGETABLES, "vegetables")
}

/// `Result  (cost=0.00..0.01 rows=1 width=4)`
pub fn result_stmt() -> PlannedStmt {
    let mut plan = Plan::new(PlanKind::Result(ResultPlan::default()));
    plan.total_cost = 0.01;
    plan.plan_rows = 1.0;
    plan.plan_width = 4;
    PlannedStmt::new(CmdType::Select, plan)
}

/// `SELECT * FROM vegetables WHERE id > 1`
pub fn seq_scan_stmt() -> PlannedStmt {
    let mut plan = Plan::new(PlanKind::SeqScan(SeqScan {
        scan: Scan { scanrelid: 1 },
    }));
    plan.total_cost = 25.88;
    plan.plan_rows = 423.0;
    plan.plan_width = 36;
    plan.parallel_safe = true;
    plan.qual.push(make_op_expr(
        521,
        BOOLOID,
        vec![make_var(1, 1, INT4OID, -1, 0, 0), make_int4_const(1)],
    ));
    let mut stmt = PlannedStmt::new(CmdType::Select, plan);
    stmt.rtable.push(RangeTblEntry::relation(
        VEGETABLES,
        "vegetables",
        vec!["id".to_string(), "name".to_string()],
    ));
    stmt.relation_oids = vec![VEGETABLES];
    stmt
}

/// A planner that always hands back `stmt`.
pub fn planner(
    stmt: PlannedStmt,
) -> impl Fn(&str, Option<&ParamListInfo>) -> Result<Vec<PlannedStmt>> {
    move |_: &str, _: Option<&ParamListInfo>| -> Result<Vec<PlannedStmt>> {
        Ok(vec![stmt.clone()])
    }
}

/// An environment with its own registry and hook chain so tests do not
/// see each other's extensions.
pub fn env(engine: Arc<dyn PlanExecutor>) -> ExplainEnv {
    ExplainEnv {
        catalog: Arc::new(catalog()),
        registry: Arc::new(ExplainRegistry::new()),
        executor: Arc::new(ExecutorHooks::new()),
        engine,
        track_io_timing: false,
    }
}

/// Executor that only advances the statement clock.
pub struct Elapsed(pub f64);

impl PlanExecutor for Elapsed {
    fn run(&self, qd: &mut QueryDesc, _direction: ScanDirection, _count: u64) -> Result<()> {
        if let Some(total) = qd.totaltime.as_mut() {
            total.add_elapsed(std::time::Duration::from_secs_f64(self.0 / 1000.0));
        }
        Ok(())
    }
}
