//! EXPLAIN: renders planned statements as text, XML, JSON or YAML.
//!
//! A run builds an [`ExplainState`] from the command options, opens the
//! document with [`ExplainState::begin_output`], prints one `Query` group per
//! planned statement ([`explain_one_plan`]) and closes the document. The
//! pieces are public so modules such as `auto_explain` can assemble their own
//! documents from [`explain_query_text`], [`explain_query_parameters`] and
//! [`explain_print_plan`].

pub mod command;
pub mod format;
pub mod hooks;
pub mod node;
pub mod options;
pub mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::catalog::CatalogLookup;
use crate::error::{PlanError, Result};
use crate::executor::{
    ActiveQuery, ExecFlags, ExecutorHooks, PlanExecutor, QueryDesc, ResultRelInfo,
    SerializeMetrics,
};
use crate::instrument::{jit_flags, session_buffer_usage, BufferUsage, InstrumentOption, Instrumentation, JitInstrumentation};
use crate::memctx::{current_memory_context, switch_to, MemoryCounters};
use crate::nodes::parsenodes::RteKind;
use crate::nodes::plannodes::{CmdType, PlanKind, PlannedStmt, ScanDirection};
use crate::nodes::Bitmapset;
use crate::params::{build_param_log_string, ParamListInfo};
use crate::ruleutils::{select_rtable_names_for_explain, DeparseContext};

pub use command::{parse_explain_command, ExplainCommand};
pub use format::{escape_json, escape_xml, EXPLAIN_XML_NAMESPACE};
pub use hooks::{
    get_explain_extension_id, ExplainHooks, ExplainPerNodeHook, ExplainPerPlanHook,
    ExplainRegistry, ExplainValidateOptionsHook,
};
pub use options::{apply_extension_option, parse_explain_options, ExplainOptionHandler, OptionRegistry};
pub use state::{ExplainFormat, ExplainState, ExtensionIds, SerializeMode};

use node::{bytes_to_kb, peek_buffer_usage, prescan_rels, show_buffer_usage, show_memory_counters, PlanWalker};

/// Times a statement may be re-planned after the executor reports its plan
/// invalid before EXPLAIN gives up.
const MAX_REPLAN_ATTEMPTS: usize = 3;

/// Turns statement text into planned statements.
///
/// An empty vector means the statement rewrote to nothing.
pub trait QueryPlanner {
    /// Plans `statement`. `params` is `None` for a generic plan.
    fn plan(&self, statement: &str, params: Option<&ParamListInfo>) -> Result<Vec<PlannedStmt>>;
}

impl<F> QueryPlanner for F
where
    F: Fn(&str, Option<&ParamListInfo>) -> Result<Vec<PlannedStmt>>,
{
    fn plan(&self, statement: &str, params: Option<&ParamListInfo>) -> Result<Vec<PlannedStmt>> {
        self(statement, params)
    }
}

/// Services an EXPLAIN command needs besides the planner.
#[derive(Clone)]
pub struct ExplainEnv {
    /// Catalog for names.
    pub catalog: Arc<dyn CatalogLookup>,
    /// Extension options and hooks.
    pub registry: Arc<ExplainRegistry>,
    /// Executor hook chain.
    pub executor: Arc<ExecutorHooks>,
    /// Engine that runs plans under `ANALYZE`.
    pub engine: Arc<dyn PlanExecutor>,
    /// Report I/O timings in structured buffer output.
    pub track_io_timing: bool,
}

impl ExplainEnv {
    /// An environment using the process-wide registry and hook chain.
    pub fn new(catalog: Arc<dyn CatalogLookup>, engine: Arc<dyn PlanExecutor>) -> Self {
        ExplainEnv {
            catalog,
            registry: Arc::clone(ExplainRegistry::global()),
            executor: Arc::clone(ExecutorHooks::global()),
            engine,
            track_io_timing: false,
        }
    }

    /// A fresh rendering state bound to this environment.
    pub fn new_state(&self) -> ExplainState {
        let mut es = ExplainState::with_registry(Arc::clone(&self.catalog), Arc::clone(&self.registry));
        es.track_io_timing = self.track_io_timing;
        es
    }
}

impl std::fmt::Debug for ExplainEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplainEnv")
            .field("track_io_timing", &self.track_io_timing)
            .finish_non_exhaustive()
    }
}

/// Prints the statement text under `Query Text`, in verbose mode only.
pub fn explain_query_text(es: &mut ExplainState, qd: &QueryDesc) {
    if es.verbose && !qd.source_text.is_empty() {
        es.property_text("Query Text", &qd.source_text);
    }
}

/// Prints bound parameters under `Query Parameters`. Values longer than
/// `maxlen` bytes are cut; `-1` prints them whole and `0` prints nothing.
pub fn explain_query_parameters(es: &mut ExplainState, params: Option<&ParamListInfo>, maxlen: i32) {
    let Some(params) = params else {
        return;
    };
    if params.is_empty() || maxlen == 0 {
        return;
    }
    let rendered = build_param_log_string(params, maxlen);
    if !rendered.is_empty() {
        es.property_text("Query Parameters", &rendered);
    }
}

/// Prints the plan tree of a started query, then the settings and query
/// identifier lines.
pub fn explain_print_plan(es: &mut ExplainState, qd: &mut QueryDesc) -> Result<()> {
    if let Some(ps) = qd.planstate.as_mut() {
        ps.end_all_loops();
    }
    let stmt = Arc::clone(&qd.planned_stmt);
    let catalog = Arc::clone(&es.catalog);

    let mut rels_used = Bitmapset::new();
    prescan_rels(&stmt, &stmt.plan_tree, &mut rels_used);
    for init in &stmt.plan_tree.init_plan {
        if let Some(sub) = stmt.subplan(init.plan_id) {
            prescan_rels(&stmt, sub, &mut rels_used);
        }
    }
    es.rtable_names = select_rtable_names_for_explain(&stmt.rtable, &rels_used, &*catalog);
    es.rtable_size = stmt.rtable.len();
    if stmt
        .rtable
        .iter()
        .any(|(_, rte)| matches!(rte.kind, RteKind::Group { .. }))
    {
        es.rtable_size -= 1;
    }
    es.printed_subplans = Bitmapset::new();

    let ctx = DeparseContext::for_plan_tree(&stmt, &*catalog, es.rtable_names.clone());
    let mut plan = &stmt.plan_tree;
    let mut state = qd.planstate.as_ref();
    // A Gather the planner added only for testing shows its child instead.
    if let PlanKind::Gather(g) = &plan.kind {
        if g.invisible {
            if let Some(child) = plan.outer_plan() {
                plan = child;
                state = state.and_then(|ps| ps.lefttree.as_deref());
                es.hide_workers = true;
            }
        }
    }
    PlanWalker::new(&stmt, ctx).explain_node(es, plan, state, None, None)?;

    explain_print_settings(es);

    if es.verbose && stmt.query_id != 0 {
        es.property_integer("Query Identifier", None, stmt.query_id as i64);
    }
    Ok(())
}

/// Prints planner settings that differ from their defaults.
pub fn explain_print_settings(es: &mut ExplainState) {
    if !es.settings {
        return;
    }
    let settings = es.catalog.modified_settings();
    if es.format != ExplainFormat::Text {
        es.open_group("Settings", Some("Settings"), true);
        for (name, value) in &settings {
            es.property_text(name, value);
        }
        es.close_group("Settings", Some("Settings"), true);
    } else if !settings.is_empty() {
        let joined = settings
            .iter()
            .map(|(name, value)| format!("{name} = '{value}'"))
            .collect::<Vec<_>>()
            .join(", ");
        es.property_text("Settings", &joined);
    }
}

fn report_triggers(es: &mut ExplainState, rel: &ResultRelInfo, show_relname: bool) -> Result<()> {
    for trig in &rel.triggers {
        let mut instr = trig.instr.clone();
        instr.end_loop();
        // Triggers that never fired are not interesting.
        if instr.ntuples == 0.0 {
            continue;
        }
        let relname = es
            .catalog
            .rel_name(rel.relid)
            .ok_or_else(|| PlanError::catalog("relation", rel.relid))?;

        es.open_group("Trigger", None, true);
        if es.format == ExplainFormat::Text {
            es.indent_text();
            match &trig.constraint_name {
                Some(conname) => es.output.push_str(&format!("Trigger for constraint {conname}")),
                None => es.output.push_str(&format!("Trigger {}", trig.tgname)),
            }
            if show_relname {
                es.output.push_str(&format!(" on {relname}"));
            }
            if es.timing {
                es.output.push_str(&format!(
                    ": time={:.3} calls={:.0}\n",
                    1000.0 * instr.total,
                    instr.ntuples
                ));
            } else {
                es.output.push_str(&format!(": calls={:.0}\n", instr.ntuples));
            }
        } else {
            es.property_text("Trigger Name", &trig.tgname);
            if let Some(conname) = &trig.constraint_name {
                es.property_text("Constraint Name", conname);
            }
            es.property_text("Relation", &relname);
            if es.timing {
                es.property_float("Time", Some("ms"), 1000.0 * instr.total, 3);
            }
            es.property_float("Calls", None, instr.ntuples, 0);
        }
        es.close_group("Trigger", None, true);
    }
    Ok(())
}

/// Prints time spent in triggers, per relation.
pub fn explain_print_triggers(es: &mut ExplainState, qd: &QueryDesc) -> Result<()> {
    let Some(estate) = qd.estate.as_ref() else {
        return Ok(());
    };
    let show_relname = estate.result_relations.len() > 1
        || !estate.tuple_routing.is_empty()
        || !estate.trig_target.is_empty();
    es.open_group("Triggers", Some("Triggers"), false);
    for rel in estate
        .result_relations
        .iter()
        .chain(&estate.tuple_routing)
        .chain(&estate.trig_target)
    {
        report_triggers(es, rel, show_relname)?;
    }
    es.close_group("Triggers", Some("Triggers"), false);
    Ok(())
}

/// Prints JIT counters of the leader and workers combined.
pub fn explain_print_jit_summary(es: &mut ExplainState, qd: &QueryDesc) {
    let Some(estate) = qd.estate.as_ref() else {
        return;
    };
    if estate.jit_flags & jit_flags::PERFORM == 0 {
        return;
    }
    let mut ji = JitInstrumentation::default();
    if let Some(jit) = &estate.jit {
        ji.add(jit);
    }
    if let Some(jit) = &estate.worker_jit {
        ji.add(jit);
    }
    explain_print_jit(es, estate.jit_flags, &ji);
}

/// Prints one set of JIT counters; nothing when no function was compiled.
pub fn explain_print_jit(es: &mut ExplainState, flags: i32, ji: &JitInstrumentation) {
    if ji.created_functions == 0 {
        return;
    }
    let functions = i64::try_from(ji.created_functions).unwrap_or(i64::MAX);
    let flag = |bit: i32| flags & bit != 0;
    let ms = |secs: f64| 1000.0 * secs;

    es.open_group("JIT", Some("JIT"), true);
    if es.format == ExplainFormat::Text {
        es.indent_text();
        es.output.push_str("JIT:\n");
        es.indent += 1;
        es.property_integer("Functions", None, functions);
        es.indent_text();
        es.output.push_str(&format!(
            "Options: Inlining {}, Optimization {}, Expressions {}, Deforming {}\n",
            flag(jit_flags::INLINE),
            flag(jit_flags::OPT3),
            flag(jit_flags::EXPR),
            flag(jit_flags::DEFORM)
        ));
        if es.analyze && es.timing {
            es.indent_text();
            es.output.push_str(&format!(
                "Timing: Generation {:.3} ms (Deform {:.3} ms), Inlining {:.3} ms, Optimization {:.3} ms, Emission {:.3} ms, Total {:.3} ms\n",
                ms(ji.generation_counter),
                ms(ji.deform_counter),
                ms(ji.inlining_counter),
                ms(ji.optimization_counter),
                ms(ji.emission_counter),
                ms(ji.total())
            ));
        }
        es.indent -= 1;
    } else {
        es.property_integer("Functions", None, functions);
        es.open_group("Options", Some("Options"), true);
        es.property_bool("Inlining", flag(jit_flags::INLINE));
        es.property_bool("Optimization", flag(jit_flags::OPT3));
        es.property_bool("Expressions", flag(jit_flags::EXPR));
        es.property_bool("Deforming", flag(jit_flags::DEFORM));
        es.close_group("Options", Some("Options"), true);
        if es.analyze && es.timing {
            es.open_group("Timing", Some("Timing"), true);
            es.open_group("Generation", Some("Generation"), true);
            es.property_float("Deform", Some("ms"), ms(ji.deform_counter), 3);
            es.property_float("Total", Some("ms"), ms(ji.generation_counter), 3);
            es.close_group("Generation", Some("Generation"), true);
            es.property_float("Inlining", Some("ms"), ms(ji.inlining_counter), 3);
            es.property_float("Optimization", Some("ms"), ms(ji.optimization_counter), 3);
            es.property_float("Emission", Some("ms"), ms(ji.emission_counter), 3);
            es.property_float("Total", Some("ms"), ms(ji.total()), 3);
            es.close_group("Timing", Some("Timing"), true);
        }
    }
    es.close_group("JIT", Some("JIT"), true);
}

fn explain_print_serialize(es: &mut ExplainState, metrics: &SerializeMetrics) {
    let format = if es.serialize == SerializeMode::Binary { "binary" } else { "text" };
    let output_kb = bytes_to_kb(metrics.bytes_sent);
    es.open_group("Serialization", Some("Serialization"), true);
    if es.format == ExplainFormat::Text {
        es.indent_text();
        if es.timing {
            es.output.push_str(&format!(
                "Serialization: time={:.3} ms  output={output_kb}kB  format={format}\n",
                1000.0 * metrics.time_spent
            ));
        } else {
            es.output
                .push_str(&format!("Serialization: output={output_kb}kB  format={format}\n"));
        }
        if es.buffers && peek_buffer_usage(es, &metrics.buffer_usage) {
            es.indent += 1;
            show_buffer_usage(es, &metrics.buffer_usage);
            es.indent -= 1;
        }
    } else {
        if es.timing {
            es.property_float("Time", Some("ms"), 1000.0 * metrics.time_spent, 3);
        }
        es.property_uinteger("Output Volume", Some("kB"), output_kb);
        es.property_text("Format", format);
        if es.buffers {
            show_buffer_usage(es, &metrics.buffer_usage);
        }
    }
    es.close_group("Serialization", Some("Serialization"), true);
}

/// What planning cost, for the `Planning` block and `Planning Time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanningStats {
    /// Wall-clock planning time.
    pub duration: Option<Duration>,
    /// Buffers the planner touched, when `BUFFERS` is on.
    pub buffers: Option<BufferUsage>,
    /// Planner memory, when `MEMORY` is on.
    pub memory: Option<MemoryCounters>,
}

fn total_seconds(instr: &Option<Instrumentation>) -> f64 {
    instr.as_ref().map_or(0.0, |t| {
        let mut t = t.clone();
        t.end_loop();
        t.total
    })
}

/// Explains one planned statement, running it first under `ANALYZE`.
///
/// Returns `Ok(false)` without printing anything when the executor reports
/// the plan invalid; the caller re-plans.
pub fn explain_one_plan(
    env: &ExplainEnv,
    stmt: Arc<PlannedStmt>,
    es: &mut ExplainState,
    query_string: &str,
    params: Option<&ParamListInfo>,
    planning: &PlanningStats,
) -> Result<bool> {
    let mut instrument_options = InstrumentOption::NONE;
    if es.analyze {
        instrument_options = if es.timing {
            InstrumentOption::TIMER
        } else {
            InstrumentOption::ROWS
        };
    }
    if es.buffers {
        instrument_options = instrument_options | InstrumentOption::BUFFERS;
    }
    if es.wal {
        instrument_options = instrument_options | InstrumentOption::WAL;
    }

    let mut desc = QueryDesc::new(
        Arc::clone(&stmt),
        query_string,
        params.cloned(),
        Arc::clone(&env.catalog),
        Arc::clone(&env.engine),
    );
    desc.instrument_options = instrument_options;
    desc.totaltime = Some(Instrumentation::new(InstrumentOption::TIMER, false));

    let mut eflags = if es.analyze { ExecFlags::NONE } else { ExecFlags::EXPLAIN_ONLY };
    if es.generic {
        eflags |= ExecFlags::EXPLAIN_GENERIC;
    }

    // Any early return below releases the executor state with the guard.
    let mut qd = ActiveQuery::new(&env.executor, &mut desc);
    let start = Instant::now();
    if !qd.start(eflags)? {
        debug!("plan invalidated at executor start");
        if qd.estate.is_some() {
            qd.end()?;
        }
        return Ok(false);
    }
    if es.analyze {
        qd.run(ScanDirection::Forward, 0)?;
        qd.finish()?;
    }
    let mut totaltime = start.elapsed().as_secs_f64();

    es.open_group("Query", None, true);
    explain_print_plan(es, &mut qd)?;

    let planning_buffers = planning.buffers.filter(|b| peek_buffer_usage(es, b));
    if planning_buffers.is_some() || planning.memory.is_some() {
        es.open_group("Planning", Some("Planning"), true);
        if es.format == ExplainFormat::Text {
            es.indent_text();
            es.output.push_str("Planning:\n");
            es.indent += 1;
        }
        if let Some(buffers) = &planning_buffers {
            show_buffer_usage(es, buffers);
        }
        if let Some(memory) = &planning.memory {
            show_memory_counters(es, memory);
        }
        if es.format == ExplainFormat::Text {
            es.indent -= 1;
        }
        es.close_group("Planning", Some("Planning"), true);
    }

    if es.summary {
        if let Some(duration) = planning.duration {
            es.property_float("Planning Time", Some("ms"), 1000.0 * duration.as_secs_f64(), 3);
        }
    }

    if es.analyze {
        explain_print_triggers(es, &qd)?;
    }
    // JIT details depend on the build, so they follow COSTS.
    if es.costs {
        explain_print_jit_summary(es, &qd);
    }
    if es.serialize != SerializeMode::None {
        let metrics = qd
            .estate
            .as_ref()
            .and_then(|e| e.serialize_metrics)
            .unwrap_or_default();
        explain_print_serialize(es, &metrics);
    }

    if let Some(hook) = es.registry.hooks.per_plan_hook() {
        hook(&stmt, es, Some(query_string), params)?;
    }

    // Run and finish are timed by the executor itself; the wall clock only
    // adds what it cannot see.
    let recorded = total_seconds(&qd.totaltime);
    totaltime = totaltime.max(recorded);
    let end = Instant::now();
    qd.end()?;
    totaltime += end.elapsed().as_secs_f64();

    if es.summary && es.analyze {
        es.property_float("Execution Time", Some("ms"), 1000.0 * totaltime, 3);
    }
    es.close_group("Query", None, true);
    Ok(true)
}

fn explain_one_utility(es: &mut ExplainState) {
    if es.format == ExplainFormat::Text {
        es.output.push_str("Utility statements have no plan structure\n");
    } else {
        es.dummy_group("Utility Statement", None);
    }
}

fn plan_with_stats(
    es: &ExplainState,
    planner: &dyn QueryPlanner,
    statement: &str,
    params: Option<&ParamListInfo>,
) -> Result<(Vec<PlannedStmt>, PlanningStats)> {
    let planner_ctx = if es.memory {
        Some(current_memory_context().create_child("explain analyze planner context")?)
    } else {
        None
    };
    let buffers_before = session_buffer_usage();
    let start = Instant::now();
    let stmts = {
        let _guard = planner_ctx.as_ref().map(switch_to);
        planner.plan(statement, params)?
    };
    let duration = start.elapsed();
    let stats = PlanningStats {
        duration: Some(duration),
        buffers: es.buffers.then(|| session_buffer_usage().since(&buffers_before)),
        memory: planner_ctx.as_ref().map(|ctx| ctx.counters(true)),
    };
    if let Some(ctx) = planner_ctx {
        ctx.delete();
    }
    Ok((stmts, stats))
}

/// Turns a one-query JSON array into the bare query object.
fn unwrap_single_json_query(doc: &str) -> Option<String> {
    let inner = doc.strip_prefix("[\n")?.strip_suffix("\n]")?;
    let lines: Vec<&str> = inner
        .lines()
        .map(|line| line.strip_prefix("  ").unwrap_or(line))
        .collect();
    Some(lines.join("\n"))
}

/// Runs `EXPLAIN` end to end.
///
/// Text output comes back one line per element; the other formats as a
/// single document. A JSON document holding exactly one query is returned
/// as that query's object.
pub fn explain_query(
    env: &ExplainEnv,
    planner: &dyn QueryPlanner,
    command_text: &str,
    params: Option<&ParamListInfo>,
) -> Result<Vec<String>> {
    let command = parse_explain_command(command_text)?;
    let mut es = env.new_state();
    parse_explain_options(&mut es, &command.options)?;
    debug!(format = %es.format, analyze = es.analyze, "explain");

    // A generic plan leaves parameters unbound.
    let bound = if es.generic { None } else { params };

    es.begin_output();
    let mut explained = 0usize;
    let mut attempt = 0usize;
    'replan: loop {
        attempt += 1;
        let output_mark = es.output.len();
        let stack_mark = es.grouping_stack.clone();
        let indent_mark = es.indent;

        let (stmts, planning) = plan_with_stats(&es, planner, &command.statement, bound)?;
        if stmts.is_empty() && es.format == ExplainFormat::Text {
            es.output.push_str("Query rewrites to nothing\n");
        }
        let count = stmts.len();
        for (i, stmt) in stmts.into_iter().enumerate() {
            if stmt.command_type == CmdType::Utility {
                explain_one_utility(&mut es);
            } else if !explain_one_plan(env, Arc::new(stmt), &mut es, &command.statement, bound, &planning)? {
                if attempt >= MAX_REPLAN_ATTEMPTS {
                    return Err(PlanError::internal(format!(
                        "plan invalidated {attempt} times in a row"
                    )));
                }
                warn!(attempt, "plan invalidated, planning again");
                es.output.truncate(output_mark);
                es.grouping_stack = stack_mark;
                es.indent = indent_mark;
                continue 'replan;
            }
            if i + 1 < count {
                es.separate_plans();
            }
        }
        explained = count;
        break;
    }
    es.end_output();

    if es.grouping_depth() != 0 {
        return Err(PlanError::internal(format!(
            "unbalanced EXPLAIN groups: {} left open",
            es.grouping_depth()
        )));
    }

    let output = std::mem::take(&mut es.output);
    match es.format {
        ExplainFormat::Text => Ok(output.lines().map(str::to_string).collect()),
        ExplainFormat::Json if explained == 1 => {
            Ok(vec![unwrap_single_json_query(&output).unwrap_or(output)])
        }
        _ => Ok(vec![output]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::executor::NullExecutor;
    use crate::nodes::plannodes::{Plan, ResultPlan};

    fn env() -> ExplainEnv {
        ExplainEnv {
            catalog: Arc::new(InMemoryCatalog::new()),
            registry: Arc::new(ExplainRegistry::new()),
            executor: Arc::new(ExecutorHooks::new()),
            engine: Arc::new(NullExecutor),
            track_io_timing: false,
        }
    }

    fn select_one(_: &str, _: Option<&ParamListInfo>) -> Result<Vec<PlannedStmt>> {
        let mut plan = Plan::new(PlanKind::Result(ResultPlan::default()));
        plan.total_cost = 0.01;
        plan.plan_rows = 1.0;
        plan.plan_width = 4;
        Ok(vec![PlannedStmt::new(CmdType::Select, plan)])
    }

    #[test]
    fn text_result_node() {
        let lines = explain_query(&env(), &select_one, "EXPLAIN SELECT 1", None).unwrap();
        assert_eq!(lines, ["Result  (cost=0.00..0.01 rows=1 width=4)"]);
    }

    #[test]
    fn json_single_query_is_an_object() {
        let out = explain_query(&env(), &select_one, "EXPLAIN (FORMAT JSON) SELECT 1", None).unwrap();
        assert_eq!(out.len(), 1);
        let doc = &out[0];
        assert!(doc.starts_with('{') && doc.ends_with('}'));
        let value: serde_json::Value = serde_json::from_str(doc).unwrap();
        assert_eq!(value["Plan"]["Node Type"], "Result");
    }

    #[test]
    fn nothing_to_explain() {
        let nothing = |_: &str, _: Option<&ParamListInfo>| -> Result<Vec<PlannedStmt>> { Ok(Vec::new()) };
        let lines = explain_query(&env(), &nothing, "EXPLAIN SELECT 1", None).unwrap();
        assert_eq!(lines, ["Query rewrites to nothing"]);
    }

    #[test]
    fn utility_statement() {
        let utility = |_: &str, _: Option<&ParamListInfo>| -> Result<Vec<PlannedStmt>> {
            Ok(vec![PlannedStmt::new(CmdType::Utility, Plan::default())])
        };
        let lines = explain_query(&env(), &utility, "EXPLAIN NOTIFY chan", None).unwrap();
        assert_eq!(lines, ["Utility statements have no plan structure"]);
    }

    #[test]
    fn parameters_respect_maxlen() {
        use crate::nodes::primnodes::Datum;
        use crate::params::ParamExternData;

        let mut es = env().new_state();
        let params = ParamListInfo::new(vec![ParamExternData::new(
            Datum::Text("abcdefghij".into()),
            crate::catalog::TEXTOID,
        )]);
        explain_query_parameters(&mut es, Some(&params), 0);
        assert!(es.output.is_empty());
        explain_query_parameters(&mut es, Some(&params), 4);
        assert_eq!(es.output, "Query Parameters: $1 = 'abcd...'\n");
    }
}
