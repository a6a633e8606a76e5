#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use plantree::auto_explain::{AutoExplain, AutoExplainConfig, LogLevel, LogSink};
use plantree::catalog::TEXTOID;
use plantree::executor::{
    executor_end, executor_finish, executor_run, executor_start, ExecFlags, ExecutorHooks,
    PlanExecutor, QueryDesc,
};
use plantree::explain::ExplainRegistry;
use plantree::nodes::plannodes::ScanDirection;
use plantree::nodes::primnodes::Datum;
use plantree::params::{ParamExternData, ParamListInfo};
use plantree::{ExplainFormat, Result};

use common::{catalog, result_stmt, seq_scan_stmt, Elapsed};

#[derive(Default)]
struct Collect(Mutex<Vec<(LogLevel, String)>>);

impl Collect {
    fn messages(&self) -> Vec<String> {
        self.0.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl LogSink for Collect {
    fn emit(&self, level: LogLevel, message: &str) {
        self.0.lock().push((level, message.to_string()));
    }
}

fn module(config: AutoExplainConfig) -> (Arc<AutoExplain>, Arc<Collect>) {
    let sink = Arc::new(Collect::default());
    let module = Arc::new(
        AutoExplain::new(config)
            .with_sink(sink.clone())
            .with_seed(42)
            .with_registry(Arc::new(ExplainRegistry::new())),
    );
    (module, sink)
}

fn query(text: &str, engine: Arc<dyn PlanExecutor>, params: Option<ParamListInfo>) -> QueryDesc {
    QueryDesc::new(
        Arc::new(result_stmt()),
        text,
        params,
        Arc::new(catalog()),
        engine,
    )
}

fn execute(hooks: &ExecutorHooks, qd: &mut QueryDesc) -> Result<()> {
    assert!(executor_start(hooks, qd, ExecFlags::NONE)?);
    executor_run(hooks, qd, ScanDirection::Forward, 0)?;
    executor_finish(hooks, qd)?;
    executor_end(hooks, qd)
}

fn run_select(hooks: &ExecutorHooks, ms: f64) -> Result<()> {
    execute(hooks, &mut query("select 1", Arc::new(Elapsed(ms)), None))
}

/// Body of a logged message, without the duration line.
fn plan_body(message: &str) -> &str {
    message.split_once('\n').map_or("", |(_, body)| body)
}

#[test]
fn threshold_filters_fast_statements() -> Result<()> {
    let (module, sink) = module(AutoExplainConfig {
        log_min_duration: 100,
        ..AutoExplainConfig::default()
    });
    let hooks = ExecutorHooks::new();
    module.install(&hooks);

    run_select(&hooks, 50.0)?;
    assert!(sink.messages().is_empty());
    run_select(&hooks, 150.0)?;

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    let (first, _) = messages[0].split_once('\n').expect("two-part message");
    let msec: f64 = first
        .strip_prefix("duration: ")
        .and_then(|rest| rest.strip_suffix(" ms  plan:"))
        .and_then(|n| n.parse().ok())
        .expect("duration line");
    assert!(msec >= 150.0);
    Ok(())
}

#[test]
fn sample_rate_bounds() -> Result<()> {
    for (rate, expect_all) in [(0.0, false), (1.0, true)] {
        let (module, sink) = module(AutoExplainConfig {
            log_min_duration: 0,
            sample_rate: rate,
            ..AutoExplainConfig::default()
        });
        let hooks = ExecutorHooks::new();
        module.install(&hooks);
        for _ in 0..1000 {
            run_select(&hooks, 1.0)?;
        }
        let logged = sink.messages().len();
        assert_eq!(logged, if expect_all { 1000 } else { 0 }, "rate {rate}");
    }
    Ok(())
}

#[test]
fn half_sampling_is_seeded() -> Result<()> {
    let mut counts = Vec::new();
    for _ in 0..2 {
        let (module, sink) = module(AutoExplainConfig {
            log_min_duration: 0,
            sample_rate: 0.5,
            ..AutoExplainConfig::default()
        });
        let hooks = ExecutorHooks::new();
        module.install(&hooks);
        for _ in 0..1000 {
            run_select(&hooks, 1.0)?;
        }
        counts.push(sink.messages().len());
    }
    assert_eq!(counts[0], counts[1]);
    assert!((350..650).contains(&counts[0]), "sampled {}", counts[0]);
    Ok(())
}

/// Runs an inner statement through the same hook chain while it runs.
struct Nested {
    hooks: Arc<ExecutorHooks>,
}

impl PlanExecutor for Nested {
    fn run(&self, qd: &mut QueryDesc, _direction: ScanDirection, _count: u64) -> Result<()> {
        let mut inner = query("select 2", Arc::new(Elapsed(5.0)), None);
        execute(&self.hooks, &mut inner)?;
        if let Some(total) = qd.totaltime.as_mut() {
            total.add_elapsed(Duration::from_millis(20));
        }
        Ok(())
    }
}

fn nested_run(log_nested_statements: bool) -> Result<(Vec<String>, Arc<AutoExplain>)> {
    let (module, sink) = module(AutoExplainConfig {
        log_min_duration: 0,
        log_verbose: true,
        log_nested_statements,
        ..AutoExplainConfig::default()
    });
    let hooks = Arc::new(ExecutorHooks::new());
    module.install(&hooks);
    let engine = Arc::new(Nested {
        hooks: Arc::clone(&hooks),
    });
    execute(&hooks, &mut query("select 1", engine, None))?;
    Ok((sink.messages(), module))
}

#[test]
fn nested_statements_are_skipped_by_default() -> Result<()> {
    let (messages, module) = nested_run(false)?;
    assert_eq!(messages.len(), 1);
    assert!(plan_body(&messages[0]).starts_with("Query Text: select 1\n"));
    assert_eq!(module.nesting_level(), 0);
    Ok(())
}

#[test]
fn nested_statements_log_inner_first() -> Result<()> {
    let (messages, module) = nested_run(true)?;
    assert_eq!(messages.len(), 2);
    assert!(plan_body(&messages[0]).starts_with("Query Text: select 2\n"));
    assert!(plan_body(&messages[1]).starts_with("Query Text: select 1\n"));
    assert_eq!(module.nesting_level(), 0);
    Ok(())
}

#[test]
fn parameters_follow_the_length_limit() -> Result<()> {
    let params = || {
        Some(ParamListInfo::new(vec![ParamExternData::new(
            Datum::Text("abcdefghijkl".into()),
            TEXTOID,
        )]))
    };
    let mut seen = Vec::new();
    for maxlen in [8, -1, 0] {
        let (module, sink) = module(AutoExplainConfig {
            log_min_duration: 0,
            log_parameter_max_length: maxlen,
            ..AutoExplainConfig::default()
        });
        let hooks = ExecutorHooks::new();
        module.install(&hooks);
        execute(&hooks, &mut query("select $1", Arc::new(Elapsed(1.0)), params()))?;
        let messages = sink.messages();
        let line = plan_body(&messages[0])
            .lines()
            .find(|l| l.starts_with("Query Parameters: "))
            .map(str::to_string);
        seen.push(line);
    }
    assert_eq!(
        seen,
        [
            Some("Query Parameters: $1 = 'abcdefgh...'".to_string()),
            Some("Query Parameters: $1 = 'abcdefghijkl'".to_string()),
            None,
        ]
    );
    Ok(())
}

#[test]
fn json_plans_are_single_objects() -> Result<()> {
    let (module, sink) = module(AutoExplainConfig {
        log_min_duration: 0,
        log_verbose: true,
        log_format: ExplainFormat::Json,
        ..AutoExplainConfig::default()
    });
    let hooks = ExecutorHooks::new();
    module.install(&hooks);
    run_select(&hooks, 1.0)?;

    let messages = sink.messages();
    let doc: serde_json::Value = serde_json::from_str(plan_body(&messages[0]))?;
    assert!(doc.is_object());
    assert_eq!(doc["Query Text"], "select 1");
    assert_eq!(doc["Plan"]["Node Type"], "Result");
    Ok(())
}

#[test]
fn analyze_adds_actuals_for_the_scanned_relation() -> Result<()> {
    let (module, sink) = module(AutoExplainConfig {
        log_min_duration: 0,
        log_analyze: true,
        log_timing: false,
        ..AutoExplainConfig::default()
    });
    let hooks = ExecutorHooks::new();
    module.install(&hooks);
    let mut qd = QueryDesc::new(
        Arc::new(seq_scan_stmt()),
        "select * from vegetables where id > 1",
        None,
        Arc::new(catalog()),
        Arc::new(Elapsed(3.0)),
    );
    execute(&hooks, &mut qd)?;

    let messages = sink.messages();
    let body: Vec<&str> = plan_body(&messages[0]).lines().collect();
    assert_eq!(
        body[0],
        "Seq Scan on vegetables  (cost=0.00..25.88 rows=423 width=36) (never executed)"
    );
    assert_eq!(body[1], "  Filter: (id > 1)");
    Ok(())
}

#[test]
fn settings_change_through_set() -> Result<()> {
    let (module, sink) = module(AutoExplainConfig::default());
    let hooks = ExecutorHooks::new();
    module.install(&hooks);

    module.set("auto_explain.log_min_duration", "10ms", true)?;
    module.set("auto_explain.log_level", "notice", true)?;
    assert_eq!(module.show("auto_explain.log_min_duration")?, "10ms");
    run_select(&hooks, 5.0)?;
    run_select(&hooks, 25.0)?;

    let logged = sink.0.lock();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].0, LogLevel::Notice);
    Ok(())
}
