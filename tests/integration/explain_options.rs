#![allow(missing_docs)]

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use plantree::executor::NullExecutor;
use plantree::explain::{explain_query, ExplainEnv, ExplainState};
use plantree::nodes::parsenodes::DefElem;
use plantree::nodes::plannodes::PlannedStmt;
use plantree::params::ParamListInfo;
use plantree::{PlanError, Result};

use common::{env, planner, result_stmt};

fn explain_with(env: &ExplainEnv, command: &str) -> Result<Vec<String>> {
    explain_query(env, &planner(result_stmt()), command, None)
}

fn explain(command: &str) -> Result<Vec<String>> {
    explain_with(&env(Arc::new(NullExecutor)), command)
}

fn option_error(command: &str) -> PlanError {
    match explain(command) {
        Ok(lines) => panic!("{command} succeeded with {lines:?}"),
        Err(err) => err,
    }
}

#[test]
fn unknown_option_points_at_its_name() {
    let err = option_error("EXPLAIN (BICYCLE red) SELECT 1");
    assert_eq!(err.to_string(), "unrecognized EXPLAIN option \"bicycle\"");
    assert_eq!(err.location(), Some(9));
}

#[test]
fn counters_require_analyze() {
    for (command, label) in [
        ("EXPLAIN (WAL) SELECT 1", "WAL"),
        ("EXPLAIN (TIMING) SELECT 1", "TIMING"),
        ("EXPLAIN (SERIALIZE) SELECT 1", "SERIALIZE"),
    ] {
        let err = option_error(command);
        assert_eq!(err.to_string(), format!("EXPLAIN option {label} requires ANALYZE"));
    }
}

#[test]
fn analyze_and_generic_plan_conflict() {
    let err = option_error("EXPLAIN (ANALYZE, GENERIC_PLAN) SELECT 1");
    assert_eq!(
        err.to_string(),
        "EXPLAIN options ANALYZE and GENERIC_PLAN cannot be used together"
    );
}

#[test]
fn bad_format_value() {
    let err = option_error("EXPLAIN (FORMAT csv) SELECT 1");
    assert_eq!(
        err.to_string(),
        "unrecognized value for EXPLAIN option \"format\": \"csv\""
    );
}

#[test]
fn generic_plan_leaves_parameters_unbound() -> Result<()> {
    let saw_params = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&saw_params);
    let planner = move |_: &str, params: Option<&ParamListInfo>| -> Result<Vec<PlannedStmt>> {
        seen.store(params.is_some(), Ordering::SeqCst);
        Ok(vec![result_stmt()])
    };
    let env = env(Arc::new(NullExecutor));
    let params = ParamListInfo::new(Vec::new());

    explain_query(&env, &planner, "EXPLAIN SELECT $1", Some(&params))?;
    assert!(saw_params.load(Ordering::SeqCst));
    explain_query(&env, &planner, "EXPLAIN (GENERIC_PLAN) SELECT $1", Some(&params))?;
    assert!(!saw_params.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn extension_option_reaches_its_handler() -> Result<()> {
    let env = env(Arc::new(NullExecutor));
    let id = env.registry.extension_ids.get_id("bicycle_shop");
    env.registry.options.register(
        "bicycle",
        Arc::new(move |es: &mut ExplainState, opt: &DefElem| -> Result<()> {
            let colour = opt.get_string()?;
            es.set_extension_state(id, Box::new(colour));
            Ok(())
        }),
    );

    let lines = explain_with(&env, "EXPLAIN (BICYCLE red) SELECT 1")?;
    assert_eq!(lines, ["Result  (cost=0.00..0.01 rows=1 width=4)"]);
    Ok(())
}

#[test]
fn registering_an_option_again_replaces_the_handler() -> Result<()> {
    let env = env(Arc::new(NullExecutor));
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let calls = Arc::clone(&first);
    env.registry.options.register(
        "bicycle",
        Arc::new(move |_: &mut ExplainState, _: &DefElem| -> Result<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    let calls = Arc::clone(&second);
    env.registry.options.register(
        "bicycle",
        Arc::new(move |_: &mut ExplainState, _: &DefElem| -> Result<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    explain_with(&env, "EXPLAIN (BICYCLE) SELECT 1")?;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(env.registry.options.names(), ["bicycle"]);
    Ok(())
}

#[test]
fn handler_errors_abort_the_command() {
    let env = env(Arc::new(NullExecutor));
    env.registry.options.register(
        "bicycle",
        Arc::new(|_: &mut ExplainState, opt: &DefElem| -> Result<()> {
            Err(PlanError::option_at(
                "bicycles must be red",
                opt.location.offset(),
            ))
        }),
    );
    let err = explain_with(&env, "EXPLAIN (BICYCLE blue) SELECT 1").unwrap_err();
    assert_eq!(err.to_string(), "bicycles must be red");
    assert_eq!(err.location(), Some(9));
}

#[test]
fn validate_hook_sees_the_final_state() {
    let env = env(Arc::new(NullExecutor));
    env.registry.hooks.install_validate_options(Some(Arc::new(
        |es: &mut ExplainState, options: &[DefElem]| -> Result<()> {
            if es.verbose && options.len() == 1 {
                return Err(PlanError::option("VERBOSE needs company"));
            }
            Ok(())
        },
    )));
    assert!(explain_with(&env, "EXPLAIN (VERBOSE, COSTS) SELECT 1").is_ok());
    let err = explain_with(&env, "EXPLAIN (VERBOSE) SELECT 1").unwrap_err();
    assert_eq!(err.to_string(), "VERBOSE needs company");
}

#[test]
fn settings_lists_modified_values() -> Result<()> {
    let mut env = env(Arc::new(NullExecutor));
    env.catalog = Arc::new(
        common::catalog()
            .with_setting("work_mem", "64MB")
            .with_setting("enable_seqscan", "off"),
    );
    let lines = explain_with(&env, "EXPLAIN (SETTINGS) SELECT 1")?;
    assert_eq!(
        lines,
        [
            "Result  (cost=0.00..0.01 rows=1 width=4)",
            "Settings: enable_seqscan = 'off', work_mem = '64MB'",
        ]
    );
    Ok(())
}
