#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use plantree::catalog::InMemoryCatalog;
use plantree::executor::{NullExecutor, RecordedNode, RecordedRun, ReplayExecutor};
use plantree::explain::{explain_query, EXPLAIN_XML_NAMESPACE};
use plantree::instrument::Instrumentation;
use plantree::memctx::top_memory_context;
use plantree::Result;

use common::{env, planner, result_stmt, seq_scan_stmt, Elapsed};

fn explain(command: &str) -> Result<Vec<String>> {
    explain_query(&env(Arc::new(NullExecutor)), &planner(seq_scan_stmt()), command, None)
}

/// Checks that every opening tag is closed in order.
fn assert_balanced_xml(doc: &str) {
    let mut stack: Vec<&str> = Vec::new();
    let mut rest = doc;
    while let Some(open) = rest.find('<') {
        let close = rest[open..].find('>').expect("unterminated tag") + open;
        let tag = &rest[open + 1..close];
        rest = &rest[close + 1..];
        if let Some(name) = tag.strip_prefix('/') {
            assert_eq!(stack.pop(), Some(name), "mismatched </{name}>");
        } else if !tag.ends_with('/') {
            stack.push(tag.split_whitespace().next().unwrap_or(tag));
        }
    }
    assert!(stack.is_empty(), "unclosed tags: {stack:?}");
}

#[test]
fn text_seq_scan_with_filter() -> Result<()> {
    let lines = explain("EXPLAIN SELECT * FROM vegetables WHERE id > 1")?;
    assert_eq!(
        lines,
        [
            "Seq Scan on vegetables  (cost=0.00..25.88 rows=423 width=36)",
            "  Filter: (id > 1)",
        ]
    );
    Ok(())
}

#[test]
fn costs_off_drops_the_estimates() -> Result<()> {
    let lines = explain("EXPLAIN (COSTS OFF) SELECT * FROM vegetables WHERE id > 1")?;
    assert_eq!(lines, ["Seq Scan on vegetables", "  Filter: (id > 1)"]);
    Ok(())
}

#[test]
fn verbose_qualifies_names() -> Result<()> {
    let lines = explain("EXPLAIN (VERBOSE) SELECT * FROM vegetables WHERE id > 1")?;
    assert_eq!(
        lines[0],
        "Seq Scan on public.vegetables  (cost=0.00..25.88 rows=423 width=36)"
    );
    assert!(lines.contains(&"  Filter: (vegetables.id > 1)".to_string()));
    Ok(())
}

#[test]
fn json_document_parses() -> Result<()> {
    let out = explain("EXPLAIN (FORMAT JSON) SELECT * FROM vegetables WHERE id > 1")?;
    assert_eq!(out.len(), 1);
    let doc: serde_json::Value = serde_json::from_str(&out[0])?;
    let plan = &doc["Plan"];
    assert_eq!(plan["Node Type"], "Seq Scan");
    assert_eq!(plan["Relation Name"], "vegetables");
    assert_eq!(plan["Alias"], "vegetables");
    assert_eq!(plan["Filter"], "(id > 1)");
    assert_eq!(plan["Parallel Aware"], false);
    assert_eq!(plan["Total Cost"].as_f64(), Some(25.88));
    assert_eq!(plan["Plan Rows"].as_f64(), Some(423.0));
    Ok(())
}

#[test]
fn yaml_document_parses() -> Result<()> {
    let out = explain("EXPLAIN (FORMAT YAML) SELECT * FROM vegetables WHERE id > 1")?;
    assert_eq!(out.len(), 1);
    let doc: serde_yaml::Value = serde_yaml::from_str(&out[0]).expect("valid yaml");
    let plan = &doc[0]["Plan"];
    assert_eq!(plan["Node Type"].as_str(), Some("Seq Scan"));
    assert_eq!(plan["Relation Name"].as_str(), Some("vegetables"));
    assert_eq!(plan["Filter"].as_str(), Some("(id > 1)"));
    Ok(())
}

#[test]
fn xml_document_is_balanced() -> Result<()> {
    let out = explain("EXPLAIN (FORMAT XML) SELECT * FROM vegetables WHERE id > 1")?;
    let doc = &out[0];
    assert!(doc.starts_with(&format!("<explain xmlns=\"{EXPLAIN_XML_NAMESPACE}\">")));
    assert!(doc.contains("<Node-Type>Seq Scan</Node-Type>"));
    assert!(doc.contains("<Filter>(id &gt; 1)</Filter>"));
    assert_balanced_xml(doc);
    Ok(())
}

#[test]
fn structured_formats_agree_on_the_tree() -> Result<()> {
    let stmt = result_stmt();
    let env = env(Arc::new(NullExecutor));
    let json = explain_query(&env, &planner(stmt.clone()), "EXPLAIN (FORMAT JSON) SELECT 1", None)?;
    let yaml = explain_query(&env, &planner(stmt), "EXPLAIN (FORMAT YAML) SELECT 1", None)?;
    let json: serde_json::Value = serde_json::from_str(&json[0])?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&yaml[0]).expect("valid yaml");
    assert_eq!(json["Plan"]["Node Type"], "Result");
    assert_eq!(yaml[0]["Plan"]["Node Type"].as_str(), Some("Result"));
    assert_eq!(
        json["Plan"]["Plan Width"].as_i64(),
        yaml[0]["Plan"]["Plan Width"].as_i64()
    );
    Ok(())
}

#[test]
fn analyze_reports_recorded_counters() -> Result<()> {
    let mut counters = Instrumentation::default();
    counters.ntuples = 422.0;
    counters.nloops = 1.0;
    counters.nfiltered1 = 1.0;
    counters.startup = 0.000_012;
    counters.total = 0.000_345;
    let run = RecordedRun {
        processed: 422,
        elapsed_ms: 0.5,
        nodes: vec![RecordedNode {
            plan_node_id: 0,
            instrument: Some(counters),
            ..RecordedNode::default()
        }],
        ..RecordedRun::default()
    };
    let env = env(Arc::new(ReplayExecutor::new(run)));
    let lines = explain_query(
        &env,
        &planner(seq_scan_stmt()),
        "EXPLAIN (ANALYZE, TIMING OFF, BUFFERS OFF, SUMMARY OFF) SELECT * FROM vegetables WHERE id > 1",
        None,
    )?;
    assert_eq!(
        lines,
        [
            "Seq Scan on vegetables  (cost=0.00..25.88 rows=423 width=36) (actual rows=422.00 loops=1)",
            "  Filter: (id > 1)",
            "  Rows Removed by Filter: 1",
        ]
    );
    Ok(())
}

#[test]
fn analyze_summary_reports_times() -> Result<()> {
    let env = env(Arc::new(ReplayExecutor::new(RecordedRun::default())));
    let lines = explain_query(
        &env,
        &planner(result_stmt()),
        "EXPLAIN (ANALYZE, BUFFERS OFF) SELECT 1",
        None,
    )?;
    assert!(lines[0].starts_with("Result  (cost=0.00..0.01 rows=1 width=4)"));
    assert!(lines.iter().any(|l| l.starts_with("Planning Time: ") && l.ends_with(" ms")));
    assert!(lines.iter().any(|l| l.starts_with("Execution Time: ") && l.ends_with(" ms")));
    Ok(())
}

#[test]
fn failed_rendering_releases_executor_state() {
    let top = top_memory_context();
    let before = top.child_count();
    let mut env = env(Arc::new(Elapsed(1.0)));
    env.catalog = Arc::new(InMemoryCatalog::new());

    for command in ["EXPLAIN SELECT 1", "EXPLAIN (ANALYZE, TIMING OFF) SELECT 1"] {
        for _ in 0..5 {
            let err = explain_query(&env, &planner(seq_scan_stmt()), command, None).unwrap_err();
            assert!(err.to_string().contains("16384"), "{err}");
        }
    }
    assert_eq!(top.child_count(), before);
}
