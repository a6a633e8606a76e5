#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use plantree::executor::NullExecutor;
use plantree::explain::{explain_query, ExplainEnv};
use plantree::overexplain;
use plantree::Result;

use common::{env, planner, seq_scan_stmt, VEGETABLES};

fn overexplain_env() -> (ExplainEnv, overexplain::Installed) {
    let env = env(Arc::new(NullExecutor));
    let installed = overexplain::install(&env.registry);
    (env, installed)
}

fn explain(env: &ExplainEnv, options: &str) -> Result<Vec<String>> {
    let command = format!("EXPLAIN ({options}) SELECT * FROM vegetables WHERE id > 1");
    explain_query(env, &planner(seq_scan_stmt()), &command, None)
}

#[test]
fn debug_prints_node_and_statement_bookkeeping() -> Result<()> {
    let (env, _installed) = overexplain_env();
    let lines = explain(&env, "DEBUG")?;
    assert_eq!(
        lines,
        [
            "Seq Scan on vegetables  (cost=0.00..25.88 rows=423 width=36)",
            "  Filter: (id > 1)",
            "  Disabled Nodes: 0",
            "  Parallel Safe: true",
            "  Plan Node ID: 0",
            "PlannedStmt:",
            "  Command Type: select",
            "  Flags: none",
            "  Subplans Needing Rewind: none",
            "  Relation OIDs: 16384",
            "  Executor Parameter Types: none",
            "  Parse Location: Unknown",
        ]
    );
    Ok(())
}

#[test]
fn range_table_describes_each_entry() -> Result<()> {
    let (env, _installed) = overexplain_env();
    let lines = explain(&env, "RANGE_TABLE")?;
    assert_eq!(
        lines,
        [
            "Seq Scan on vegetables  (cost=0.00..25.88 rows=423 width=36)",
            "  Filter: (id > 1)",
            "  Scan RTI: 1",
            "RTI 1 (relation, in-from-clause):",
            "  Eref: vegetables (id, name)",
            "  Relation: vegetables",
            "  Relation Kind: relation",
            "  Relation Lock Mode: AccessShareLock",
        ]
    );
    Ok(())
}

#[test]
fn verbose_range_table_qualifies_relations() -> Result<()> {
    let (env, _installed) = overexplain_env();
    let lines = explain(&env, "RANGE_TABLE, VERBOSE")?;
    assert!(lines.contains(&"  Relation: public.vegetables".to_string()));
    Ok(())
}

#[test]
fn json_output_stays_well_formed() -> Result<()> {
    let (env, _installed) = overexplain_env();
    let out = explain(&env, "DEBUG, RANGE_TABLE, FORMAT JSON")?;
    let doc: serde_json::Value = serde_json::from_str(&out[0])?;

    assert_eq!(doc["Plan"]["Plan Node ID"], 0);
    assert_eq!(doc["Plan"]["Parallel Safe"], true);
    assert_eq!(doc["Plan"]["extParam"], "none");
    assert_eq!(doc["Plan"]["Scan RTI"], 1);

    let stmt = &doc["PlannedStmt"];
    assert_eq!(stmt["Command Type"], "select");
    assert_eq!(stmt["Relation OIDs"], VEGETABLES.to_string());
    assert_eq!(stmt["Parse Location"], "Unknown");

    let entries = doc["Range Table"].as_array().expect("range table array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["RTI"], 1);
    assert_eq!(entries[0]["Kind"], "relation");
    assert_eq!(entries[0]["In From Clause"], true);
    assert_eq!(entries[0]["Security Barrier"], false);
    assert_eq!(doc["Unprunable RTIs"], "none");
    assert_eq!(doc["Result RTIs"], "none");
    Ok(())
}

#[test]
fn options_off_print_nothing_extra() -> Result<()> {
    let (env, _installed) = overexplain_env();
    let lines = explain(&env, "DEBUG OFF, RANGE_TABLE false")?;
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
fn uninstalled_hooks_stop_printing() -> Result<()> {
    let (env, installed) = overexplain_env();
    overexplain::uninstall(&env.registry, installed);
    let lines = explain(&env, "DEBUG")?;
    assert_eq!(lines.len(), 2);
    Ok(())
}
