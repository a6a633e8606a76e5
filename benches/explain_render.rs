//! Rendering benchmarks for EXPLAIN output.
#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use plantree::catalog::{InMemoryCatalog, BOOLOID, INT4OID};
use plantree::executor::{ExecutorHooks, NullExecutor};
use plantree::explain::{explain_query, ExplainEnv, ExplainRegistry};
use plantree::nodes::makefuncs::{make_int4_const, make_op_expr, make_var};
use plantree::nodes::plannodes::{Append, CmdType, Plan, PlanKind, PlannedStmt, Scan, SeqScan};
use plantree::nodes::RangeTblEntry;
use plantree::params::ParamListInfo;
use plantree::Result;

const FORMATS: [&str; 4] = ["text", "json", "xml", "yaml"];

/// An append over `partitions` filtered scans, one relation each.
fn partitioned_scan(partitions: u32, rng: &mut ChaCha8Rng) -> (PlannedStmt, InMemoryCatalog) {
    let mut catalog = InMemoryCatalog::new();
    let mut members = Vec::with_capacity(partitions as usize);
    for i in 0..partitions {
        let relid = 20_000 + i;
        catalog = catalog.with_relation(relid, format!("measurements_p{i}"));
        let mut scan = Plan::new(PlanKind::SeqScan(SeqScan {
            scan: Scan { scanrelid: i + 1 },
        }));
        scan.total_cost = rng.gen_range(10.0..5_000.0);
        scan.plan_rows = f64::from(rng.gen_range(1u32..100_000));
        scan.plan_width = 16;
        let rti = (i + 1) as i32;
        scan.plan_node_id = rti;
        scan.qual.push(make_op_expr(
            521,
            BOOLOID,
            vec![make_var(rti, 1, INT4OID, -1, 0, 0), make_int4_const(rng.gen_range(0..1_000))],
        ));
        members.push(scan);
    }
    let total = members.iter().map(|m| m.total_cost).sum();
    let mut plan = Plan::new(PlanKind::Append(Append {
        appendplans: members,
        part_prune_index: -1,
        ..Append::default()
    }));
    plan.total_cost = total;
    plan.plan_width = 16;

    let mut stmt = PlannedStmt::new(CmdType::Select, plan);
    for i in 0..partitions {
        stmt.rtable.push(RangeTblEntry::relation(
            20_000 + i,
            format!("measurements_p{i}"),
            vec!["reading".into(), "taken_at".into()],
        ));
    }
    (stmt, catalog)
}

fn explain_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("explain/render");
    group.sample_size(30);
    let mut rng = ChaCha8Rng::seed_from_u64(0x0DDB_A11);

    for partitions in [8u32, 128] {
        let (stmt, catalog) = partitioned_scan(partitions, &mut rng);
        let env = ExplainEnv {
            catalog: Arc::new(catalog),
            registry: Arc::new(ExplainRegistry::new()),
            executor: Arc::new(ExecutorHooks::new()),
            engine: Arc::new(NullExecutor),
            track_io_timing: false,
        };
        let planner = move |_: &str, _: Option<&ParamListInfo>| -> Result<Vec<PlannedStmt>> {
            Ok(vec![stmt.clone()])
        };
        group.throughput(Throughput::Elements(u64::from(partitions)));
        for format in FORMATS {
            let command = format!("EXPLAIN (VERBOSE, FORMAT {format}) SELECT * FROM measurements");
            group.bench_with_input(
                BenchmarkId::new(format, partitions),
                &command,
                |b, command| {
                    b.iter(|| {
                        let out = explain_query(&env, &planner, command, None).expect("explain");
                        black_box(out);
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, explain_render);
criterion_main!(benches);
