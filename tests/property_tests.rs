#![allow(missing_docs)]

use std::sync::Arc;

use proptest::prelude::*;

use plantree::auto_explain::{parse_duration_ms, AutoExplainConfig};
use plantree::catalog::InMemoryCatalog;
use plantree::executor::{ExecutorHooks, NullExecutor};
use plantree::explain::{escape_json, explain_query, ExplainEnv, ExplainRegistry};
use plantree::nodes::copyfuncs::copy_node;
use plantree::nodes::equalfuncs::equal;
use plantree::nodes::makefuncs::{make_node, make_var};
use plantree::nodes::nodefuncs::{expression_tree_walker, Walk};
use plantree::nodes::plannodes::{Append, CmdType, Plan, PlanKind, PlannedStmt, ResultPlan, Scan, SeqScan};
use plantree::nodes::primnodes::{
    Aggref, ArrayCoerceExpr, ArrayExpr, BoolExpr, BoolExprType, BooleanTest, CaseExpr,
    CaseTestExpr, CaseWhen, CoalesceExpr, CoerceToDomain, CoerceToDomainValue, CoerceViaIO,
    CollateExpr, Const, ConvertRowtypeExpr, Datum, Expr, FieldSelect, FieldStore, FuncExpr,
    MinMaxExpr, NullTest, OpExpr, Param, RelabelType, RowExpr, ScalarArrayOpExpr, SubLink,
    SubPlan, TargetEntry, WindowFunc,
};
use plantree::nodes::serialize::{node_to_string, string_to_node};
use plantree::nodes::{Bitmapset, Node, NodeTag, ParseLoc, RangeTblEntry};
use plantree::params::ParamListInfo;
use plantree::ruleutils::quote_identifier;
use plantree::Result;

fn arb_costs() -> impl Strategy<Value = (f64, f64, f64, i32)> {
    (0u32..10_000, 0u32..1_000_000, 1u32..100_000, 1i32..512).prop_map(|(s, t, r, w)| {
        let startup = f64::from(s) / 100.0;
        (startup, startup + f64::from(t) / 100.0, f64::from(r), w)
    })
}

fn with_costs(mut plan: Plan, (startup, total, rows, width): (f64, f64, f64, i32)) -> Plan {
    plan.startup_cost = startup;
    plan.total_cost = total;
    plan.plan_rows = rows;
    plan.plan_width = width;
    plan
}

fn arb_leaf() -> impl Strategy<Value = Plan> {
    prop_oneof![
        arb_costs().prop_map(|c| with_costs(Plan::new(PlanKind::Result(ResultPlan::default())), c)),
        arb_costs().prop_map(|c| {
            with_costs(
                Plan::new(PlanKind::SeqScan(SeqScan {
                    scan: Scan { scanrelid: 1 },
                })),
                c,
            )
        }),
    ]
}

fn arb_plan() -> impl Strategy<Value = Plan> {
    arb_leaf().prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            (prop::collection::vec(inner.clone(), 1..4), arb_costs()).prop_map(|(members, c)| {
                with_costs(
                    Plan::new(PlanKind::Append(Append {
                        appendplans: members,
                        part_prune_index: -1,
                        ..Append::default()
                    })),
                    c,
                )
            }),
            (inner, arb_costs()).prop_map(|(child, c)| {
                let mut plan = with_costs(Plan::new(PlanKind::Result(ResultPlan::default())), c);
                plan.lefttree = Some(Box::new(child));
                plan
            }),
        ]
    })
}

fn count_nodes(plan: &Plan) -> usize {
    let members = match &plan.kind {
        PlanKind::Append(ap) => ap.appendplans.iter().map(count_nodes).sum(),
        _ => 0,
    };
    1 + members
        + plan.lefttree.as_deref().map_or(0, count_nodes)
        + plan.righttree.as_deref().map_or(0, count_nodes)
}

fn explain(plan: Plan, format: &str) -> Result<Vec<String>> {
    let env = ExplainEnv {
        catalog: Arc::new(InMemoryCatalog::new().with_relation(16384, "vegetables")),
        registry: Arc::new(ExplainRegistry::new()),
        executor: Arc::new(ExecutorHooks::new()),
        engine: Arc::new(NullExecutor),
        track_io_timing: false,
    };
    let mut stmt = PlannedStmt::new(CmdType::Select, plan);
    stmt.rtable.push(RangeTblEntry::relation(16384, "vegetables", vec!["id".into()]));
    let planner = move |_: &str, _: Option<&ParamListInfo>| -> Result<Vec<PlannedStmt>> {
        Ok(vec![stmt.clone()])
    };
    explain_query(&env, &planner, &format!("EXPLAIN (FORMAT {format}) SELECT 1"), None)
}

fn xml_is_balanced(doc: &str) -> bool {
    let mut stack: Vec<&str> = Vec::new();
    let mut rest = doc;
    while let Some(open) = rest.find('<') {
        let Some(len) = rest[open..].find('>') else {
            return false;
        };
        let tag = &rest[open + 1..open + len];
        rest = &rest[open + len + 1..];
        if let Some(name) = tag.strip_prefix('/') {
            if stack.pop() != Some(name) {
                return false;
            }
        } else if !tag.ends_with('/') {
            stack.push(tag.split_whitespace().next().unwrap_or(tag));
        }
    }
    stack.is_empty()
}

fn arb_datum() -> impl Strategy<Value = Option<Datum>> {
    prop::option::of(prop_oneof![
        any::<bool>().prop_map(Datum::Bool),
        any::<i64>().prop_map(Datum::Int),
        prop_oneof![
            (-4_000_000i32..4_000_000).prop_map(|n| f64::from(n) / 4.0),
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ]
        .prop_map(Datum::Float),
        "[a-z ']{0,8}".prop_map(Datum::Text),
        prop::collection::vec(any::<u8>(), 0..6).prop_map(Datum::Bytes),
    ])
}

fn arb_leaf_expr() -> impl Strategy<Value = Expr> {
    prop_oneof![
        (1i32..4, 1i16..8).prop_map(|(rel, col)| make_var(rel, col, 23, -1, 0, 0)),
        (arb_datum(), -1i32..40).prop_map(|(constvalue, loc)| {
            Expr::Const(Box::new(Const {
                consttype: 701,
                consttypmod: -1,
                constlen: 8,
                constvalue,
                location: ParseLoc(loc),
                ..Const::default()
            }))
        }),
        (1i32..5).prop_map(|paramid| {
            Expr::Param(Box::new(Param {
                paramid,
                paramtype: 23,
                ..Param::default()
            }))
        }),
        Just(Expr::CaseTestExpr(Box::new(CaseTestExpr {
            type_id: 23,
            type_mod: -1,
            collation: 0,
        }))),
        Just(Expr::CoerceToDomainValue(Box::new(CoerceToDomainValue::default()))),
    ]
}

/// Expressions of every kind, nested a few levels deep.
fn arb_expr() -> impl Strategy<Value = Expr> {
    arb_leaf_expr().prop_recursive(4, 48, 4, |inner| {
        let args = prop::collection::vec(inner.clone(), 0..4);
        let opt = prop::option::of(inner.clone());
        let calls = prop_oneof![
            (args.clone(), args.clone(), opt.clone()).prop_map(|(direct, args, aggfilter)| {
                let args = args
                    .into_iter()
                    .zip(1i16..)
                    .map(|(expr, resno)| TargetEntry {
                        expr,
                        resno,
                        ..TargetEntry::default()
                    })
                    .collect();
                Expr::Aggref(Box::new(Aggref {
                    aggfnoid: 2147,
                    aggdirectargs: direct,
                    args,
                    aggfilter,
                    ..Aggref::default()
                }))
            }),
            (args.clone(), opt.clone()).prop_map(|(args, aggfilter)| {
                Expr::WindowFunc(Box::new(WindowFunc {
                    winfnoid: 3100,
                    args,
                    aggfilter,
                    ..WindowFunc::default()
                }))
            }),
            args.clone().prop_map(|args| {
                Expr::FuncExpr(Box::new(FuncExpr {
                    funcid: 1299,
                    args,
                    ..FuncExpr::default()
                }))
            }),
            args.clone().prop_map(|args| {
                Expr::OpExpr(Box::new(OpExpr {
                    opno: 96,
                    args,
                    ..OpExpr::default()
                }))
            }),
            args.clone().prop_map(|args| {
                Expr::ScalarArrayOpExpr(Box::new(ScalarArrayOpExpr {
                    opno: 96,
                    use_or: true,
                    args,
                    ..ScalarArrayOpExpr::default()
                }))
            }),
            args.clone().prop_map(|args| {
                Expr::BoolExpr(Box::new(BoolExpr {
                    boolop: BoolExprType::Or,
                    args,
                    ..BoolExpr::default()
                }))
            }),
            opt.clone().prop_map(|testexpr| {
                Expr::SubLink(Box::new(SubLink {
                    testexpr,
                    ..SubLink::default()
                }))
            }),
            (opt.clone(), args.clone()).prop_map(|(testexpr, args)| {
                Expr::SubPlan(Box::new(SubPlan {
                    testexpr,
                    args,
                    plan_id: 1,
                    plan_name: "SubPlan 1".into(),
                    ..SubPlan::default()
                }))
            }),
        ];
        let wrappers = prop_oneof![
            inner.clone().prop_map(|arg| {
                Expr::FieldSelect(Box::new(FieldSelect {
                    arg,
                    fieldnum: 1,
                    ..FieldSelect::default()
                }))
            }),
            (inner.clone(), args.clone()).prop_map(|(arg, newvals)| {
                Expr::FieldStore(Box::new(FieldStore {
                    arg,
                    newvals,
                    ..FieldStore::default()
                }))
            }),
            inner.clone().prop_map(|arg| {
                Expr::RelabelType(Box::new(RelabelType {
                    arg,
                    resulttype: 25,
                    ..RelabelType::default()
                }))
            }),
            inner.clone().prop_map(|arg| {
                Expr::CoerceViaIO(Box::new(CoerceViaIO {
                    arg,
                    resulttype: 25,
                    ..CoerceViaIO::default()
                }))
            }),
            (inner.clone(), inner.clone()).prop_map(|(arg, elemexpr)| {
                Expr::ArrayCoerceExpr(Box::new(ArrayCoerceExpr {
                    arg,
                    elemexpr,
                    ..ArrayCoerceExpr::default()
                }))
            }),
            inner.clone().prop_map(|arg| {
                Expr::ConvertRowtypeExpr(Box::new(ConvertRowtypeExpr {
                    arg,
                    ..ConvertRowtypeExpr::default()
                }))
            }),
            inner.clone().prop_map(|arg| {
                Expr::CollateExpr(Box::new(CollateExpr {
                    arg,
                    coll_oid: 950,
                    ..CollateExpr::default()
                }))
            }),
            inner.clone().prop_map(|arg| {
                Expr::NullTest(Box::new(NullTest {
                    arg,
                    ..NullTest::default()
                }))
            }),
            inner.clone().prop_map(|arg| {
                Expr::BooleanTest(Box::new(BooleanTest {
                    arg,
                    ..BooleanTest::default()
                }))
            }),
            inner.clone().prop_map(|arg| {
                Expr::CoerceToDomain(Box::new(CoerceToDomain {
                    arg,
                    ..CoerceToDomain::default()
                }))
            }),
        ];
        let lists = prop_oneof![
            (
                opt.clone(),
                prop::collection::vec((inner.clone(), inner.clone()), 1..3),
                opt,
            )
                .prop_map(|(arg, whens, defresult)| {
                    let args = whens
                        .into_iter()
                        .map(|(expr, result)| CaseWhen {
                            expr,
                            result,
                            location: ParseLoc::UNKNOWN,
                        })
                        .collect();
                    Expr::CaseExpr(Box::new(CaseExpr {
                        arg,
                        args,
                        defresult,
                        ..CaseExpr::default()
                    }))
                }),
            args.clone().prop_map(|elements| {
                Expr::ArrayExpr(Box::new(ArrayExpr {
                    elements,
                    ..ArrayExpr::default()
                }))
            }),
            args.clone().prop_map(|args| {
                Expr::RowExpr(Box::new(RowExpr {
                    args,
                    ..RowExpr::default()
                }))
            }),
            args.clone().prop_map(|args| {
                Expr::CoalesceExpr(Box::new(CoalesceExpr {
                    args,
                    ..CoalesceExpr::default()
                }))
            }),
            args.prop_map(|args| {
                Expr::MinMaxExpr(Box::new(MinMaxExpr {
                    args,
                    ..MinMaxExpr::default()
                }))
            }),
        ];
        prop_oneof![calls, wrappers, lists]
    })
}

/// Counts column references by spelling out every kind's children.
fn count_vars_by_hand(expr: &Expr) -> usize {
    let all = |list: &[Expr]| list.iter().map(count_vars_by_hand).sum::<usize>();
    let opt = |e: &Option<Expr>| e.as_ref().map_or(0, count_vars_by_hand);
    match expr {
        Expr::Var(_) => 1,
        Expr::Const(_)
        | Expr::Param(_)
        | Expr::CaseTestExpr(_)
        | Expr::CoerceToDomainValue(_) => 0,
        Expr::Aggref(a) => {
            all(&a.aggdirectargs)
                + a.args.iter().map(|t| count_vars_by_hand(&t.expr)).sum::<usize>()
                + opt(&a.aggfilter)
        }
        Expr::WindowFunc(w) => all(&w.args) + opt(&w.aggfilter),
        Expr::FuncExpr(f) => all(&f.args),
        Expr::OpExpr(o) => all(&o.args),
        Expr::ScalarArrayOpExpr(s) => all(&s.args),
        Expr::BoolExpr(b) => all(&b.args),
        Expr::SubLink(s) => opt(&s.testexpr),
        Expr::SubPlan(s) => opt(&s.testexpr) + all(&s.args),
        Expr::FieldSelect(f) => count_vars_by_hand(&f.arg),
        Expr::FieldStore(f) => count_vars_by_hand(&f.arg) + all(&f.newvals),
        Expr::RelabelType(r) => count_vars_by_hand(&r.arg),
        Expr::CoerceViaIO(c) => count_vars_by_hand(&c.arg),
        Expr::ArrayCoerceExpr(a) => count_vars_by_hand(&a.arg) + count_vars_by_hand(&a.elemexpr),
        Expr::ConvertRowtypeExpr(c) => count_vars_by_hand(&c.arg),
        Expr::CollateExpr(c) => count_vars_by_hand(&c.arg),
        Expr::CaseExpr(c) => {
            opt(&c.arg)
                + c.args
                    .iter()
                    .map(|w| count_vars_by_hand(&w.expr) + count_vars_by_hand(&w.result))
                    .sum::<usize>()
                + opt(&c.defresult)
        }
        Expr::ArrayExpr(a) => all(&a.elements),
        Expr::RowExpr(r) => all(&r.args),
        Expr::CoalesceExpr(c) => all(&c.args),
        Expr::MinMaxExpr(m) => all(&m.args),
        Expr::NullTest(n) => count_vars_by_hand(&n.arg),
        Expr::BooleanTest(b) => count_vars_by_hand(&b.arg),
        Expr::CoerceToDomain(c) => count_vars_by_hand(&c.arg),
    }
}

proptest! {
    #[test]
    fn prop_text_has_one_line_per_node(plan in arb_plan()) {
        let nodes = count_nodes(&plan);
        let lines = explain(plan, "text").unwrap();
        prop_assert!(!lines[0].starts_with(' '));
        let children = lines.iter().filter(|l| l.trim_start().starts_with("->  ")).count();
        prop_assert_eq!(children, nodes - 1);
    }

    #[test]
    fn prop_json_parses_and_nests(plan in arb_plan()) {
        let root_is_append = matches!(plan.kind, PlanKind::Append(_));
        let out = explain(plan, "json").unwrap();
        let doc: serde_json::Value = serde_json::from_str(&out[0]).unwrap();
        let node_type = doc["Plan"]["Node Type"].as_str().unwrap().to_string();
        prop_assert_eq!(node_type == "Append", root_is_append);
    }

    #[test]
    fn prop_yaml_parses(plan in arb_plan()) {
        let out = explain(plan, "yaml").unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&out[0]).unwrap();
        prop_assert!(doc[0]["Plan"]["Node Type"].is_string());
    }

    #[test]
    fn prop_xml_tags_balance(plan in arb_plan()) {
        let out = explain(plan, "xml").unwrap();
        prop_assert!(xml_is_balanced(&out[0]));
    }

    #[test]
    fn prop_escaped_json_reads_back(s in any::<String>()) {
        let decoded: String = serde_json::from_str(&escape_json(&s)).unwrap();
        prop_assert_eq!(decoded, s);
    }

    #[test]
    fn prop_quoted_identifiers_unquote(ident in "[A-Za-z0-9_ ]{1,12}") {
        let quoted = quote_identifier(&ident);
        if quoted != ident {
            let inner = quoted.strip_prefix('"').and_then(|q| q.strip_suffix('"')).unwrap();
            prop_assert_eq!(inner, ident.as_str());
        }
    }

    #[test]
    fn prop_bitmapset_iterates_sorted_members(members in prop::collection::vec(0u32..300, 0..40)) {
        let mut set = Bitmapset::new();
        for &m in &members {
            set.add_member(m);
        }
        let mut expected = members.clone();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(set.iter().collect::<Vec<_>>(), expected.clone());
        prop_assert_eq!(set.num_members(), expected.len());
        for m in expected {
            prop_assert!(set.is_member(m));
        }
    }

    #[test]
    fn prop_durations_show_what_was_set(ms in 0i32..100_000_000) {
        let mut config = AutoExplainConfig::default();
        config.set("auto_explain.log_min_duration", &ms.to_string(), true).unwrap();
        let shown = config.show("auto_explain.log_min_duration").unwrap();
        prop_assert_eq!(parse_duration_ms(&shown), Some(ms));
    }

    #[test]
    fn prop_copies_equal_their_source(expr in arb_expr()) {
        let node = Node::from(expr);
        prop_assert!(equal(&node, &node));
        prop_assert!(equal(&copy_node(&node), &node));
    }

    #[test]
    fn prop_equality_is_symmetric(a in arb_expr(), b in arb_expr()) {
        let (a, b) = (Node::from(a), Node::from(b));
        prop_assert_eq!(equal(&a, &b), equal(&b, &a));
    }

    #[test]
    fn prop_text_form_reads_back(expr in arb_expr()) {
        let node = Node::from(expr);
        let text = node_to_string(&node).unwrap();
        let back = string_to_node(&text).unwrap();
        prop_assert!(equal(&back, &node), "{}", text);
        prop_assert_eq!(node_to_string(&back).unwrap(), text);
    }

    #[test]
    fn prop_walker_reaches_every_var(expr in arb_expr()) {
        let mut seen = 0usize;
        let flow = expression_tree_walker(&expr, &mut |e: &Expr| {
            if matches!(e, Expr::Var(_)) {
                seen += 1;
            }
            Walk::<()>::Continue
        });
        prop_assert!(flow.is_continue());
        prop_assert_eq!(seen, count_vars_by_hand(&expr));
    }

    #[test]
    fn prop_made_nodes_carry_their_tag(tag in prop::sample::select(NodeTag::ALL)) {
        match make_node(tag) {
            Ok(node) => prop_assert_eq!(node.tag(), tag),
            Err(_) => prop_assert!(
                !tag.is_plan() && !(tag.is_expr() && tag != NodeTag::CaseWhen && tag != NodeTag::TargetEntry),
                "{:?} should be constructible",
                tag
            ),
        }
    }
}
