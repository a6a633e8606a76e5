//! Node constructors.
//!
//! [`make_plan_node`] and [`make_expr_node`] build a zero-initialized node of a
//! given tag; the `make_*` helpers fill in the fields callers usually need.

use super::parsenodes::{Alias, DefElem, DefElemArg};
use super::plannodes::*;
use super::primnodes::*;
use super::{AttrNumber, Index, Node, NodeTag, Oid, ParseLoc};
use crate::catalog::{BOOLOID, INT4OID, INT8OID, TEXTOID};
use crate::error::{PlanError, Result};

/// Zero-initialized plan node of kind `tag`.
pub fn make_plan_node(tag: NodeTag) -> Result<Plan> {
    let kind = match tag {
        NodeTag::Result => PlanKind::Result(ResultPlan::default()),
        NodeTag::ProjectSet => PlanKind::ProjectSet,
        NodeTag::ModifyTable => PlanKind::ModifyTable(ModifyTable::default()),
        NodeTag::Append => PlanKind::Append(Append::default()),
        NodeTag::MergeAppend => PlanKind::MergeAppend(MergeAppend::default()),
        NodeTag::RecursiveUnion => PlanKind::RecursiveUnion(RecursiveUnion::default()),
        NodeTag::BitmapAnd => PlanKind::BitmapAnd(BitmapAnd::default()),
        NodeTag::BitmapOr => PlanKind::BitmapOr(BitmapOr::default()),
        NodeTag::SeqScan => PlanKind::SeqScan(SeqScan::default()),
        NodeTag::SampleScan => PlanKind::SampleScan(SampleScan::default()),
        NodeTag::IndexScan => PlanKind::IndexScan(IndexScan::default()),
        NodeTag::IndexOnlyScan => PlanKind::IndexOnlyScan(IndexOnlyScan::default()),
        NodeTag::BitmapIndexScan => PlanKind::BitmapIndexScan(BitmapIndexScan::default()),
        NodeTag::BitmapHeapScan => PlanKind::BitmapHeapScan(BitmapHeapScan::default()),
        NodeTag::TidScan => PlanKind::TidScan(TidScan::default()),
        NodeTag::TidRangeScan => PlanKind::TidRangeScan(TidRangeScan::default()),
        NodeTag::SubqueryScan => PlanKind::SubqueryScan(SubqueryScan::default()),
        NodeTag::FunctionScan => PlanKind::FunctionScan(FunctionScan::default()),
        NodeTag::ValuesScan => PlanKind::ValuesScan(ValuesScan::default()),
        NodeTag::TableFuncScan => PlanKind::TableFuncScan(TableFuncScan::default()),
        NodeTag::CteScan => PlanKind::CteScan(CteScan::default()),
        NodeTag::NamedTuplestoreScan => {
            PlanKind::NamedTuplestoreScan(NamedTuplestoreScan::default())
        }
        NodeTag::WorkTableScan => PlanKind::WorkTableScan(WorkTableScan::default()),
        NodeTag::ForeignScan => PlanKind::ForeignScan(ForeignScan::default()),
        NodeTag::CustomScan => PlanKind::CustomScan(CustomScan::default()),
        NodeTag::NestLoop => PlanKind::NestLoop(NestLoop::default()),
        NodeTag::MergeJoin => PlanKind::MergeJoin(MergeJoin::default()),
        NodeTag::HashJoin => PlanKind::HashJoin(HashJoin::default()),
        NodeTag::Material => PlanKind::Material,
        NodeTag::Memoize => PlanKind::Memoize(Memoize::default()),
        NodeTag::Sort => PlanKind::Sort(Sort::default()),
        NodeTag::IncrementalSort => PlanKind::IncrementalSort(IncrementalSort::default()),
        NodeTag::Group => PlanKind::Group(Group::default()),
        NodeTag::Agg => PlanKind::Agg(Agg::default()),
        NodeTag::WindowAgg => PlanKind::WindowAgg(WindowAgg::default()),
        NodeTag::Unique => PlanKind::Unique(Unique::default()),
        NodeTag::Gather => PlanKind::Gather(Gather::default()),
        NodeTag::GatherMerge => PlanKind::GatherMerge(GatherMerge::default()),
        NodeTag::Hash => PlanKind::Hash(Hash::default()),
        NodeTag::SetOp => PlanKind::SetOp(SetOp::default()),
        NodeTag::LockRows => PlanKind::LockRows(LockRows::default()),
        NodeTag::Limit => PlanKind::Limit(Limit::default()),
        other => {
            return Err(PlanError::internal(format!(
                "unrecognized plan node type: {other}"
            )))
        }
    };
    Ok(Plan::new(kind))
}

/// Zero-initialized expression node of kind `tag`.
pub fn make_expr_node(tag: NodeTag) -> Result<Expr> {
    Ok(match tag {
        NodeTag::Var => Expr::Var(Box::default()),
        NodeTag::Const => Expr::Const(Box::default()),
        NodeTag::Param => Expr::Param(Box::default()),
        NodeTag::Aggref => Expr::Aggref(Box::default()),
        NodeTag::WindowFunc => Expr::WindowFunc(Box::default()),
        NodeTag::FuncExpr => Expr::FuncExpr(Box::default()),
        NodeTag::OpExpr => Expr::OpExpr(Box::default()),
        NodeTag::ScalarArrayOpExpr => Expr::ScalarArrayOpExpr(Box::default()),
        NodeTag::BoolExpr => Expr::BoolExpr(Box::default()),
        NodeTag::SubLink => Expr::SubLink(Box::default()),
        NodeTag::SubPlan => Expr::SubPlan(Box::default()),
        NodeTag::FieldSelect => Expr::FieldSelect(Box::default()),
        NodeTag::FieldStore => Expr::FieldStore(Box::default()),
        NodeTag::RelabelType => Expr::RelabelType(Box::default()),
        NodeTag::CoerceViaIO => Expr::CoerceViaIO(Box::default()),
        NodeTag::ArrayCoerceExpr => Expr::ArrayCoerceExpr(Box::default()),
        NodeTag::ConvertRowtypeExpr => Expr::ConvertRowtypeExpr(Box::default()),
        NodeTag::CollateExpr => Expr::CollateExpr(Box::default()),
        NodeTag::CaseExpr => Expr::CaseExpr(Box::default()),
        NodeTag::CaseTestExpr => Expr::CaseTestExpr(Box::default()),
        NodeTag::ArrayExpr => Expr::ArrayExpr(Box::default()),
        NodeTag::RowExpr => Expr::RowExpr(Box::default()),
        NodeTag::CoalesceExpr => Expr::CoalesceExpr(Box::default()),
        NodeTag::MinMaxExpr => Expr::MinMaxExpr(Box::default()),
        NodeTag::NullTest => Expr::NullTest(Box::default()),
        NodeTag::BooleanTest => Expr::BooleanTest(Box::default()),
        NodeTag::CoerceToDomain => Expr::CoerceToDomain(Box::default()),
        NodeTag::CoerceToDomainValue => Expr::CoerceToDomainValue(Box::default()),
        other => {
            return Err(PlanError::internal(format!(
                "unrecognized expression node type: {other}"
            )))
        }
    })
}

/// Zero-initialized node of any concrete plan or expression kind.
pub fn make_node(tag: NodeTag) -> Result<Node> {
    if tag.is_plan() {
        make_plan_node(tag).map(Node::from)
    } else {
        make_expr_node(tag).map(Node::from)
    }
}

/// Column reference.
pub fn make_var(
    varno: i32,
    varattno: AttrNumber,
    vartype: Oid,
    vartypmod: i32,
    varcollid: Oid,
    varlevelsup: u32,
) -> Expr {
    Expr::Var(Box::new(Var {
        varno,
        varattno,
        vartype,
        vartypmod,
        varcollid,
        varlevelsup,
        varnosyn: super::Diagnostic(varno.max(0) as Index),
        varattnosyn: super::Diagnostic(varattno),
        ..Var::default()
    }))
}

/// Constant of an arbitrary type.
pub fn make_const(
    consttype: Oid,
    consttypmod: i32,
    constcollid: Oid,
    constlen: i16,
    constvalue: Option<Datum>,
    constbyval: bool,
) -> Expr {
    Expr::Const(Box::new(Const {
        consttype,
        consttypmod,
        constcollid,
        constlen,
        constvalue,
        constbyval,
        location: ParseLoc::UNKNOWN,
    }))
}

/// NULL constant of the given type.
pub fn make_null_const(consttype: Oid, consttypmod: i32, constcollid: Oid) -> Expr {
    make_const(consttype, consttypmod, constcollid, -1, None, false)
}

/// Boolean constant, or a boolean NULL.
pub fn make_bool_const(value: Option<bool>) -> Expr {
    make_const(BOOLOID, -1, 0, 1, value.map(Datum::Bool), true)
}

/// `integer` constant.
pub fn make_int4_const(value: i32) -> Expr {
    make_const(INT4OID, -1, 0, 4, Some(Datum::Int(i64::from(value))), true)
}

/// `bigint` constant.
pub fn make_int8_const(value: i64) -> Expr {
    make_const(INT8OID, -1, 0, 8, Some(Datum::Int(value)), true)
}

/// `text` constant in the default collation.
pub fn make_text_const(value: impl Into<String>) -> Expr {
    make_const(
        TEXTOID,
        -1,
        crate::catalog::DEFAULT_COLLATION_OID,
        -1,
        Some(Datum::Text(value.into())),
        false,
    )
}

/// Operator call.
pub fn make_op_expr(opno: Oid, opresulttype: Oid, args: Vec<Expr>) -> Expr {
    Expr::OpExpr(Box::new(OpExpr {
        opno,
        opresulttype,
        args,
        ..OpExpr::default()
    }))
}

/// Function call written in the given form.
pub fn make_func_expr(funcid: Oid, rettype: Oid, args: Vec<Expr>, fformat: CoercionForm) -> Expr {
    Expr::FuncExpr(Box::new(FuncExpr {
        funcid,
        funcresulttype: rettype,
        funcformat: fformat,
        args,
        ..FuncExpr::default()
    }))
}

/// `AND` / `OR` / `NOT` node.
pub fn make_bool_expr(boolop: BoolExprType, args: Vec<Expr>) -> Expr {
    Expr::BoolExpr(Box::new(BoolExpr {
        boolop,
        args,
        location: ParseLoc::UNKNOWN,
    }))
}

/// Turns an implicitly AND-ed list into one expression: `true` when empty,
/// the sole member when singular, otherwise an explicit `AND`.
pub fn make_ands_explicit(mut andclauses: Vec<Expr>) -> Expr {
    match andclauses.len() {
        0 => make_bool_const(Some(true)),
        1 => andclauses.remove(0),
        _ => make_bool_expr(BoolExprType::And, andclauses),
    }
}

/// Splits an explicit `AND` back into its members.
pub fn make_ands_implicit(clause: Option<Expr>) -> Vec<Expr> {
    match clause {
        None => Vec::new(),
        Some(Expr::BoolExpr(b)) if b.boolop == BoolExprType::And => b.args,
        Some(Expr::Const(c)) if c.constvalue == Some(Datum::Bool(true)) => Vec::new(),
        Some(other) => vec![other],
    }
}

/// `expr IS [NOT] NULL`.
pub fn make_null_test(arg: Expr, nulltesttype: NullTestType) -> Expr {
    Expr::NullTest(Box::new(NullTest {
        arg,
        nulltesttype,
        argisrow: false,
        location: ParseLoc::UNKNOWN,
    }))
}

/// Executor param reference.
pub fn make_param_exec(paramid: i32, paramtype: Oid) -> Expr {
    Expr::Param(Box::new(Param {
        paramkind: ParamKind::Exec,
        paramid,
        paramtype,
        paramtypmod: -1,
        ..Param::default()
    }))
}

/// Client-supplied param reference (`$n`).
pub fn make_param_extern(paramid: i32, paramtype: Oid) -> Expr {
    Expr::Param(Box::new(Param {
        paramkind: ParamKind::Extern,
        paramid,
        paramtype,
        paramtypmod: -1,
        ..Param::default()
    }))
}

/// Target list entry.
pub fn make_target_entry(
    expr: Expr,
    resno: AttrNumber,
    resname: Option<String>,
    resjunk: bool,
) -> TargetEntry {
    TargetEntry {
        expr,
        resno,
        resname,
        resjunk,
        ..TargetEntry::default()
    }
}

/// Target list entry that simply passes through `varno.resno` of the
/// child's output, as the planner builds for upper nodes.
pub fn make_passthrough_entry(varno: i32, resno: AttrNumber, vartype: Oid) -> TargetEntry {
    make_target_entry(make_var(varno, resno, vartype, -1, 0, 0), resno, None, false)
}

/// Alias with column names.
pub fn make_alias(aliasname: &str, colnames: &[&str]) -> Alias {
    Alias {
        aliasname: aliasname.to_string(),
        colnames: colnames.iter().map(|c| (*c).to_string()).collect(),
    }
}

/// Option element at a source location.
pub fn make_def_elem(name: &str, arg: Option<DefElemArg>, location: Option<usize>) -> DefElem {
    DefElem {
        defnamespace: None,
        defname: name.to_string(),
        arg,
        location: location.map_or(ParseLoc::UNKNOWN, |l| {
            ParseLoc(i32::try_from(l).unwrap_or(i32::MAX))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_concrete_plan_and_expr_tag_constructs() {
        for tag in NodeTag::ALL {
            if tag.is_plan() {
                let plan = make_plan_node(*tag).unwrap();
                assert_eq!(plan.tag(), *tag);
                assert_eq!(plan.plan_node_id, 0);
                assert!(plan.targetlist.is_empty());
            } else if tag.is_expr() && *tag != NodeTag::CaseWhen && *tag != NodeTag::TargetEntry {
                assert_eq!(make_expr_node(*tag).unwrap().tag(), *tag);
            }
        }
    }

    #[test]
    fn non_plan_tags_are_rejected() {
        assert!(make_plan_node(NodeTag::Var).unwrap_err().is_internal());
        assert!(make_plan_node(NodeTag::Scan).is_err());
        assert!(make_expr_node(NodeTag::SeqScan).is_err());
    }

    #[test]
    fn ands_explicit_and_implicit() {
        assert_eq!(make_ands_explicit(vec![]), make_bool_const(Some(true)));
        let one = make_int4_const(1);
        assert_eq!(make_ands_explicit(vec![one.clone()]), one);
        let both = make_ands_explicit(vec![one.clone(), make_int4_const(2)]);
        assert_eq!(both.tag(), NodeTag::BoolExpr);
        assert_eq!(make_ands_implicit(Some(both)).len(), 2);
        assert!(make_ands_implicit(Some(make_bool_const(Some(true)))).is_empty());
    }
}
