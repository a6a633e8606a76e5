//! Generic expression utilities: result type, typmod, collation and location
//! of any expression, plus the tree walkers and the mutator.
//!
//! Walkers call [`TreeWalker::expr`] on every node in pre-order and descend
//! only while it returns [`Walk::Continue`]. Sub-selects are separate query
//! levels; the walker crosses into them only when [`TreeWalker::query`] asks
//! for it.

use std::borrow::Cow;
use std::ops::{BitOr, ControlFlow};

use super::parsenodes::{JoinTreeNode, Query, RangeTable, RangeTblEntry, RteKind};
use super::plannodes::{Plan, PlannedStmt};
use super::primnodes::*;
use super::{Oid, ParseLoc, INVALID_OID};
use crate::catalog::{builtin_array_type, ANYARRAYOID, BOOLOID, RECORDOID, VOIDOID};

/// Result type of `expr`.
pub fn expr_type(expr: &Expr) -> Oid {
    match expr {
        Expr::Var(v) => v.vartype,
        Expr::Const(c) => c.consttype,
        Expr::Param(p) => p.paramtype,
        Expr::Aggref(a) => a.aggtype,
        Expr::WindowFunc(w) => w.wintype,
        Expr::FuncExpr(f) => f.funcresulttype,
        Expr::OpExpr(o) => o.opresulttype,
        Expr::ScalarArrayOpExpr(_) | Expr::BoolExpr(_) => BOOLOID,
        Expr::SubLink(s) => {
            let first_col = || {
                s.subselect
                    .target_list
                    .iter()
                    .find(|tle| !tle.resjunk)
                    .map_or(INVALID_OID, |tle| expr_type(&tle.expr))
            };
            sublink_result_type(s.sub_link_type, first_col)
        }
        Expr::SubPlan(s) => sublink_result_type(s.sub_link_type, || s.first_col_type),
        Expr::FieldSelect(f) => f.resulttype,
        Expr::FieldStore(f) => f.resulttype,
        Expr::RelabelType(r) => r.resulttype,
        Expr::CoerceViaIO(c) => c.resulttype,
        Expr::ArrayCoerceExpr(a) => a.resulttype,
        Expr::ConvertRowtypeExpr(c) => c.resulttype,
        Expr::CollateExpr(c) => expr_type(&c.arg),
        Expr::CaseExpr(c) => c.casetype,
        Expr::CaseTestExpr(c) => c.type_id,
        Expr::ArrayExpr(a) => a.array_typeid,
        Expr::RowExpr(r) => r.row_typeid,
        Expr::CoalesceExpr(c) => c.coalescetype,
        Expr::MinMaxExpr(m) => m.minmaxtype,
        Expr::NullTest(_) | Expr::BooleanTest(_) => BOOLOID,
        Expr::CoerceToDomain(c) => c.resulttype,
        Expr::CoerceToDomainValue(c) => c.type_id,
    }
}

fn sublink_result_type(kind: SubLinkType, first_col: impl FnOnce() -> Oid) -> Oid {
    match kind {
        SubLinkType::Exists | SubLinkType::All | SubLinkType::Any | SubLinkType::RowCompare => {
            BOOLOID
        }
        SubLinkType::Expr => first_col(),
        SubLinkType::Array => builtin_array_type(first_col()).unwrap_or(ANYARRAYOID),
        SubLinkType::MultiExpr => RECORDOID,
        SubLinkType::Cte => VOIDOID,
    }
}

/// Type modifier of `expr`'s result, `-1` when unknown.
pub fn expr_typmod(expr: &Expr) -> i32 {
    match expr {
        Expr::Var(v) => v.vartypmod,
        Expr::Const(c) => c.consttypmod,
        Expr::Param(p) => p.paramtypmod,
        Expr::SubLink(s) if s.sub_link_type == SubLinkType::Expr => s
            .subselect
            .target_list
            .iter()
            .find(|tle| !tle.resjunk)
            .map_or(-1, |tle| expr_typmod(&tle.expr)),
        Expr::SubPlan(s) if s.sub_link_type == SubLinkType::Expr => s.first_col_typmod,
        Expr::FieldSelect(f) => f.resulttypmod,
        Expr::RelabelType(r) => r.resulttypmod,
        Expr::ArrayCoerceExpr(a) => a.resulttypmod,
        Expr::CollateExpr(c) => expr_typmod(&c.arg),
        Expr::CaseExpr(c) => {
            let Some(def) = &c.defresult else {
                return -1;
            };
            if expr_type(def) != c.casetype {
                return -1;
            }
            let typmod = expr_typmod(def);
            if typmod < 0 {
                return -1;
            }
            let uniform = c
                .args
                .iter()
                .all(|w| expr_type(&w.result) == c.casetype && expr_typmod(&w.result) == typmod);
            if uniform {
                typmod
            } else {
                -1
            }
        }
        Expr::CaseTestExpr(c) => c.type_mod,
        Expr::ArrayExpr(a) if !a.multidims => common_typmod(&a.elements, a.element_typeid),
        Expr::CoalesceExpr(c) => common_typmod(&c.args, c.coalescetype),
        Expr::MinMaxExpr(m) => common_typmod(&m.args, m.minmaxtype),
        Expr::CoerceToDomain(c) => c.resulttypmod,
        Expr::CoerceToDomainValue(c) => c.type_mod,
        _ => -1,
    }
}

/// Shared typmod of `args` if all have type `typid` and the same typmod.
fn common_typmod(args: &[Expr], typid: Oid) -> i32 {
    let Some(first) = args.first() else {
        return -1;
    };
    if expr_type(first) != typid {
        return -1;
    }
    let typmod = expr_typmod(first);
    if typmod < 0 {
        return -1;
    }
    let uniform = args[1..]
        .iter()
        .all(|a| expr_type(a) == typid && expr_typmod(a) == typmod);
    if uniform {
        typmod
    } else {
        -1
    }
}

/// Collation of `expr`'s result, `0` for non-collatable results.
pub fn expr_collation(expr: &Expr) -> Oid {
    match expr {
        Expr::Var(v) => v.varcollid,
        Expr::Const(c) => c.constcollid,
        Expr::Param(p) => p.paramcollid,
        Expr::Aggref(a) => a.aggcollid,
        Expr::WindowFunc(w) => w.wincollid,
        Expr::FuncExpr(f) => f.funccollid,
        Expr::OpExpr(o) => o.opcollid,
        Expr::SubLink(s) if matches!(s.sub_link_type, SubLinkType::Expr | SubLinkType::Array) => s
            .subselect
            .target_list
            .iter()
            .find(|tle| !tle.resjunk)
            .map_or(INVALID_OID, |tle| expr_collation(&tle.expr)),
        Expr::SubPlan(s) if matches!(s.sub_link_type, SubLinkType::Expr | SubLinkType::Array) => {
            s.first_col_collation
        }
        Expr::FieldSelect(f) => f.resultcollid,
        Expr::RelabelType(r) => r.resultcollid,
        Expr::CoerceViaIO(c) => c.resultcollid,
        Expr::ArrayCoerceExpr(a) => a.resultcollid,
        Expr::CollateExpr(c) => c.coll_oid,
        Expr::CaseExpr(c) => c.casecollid,
        Expr::CaseTestExpr(c) => c.collation,
        Expr::ArrayExpr(a) => a.array_collid,
        Expr::CoalesceExpr(c) => c.coalescecollid,
        Expr::MinMaxExpr(m) => m.minmaxcollid,
        Expr::CoerceToDomain(c) => c.resultcollid,
        Expr::CoerceToDomainValue(c) => c.collation,
        _ => INVALID_OID,
    }
}

fn leftmost(a: ParseLoc, b: ParseLoc) -> ParseLoc {
    match (a.offset(), b.offset()) {
        (None, _) => b,
        (_, None) => a,
        (Some(x), Some(y)) if y < x => b,
        _ => a,
    }
}

fn leftmost_of(own: ParseLoc, args: &[Expr]) -> ParseLoc {
    args.first()
        .map_or(own, |first| leftmost(own, expr_location(first)))
}

/// Source location of `expr`, taking the leftmost of the node's own token
/// and its leading operand where the operand is written first.
pub fn expr_location(expr: &Expr) -> ParseLoc {
    match expr {
        Expr::Var(v) => v.location,
        Expr::Const(c) => c.location,
        Expr::Param(p) => p.location,
        Expr::Aggref(a) => a.location,
        Expr::WindowFunc(w) => w.location,
        Expr::FuncExpr(f) => leftmost_of(f.location, &f.args),
        Expr::OpExpr(o) => leftmost_of(o.location, &o.args),
        Expr::ScalarArrayOpExpr(s) => leftmost_of(s.location, &s.args),
        Expr::BoolExpr(b) => leftmost_of(b.location, &b.args),
        Expr::SubLink(s) => match &s.testexpr {
            Some(test) => leftmost(expr_location(test), s.location),
            None => s.location,
        },
        Expr::SubPlan(s) => s
            .testexpr
            .as_ref()
            .map_or(ParseLoc::UNKNOWN, expr_location),
        Expr::FieldSelect(f) => expr_location(&f.arg),
        Expr::FieldStore(f) => expr_location(&f.arg),
        Expr::RelabelType(r) => leftmost(r.location, expr_location(&r.arg)),
        Expr::CoerceViaIO(c) => leftmost(c.location, expr_location(&c.arg)),
        Expr::ArrayCoerceExpr(a) => leftmost(a.location, expr_location(&a.arg)),
        Expr::ConvertRowtypeExpr(c) => leftmost(c.location, expr_location(&c.arg)),
        Expr::CollateExpr(c) => leftmost(expr_location(&c.arg), c.location),
        Expr::CaseExpr(c) => c.location,
        Expr::CaseTestExpr(_) => ParseLoc::UNKNOWN,
        Expr::ArrayExpr(a) => a.location,
        Expr::RowExpr(r) => r.location,
        Expr::CoalesceExpr(c) => c.location,
        Expr::MinMaxExpr(m) => m.location,
        Expr::NullTest(n) => leftmost(n.location, expr_location(&n.arg)),
        Expr::BooleanTest(b) => leftmost(b.location, expr_location(&b.arg)),
        Expr::CoerceToDomain(c) => leftmost(c.location, expr_location(&c.arg)),
        Expr::CoerceToDomainValue(c) => c.location,
    }
}

/// What a walker callback wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk<B = ()> {
    /// Descend into the node's children.
    Continue,
    /// Do not descend, but keep walking the siblings.
    SkipChildren,
    /// Abort the walk.
    Break(B),
}

/// Flags controlling [`query_tree_walker`] and [`range_table_walker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QtwFlags(pub u32);

impl QtwFlags {
    /// No flags.
    pub const NONE: QtwFlags = QtwFlags(0);
    /// Do not descend into sub-queries of the range table.
    pub const IGNORE_RT_SUBQUERIES: QtwFlags = QtwFlags(0x01);
    /// Do not descend into CTE queries.
    pub const IGNORE_CTE_SUBQUERIES: QtwFlags = QtwFlags(0x02);
    /// Do not visit the range table at all.
    pub const IGNORE_RANGE_TABLE: QtwFlags = QtwFlags(0x04);
    /// Do not visit join alias variables.
    pub const IGNORE_JOINALIASES: QtwFlags = QtwFlags(0x08);
    /// Call [`TreeWalker::rte`] before visiting an entry's contents.
    pub const EXAMINE_RTES_BEFORE: QtwFlags = QtwFlags(0x10);
    /// Call [`TreeWalker::rte`] after visiting an entry's contents.
    pub const EXAMINE_RTES_AFTER: QtwFlags = QtwFlags(0x20);
    /// Do not visit grouping step expressions.
    pub const IGNORE_GROUPEXPRS: QtwFlags = QtwFlags(0x40);

    /// True when every bit of `other` is set.
    pub fn contains(self, other: QtwFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for QtwFlags {
    type Output = QtwFlags;

    fn bitor(self, rhs: QtwFlags) -> QtwFlags {
        QtwFlags(self.0 | rhs.0)
    }
}

/// Short names for the walker flags.
pub const QTW_IGNORE_RT_SUBQUERIES: QtwFlags = QtwFlags::IGNORE_RT_SUBQUERIES;
/// See [`QtwFlags::IGNORE_CTE_SUBQUERIES`].
pub const QTW_IGNORE_CTE_SUBQUERIES: QtwFlags = QtwFlags::IGNORE_CTE_SUBQUERIES;
/// See [`QtwFlags::IGNORE_RANGE_TABLE`].
pub const QTW_IGNORE_RANGE_TABLE: QtwFlags = QtwFlags::IGNORE_RANGE_TABLE;
/// See [`QtwFlags::IGNORE_JOINALIASES`].
pub const QTW_IGNORE_JOINALIASES: QtwFlags = QtwFlags::IGNORE_JOINALIASES;
/// See [`QtwFlags::EXAMINE_RTES_BEFORE`].
pub const QTW_EXAMINE_RTES_BEFORE: QtwFlags = QtwFlags::EXAMINE_RTES_BEFORE;
/// See [`QtwFlags::EXAMINE_RTES_AFTER`].
pub const QTW_EXAMINE_RTES_AFTER: QtwFlags = QtwFlags::EXAMINE_RTES_AFTER;

/// Callbacks driven by the tree walkers.
///
/// Any `FnMut(&Expr) -> Walk<B>` closure is a walker that stays within one
/// query level.
pub trait TreeWalker {
    /// Value carried out of an aborted walk.
    type Break;

    /// Called on every expression node before its children.
    fn expr(&mut self, expr: &Expr) -> Walk<Self::Break>;

    /// Called on a sub-select; `Continue` descends into it with
    /// [`TreeWalker::query_flags`].
    fn query(&mut self, _query: &Query) -> Walk<Self::Break> {
        Walk::SkipChildren
    }

    /// Called on range table entries when an `EXAMINE_RTES_*` flag is set.
    fn rte(&mut self, _rte: &RangeTblEntry) -> Walk<Self::Break> {
        Walk::Continue
    }

    /// Flags used when descending into sub-selects.
    fn query_flags(&self) -> QtwFlags {
        QtwFlags::NONE
    }
}

impl<B, F> TreeWalker for F
where
    F: FnMut(&Expr) -> Walk<B>,
{
    type Break = B;

    fn expr(&mut self, expr: &Expr) -> Walk<B> {
        self(expr)
    }
}

/// Walks `expr` and everything below it in pre-order.
pub fn expression_tree_walker<W>(expr: &Expr, walker: &mut W) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    match walker.expr(expr) {
        Walk::Break(b) => return ControlFlow::Break(b),
        Walk::SkipChildren => return ControlFlow::Continue(()),
        Walk::Continue => {}
    }
    expr.try_visit_children(&mut |child| expression_tree_walker(child, walker))?;
    if let Expr::SubLink(sublink) = expr {
        match walker.query(&sublink.subselect) {
            Walk::Break(b) => return ControlFlow::Break(b),
            Walk::Continue => {
                let flags = walker.query_flags();
                query_tree_walker(&sublink.subselect, walker, flags)?;
            }
            Walk::SkipChildren => {}
        }
    }
    ControlFlow::Continue(())
}

fn walk_list<W>(exprs: &[Expr], walker: &mut W) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    exprs
        .iter()
        .try_for_each(|e| expression_tree_walker(e, walker))
}

fn walk_opt<W>(expr: Option<&Expr>, walker: &mut W) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    match expr {
        Some(e) => expression_tree_walker(e, walker),
        None => ControlFlow::Continue(()),
    }
}

fn walk_jointree<W>(item: &JoinTreeNode, walker: &mut W) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    match item {
        JoinTreeNode::RangeTblRef(_) => ControlFlow::Continue(()),
        JoinTreeNode::JoinExpr(join) => {
            walk_jointree(&join.larg, walker)?;
            walk_jointree(&join.rarg, walker)?;
            walk_opt(join.quals.as_ref(), walker)
        }
        JoinTreeNode::FromExpr(from) => {
            for child in &from.fromlist {
                walk_jointree(child, walker)?;
            }
            walk_opt(from.quals.as_ref(), walker)
        }
    }
}

/// Walks the expressions of one query level, then (per `flags`) its CTEs and
/// range table.
pub fn query_tree_walker<W>(query: &Query, walker: &mut W, flags: QtwFlags) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    for tle in &query.target_list {
        expression_tree_walker(&tle.expr, walker)?;
    }
    for tle in &query.returning_list {
        expression_tree_walker(&tle.expr, walker)?;
    }
    for item in &query.jointree.fromlist {
        walk_jointree(item, walker)?;
    }
    walk_opt(query.jointree.quals.as_ref(), walker)?;
    walk_opt(query.having_qual.as_ref(), walker)?;
    walk_opt(query.limit_offset.as_ref(), walker)?;
    walk_opt(query.limit_count.as_ref(), walker)?;
    if !flags.contains(QtwFlags::IGNORE_CTE_SUBQUERIES) {
        for cte in &query.cte_list {
            match walker.query(&cte.ctequery) {
                Walk::Break(b) => return ControlFlow::Break(b),
                Walk::Continue => query_tree_walker(&cte.ctequery, walker, flags)?,
                Walk::SkipChildren => {}
            }
        }
    }
    if !flags.contains(QtwFlags::IGNORE_RANGE_TABLE) {
        range_table_walker(&query.rtable, walker, flags)?;
    }
    ControlFlow::Continue(())
}

/// Walks the expressions stored in range table entries.
pub fn range_table_walker<W>(
    rtable: &RangeTable,
    walker: &mut W,
    flags: QtwFlags,
) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    for (_, rte) in rtable.iter() {
        range_table_entry_walker(rte, walker, flags)?;
    }
    ControlFlow::Continue(())
}

/// Walks one range table entry.
pub fn range_table_entry_walker<W>(
    rte: &RangeTblEntry,
    walker: &mut W,
    flags: QtwFlags,
) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    if flags.contains(QtwFlags::EXAMINE_RTES_BEFORE) {
        match walker.rte(rte) {
            Walk::Break(b) => return ControlFlow::Break(b),
            Walk::SkipChildren => return ControlFlow::Continue(()),
            Walk::Continue => {}
        }
    }
    match &rte.kind {
        RteKind::Relation { tablesample, .. } => {
            if let Some(ts) = tablesample {
                walk_list(&ts.args, walker)?;
                walk_opt(ts.repeatable.as_ref(), walker)?;
            }
        }
        RteKind::Subquery { subquery } => {
            if !flags.contains(QtwFlags::IGNORE_RT_SUBQUERIES) {
                if let Some(q) = subquery {
                    match walker.query(q) {
                        Walk::Break(b) => return ControlFlow::Break(b),
                        Walk::Continue => query_tree_walker(q, walker, flags)?,
                        Walk::SkipChildren => {}
                    }
                }
            }
        }
        RteKind::Join { joinaliasvars, .. } => {
            if !flags.contains(QtwFlags::IGNORE_JOINALIASES) {
                walk_list(joinaliasvars, walker)?;
            }
        }
        RteKind::Function { functions, .. } => {
            for f in functions {
                expression_tree_walker(&f.funcexpr, walker)?;
            }
        }
        RteKind::TableFunc { tablefunc } => {
            walk_opt(tablefunc.docexpr.as_ref(), walker)?;
            walk_opt(tablefunc.rowexpr.as_ref(), walker)?;
            for col in tablefunc.colexprs.iter().flatten() {
                expression_tree_walker(col, walker)?;
            }
        }
        RteKind::Values { values_lists } => {
            for row in values_lists {
                walk_list(row, walker)?;
            }
        }
        RteKind::Group { groupexprs } => {
            if !flags.contains(QtwFlags::IGNORE_GROUPEXPRS) {
                walk_list(groupexprs, walker)?;
            }
        }
        RteKind::Cte { .. } | RteKind::NamedTuplestore { .. } | RteKind::Result => {}
    }
    if flags.contains(QtwFlags::EXAMINE_RTES_AFTER) {
        if let Walk::Break(b) = walker.rte(rte) {
            return ControlFlow::Break(b);
        }
    }
    ControlFlow::Continue(())
}

/// Walks every expression owned by `plan` and its descendants, node by node
/// in pre-order. Init plan arguments are included; sub-plan bodies, which the
/// statement owns, are not.
pub fn plan_tree_walker<W>(plan: &Plan, walker: &mut W) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    for root in plan.expr_roots() {
        expression_tree_walker(root, walker)?;
    }
    for init in &plan.init_plan {
        walk_opt(init.testexpr.as_ref(), walker)?;
        walk_list(&init.args, walker)?;
    }
    for child in plan.child_plans() {
        plan_tree_walker(child, walker)?;
    }
    ControlFlow::Continue(())
}

/// Walks the main plan tree and then every sub-plan of `stmt`.
pub fn planned_stmt_walker<W>(stmt: &PlannedStmt, walker: &mut W) -> ControlFlow<W::Break>
where
    W: TreeWalker + ?Sized,
{
    plan_tree_walker(&stmt.plan_tree, walker)?;
    for sub in &stmt.subplans {
        plan_tree_walker(sub, walker)?;
    }
    ControlFlow::Continue(())
}

/// Calls `f` on `plan` and every descendant plan node in pre-order.
pub fn walk_plans<'a, B>(
    plan: &'a Plan,
    f: &mut dyn FnMut(&'a Plan) -> ControlFlow<B>,
) -> ControlFlow<B> {
    f(plan)?;
    for child in plan.child_plans() {
        walk_plans(child, f)?;
    }
    ControlFlow::Continue(())
}

/// Sub-plan references found in the expressions of `plan` itself, in the
/// order the executor would initialize them.
pub fn plan_subplans(plan: &Plan) -> Vec<&SubPlan> {
    fn collect<'a>(expr: &'a Expr, out: &mut Vec<&'a SubPlan>) {
        expr.visit_children(&mut |child| collect(child, out));
        if let Expr::SubPlan(subplan) = expr {
            out.push(subplan);
        }
    }
    let mut out = Vec::new();
    for root in plan.expr_roots() {
        collect(root, &mut out);
    }
    out
}

/// Rebuilds `expr` bottom-up through `f`.
///
/// `f` sees each node before its children; returning `Some` replaces that
/// node (and its subtree) outright. Unchanged subtrees are returned
/// borrowed, so a mutator that changes nothing allocates nothing.
pub fn expression_tree_mutator<'a, F>(expr: &'a Expr, f: &mut F) -> Cow<'a, Expr>
where
    F: FnMut(&Expr) -> Option<Expr>,
{
    if let Some(replacement) = f(expr) {
        return Cow::Owned(replacement);
    }
    let mut replaced: Vec<Option<Expr>> = Vec::new();
    let mut changed = false;
    expr.visit_children(&mut |child| match expression_tree_mutator(child, f) {
        Cow::Borrowed(_) => replaced.push(None),
        Cow::Owned(new) => {
            changed = true;
            replaced.push(Some(new));
        }
    });
    if !changed {
        return Cow::Borrowed(expr);
    }
    let mut copy = expr.clone();
    let mut replaced = replaced.into_iter();
    copy.visit_mut_children(&mut |slot| {
        if let Some(Some(new)) = replaced.next() {
            *slot = new;
        }
    });
    Cow::Owned(copy)
}

/// Applies [`expression_tree_mutator`] to every expression root of `plan`
/// (not its children), replacing roots in place; returns how many changed.
pub fn plan_expr_mutator<F>(plan: &mut Plan, f: &mut F) -> usize
where
    F: FnMut(&Expr) -> Option<Expr>,
{
    let mut changed = 0;
    for root in plan.expr_roots_mut() {
        if let Cow::Owned(new) = expression_tree_mutator(root, f) {
            *root = new;
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{INT4OID, TEXTOID};
    use crate::nodes::makefuncs::*;
    use crate::nodes::parsenodes::{CommonTableExpr, FromExpr};
    use crate::nodes::plannodes::PlanKind;

    fn var(attno: i16) -> Expr {
        make_var(1, attno, INT4OID, -1, 0, 0)
    }

    #[test]
    fn types_and_collations() {
        assert_eq!(expr_type(&var(1)), INT4OID);
        assert_eq!(expr_type(&make_bool_expr(BoolExprType::Not, vec![var(1)])), BOOLOID);
        assert_eq!(expr_type(&make_text_const("x")), TEXTOID);
        assert_eq!(
            expr_collation(&make_text_const("x")),
            crate::catalog::DEFAULT_COLLATION_OID
        );
        let sub = Expr::SubPlan(Box::new(SubPlan {
            sub_link_type: SubLinkType::Array,
            first_col_type: INT4OID,
            ..SubPlan::default()
        }));
        assert_eq!(expr_type(&sub), 1007);
        let exists = Expr::SubPlan(Box::new(SubPlan {
            sub_link_type: SubLinkType::Exists,
            ..SubPlan::default()
        }));
        assert_eq!(expr_type(&exists), BOOLOID);
    }

    #[test]
    fn typmod_of_coalesce_requires_agreement() {
        let mut a = make_var(1, 1, 1043, 14, 0, 0);
        let b = make_var(1, 2, 1043, 14, 0, 0);
        let coalesce = |args| {
            Expr::CoalesceExpr(Box::new(CoalesceExpr {
                coalescetype: 1043,
                args,
                ..CoalesceExpr::default()
            }))
        };
        assert_eq!(expr_typmod(&coalesce(vec![a.clone(), b.clone()])), 14);
        if let Expr::Var(v) = &mut a {
            v.vartypmod = 20;
        }
        assert_eq!(expr_typmod(&coalesce(vec![a, b])), -1);
    }

    #[test]
    fn location_prefers_leftmost_operand() {
        let mut left = var(1);
        if let Expr::Var(v) = &mut left {
            v.location = ParseLoc(7);
        }
        let mut op = make_op_expr(96, BOOLOID, vec![left, var(2)]);
        if let Expr::OpExpr(o) = &mut op {
            o.location = ParseLoc(9);
        }
        assert_eq!(expr_location(&op).0, 7);
        assert_eq!(expr_location(&var(3)).0, -1);
    }

    #[test]
    fn walker_counts_match_manual_traversal() {
        let expr = make_bool_expr(
            BoolExprType::Or,
            vec![
                make_op_expr(96, BOOLOID, vec![var(1), make_int4_const(1)]),
                make_null_test(var(2), NullTestType::IsNull),
                var(3),
            ],
        );
        let mut seen = 0;
        let flow = expression_tree_walker(&expr, &mut |e: &Expr| {
            if matches!(e, Expr::Var(_)) {
                seen += 1;
            }
            Walk::<()>::Continue
        });
        assert!(flow.is_continue());
        assert_eq!(seen, 3);
    }

    #[test]
    fn skip_children_and_break() {
        let expr = make_bool_expr(
            BoolExprType::And,
            vec![make_null_test(var(1), NullTestType::IsNull), var(2)],
        );
        let mut vars = 0;
        let _ = expression_tree_walker(&expr, &mut |e: &Expr| match e {
            Expr::NullTest(_) => Walk::<()>::SkipChildren,
            Expr::Var(_) => {
                vars += 1;
                Walk::Continue
            }
            _ => Walk::Continue,
        });
        assert_eq!(vars, 1);

        let found = expression_tree_walker(&expr, &mut |e: &Expr| match e {
            Expr::Var(v) => Walk::Break(v.varattno),
            _ => Walk::Continue,
        });
        assert_eq!(found, ControlFlow::Break(1));
    }

    struct CrossingWalker {
        vars: usize,
    }

    impl TreeWalker for CrossingWalker {
        type Break = ();

        fn expr(&mut self, expr: &Expr) -> Walk<()> {
            if matches!(expr, Expr::Var(_)) {
                self.vars += 1;
            }
            Walk::Continue
        }

        fn query(&mut self, _query: &Query) -> Walk<()> {
            Walk::Continue
        }
    }

    fn sublink_with_inner_var() -> Expr {
        let inner = Query {
            target_list: vec![make_target_entry(var(5), 1, None, false)],
            ..Query::default()
        };
        Expr::SubLink(Box::new(SubLink {
            sub_link_type: SubLinkType::Exists,
            subselect: Box::new(inner),
            ..SubLink::default()
        }))
    }

    #[test]
    fn query_boundary_is_crossed_only_on_request() {
        let sublink = sublink_with_inner_var();
        let mut plain = 0;
        let _ = expression_tree_walker(&sublink, &mut |e: &Expr| {
            plain += usize::from(matches!(e, Expr::Var(_)));
            Walk::<()>::Continue
        });
        assert_eq!(plain, 0);

        let mut crossing = CrossingWalker { vars: 0 };
        let _ = expression_tree_walker(&sublink, &mut crossing);
        assert_eq!(crossing.vars, 1);
    }

    #[test]
    fn query_walker_honours_flags() {
        let cte_query = Query {
            target_list: vec![make_target_entry(var(1), 1, None, false)],
            ..Query::default()
        };
        let query = Query {
            cte_list: vec![CommonTableExpr {
                ctename: "c".into(),
                ctequery: Box::new(cte_query),
                ..CommonTableExpr::default()
            }],
            jointree: FromExpr {
                fromlist: Vec::new(),
                quals: Some(var(2)),
            },
            ..Query::default()
        };
        let mut all = CrossingWalker { vars: 0 };
        let _ = query_tree_walker(&query, &mut all, QtwFlags::NONE);
        assert_eq!(all.vars, 2);
        let mut top = CrossingWalker { vars: 0 };
        let _ = query_tree_walker(&query, &mut top, QTW_IGNORE_CTE_SUBQUERIES);
        assert_eq!(top.vars, 1);
    }

    #[test]
    fn range_table_walker_examines_entries() {
        struct RteCounter {
            before: usize,
            after: usize,
            seen_after: bool,
        }
        impl TreeWalker for RteCounter {
            type Break = ();
            fn expr(&mut self, _expr: &Expr) -> Walk<()> {
                Walk::Continue
            }
            fn rte(&mut self, _rte: &RangeTblEntry) -> Walk<()> {
                if self.seen_after {
                    self.after += 1;
                } else {
                    self.before += 1;
                }
                Walk::Continue
            }
        }
        let rtable: RangeTable = [
            RangeTblEntry::relation(1, "a", vec![]),
            RangeTblEntry::relation(2, "b", vec![]),
        ]
        .into_iter()
        .collect();
        let mut walker = RteCounter {
            before: 0,
            after: 0,
            seen_after: false,
        };
        let _ = range_table_walker(&rtable, &mut walker, QTW_EXAMINE_RTES_BEFORE);
        assert_eq!(walker.before, 2);
        walker.seen_after = true;
        let _ = range_table_walker(&rtable, &mut walker, QTW_EXAMINE_RTES_AFTER);
        assert_eq!(walker.after, 2);
        let _ = range_table_walker(&rtable, &mut walker, QtwFlags::NONE);
        assert_eq!(walker.after, 2);
    }

    #[test]
    fn mutator_shares_unchanged_trees() {
        let expr = make_bool_expr(BoolExprType::And, vec![var(1), make_int4_const(2)]);
        let untouched = expression_tree_mutator(&expr, &mut |_| None);
        assert!(matches!(untouched, Cow::Borrowed(_)));

        let bumped = expression_tree_mutator(&expr, &mut |e| match e {
            Expr::Var(v) => Some(make_var(v.varno, v.varattno + 1, v.vartype, -1, 0, 0)),
            _ => None,
        });
        let Cow::Owned(new) = bumped else {
            panic!("expected a rebuilt tree");
        };
        assert_eq!(new.children()[0].as_var().map(|v| v.varattno), Some(2));
        assert_eq!(expr.children()[0].as_var().map(|v| v.varattno), Some(1));
    }

    #[test]
    fn plan_walkers_reach_every_node() {
        let mut scan = make_plan_node(crate::nodes::NodeTag::SeqScan).unwrap();
        scan.qual.push(var(1));
        let mut sort = Plan::new(PlanKind::Material);
        sort.targetlist.push(make_target_entry(var(2), 1, None, false));
        sort.qual.push(Expr::SubPlan(Box::new(SubPlan {
            plan_id: 1,
            args: vec![var(3)],
            ..SubPlan::default()
        })));
        sort.lefttree = Some(Box::new(scan));

        let mut vars = 0;
        let _ = plan_tree_walker(&sort, &mut |e: &Expr| {
            vars += usize::from(matches!(e, Expr::Var(_)));
            Walk::<()>::Continue
        });
        assert_eq!(vars, 3);

        let mut nodes = 0;
        let _ = walk_plans::<()>(&sort, &mut |_| {
            nodes += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(nodes, 2);
        assert_eq!(plan_subplans(&sort).len(), 1);

        let changed = plan_expr_mutator(&mut sort, &mut |e| match e {
            Expr::Var(_) => Some(make_int4_const(0)),
            _ => None,
        });
        assert_eq!(changed, 2);
    }
}
