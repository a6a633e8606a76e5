//! Turning plan expressions back into SQL-like text for EXPLAIN.
//!
//! Expressions inside a finished plan refer to their inputs indirectly: a
//! [`Var`] may point at the outer or inner child's target list
//! ([`OUTER_VAR`], [`INNER_VAR`]), an index target list ([`INDEX_VAR`]) or a
//! range table entry, and executor [`Param`]s are fed by nest loops, init
//! plans or sub-plans further up the tree. [`DeparseContext`] tracks which
//! plan node is being printed and its ancestors so each reference can be
//! chased to something printable.

use rustc_hash::FxHashMap;

use crate::catalog::{
    format_type, get_collation_name, get_func_name, get_operator, get_rel_name, CatalogLookup,
    BOOLOID, INT4OID, NUMERICOID, UNKNOWNOID,
};
use crate::error::{PlanError, Result};
use crate::nodes::parsenodes::{RangeTable, RangeTblEntry, RteKind};
use crate::nodes::plannodes::{Plan, PlanKind, PlannedStmt};
use crate::nodes::primnodes::*;
use crate::nodes::{Bitmapset, Index, Oid};

/// A node above the one being printed: a plan, or a sub-plan expression
/// whose plan is being printed.
#[derive(Debug, Clone, Copy)]
pub enum Ancestor<'a> {
    /// A plan node.
    Plan(&'a Plan),
    /// A sub-plan reference.
    SubPlan(&'a SubPlan),
}

#[derive(Debug, Clone, Copy)]
enum Referent<'a> {
    Var(&'a Var),
    Expr(&'a Expr),
}

#[derive(Debug, Clone, Default)]
struct Namespace<'a> {
    plan: Option<&'a Plan>,
    ancestors: Vec<Ancestor<'a>>,
    outer_plan: Option<&'a Plan>,
    inner_plan: Option<&'a Plan>,
    outer_tlist: Option<&'a [TargetEntry]>,
    inner_tlist: Option<&'a [TargetEntry]>,
    index_tlist: Option<&'a [TargetEntry]>,
}

/// Everything needed to print the expressions of one planned statement.
pub struct DeparseContext<'a> {
    catalog: &'a dyn CatalogLookup,
    stmt: &'a PlannedStmt,
    rtable_names: Vec<Option<String>>,
    ns: Namespace<'a>,
}

impl<'a> DeparseContext<'a> {
    /// Context for the whole plan tree of `stmt`; `rtable_names` comes from
    /// [`select_rtable_names_for_explain`].
    pub fn for_plan_tree(
        stmt: &'a PlannedStmt,
        catalog: &'a dyn CatalogLookup,
        rtable_names: Vec<Option<String>>,
    ) -> Self {
        DeparseContext {
            catalog,
            stmt,
            rtable_names,
            ns: Namespace::default(),
        }
    }

    /// Focuses the context on `plan`, whose ancestors are listed innermost
    /// first.
    pub fn set_plan(&mut self, plan: &'a Plan, ancestors: &[Ancestor<'a>]) {
        self.ns = self.namespace_for(plan, ancestors.to_vec());
    }

    /// Unique reference name assigned to a range table entry.
    pub fn refname(&self, rti: Index) -> Option<&str> {
        let idx = usize::try_from(rti).ok()?.checked_sub(1)?;
        self.rtable_names.get(idx)?.as_deref()
    }

    /// Range table of the statement.
    pub fn rtable(&self) -> &'a RangeTable {
        &self.stmt.rtable
    }

    fn namespace_for(&self, plan: &'a Plan, ancestors: Vec<Ancestor<'a>>) -> Namespace<'a> {
        let outer_plan = match &plan.kind {
            PlanKind::Append(a) => a.appendplans.first(),
            PlanKind::MergeAppend(m) => m.mergeplans.first(),
            _ => plan.outer_plan(),
        };
        let inner_plan = match &plan.kind {
            PlanKind::SubqueryScan(s) => Some(&*s.subplan),
            PlanKind::CteScan(c) => self.stmt.subplan(c.cte_plan_id),
            PlanKind::WorkTableScan(w) => ancestors.iter().find_map(|a| match a {
                Ancestor::Plan(p) => match &p.kind {
                    PlanKind::RecursiveUnion(r) if r.wt_param == w.wt_param => Some(*p),
                    _ => None,
                },
                Ancestor::SubPlan(_) => None,
            }),
            PlanKind::ModifyTable(_) => Some(plan),
            _ => plan.inner_plan(),
        };
        let inner_tlist = match &plan.kind {
            PlanKind::ModifyTable(m) => Some(m.excl_rel_tlist.as_slice()),
            _ => inner_plan.map(|p| p.targetlist.as_slice()),
        };
        let index_tlist = match &plan.kind {
            PlanKind::IndexOnlyScan(s) => Some(s.indextlist.as_slice()),
            PlanKind::ForeignScan(f) => Some(f.fdw_scan_tlist.as_slice()),
            PlanKind::CustomScan(c) => Some(c.custom_scan_tlist.as_slice()),
            _ => None,
        };
        Namespace {
            plan: Some(plan),
            ancestors,
            outer_plan,
            inner_plan,
            outer_tlist: outer_plan.map(|p| p.targetlist.as_slice()),
            inner_tlist,
            index_tlist,
        }
    }
}

/// Prints `expr` in the current plan context. `prefix` qualifies column
/// names with their relation; `show_implicit` also shows implicit casts.
pub fn deparse_expression<'a>(
    expr: &'a Expr,
    ctx: &DeparseContext<'a>,
    prefix: bool,
    show_implicit: bool,
) -> Result<String> {
    let mut printer = Printer::new(ctx, prefix);
    printer.expr(expr, show_implicit)?;
    Ok(printer.buf)
}

/// Prints an implicitly AND-ed qualifier list.
pub fn deparse_qual_list<'a>(
    quals: &'a [Expr],
    ctx: &DeparseContext<'a>,
    prefix: bool,
) -> Result<String> {
    let mut printer = Printer::new(ctx, prefix);
    printer.and_list(quals)?;
    Ok(printer.buf)
}

struct Printer<'c, 'a> {
    ctx: &'c DeparseContext<'a>,
    ns: Namespace<'a>,
    prefix: bool,
    buf: String,
}

const SYSTEM_COLUMNS: [&str; 6] = ["ctid", "xmin", "cmin", "xmax", "cmax", "tableoid"];

impl<'c, 'a> Printer<'c, 'a> {
    fn new(ctx: &'c DeparseContext<'a>, prefix: bool) -> Self {
        Printer {
            ctx,
            ns: ctx.ns.clone(),
            prefix,
            buf: String::new(),
        }
    }

    fn catalog(&self) -> &'a dyn CatalogLookup {
        self.ctx.catalog
    }

    fn and_list(&mut self, quals: &'a [Expr]) -> Result<()> {
        match quals {
            [] => Ok(()),
            [only] => self.expr(only, false),
            _ => {
                self.buf.push('(');
                for (i, qual) in quals.iter().enumerate() {
                    if i > 0 {
                        self.buf.push_str(" AND ");
                    }
                    self.expr(qual, false)?;
                }
                self.buf.push(')');
                Ok(())
            }
        }
    }

    fn list(&mut self, exprs: &'a [Expr], show_implicit: bool) -> Result<()> {
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            self.expr(e, show_implicit)?;
        }
        Ok(())
    }

    /// Runs `f` with attention moved to `plan`, whose ancestors are
    /// `ancestors`, then restores the current namespace.
    fn with_plan(
        &mut self,
        plan: &'a Plan,
        ancestors: Vec<Ancestor<'a>>,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let saved = std::mem::replace(&mut self.ns, self.ctx.namespace_for(plan, ancestors));
        let out = f(self);
        self.ns = saved;
        out
    }

    fn child_ancestors(&self) -> Vec<Ancestor<'a>> {
        let mut ancestors = Vec::with_capacity(self.ns.ancestors.len() + 1);
        ancestors.extend(self.ns.plan.map(Ancestor::Plan));
        ancestors.extend(self.ns.ancestors.iter().copied());
        ancestors
    }

    fn expr(&mut self, expr: &'a Expr, show_implicit: bool) -> Result<()> {
        match expr {
            Expr::Var(var) => self.var(var),
            Expr::Const(c) => self.constant(c, 0),
            Expr::Param(p) => self.param(p),
            Expr::Aggref(agg) => self.aggref(agg, true),
            Expr::WindowFunc(wf) => {
                let name = get_func_name(self.catalog(), wf.winfnoid)?;
                self.buf.push_str(&quote_identifier(&name));
                self.buf.push('(');
                if wf.winstar {
                    self.buf.push('*');
                } else {
                    self.list(&wf.args, true)?;
                }
                self.buf.push(')');
                if let Some(filter) = &wf.aggfilter {
                    self.buf.push_str(" FILTER (WHERE ");
                    self.expr(filter, false)?;
                    self.buf.push(')');
                }
                self.buf.push_str(" OVER (?)");
                Ok(())
            }
            Expr::FuncExpr(f) => self.func_expr(f, show_implicit),
            Expr::OpExpr(op) => self.op_expr(op.opno, &op.args),
            Expr::ScalarArrayOpExpr(op) => {
                let [left, right] = op.args.as_slice() else {
                    return Err(PlanError::internal("ScalarArrayOpExpr needs two arguments"));
                };
                let name = get_operator(self.catalog(), op.opno)?.name;
                self.buf.push('(');
                self.expr(left, true)?;
                self.buf.push(' ');
                self.buf.push_str(&name);
                self.buf
                    .push_str(if op.use_or { " ANY (" } else { " ALL (" });
                self.expr(right, true)?;
                self.buf.push_str("))");
                Ok(())
            }
            Expr::BoolExpr(b) => match b.boolop {
                BoolExprType::Not => {
                    let [arg] = b.args.as_slice() else {
                        return Err(PlanError::internal("NOT needs exactly one argument"));
                    };
                    self.buf.push_str("(NOT ");
                    self.expr(arg, false)?;
                    self.buf.push(')');
                    Ok(())
                }
                BoolExprType::And | BoolExprType::Or => {
                    let sep = if b.boolop == BoolExprType::And {
                        " AND "
                    } else {
                        " OR "
                    };
                    self.buf.push('(');
                    for (i, arg) in b.args.iter().enumerate() {
                        if i > 0 {
                            self.buf.push_str(sep);
                        }
                        self.expr(arg, false)?;
                    }
                    self.buf.push(')');
                    Ok(())
                }
            },
            Expr::SubLink(s) => {
                let head = match s.sub_link_type {
                    SubLinkType::Exists => "EXISTS ",
                    SubLinkType::Array => "ARRAY",
                    _ => "",
                };
                self.buf.push_str(head);
                self.buf.push_str("(SELECT ...)");
                Ok(())
            }
            Expr::SubPlan(sp) => self.subplan(sp),
            Expr::FieldSelect(fs) => {
                self.buf.push('(');
                self.expr(&fs.arg, true)?;
                self.buf.push_str(&format!(").f{}", fs.fieldnum));
                Ok(())
            }
            Expr::FieldStore(fs) => {
                self.buf.push_str("ROW(");
                self.list(&fs.newvals, true)?;
                self.buf.push(')');
                Ok(())
            }
            Expr::RelabelType(r) => self.coercion(
                &r.arg,
                r.relabelformat,
                r.resulttype,
                r.resulttypmod,
                show_implicit,
            ),
            Expr::CoerceViaIO(c) => {
                self.coercion(&c.arg, c.coerceformat, c.resulttype, -1, show_implicit)
            }
            Expr::ArrayCoerceExpr(a) => self.coercion(
                &a.arg,
                a.coerceformat,
                a.resulttype,
                a.resulttypmod,
                show_implicit,
            ),
            Expr::ConvertRowtypeExpr(c) => {
                self.coercion(&c.arg, c.convertformat, c.resulttype, -1, show_implicit)
            }
            Expr::CollateExpr(c) => {
                let name = get_collation_name(self.catalog(), c.coll_oid)?;
                self.buf.push('(');
                self.expr(&c.arg, show_implicit)?;
                self.buf.push_str(" COLLATE ");
                self.buf.push_str(&quote_identifier(&name));
                self.buf.push(')');
                Ok(())
            }
            Expr::CaseExpr(case) => self.case_expr(case, show_implicit),
            Expr::CaseTestExpr(_) => {
                self.buf.push_str("CASE_TEST_EXPR");
                Ok(())
            }
            Expr::ArrayExpr(a) => {
                self.buf.push_str("ARRAY[");
                self.list(&a.elements, true)?;
                self.buf.push(']');
                Ok(())
            }
            Expr::RowExpr(r) => {
                self.buf.push_str("ROW(");
                self.list(&r.args, true)?;
                self.buf.push(')');
                Ok(())
            }
            Expr::CoalesceExpr(c) => {
                self.buf.push_str("COALESCE(");
                self.list(&c.args, true)?;
                self.buf.push(')');
                Ok(())
            }
            Expr::MinMaxExpr(m) => {
                self.buf.push_str(match m.op {
                    MinMaxOp::Greatest => "GREATEST(",
                    MinMaxOp::Least => "LEAST(",
                });
                self.list(&m.args, true)?;
                self.buf.push(')');
                Ok(())
            }
            Expr::NullTest(n) => {
                self.buf.push('(');
                self.expr(&n.arg, true)?;
                self.buf.push_str(match n.nulltesttype {
                    NullTestType::IsNull => " IS NULL)",
                    NullTestType::IsNotNull => " IS NOT NULL)",
                });
                Ok(())
            }
            Expr::BooleanTest(b) => {
                self.buf.push('(');
                self.expr(&b.arg, false)?;
                self.buf.push_str(match b.booltesttype {
                    BoolTestType::IsTrue => " IS TRUE)",
                    BoolTestType::IsNotTrue => " IS NOT TRUE)",
                    BoolTestType::IsFalse => " IS FALSE)",
                    BoolTestType::IsNotFalse => " IS NOT FALSE)",
                    BoolTestType::IsUnknown => " IS UNKNOWN)",
                    BoolTestType::IsNotUnknown => " IS NOT UNKNOWN)",
                });
                Ok(())
            }
            Expr::CoerceToDomain(c) => self.coercion(
                &c.arg,
                c.coercionformat,
                c.resulttype,
                c.resulttypmod,
                show_implicit,
            ),
            Expr::CoerceToDomainValue(_) => {
                self.buf.push_str("VALUE");
                Ok(())
            }
        }
    }

    fn var(&mut self, var: &'a Var) -> Result<()> {
        if var.varlevelsup > 0 {
            return Err(PlanError::internal(format!(
                "bogus varlevelsup: {}",
                var.varlevelsup
            )));
        }
        let (tlist, child) = match var.varno {
            OUTER_VAR => (self.ns.outer_tlist, self.ns.outer_plan),
            INNER_VAR => (self.ns.inner_tlist, self.ns.inner_plan),
            INDEX_VAR => (self.ns.index_tlist, None),
            ROWID_VAR => return Err(PlanError::internal("cannot deparse ROWID_VAR")),
            _ => return self.rte_var(var),
        };
        let tlist = tlist.ok_or_else(|| {
            PlanError::internal(format!("no target list for special varno {}", var.varno))
        })?;
        let tle = tlist
            .iter()
            .find(|tle| tle.resno == var.varattno)
            .ok_or_else(|| {
                PlanError::internal(format!(
                    "bogus varattno for special varno {}: {}",
                    var.varno, var.varattno
                ))
            })?;
        let need_paren = !matches!(tle.expr, Expr::Var(_) | Expr::Aggref(_) | Expr::Param(_));
        let print = |p: &mut Self| -> Result<()> {
            if need_paren {
                p.buf.push('(');
            }
            p.expr(&tle.expr, true)?;
            if need_paren {
                p.buf.push(')');
            }
            Ok(())
        };
        match child {
            Some(plan) => {
                let ancestors = self.child_ancestors();
                self.with_plan(plan, ancestors, print)
            }
            None => print(self),
        }
    }

    fn rte_var(&mut self, var: &Var) -> Result<()> {
        let rti = Index::try_from(var.varno)
            .map_err(|_| PlanError::internal(format!("bogus varno: {}", var.varno)))?;
        let rte = self.ctx.stmt.rtable.rt_fetch(rti)?;
        let refname = self
            .ctx
            .refname(rti)
            .map(str::to_string)
            .unwrap_or_else(|| rte.eref.aliasname.clone());
        let attname = match var.varattno {
            0 => None,
            n if n > 0 => {
                let idx = usize::try_from(n - 1).unwrap_or(usize::MAX);
                Some(rte.eref.colnames.get(idx).cloned().ok_or_else(|| {
                    PlanError::internal(format!(
                        "invalid attnum {n} for relation \"{}\"",
                        rte.eref.aliasname
                    ))
                })?)
            }
            n => {
                let idx = usize::try_from(-i32::from(n) - 1).unwrap_or(usize::MAX);
                Some(
                    SYSTEM_COLUMNS
                        .get(idx)
                        .map(|s| s.to_string())
                        .ok_or_else(|| PlanError::internal(format!("invalid attnum {n}")))?,
                )
            }
        };
        if self.prefix || attname.is_none() {
            self.buf.push_str(&quote_identifier(&refname));
            self.buf.push('.');
        }
        match attname {
            Some(name) => self.buf.push_str(&quote_identifier(&name)),
            None => self.buf.push('*'),
        }
        Ok(())
    }

    fn param(&mut self, param: &'a Param) -> Result<()> {
        if param.paramkind == ParamKind::Exec {
            if let Some((referent, plan, ancestors)) = self.find_param_referent(param.paramid) {
                let need_paren = match referent {
                    Referent::Var(_) => false,
                    Referent::Expr(e) => {
                        !matches!(e, Expr::Var(_) | Expr::Aggref(_) | Expr::Param(_))
                    }
                };
                let saved_prefix = std::mem::replace(&mut self.prefix, true);
                let out = self.with_plan(plan, ancestors, |p| {
                    if need_paren {
                        p.buf.push('(');
                    }
                    match referent {
                        Referent::Var(var) => p.var(var)?,
                        Referent::Expr(e) => p.expr(e, false)?,
                    }
                    if need_paren {
                        p.buf.push(')');
                    }
                    Ok(())
                });
                self.prefix = saved_prefix;
                return out;
            }
            if let Some((subplan, column)) = self.find_param_generator(param.paramid) {
                self.buf.push_str(&format!(
                    "({}{}).col{}",
                    if subplan.use_hash_table { "hashed " } else { "" },
                    subplan.plan_name,
                    column + 1
                ));
                return Ok(());
            }
        }
        self.buf.push_str(&format!("${}", param.paramid));
        Ok(())
    }

    /// What supplies an executor param: a nest loop parameter of an
    /// ancestor whose inner side we are in, or an argument of a sub-plan we
    /// are inside. Returns it with the plan it must be printed in and that
    /// plan's ancestors.
    fn find_param_referent(
        &self,
        paramid: i32,
    ) -> Option<(Referent<'a>, &'a Plan, Vec<Ancestor<'a>>)> {
        let ancestors = &self.ns.ancestors;
        let mut child = self.ns.plan;
        for (i, &ancestor) in ancestors.iter().enumerate() {
            match ancestor {
                Ancestor::Plan(plan) => {
                    if let PlanKind::NestLoop(nl) = &plan.kind {
                        let from_inner = matches!(
                            (child, plan.inner_plan()),
                            (Some(c), Some(inner)) if std::ptr::eq(c, inner)
                        );
                        if from_inner {
                            if let Some(nlp) = nl.nest_params.iter().find(|p| p.paramno == paramid)
                            {
                                return Some((
                                    Referent::Var(&nlp.paramval),
                                    plan,
                                    ancestors[i + 1..].to_vec(),
                                ));
                            }
                        }
                    }
                    child = Some(plan);
                }
                Ancestor::SubPlan(sp) => {
                    let pos = sp.par_param.iter().position(|&p| p == paramid);
                    if let Some(arg) = pos.and_then(|pos| sp.args.get(pos)) {
                        // args are evaluated by the nearest enclosing plan
                        let (j, plan) = ancestors[i + 1..].iter().enumerate().find_map(
                            |(j, &a)| match a {
                                Ancestor::Plan(p) => Some((j, p)),
                                Ancestor::SubPlan(_) => None,
                            },
                        )?;
                        let rest = ancestors[i + j + 2..].to_vec();
                        return Some((Referent::Expr(arg), plan, rest));
                    }
                }
            }
        }
        None
    }

    /// Sub-plan or init plan producing an executor param, with the param's
    /// zero-based column within that plan's output.
    fn find_param_generator(&self, paramid: i32) -> Option<(&'a SubPlan, usize)> {
        let own = self.ns.plan.map(Ancestor::Plan);
        for ancestor in own.into_iter().chain(self.ns.ancestors.iter().copied()) {
            match ancestor {
                Ancestor::SubPlan(sp) => {
                    if let Some(col) = sp.param_ids.iter().position(|&p| p == paramid) {
                        return Some((sp, col));
                    }
                }
                Ancestor::Plan(plan) => {
                    for init in &plan.init_plan {
                        if let Some(col) = init.set_param.iter().position(|&p| p == paramid) {
                            return Some((init, col));
                        }
                    }
                }
            }
        }
        None
    }

    fn subplan(&mut self, sp: &'a SubPlan) -> Result<()> {
        self.buf.push_str(match sp.sub_link_type {
            SubLinkType::Exists => "EXISTS(",
            SubLinkType::All => "(ALL ",
            SubLinkType::Any => "(ANY ",
            SubLinkType::RowCompare | SubLinkType::Expr => "(",
            SubLinkType::MultiExpr => "(rescan ",
            SubLinkType::Array => "ARRAY(",
            SubLinkType::Cte => "CTE(",
        });
        match &sp.testexpr {
            Some(test) => {
                self.ns.ancestors.insert(0, Ancestor::SubPlan(sp));
                let out = self.expr(test, false);
                self.ns.ancestors.remove(0);
                out?;
                self.buf.push(')');
            }
            None => {
                if sp.use_hash_table {
                    self.buf.push_str("hashed ");
                }
                self.buf.push_str(&sp.plan_name);
                self.buf.push(')');
            }
        }
        Ok(())
    }

    fn aggref(&mut self, agg: &'a Aggref, allow_partial: bool) -> Result<()> {
        if agg.aggsplit.combine() {
            // the argument is the partial aggregate computed below us
            if let [TargetEntry {
                expr: Expr::Var(var),
                ..
            }] = agg.args.as_slice()
            {
                if var.varno == OUTER_VAR {
                    if let (Some(tlist), Some(plan)) = (self.ns.outer_tlist, self.ns.outer_plan) {
                        if let Some(Expr::Aggref(original)) = tlist
                            .iter()
                            .find(|tle| tle.resno == var.varattno)
                            .map(|tle| &tle.expr)
                        {
                            let ancestors = self.child_ancestors();
                            return self.with_plan(plan, ancestors, |p| p.aggref(original, false));
                        }
                    }
                }
            }
        }
        if allow_partial && agg.aggsplit.skip_final() {
            self.buf.push_str("PARTIAL ");
        }
        let name = get_func_name(self.catalog(), agg.aggfnoid)?;
        self.buf.push_str(&quote_identifier(&name));
        self.buf.push('(');
        if agg.aggkind != AggKind::Normal {
            self.list(&agg.aggdirectargs, true)?;
            self.buf.push_str(") WITHIN GROUP (ORDER BY ");
            self.agg_args(agg)?;
            self.buf.push(')');
        } else if agg.aggstar {
            self.buf.push_str("*)");
        } else {
            if !agg.aggdistinct.is_empty() {
                self.buf.push_str("DISTINCT ");
            }
            self.agg_args(agg)?;
            if !agg.aggorder.is_empty() {
                self.buf.push_str(" ORDER BY ");
                self.agg_order(agg)?;
            }
            self.buf.push(')');
        }
        if let Some(filter) = &agg.aggfilter {
            self.buf.push_str(" FILTER (WHERE ");
            self.expr(filter, false)?;
            self.buf.push(')');
        }
        Ok(())
    }

    fn agg_args(&mut self, agg: &'a Aggref) -> Result<()> {
        let mut first = true;
        for tle in agg.args.iter().filter(|tle| !tle.resjunk) {
            if !first {
                self.buf.push_str(", ");
            }
            first = false;
            self.expr(&tle.expr, true)?;
        }
        Ok(())
    }

    fn agg_order(&mut self, agg: &'a Aggref) -> Result<()> {
        for (i, clause) in agg.aggorder.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            let tle = agg
                .args
                .iter()
                .find(|tle| tle.ressortgroupref == clause.tle_sort_group_ref)
                .ok_or_else(|| PlanError::internal("ORDER BY item not found in aggregate arguments"))?;
            self.expr(&tle.expr, true)?;
            let opname = get_operator(self.catalog(), clause.sortop)?.name;
            let desc = opname == ">";
            match opname.as_str() {
                "<" => {}
                ">" => self.buf.push_str(" DESC"),
                other => {
                    self.buf.push_str(" USING ");
                    self.buf.push_str(other);
                }
            }
            if clause.nulls_first && !desc {
                self.buf.push_str(" NULLS FIRST");
            } else if !clause.nulls_first && desc {
                self.buf.push_str(" NULLS LAST");
            }
        }
        Ok(())
    }

    fn func_expr(&mut self, f: &'a FuncExpr, show_implicit: bool) -> Result<()> {
        match f.funcformat {
            CoercionForm::ImplicitCast | CoercionForm::ExplicitCast => {
                let arg = f
                    .args
                    .first()
                    .ok_or_else(|| PlanError::internal("cast function without argument"))?;
                self.coercion(arg, f.funcformat, f.funcresulttype, -1, show_implicit)
            }
            CoercionForm::ExplicitCall | CoercionForm::SqlSyntax => {
                let name = get_func_name(self.catalog(), f.funcid)?;
                self.buf.push_str(&quote_identifier(&name));
                self.buf.push('(');
                if f.funcvariadic && !f.args.is_empty() {
                    let (last, rest) = f.args.split_at(f.args.len() - 1);
                    self.list(rest, true)?;
                    if !rest.is_empty() {
                        self.buf.push_str(", ");
                    }
                    self.buf.push_str("VARIADIC ");
                    self.list(last, true)?;
                } else {
                    self.list(&f.args, true)?;
                }
                self.buf.push(')');
                Ok(())
            }
        }
    }

    fn op_expr(&mut self, opno: Oid, args: &'a [Expr]) -> Result<()> {
        let op = get_operator(self.catalog(), opno)?;
        self.buf.push('(');
        match args {
            [left, right] => {
                self.expr(left, true)?;
                self.buf.push(' ');
                self.buf.push_str(&op.name);
                self.buf.push(' ');
                self.expr(right, true)?;
            }
            [arg] => {
                self.buf.push_str(&op.name);
                self.buf.push(' ');
                self.expr(arg, true)?;
            }
            _ => return Err(PlanError::internal("operator needs one or two arguments")),
        }
        self.buf.push(')');
        Ok(())
    }

    fn coercion(
        &mut self,
        arg: &'a Expr,
        format: CoercionForm,
        resulttype: Oid,
        resulttypmod: i32,
        show_implicit: bool,
    ) -> Result<()> {
        if format == CoercionForm::ImplicitCast && !show_implicit {
            return self.expr(arg, false);
        }
        match arg {
            Expr::Const(c) if !c.is_null() => self.constant(c, -1)?,
            _ => {
                self.buf.push('(');
                self.expr(arg, false)?;
                self.buf.push(')');
            }
        }
        self.buf.push_str("::");
        self.buf
            .push_str(&format_type(self.catalog(), resulttype, resulttypmod)?);
        Ok(())
    }

    fn case_expr(&mut self, case: &'a CaseExpr, show_implicit: bool) -> Result<()> {
        self.buf.push_str("CASE");
        if let Some(arg) = &case.arg {
            self.buf.push(' ');
            self.expr(arg, true)?;
        }
        for when in &case.args {
            self.buf.push_str(" WHEN ");
            let cond = match (&case.arg, &when.expr) {
                (Some(_), Expr::OpExpr(op)) => match op.args.as_slice() {
                    [Expr::CaseTestExpr(_), rhs] => rhs,
                    _ => &when.expr,
                },
                _ => &when.expr,
            };
            self.expr(cond, false)?;
            self.buf.push_str(" THEN ");
            self.expr(&when.result, true)?;
        }
        if let Some(def) = &case.defresult {
            self.buf.push_str(" ELSE ");
            self.expr(def, show_implicit)?;
        }
        self.buf.push_str(" END");
        Ok(())
    }

    /// `show_type`: `-1` never adds a type label, `0` adds it where the
    /// literal would otherwise be ambiguous, `1` always adds it.
    fn constant(&mut self, c: &Const, show_type: i8) -> Result<()> {
        let Some(value) = &c.constvalue else {
            self.buf.push_str("NULL");
            if show_type >= 0 {
                self.buf.push_str("::");
                self.buf
                    .push_str(&format_type(self.catalog(), c.consttype, c.consttypmod)?);
            }
            return Ok(());
        };
        let text = datum_output(value);
        let mut need_label = match c.consttype {
            INT4OID if !text.starts_with('-') => {
                self.buf.push_str(&text);
                false
            }
            NUMERICOID
                if text.starts_with(|ch: char| ch.is_ascii_digit())
                    && text.contains(['.', 'e', 'E']) =>
            {
                self.buf.push_str(&text);
                c.consttypmod >= 0
            }
            BOOLOID => {
                self.buf
                    .push_str(if text == "t" { "true" } else { "false" });
                false
            }
            _ => {
                self.buf.push_str(&quote_literal(&text));
                true
            }
        };
        if c.consttype == UNKNOWNOID {
            need_label = false;
        }
        if show_type > 0 || (show_type == 0 && need_label) {
            self.buf.push_str("::");
            self.buf
                .push_str(&format_type(self.catalog(), c.consttype, c.consttypmod)?);
        }
        Ok(())
    }
}

/// Output-function text of a datum, as the type's output function would
/// print it.
pub fn datum_output(value: &Datum) -> String {
    match value {
        Datum::Bool(b) => if *b { "t" } else { "f" }.to_string(),
        Datum::Int(i) => i.to_string(),
        Datum::Float(f) if f.is_nan() => "NaN".to_string(),
        Datum::Float(f) if f.is_infinite() => {
            if *f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
        }
        Datum::Float(f) => f.to_string(),
        Datum::Text(s) => s.clone(),
        Datum::Bytes(bytes) => {
            let mut out = String::with_capacity(2 + bytes.len() * 2);
            out.push_str("\\x");
            for b in bytes {
                out.push_str(&format!("{b:02x}"));
            }
            out
        }
    }
}

const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "system_user", "table", "then",
    "to", "trailing", "true", "union", "unique", "user", "using", "variadic", "when", "where",
    "window", "with",
];

fn is_quoted_identifier(ident: &str) -> bool {
    let Some(inner) = ident
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return false;
    };
    if inner.is_empty() || ident.len() < 2 {
        return false;
    }
    // every embedded quote must be doubled
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '"' && chars.next() != Some('"') {
            return false;
        }
    }
    true
}

/// Quotes `ident` when it is not a plain lower-case identifier or is a
/// reserved word. Already quoted identifiers are returned unchanged.
pub fn quote_identifier(ident: &str) -> String {
    if is_quoted_identifier(ident) {
        return ident.to_string();
    }
    let safe = ident
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_KEYWORDS.contains(&ident);
    if safe {
        return ident.to_string();
    }
    let mut out = String::with_capacity(ident.len() + 2);
    out.push('"');
    for c in ident.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Quotes a string literal, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Reference name for every range table entry in `rels_used`, unique
/// across the statement. Other entries get `None`.
///
/// Names come from the user alias, else the relation name, else the
/// entry's own alias; duplicates get `_1`, `_2`, ... appended.
pub fn select_rtable_names_for_explain(
    rtable: &RangeTable,
    rels_used: &Bitmapset,
    catalog: &dyn CatalogLookup,
) -> Vec<Option<String>> {
    let mut counters: FxHashMap<String, u32> = FxHashMap::default();
    let mut names = Vec::with_capacity(rtable.len());
    for (i, slot) in rtable.0.iter().enumerate() {
        let rti = u32::try_from(i + 1).unwrap_or(u32::MAX);
        let Some(rte) = slot else {
            names.push(None);
            continue;
        };
        let base = if rels_used.is_member(rti) {
            base_refname(rte, catalog)
        } else {
            None
        };
        let Some(base) = base else {
            names.push(None);
            continue;
        };
        let name = match counters.get(&base).copied() {
            None => {
                counters.insert(base.clone(), 0);
                base
            }
            Some(mut counter) => {
                let mut candidate;
                loop {
                    counter += 1;
                    candidate = format!("{base}_{counter}");
                    if !names
                        .iter()
                        .any(|n: &Option<String>| n.as_deref() == Some(candidate.as_str()))
                    {
                        break;
                    }
                }
                counters.insert(base, counter);
                counters.insert(candidate.clone(), 0);
                candidate
            }
        };
        names.push(Some(name));
    }
    names
}

fn base_refname(rte: &RangeTblEntry, catalog: &dyn CatalogLookup) -> Option<String> {
    if let Some(alias) = &rte.alias {
        return Some(alias.aliasname.clone());
    }
    match &rte.kind {
        RteKind::Relation { relid, .. } => {
            Some(get_rel_name(catalog, *relid).unwrap_or_else(|_| rte.eref.aliasname.clone()))
        }
        RteKind::Join { .. } => None,
        _ => Some(rte.eref.aliasname.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, TEXTOID};
    use crate::nodes::makefuncs::*;
    use crate::nodes::plannodes::{NestLoop, NestLoopParam, Scan, SeqScan};
    use crate::nodes::{CmdType, RangeTblEntry};

    fn two_table_stmt() -> PlannedStmt {
        let mut stmt = PlannedStmt::new(CmdType::Select, Plan::default());
        stmt.rtable
            .push(RangeTblEntry::relation(16384, "t", vec!["a".into(), "b".into()]));
        stmt.rtable
            .push(RangeTblEntry::relation(16384, "t", vec!["a".into(), "b".into()]));
        stmt
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new().with_relation(16384, "t")
    }

    fn names(stmt: &PlannedStmt, cat: &InMemoryCatalog) -> Vec<Option<String>> {
        let used: Bitmapset = [1, 2].into_iter().collect();
        select_rtable_names_for_explain(&stmt.rtable, &used, cat)
    }

    #[test]
    fn duplicate_relations_get_numbered_names() {
        let stmt = two_table_stmt();
        assert_eq!(
            names(&stmt, &catalog()),
            vec![Some("t".to_string()), Some("t_1".to_string())]
        );
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_identifier("abc_1"), "abc_1");
        assert_eq!(quote_identifier("Abc"), "\"Abc\"");
        assert_eq!(quote_identifier("select"), "\"select\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        let once = quote_identifier("My Table");
        assert_eq!(quote_identifier(&once), once);
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn operators_constants_and_prefixes() {
        let stmt = two_table_stmt();
        let cat = catalog();
        let mut ctx = DeparseContext::for_plan_tree(&stmt, &cat, names(&stmt, &cat));
        ctx.set_plan(&stmt.plan_tree, &[]);
        let qual = make_op_expr(
            96,
            BOOLOID,
            vec![make_var(2, 1, INT4OID, -1, 0, 0), make_int4_const(42)],
        );
        assert_eq!(deparse_expression(&qual, &ctx, false, false).unwrap(), "(a = 42)");
        assert_eq!(
            deparse_expression(&qual, &ctx, true, false).unwrap(),
            "(t_1.a = 42)"
        );
        let text = make_text_const("x'y");
        assert_eq!(
            deparse_expression(&text, &ctx, false, false).unwrap(),
            "'x''y'::text"
        );
        assert_eq!(
            deparse_expression(&make_int4_const(-3), &ctx, false, false).unwrap(),
            "'-3'::integer"
        );
        let quals = vec![
            make_null_test(make_var(1, 2, TEXTOID, -1, 100, 0), NullTestType::IsNotNull),
            make_bool_const(Some(true)),
        ];
        assert_eq!(
            deparse_qual_list(&quals, &ctx, false).unwrap(),
            "((b IS NOT NULL) AND true)"
        );
    }

    #[test]
    fn outer_references_resolve_through_child_target_list() {
        let mut scan = Plan::new(PlanKind::SeqScan(SeqScan {
            scan: Scan { scanrelid: 1 },
        }));
        scan.targetlist.push(make_target_entry(
            make_op_expr(551, INT4OID, vec![make_var(1, 1, INT4OID, -1, 0, 0), make_int4_const(1)]),
            1,
            None,
            false,
        ));
        let mut sort = Plan::new(PlanKind::Material);
        sort.lefttree = Some(Box::new(scan));
        let mut stmt = two_table_stmt();
        stmt.plan_tree = sort;
        let cat = catalog();
        let mut ctx = DeparseContext::for_plan_tree(&stmt, &cat, names(&stmt, &cat));
        ctx.set_plan(&stmt.plan_tree, &[]);
        let outer = make_var(OUTER_VAR, 1, INT4OID, -1, 0, 0);
        assert_eq!(
            deparse_expression(&outer, &ctx, true, false).unwrap(),
            "((t.a + 1))"
        );
    }

    #[test]
    fn nest_loop_params_print_the_outer_column() {
        let outer = Plan::new(PlanKind::SeqScan(SeqScan {
            scan: Scan { scanrelid: 1 },
        }));
        let mut inner = Plan::new(PlanKind::SeqScan(SeqScan {
            scan: Scan { scanrelid: 2 },
        }));
        inner.qual.push(make_op_expr(
            96,
            BOOLOID,
            vec![make_var(2, 1, INT4OID, -1, 0, 0), make_param_exec(0, INT4OID)],
        ));
        let mut outer_with_tlist = outer;
        outer_with_tlist
            .targetlist
            .push(make_passthrough_entry(1, 1, INT4OID));
        let mut join = Plan::new(PlanKind::NestLoop(NestLoop {
            nest_params: vec![NestLoopParam {
                paramno: 0,
                paramval: Var {
                    varno: OUTER_VAR,
                    varattno: 1,
                    vartype: INT4OID,
                    ..Var::default()
                },
            }],
            ..NestLoop::default()
        }));
        join.lefttree = Some(Box::new(outer_with_tlist));
        join.righttree = Some(Box::new(inner));
        let mut stmt = two_table_stmt();
        stmt.plan_tree = join;
        let cat = catalog();
        let rt_names = names(&stmt, &cat);
        let root = &stmt.plan_tree;
        let inner = root.inner_plan().unwrap();
        let mut ctx = DeparseContext::for_plan_tree(&stmt, &cat, rt_names);
        ctx.set_plan(inner, &[Ancestor::Plan(root)]);
        assert_eq!(
            deparse_qual_list(&inner.qual, &ctx, false).unwrap(),
            "(a = t.a)"
        );
    }

    #[test]
    fn init_plan_outputs_and_sub_plans() {
        let mut scan = Plan::new(PlanKind::SeqScan(SeqScan {
            scan: Scan { scanrelid: 1 },
        }));
        scan.init_plan.push(SubPlan {
            plan_id: 1,
            plan_name: "InitPlan 1".into(),
            set_param: vec![0],
            ..SubPlan::default()
        });
        let mut stmt = two_table_stmt();
        stmt.plan_tree = scan;
        let cat = catalog();
        let mut ctx = DeparseContext::for_plan_tree(&stmt, &cat, names(&stmt, &cat));
        ctx.set_plan(&stmt.plan_tree, &[]);
        let qual = make_op_expr(
            96,
            BOOLOID,
            vec![make_var(1, 1, INT4OID, -1, 0, 0), make_param_exec(0, INT4OID)],
        );
        assert_eq!(
            deparse_expression(&qual, &ctx, false, false).unwrap(),
            "(a = (InitPlan 1).col1)"
        );

        let exists = Expr::SubPlan(Box::new(SubPlan {
            sub_link_type: SubLinkType::Exists,
            plan_id: 2,
            plan_name: "SubPlan 2".into(),
            ..SubPlan::default()
        }));
        assert_eq!(
            deparse_expression(&exists, &ctx, false, false).unwrap(),
            "EXISTS(SubPlan 2)"
        );
        let any = Expr::SubPlan(Box::new(SubPlan {
            sub_link_type: SubLinkType::Any,
            testexpr: Some(make_op_expr(
                96,
                BOOLOID,
                vec![make_var(1, 1, INT4OID, -1, 0, 0), make_param_exec(5, INT4OID)],
            )),
            param_ids: vec![5],
            plan_id: 3,
            plan_name: "SubPlan 3".into(),
            use_hash_table: true,
            ..SubPlan::default()
        }));
        assert_eq!(
            deparse_expression(&any, &ctx, false, false).unwrap(),
            "(ANY (a = (hashed SubPlan 3).col1))"
        );
    }

    #[test]
    fn implicit_casts_hide_unless_requested() {
        let stmt = two_table_stmt();
        let cat = catalog();
        let mut ctx = DeparseContext::for_plan_tree(&stmt, &cat, names(&stmt, &cat));
        ctx.set_plan(&stmt.plan_tree, &[]);
        let cast = Expr::RelabelType(Box::new(RelabelType {
            arg: make_var(1, 2, TEXTOID, -1, 100, 0),
            resulttype: crate::catalog::VARCHAROID,
            resulttypmod: -1,
            relabelformat: CoercionForm::ImplicitCast,
            ..RelabelType::default()
        }));
        assert_eq!(deparse_expression(&cast, &ctx, false, false).unwrap(), "b");
        assert_eq!(
            deparse_expression(&cast, &ctx, false, true).unwrap(),
            "(b)::character varying"
        );
    }
}
