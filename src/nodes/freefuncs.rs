//! Releasing node trees.
//!
//! Dropping a deeply nested tree through the derived drop glue recurses once
//! per level. [`free_object`] instead detaches children onto an explicit
//! worklist so that every node is dropped shallowly, whatever the depth.

use std::mem;

use super::parsenodes::{JoinTreeNode, Query, RteKind};
use super::pathnodes::Path;
use super::plannodes::{Plan, PlannedStmt};
use super::primnodes::Expr;
use super::Node;

enum Piece {
    Node(Node),
    Stmt(PlannedStmt),
    Plan(Plan),
    Expr(Expr),
    Query(Query),
    JoinTree(JoinTreeNode),
    Path(Path),
    Leaf(Node),
}

/// Releases `node` and everything it owns; returns the number of nodes freed.
pub fn free_object(node: Node) -> usize {
    let mut stack = vec![Piece::Node(node)];
    let mut freed = 0;
    while let Some(piece) = stack.pop() {
        freed += 1;
        match piece {
            Piece::Node(node) => {
                // the wrapper itself is not a node of its own
                freed -= 1;
                push_node(node, &mut stack);
            }
            Piece::Stmt(mut stmt) => {
                stack.push(Piece::Plan(mem::take(&mut stmt.plan_tree)));
                stack.extend(stmt.subplans.drain(..).map(Piece::Plan));
                for (_, rte) in stmt.rtable.iter_mut() {
                    detach_rte(&mut rte.kind, &mut stack);
                }
            }
            Piece::Plan(mut plan) => detach_plan(&mut plan, &mut stack),
            Piece::Expr(mut expr) => {
                if let Expr::SubLink(sublink) = &mut expr {
                    stack.push(Piece::Query(mem::take(&mut *sublink.subselect)));
                }
                expr.visit_mut_children(&mut |child| stack.push(Piece::Expr(mem::take(child))));
            }
            Piece::Query(mut query) => detach_query(&mut query, &mut stack),
            Piece::JoinTree(item) => match item {
                JoinTreeNode::RangeTblRef(_) => {}
                JoinTreeNode::JoinExpr(mut join) => {
                    stack.push(Piece::JoinTree(mem::take(&mut join.larg)));
                    stack.push(Piece::JoinTree(mem::take(&mut join.rarg)));
                    stack.extend(join.quals.take().map(Piece::Expr));
                }
                JoinTreeNode::FromExpr(mut from) => {
                    stack.extend(from.fromlist.drain(..).map(Piece::JoinTree));
                    stack.extend(from.quals.take().map(Piece::Expr));
                }
            },
            Piece::Path(mut path) => {
                for child in path.subpaths_mut() {
                    stack.push(Piece::Path(mem::take(child)));
                }
            }
            Piece::Leaf(_) => {}
        }
    }
    freed
}

fn push_node(node: Node, stack: &mut Vec<Piece>) {
    match node {
        Node::Plan(plan) => stack.push(Piece::Plan(*plan)),
        Node::PlannedStmt(stmt) => stack.push(Piece::Stmt(*stmt)),
        Node::Expr(expr) => stack.push(Piece::Expr(expr)),
        Node::TargetEntry(tle) => stack.push(Piece::Expr(tle.expr)),
        Node::Path(path) => stack.push(Piece::Path(*path)),
        Node::Query(query) => stack.push(Piece::Query(*query)),
        Node::RangeTblEntry(mut rte) => {
            detach_rte(&mut rte.kind, stack);
            stack.push(Piece::Leaf(Node::RangeTblEntry(rte)));
        }
        Node::List(items) => stack.extend(items.into_iter().map(Piece::Node)),
        leaf @ (Node::RtePermissionInfo(_)
        | Node::Alias(_)
        | Node::DefElem(_)
        | Node::Bitmapset(_)
        | Node::Value(_)) => stack.push(Piece::Leaf(leaf)),
    }
}

fn detach_plan(plan: &mut Plan, stack: &mut Vec<Piece>) {
    if let Some(left) = plan.lefttree.take() {
        stack.push(Piece::Plan(*left));
    }
    if let Some(right) = plan.righttree.take() {
        stack.push(Piece::Plan(*right));
    }
    for member in plan.member_plans_mut() {
        stack.push(Piece::Plan(mem::take(member)));
    }
    for expr in plan.expr_roots_mut() {
        stack.push(Piece::Expr(mem::take(expr)));
    }
    for subplan in plan.init_plan.drain(..) {
        stack.push(Piece::Expr(Expr::SubPlan(Box::new(subplan))));
    }
}

fn detach_query(query: &mut Query, stack: &mut Vec<Piece>) {
    for cte in query.cte_list.drain(..) {
        stack.push(Piece::Query(*cte.ctequery));
    }
    for (_, rte) in query.rtable.iter_mut() {
        detach_rte(&mut rte.kind, stack);
    }
    stack.extend(query.jointree.fromlist.drain(..).map(Piece::JoinTree));
    stack.extend(query.jointree.quals.take().map(Piece::Expr));
    stack.extend(query.target_list.drain(..).map(|tle| Piece::Expr(tle.expr)));
    stack.extend(query.returning_list.drain(..).map(|tle| Piece::Expr(tle.expr)));
    stack.extend(query.having_qual.take().map(Piece::Expr));
    stack.extend(query.limit_offset.take().map(Piece::Expr));
    stack.extend(query.limit_count.take().map(Piece::Expr));
}

fn detach_rte(kind: &mut RteKind, stack: &mut Vec<Piece>) {
    match kind {
        RteKind::Subquery { subquery } => {
            if let Some(q) = subquery.take() {
                stack.push(Piece::Query(*q));
            }
        }
        RteKind::Join { joinaliasvars, .. } => {
            stack.extend(joinaliasvars.drain(..).map(Piece::Expr));
        }
        RteKind::Function { functions, .. } => {
            stack.extend(functions.drain(..).map(|f| Piece::Expr(f.funcexpr)));
        }
        RteKind::Values { values_lists } => {
            for row in values_lists.drain(..) {
                stack.extend(row.into_iter().map(Piece::Expr));
            }
        }
        RteKind::Group { groupexprs } => {
            stack.extend(groupexprs.drain(..).map(Piece::Expr));
        }
        RteKind::Relation { .. }
        | RteKind::TableFunc { .. }
        | RteKind::Cte { .. }
        | RteKind::NamedTuplestore { .. }
        | RteKind::Result => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::makefuncs::{make_bool_expr, make_int4_const, make_var};
    use crate::nodes::primnodes::BoolExprType;

    #[test]
    fn counts_every_expression_node() {
        let expr = make_bool_expr(
            BoolExprType::And,
            vec![make_var(1, 1, 23, -1, 0, 0), make_int4_const(3)],
        );
        assert_eq!(free_object(Node::Expr(expr)), 3);
    }

    #[test]
    fn deep_trees_do_not_overflow() {
        let mut expr = make_int4_const(0);
        for _ in 0..200_000 {
            expr = make_bool_expr(BoolExprType::Not, vec![expr]);
        }
        assert_eq!(free_object(Node::Expr(expr)), 200_001);
    }

    #[test]
    fn plan_children_are_released() {
        let mut root = Plan::new(crate::nodes::PlanKind::Material);
        root.lefttree = Some(Box::new(Plan::new(crate::nodes::PlanKind::Material)));
        root.qual.push(make_int4_const(1));
        // two plans and one qual
        assert_eq!(free_object(Node::from(root)), 3);
    }
}
