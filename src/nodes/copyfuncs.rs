//! Deep copy of node trees.
//!
//! Every node owns its children outright, so a derived `Clone` already yields
//! a disjoint tree. The only field with special copy semantics is the
//! executor's function cache, whose `Clone` impl returns an empty cache.

use super::Node;

/// Deep copy of any node tree.
pub fn copy_object<T: Clone>(node: &T) -> T {
    node.clone()
}

/// Deep copy of an optional node, preserving absence.
pub fn copy_opt<T: Clone>(node: Option<&T>) -> Option<T> {
    node.cloned()
}

/// Deep copy of a generic node.
pub fn copy_node(node: &Node) -> Node {
    copy_object(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::makefuncs::{make_int4_const, make_op_expr, make_var};
    use crate::nodes::primnodes::Expr;
    use crate::nodes::{FmgrInfo, ParseLoc};

    #[test]
    fn copy_is_equal_and_disjoint() {
        let original = make_op_expr(96, 16, vec![make_var(1, 1, 23, -1, 0, 0), make_int4_const(5)]);
        let mut copy = copy_object(&original);
        assert_eq!(copy, original);
        if let Expr::OpExpr(op) = &mut copy {
            op.args.pop();
        }
        assert_ne!(copy, original);
        if let Expr::OpExpr(op) = &original {
            assert_eq!(op.args.len(), 2);
        }
    }

    #[test]
    fn copy_clears_function_cache_but_keeps_locations() {
        let mut original = make_op_expr(96, 16, vec![]);
        if let Expr::OpExpr(op) = &mut original {
            op.fn_cache.fill(FmgrInfo {
                fn_oid: 65,
                fn_nargs: 2,
                fn_strict: true,
            });
            op.location = ParseLoc(42);
        }
        let copy = copy_node(&Node::Expr(original));
        let Some(Expr::OpExpr(op)) = copy.as_expr() else {
            panic!("expected OpExpr");
        };
        assert!(op.fn_cache.is_empty());
        assert_eq!(op.location.0, 42);
    }

    #[test]
    fn copy_preserves_absence() {
        assert_eq!(copy_opt::<Expr>(None), None);
        let c = make_int4_const(1);
        assert_eq!(copy_opt(Some(&c)), Some(c));
    }
}
