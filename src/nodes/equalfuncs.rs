//! Structural equality of node trees.
//!
//! Equality is derived field by field. Source locations
//! ([`ParseLoc`](super::ParseLoc)), diagnostic-only fields
//! ([`Diagnostic`](super::Diagnostic)) and executor caches compare equal
//! unconditionally; [`Bitmapset`](super::Bitmapset) compares as a set.

use super::Node;

/// Structural equality; nodes of different kinds are never equal.
pub fn equal(a: &Node, b: &Node) -> bool {
    a.tag() == b.tag() && a == b
}

/// Equality of two optional nodes, where two absent nodes are equal.
pub fn equal_opt<T: PartialEq>(a: Option<&T>, b: Option<&T>) -> bool {
    a == b
}

/// Element-wise, order-sensitive equality of node lists.
pub fn equal_list<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}
