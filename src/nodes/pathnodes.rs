//! Planner paths.
//!
//! Paths are the planner's candidate plans. They are never rendered by
//! EXPLAIN, but they belong to the same node universe, so copy, equality,
//! free and serialization handle them like every other node.

use serde::{Deserialize, Serialize};

use super::parsenodes::JoinType;
use super::plannodes::ScanDirection;
use super::primnodes::Expr;
use super::{Bitmapset, NodeTag, Oid};

/// Fields every path shares, plus the variant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    /// Plan node kind this path would produce.
    pub pathtype: Option<NodeTag>,
    /// Relations the path scans or joins.
    pub parent_relids: Bitmapset,
    /// Relations that must supply parameters.
    pub required_outer: Bitmapset,
    /// Participates in parallel execution.
    pub parallel_aware: bool,
    /// May run inside a parallel worker.
    pub parallel_safe: bool,
    /// Desired worker count.
    pub parallel_workers: i32,
    /// Estimated rows.
    pub rows: f64,
    /// Disabled nodes contributing to the cost.
    pub disabled_nodes: i32,
    /// Startup cost.
    pub startup_cost: f64,
    /// Total cost.
    pub total_cost: f64,
    /// Output ordering, as sort expressions.
    pub pathkeys: Vec<Expr>,
    /// Variant data.
    pub kind: PathKind,
}

/// Prefix shared by the join path variants.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinPath {
    /// Join semantics.
    pub jointype: JoinType,
    /// Each outer row matches at most one inner row.
    pub inner_unique: bool,
    /// Outer input.
    pub outerjoinpath: Box<Path>,
    /// Inner input.
    pub innerjoinpath: Box<Path>,
    /// Join conditions.
    pub joinrestrictinfo: Vec<Expr>,
}

/// Variant-specific path data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum PathKind {
    /// Sequential scan or any other path without extra data.
    #[default]
    Plain,
    /// Index scan.
    Index {
        /// Index relation.
        indexid: Oid,
        /// Index conditions.
        indexclauses: Vec<Expr>,
        /// Ordering operators applied by the index.
        indexorderbys: Vec<Expr>,
        /// Scan direction.
        indexscandir: ScanDirection,
        /// Cost of the index part alone.
        indextotalcost: f64,
        /// Fraction of the index visited.
        indexselectivity: f64,
    },
    /// Bitmap heap scan over a tree of index paths.
    BitmapHeap {
        /// Bitmap-producing input.
        bitmapqual: Box<Path>,
    },
    /// Nested loop join.
    Nest(JoinPath),
    /// Merge join.
    Merge {
        /// Join prefix.
        jpath: JoinPath,
        /// Merge conditions.
        path_mergeclauses: Vec<Expr>,
        /// Explicit sort needed on the outer side.
        outersortkeys: Vec<Expr>,
        /// Explicit sort needed on the inner side.
        innersortkeys: Vec<Expr>,
        /// Mark/restore on the inner side can be skipped.
        skip_mark_restore: bool,
        /// Materialize the inner side.
        materialize_inner: bool,
    },
    /// Hash join.
    Hash {
        /// Join prefix.
        jpath: JoinPath,
        /// Hash conditions.
        path_hashclauses: Vec<Expr>,
        /// Estimated batch count.
        num_batches: i32,
        /// Estimated inner rows across all workers.
        inner_rows_total: f64,
    },
    /// Append.
    Append {
        /// Members.
        subpaths: Vec<Path>,
        /// Index of the first partial member.
        first_partial_path: i32,
        /// Row limit known to the planner, or `-1`.
        limit_tuples: f64,
    },
    /// Explicit sort.
    Sort {
        /// Input.
        subpath: Box<Path>,
    },
    /// Materialization.
    Material {
        /// Input.
        subpath: Box<Path>,
    },
}

impl Path {
    /// Discriminator of this path.
    pub fn tag(&self) -> NodeTag {
        match &self.kind {
            PathKind::Plain => NodeTag::Path,
            PathKind::Index { .. } => NodeTag::IndexPath,
            PathKind::BitmapHeap { .. } => NodeTag::BitmapHeapPath,
            PathKind::Nest(_) => NodeTag::NestPath,
            PathKind::Merge { .. } => NodeTag::MergePath,
            PathKind::Hash { .. } => NodeTag::HashPath,
            PathKind::Append { .. } => NodeTag::AppendPath,
            PathKind::Sort { .. } => NodeTag::SortPath,
            PathKind::Material { .. } => NodeTag::MaterialPath,
        }
    }

    /// The join prefix, for join paths.
    pub fn join_path(&self) -> Option<&JoinPath> {
        match &self.kind {
            PathKind::Nest(jpath)
            | PathKind::Merge { jpath, .. }
            | PathKind::Hash { jpath, .. } => Some(jpath),
            _ => None,
        }
    }

    /// Input paths in outer-to-inner order.
    pub fn subpaths(&self) -> Vec<&Path> {
        if let Some(jpath) = self.join_path() {
            return vec![&*jpath.outerjoinpath, &*jpath.innerjoinpath];
        }
        match &self.kind {
            PathKind::BitmapHeap { bitmapqual } => vec![&**bitmapqual],
            PathKind::Append { subpaths, .. } => subpaths.iter().collect(),
            PathKind::Sort { subpath } | PathKind::Material { subpath } => vec![&**subpath],
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`Path::subpaths`].
    pub fn subpaths_mut(&mut self) -> Vec<&mut Path> {
        match &mut self.kind {
            PathKind::Nest(jpath)
            | PathKind::Merge { jpath, .. }
            | PathKind::Hash { jpath, .. } => {
                vec![&mut *jpath.outerjoinpath, &mut *jpath.innerjoinpath]
            }
            PathKind::BitmapHeap { bitmapqual } => vec![&mut **bitmapqual],
            PathKind::Append { subpaths, .. } => subpaths.iter_mut().collect(),
            PathKind::Sort { subpath } | PathKind::Material { subpath } => vec![&mut **subpath],
            PathKind::Plain | PathKind::Index { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_paths_share_prefix() {
        let hash = Path {
            kind: PathKind::Hash {
                jpath: JoinPath {
                    jointype: JoinType::Left,
                    ..JoinPath::default()
                },
                path_hashclauses: Vec::new(),
                num_batches: 1,
                inner_rows_total: 0.0,
            },
            ..Path::default()
        };
        assert_eq!(hash.tag(), NodeTag::HashPath);
        assert!(hash.tag().is_a(NodeTag::JoinPath));
        assert_eq!(hash.join_path().map(|j| j.jointype), Some(JoinType::Left));
        assert_eq!(hash.subpaths().len(), 2);
        assert!(Path::default().join_path().is_none());
    }
}
