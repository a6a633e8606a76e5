//! Closed-world node model shared by the planner, executor and EXPLAIN.
//!
//! Every node kind is listed in [`NodeTag`]. Plan variants share the common
//! [`plannodes::Plan`] header and, where applicable, the [`plannodes::Scan`]
//! or [`plannodes::Join`] prefix; [`NodeTag::is_a`] answers prefix-chain
//! questions the same way for every kind.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod bitmapset;
pub mod copyfuncs;
pub mod equalfuncs;
pub mod freefuncs;
pub mod makefuncs;
pub mod nodefuncs;
pub mod parsenodes;
pub mod pathnodes;
pub mod plannodes;
pub mod primnodes;
pub mod serialize;

pub use bitmapset::Bitmapset;
pub use parsenodes::{
    Alias, DefElem, DefElemArg, JoinType, Query, RangeTable, RangeTblEntry, RteKind,
    RtePermissionInfo,
};
pub use pathnodes::{JoinPath, Path, PathKind};
pub use plannodes::{CmdType, Join, Plan, PlanKind, PlannedStmt, Scan};
pub use primnodes::{Expr, TargetEntry};

/// Catalog object identifier.
pub type Oid = u32;
/// The reserved "no object" identifier.
pub const INVALID_OID: Oid = 0;
/// One-based position inside a range table or list.
pub type Index = u32;
/// Column number within a relation or target list.
pub type AttrNumber = i16;

/// Every node kind known to the system, including the abstract prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeTag {
    // abstract prefixes
    Plan,
    Scan,
    Join,
    Expr,
    Path,
    JoinPath,

    // plan nodes
    Result,
    ProjectSet,
    ModifyTable,
    Append,
    MergeAppend,
    RecursiveUnion,
    BitmapAnd,
    BitmapOr,
    SeqScan,
    SampleScan,
    IndexScan,
    IndexOnlyScan,
    BitmapIndexScan,
    BitmapHeapScan,
    TidScan,
    TidRangeScan,
    SubqueryScan,
    FunctionScan,
    ValuesScan,
    TableFuncScan,
    CteScan,
    NamedTuplestoreScan,
    WorkTableScan,
    ForeignScan,
    CustomScan,
    NestLoop,
    MergeJoin,
    HashJoin,
    Material,
    Memoize,
    Sort,
    IncrementalSort,
    Group,
    Agg,
    WindowAgg,
    Unique,
    Gather,
    GatherMerge,
    Hash,
    SetOp,
    LockRows,
    Limit,

    // plan support
    PlannedStmt,
    NestLoopParam,
    PlanRowMark,

    // expressions
    Var,
    Const,
    Param,
    Aggref,
    WindowFunc,
    FuncExpr,
    OpExpr,
    ScalarArrayOpExpr,
    BoolExpr,
    SubLink,
    SubPlan,
    FieldSelect,
    FieldStore,
    RelabelType,
    CoerceViaIO,
    ArrayCoerceExpr,
    ConvertRowtypeExpr,
    CollateExpr,
    CaseExpr,
    CaseWhen,
    CaseTestExpr,
    ArrayExpr,
    RowExpr,
    CoalesceExpr,
    MinMaxExpr,
    NullTest,
    BooleanTest,
    CoerceToDomain,
    CoerceToDomainValue,
    TargetEntry,
    SortGroupClause,

    // parse-side records
    Query,
    RangeTblEntry,
    RtePermissionInfo,
    RangeTblFunction,
    TableSampleClause,
    TableFunc,
    Alias,
    RangeTblRef,
    JoinExpr,
    FromExpr,
    CommonTableExpr,
    DefElem,

    // planner paths
    IndexPath,
    BitmapHeapPath,
    NestPath,
    MergePath,
    HashPath,
    AppendPath,
    SortPath,
    MaterialPath,

    // values and containers
    Integer,
    Float,
    Boolean,
    String,
    Bitmapset,
    List,
}

impl NodeTag {
    /// Every tag, in declaration order.
    pub const ALL: &'static [NodeTag] = &[
        NodeTag::Plan,
        NodeTag::Scan,
        NodeTag::Join,
        NodeTag::Expr,
        NodeTag::Path,
        NodeTag::JoinPath,
        NodeTag::Result,
        NodeTag::ProjectSet,
        NodeTag::ModifyTable,
        NodeTag::Append,
        NodeTag::MergeAppend,
        NodeTag::RecursiveUnion,
        NodeTag::BitmapAnd,
        NodeTag::BitmapOr,
        NodeTag::SeqScan,
        NodeTag::SampleScan,
        NodeTag::IndexScan,
        NodeTag::IndexOnlyScan,
        NodeTag::BitmapIndexScan,
        NodeTag::BitmapHeapScan,
        NodeTag::TidScan,
        NodeTag::TidRangeScan,
        NodeTag::SubqueryScan,
        NodeTag::FunctionScan,
        NodeTag::ValuesScan,
        NodeTag::TableFuncScan,
        NodeTag::CteScan,
        NodeTag::NamedTuplestoreScan,
        NodeTag::WorkTableScan,
        NodeTag::ForeignScan,
        NodeTag::CustomScan,
        NodeTag::NestLoop,
        NodeTag::MergeJoin,
        NodeTag::HashJoin,
        NodeTag::Material,
        NodeTag::Memoize,
        NodeTag::Sort,
        NodeTag::IncrementalSort,
        NodeTag::Group,
        NodeTag::Agg,
        NodeTag::WindowAgg,
        NodeTag::Unique,
        NodeTag::Gather,
        NodeTag::GatherMerge,
        NodeTag::Hash,
        NodeTag::SetOp,
        NodeTag::LockRows,
        NodeTag::Limit,
        NodeTag::PlannedStmt,
        NodeTag::NestLoopParam,
        NodeTag::PlanRowMark,
        NodeTag::Var,
        NodeTag::Const,
        NodeTag::Param,
        NodeTag::Aggref,
        NodeTag::WindowFunc,
        NodeTag::FuncExpr,
        NodeTag::OpExpr,
        NodeTag::ScalarArrayOpExpr,
        NodeTag::BoolExpr,
        NodeTag::SubLink,
        NodeTag::SubPlan,
        NodeTag::FieldSelect,
        NodeTag::FieldStore,
        NodeTag::RelabelType,
        NodeTag::CoerceViaIO,
        NodeTag::ArrayCoerceExpr,
        NodeTag::ConvertRowtypeExpr,
        NodeTag::CollateExpr,
        NodeTag::CaseExpr,
        NodeTag::CaseWhen,
        NodeTag::CaseTestExpr,
        NodeTag::ArrayExpr,
        NodeTag::RowExpr,
        NodeTag::CoalesceExpr,
        NodeTag::MinMaxExpr,
        NodeTag::NullTest,
        NodeTag::BooleanTest,
        NodeTag::CoerceToDomain,
        NodeTag::CoerceToDomainValue,
        NodeTag::TargetEntry,
        NodeTag::SortGroupClause,
        NodeTag::Query,
        NodeTag::RangeTblEntry,
        NodeTag::RtePermissionInfo,
        NodeTag::RangeTblFunction,
        NodeTag::TableSampleClause,
        NodeTag::TableFunc,
        NodeTag::Alias,
        NodeTag::RangeTblRef,
        NodeTag::JoinExpr,
        NodeTag::FromExpr,
        NodeTag::CommonTableExpr,
        NodeTag::DefElem,
        NodeTag::IndexPath,
        NodeTag::BitmapHeapPath,
        NodeTag::NestPath,
        NodeTag::MergePath,
        NodeTag::HashPath,
        NodeTag::AppendPath,
        NodeTag::SortPath,
        NodeTag::MaterialPath,
        NodeTag::Integer,
        NodeTag::Float,
        NodeTag::Boolean,
        NodeTag::String,
        NodeTag::Bitmapset,
        NodeTag::List,
    ];

    /// The prefix record this kind embeds, if any.
    pub fn parent(self) -> Option<NodeTag> {
        use NodeTag::*;
        match self {
            Scan | Join => Some(Plan),
            SeqScan | SampleScan | IndexScan | IndexOnlyScan | BitmapIndexScan | BitmapHeapScan
            | TidScan | TidRangeScan | SubqueryScan | FunctionScan | ValuesScan | TableFuncScan
            | CteScan | NamedTuplestoreScan | WorkTableScan | ForeignScan | CustomScan => Some(Scan),
            NestLoop | MergeJoin | HashJoin => Some(Join),
            Result | ProjectSet | ModifyTable | Append | MergeAppend | RecursiveUnion
            | BitmapAnd | BitmapOr | Material | Memoize | Sort | Group | Agg | WindowAgg
            | Unique | Gather | GatherMerge | Hash | SetOp | LockRows | Limit => Some(Plan),
            // an incremental sort carries a full Sort record as its prefix
            IncrementalSort => Some(Sort),
            Var | Const | Param | Aggref | WindowFunc | FuncExpr | OpExpr | ScalarArrayOpExpr
            | BoolExpr | SubLink | SubPlan | FieldSelect | FieldStore | RelabelType
            | CoerceViaIO | ArrayCoerceExpr | ConvertRowtypeExpr | CollateExpr | CaseExpr
            | CaseWhen | CaseTestExpr | ArrayExpr | RowExpr | CoalesceExpr | MinMaxExpr
            | NullTest | BooleanTest | CoerceToDomain | CoerceToDomainValue | TargetEntry => {
                Some(Expr)
            }
            IndexPath | BitmapHeapPath | AppendPath | SortPath | MaterialPath | JoinPath => {
                Some(Path)
            }
            NestPath | MergePath | HashPath => Some(JoinPath),
            _ => None,
        }
    }

    /// True when a record tagged `self` may be viewed as a `base` record.
    pub fn is_a(self, base: NodeTag) -> bool {
        let mut current = Some(self);
        while let Some(tag) = current {
            if tag == base {
                return true;
            }
            current = tag.parent();
        }
        false
    }

    /// True for tags that only exist as prefixes and are never instantiated.
    ///
    /// `Path` is both a prefix and the tag of a plain scan path.
    pub fn is_abstract(self) -> bool {
        matches!(
            self,
            NodeTag::Plan | NodeTag::Scan | NodeTag::Join | NodeTag::Expr | NodeTag::JoinPath
        )
    }

    /// True for concrete plan node kinds.
    pub fn is_plan(self) -> bool {
        !self.is_abstract() && self.is_a(NodeTag::Plan)
    }

    /// True for concrete expression kinds.
    pub fn is_expr(self) -> bool {
        !self.is_abstract() && self.is_a(NodeTag::Expr)
    }
}

impl fmt::Display for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Source text location of a node; `-1` means unknown.
///
/// Locations are carried through copies and serialization but never take part
/// in equality, so two trees parsed from differently formatted text compare
/// equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParseLoc(pub i32);

impl ParseLoc {
    /// The "unknown" location.
    pub const UNKNOWN: ParseLoc = ParseLoc(-1);

    /// Byte offset, if known.
    pub fn offset(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl Default for ParseLoc {
    fn default() -> Self {
        ParseLoc::UNKNOWN
    }
}

impl PartialEq for ParseLoc {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// A field kept for diagnostics only.
///
/// Copies duplicate the value verbatim; equality ignores it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostic<T>(pub T);

impl<T> PartialEq for Diagnostic<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// Lookup data the executor caches for a function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmgrInfo {
    /// Function being called.
    pub fn_oid: Oid,
    /// Number of declared arguments.
    pub fn_nargs: i16,
    /// Strict functions return null on any null input.
    pub fn_strict: bool,
}

/// Transient executor cache attached to function-call nodes.
///
/// Never serialized, cleared on copy and ignored by equality.
#[derive(Default)]
pub struct FnCache(Option<Arc<FmgrInfo>>);

impl FnCache {
    /// Populates the cache.
    pub fn fill(&mut self, info: FmgrInfo) {
        self.0 = Some(Arc::new(info));
    }

    /// Cached lookup data, if the executor has filled it in.
    pub fn get(&self) -> Option<&FmgrInfo> {
        self.0.as_deref()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl Clone for FnCache {
    fn clone(&self) -> Self {
        FnCache(None)
    }
}

impl PartialEq for FnCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl fmt::Debug for FnCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(info) => write!(f, "FnCache({})", info.fn_oid),
            None => f.write_str("FnCache(empty)"),
        }
    }
}

/// Scalar value nodes used as option arguments and list members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Integer literal.
    Integer(i64),
    /// Numeric literal kept in its textual form.
    Float(String),
    /// Boolean literal.
    Boolean(bool),
    /// Identifier or string literal.
    String(String),
}

/// Any node of the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// A plan tree node.
    Plan(Box<Plan>),
    /// A finished statement plan.
    PlannedStmt(Box<PlannedStmt>),
    /// An expression.
    Expr(Expr),
    /// A target list entry.
    TargetEntry(Box<TargetEntry>),
    /// A planner path.
    Path(Box<Path>),
    /// An analyzed query.
    Query(Box<Query>),
    /// A range table entry.
    RangeTblEntry(Box<RangeTblEntry>),
    /// A permission-check record.
    RtePermissionInfo(Box<RtePermissionInfo>),
    /// A table alias.
    Alias(Alias),
    /// A generic `name [= value]` option.
    DefElem(DefElem),
    /// An integer set.
    Bitmapset(Bitmapset),
    /// A scalar value.
    Value(Value),
    /// An ordered list of nodes.
    List(Vec<Node>),
}

impl Node {
    /// Discriminator of this node.
    pub fn tag(&self) -> NodeTag {
        match self {
            Node::Plan(plan) => plan.tag(),
            Node::PlannedStmt(_) => NodeTag::PlannedStmt,
            Node::Expr(expr) => expr.tag(),
            Node::TargetEntry(_) => NodeTag::TargetEntry,
            Node::Path(path) => path.tag(),
            Node::Query(_) => NodeTag::Query,
            Node::RangeTblEntry(_) => NodeTag::RangeTblEntry,
            Node::RtePermissionInfo(_) => NodeTag::RtePermissionInfo,
            Node::Alias(_) => NodeTag::Alias,
            Node::DefElem(_) => NodeTag::DefElem,
            Node::Bitmapset(_) => NodeTag::Bitmapset,
            Node::Value(Value::Integer(_)) => NodeTag::Integer,
            Node::Value(Value::Float(_)) => NodeTag::Float,
            Node::Value(Value::Boolean(_)) => NodeTag::Boolean,
            Node::Value(Value::String(_)) => NodeTag::String,
            Node::List(_) => NodeTag::List,
        }
    }

    /// Runtime downcast check.
    pub fn is_a(&self, tag: NodeTag) -> bool {
        self.tag().is_a(tag)
    }

    /// Views the node as a plan, if it is one.
    pub fn as_plan(&self) -> Option<&Plan> {
        match self {
            Node::Plan(plan) => Some(plan),
            _ => None,
        }
    }

    /// Views the node as an expression, if it is one.
    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Node::Expr(expr) => Some(expr),
            _ => None,
        }
    }
}

impl From<Plan> for Node {
    fn from(plan: Plan) -> Self {
        Node::Plan(Box::new(plan))
    }
}

impl From<Expr> for Node {
    fn from(expr: Expr) -> Self {
        Node::Expr(expr)
    }
}

impl From<PlannedStmt> for Node {
    fn from(stmt: PlannedStmt) -> Self {
        Node::PlannedStmt(Box::new(stmt))
    }
}

impl From<Query> for Node {
    fn from(query: Query) -> Self {
        Node::Query(Box::new(query))
    }
}
