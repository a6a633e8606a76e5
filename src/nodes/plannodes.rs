//! Finished plan trees.
//!
//! A [`Plan`] carries the fields every plan node shares; the variant-specific
//! data lives in [`PlanKind`]. Scan variants embed [`Scan`] and join variants
//! embed [`Join`] as their first field, so the prefix can be reached uniformly
//! through [`Plan::as_scan`] and [`Plan::as_join`].

use serde::{Deserialize, Serialize};

use super::parsenodes::{
    JoinType, RangeTable, RangeTblFunction, RtePermissionInfo, TableFunc, TableSampleClause,
};
use super::primnodes::{Expr, SubPlan, TargetEntry, Var};
use super::{AttrNumber, Bitmapset, Index, NodeTag, Oid, ParseLoc};

/// Kind of statement a plan executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CmdType {
    /// Not yet known.
    #[default]
    Unknown,
    /// `SELECT`.
    Select,
    /// `UPDATE`.
    Update,
    /// `INSERT`.
    Insert,
    /// `DELETE`.
    Delete,
    /// `MERGE`.
    Merge,
    /// Utility command.
    Utility,
    /// Rewritten to nothing.
    Nothing,
}

impl CmdType {
    /// Lower-case name of the command kind.
    pub fn name(self) -> &'static str {
        match self {
            CmdType::Unknown => "unknown",
            CmdType::Select => "select",
            CmdType::Update => "update",
            CmdType::Insert => "insert",
            CmdType::Delete => "delete",
            CmdType::Merge => "merge",
            CmdType::Utility => "utility",
            CmdType::Nothing => "nothing",
        }
    }
}

/// Direction of an index scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanDirection {
    /// Backward scan.
    Backward,
    /// Direction not relevant.
    NoMovement,
    /// Forward scan.
    #[default]
    Forward,
}

/// One sort key of a sorting node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SortColumn {
    /// Target list position of the key.
    pub col_idx: AttrNumber,
    /// Ordering operator.
    pub sort_operator: Oid,
    /// Collation.
    pub collation: Oid,
    /// Whether nulls sort first.
    pub nulls_first: bool,
}

/// One grouping or uniqueness key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupColumn {
    /// Target list position of the key.
    pub col_idx: AttrNumber,
    /// Equality operator.
    pub eq_operator: Oid,
    /// Collation.
    pub collation: Oid,
}

/// Prefix shared by all scan nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scan {
    /// Range table index of the scanned relation; `0` if none.
    pub scanrelid: Index,
}

/// Prefix shared by all join nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Join {
    /// Join semantics.
    pub jointype: JoinType,
    /// Each outer row matches at most one inner row.
    pub inner_unique: bool,
    /// Join conditions applied after matching.
    pub joinqual: Vec<Expr>,
}

/// Fields every plan node shares, plus the variant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    /// Cost before the first row is returned.
    pub startup_cost: f64,
    /// Total cost.
    pub total_cost: f64,
    /// Estimated row count.
    pub plan_rows: f64,
    /// Estimated average row width in bytes.
    pub plan_width: i32,
    /// Disabled nodes contributing to this subtree's cost.
    pub disabled_nodes: i32,
    /// Participates in parallel execution.
    pub parallel_aware: bool,
    /// May run inside a parallel worker.
    pub parallel_safe: bool,
    /// May run asynchronously.
    pub async_capable: bool,
    /// Unique pre-order id within the statement.
    pub plan_node_id: i32,
    /// Output columns.
    pub targetlist: Vec<TargetEntry>,
    /// Implicitly AND-ed filter conditions.
    pub qual: Vec<Expr>,
    /// Outer child.
    pub lefttree: Option<Box<Plan>>,
    /// Inner child.
    pub righttree: Option<Box<Plan>>,
    /// Init plans evaluated before this node.
    pub init_plan: Vec<SubPlan>,
    /// Executor params flowing in from outside this subtree.
    pub ext_param: Bitmapset,
    /// Executor params referenced anywhere in this subtree.
    pub all_param: Bitmapset,
    /// Variant-specific data.
    pub kind: PlanKind,
}

/// Variant-specific plan data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanKind {
    /// Computes a row without a source relation, or filters its child.
    Result(ResultPlan),
    /// Expands set-returning functions in the target list.
    ProjectSet,
    /// Applies an insert, update, delete or merge.
    ModifyTable(ModifyTable),
    /// Concatenates the output of its members.
    Append(Append),
    /// Merges sorted members.
    MergeAppend(MergeAppend),
    /// Evaluates a recursive CTE.
    RecursiveUnion(RecursiveUnion),
    /// Intersects bitmaps.
    BitmapAnd(BitmapAnd),
    /// Unions bitmaps.
    BitmapOr(BitmapOr),
    /// Sequential scan.
    SeqScan(SeqScan),
    /// `TABLESAMPLE` scan.
    SampleScan(SampleScan),
    /// Index scan.
    IndexScan(IndexScan),
    /// Index-only scan.
    IndexOnlyScan(IndexOnlyScan),
    /// Builds a bitmap from one index.
    BitmapIndexScan(BitmapIndexScan),
    /// Fetches heap rows named by a bitmap.
    BitmapHeapScan(BitmapHeapScan),
    /// Fetches rows by tuple id.
    TidScan(TidScan),
    /// Fetches rows in a tuple id range.
    TidRangeScan(TidRangeScan),
    /// Scans the output of a sub-query plan.
    SubqueryScan(SubqueryScan),
    /// Scans function results.
    FunctionScan(FunctionScan),
    /// Scans a `VALUES` list.
    ValuesScan(ValuesScan),
    /// Scans a table function.
    TableFuncScan(TableFuncScan),
    /// Scans a CTE.
    CteScan(CteScan),
    /// Scans an ephemeral named relation.
    NamedTuplestoreScan(NamedTuplestoreScan),
    /// Scans the working table of a recursive union.
    WorkTableScan(WorkTableScan),
    /// Scans a foreign relation.
    ForeignScan(ForeignScan),
    /// Scan implemented by an extension provider.
    CustomScan(CustomScan),
    /// Nested loop join.
    NestLoop(NestLoop),
    /// Merge join.
    MergeJoin(MergeJoin),
    /// Hash join.
    HashJoin(HashJoin),
    /// Materializes its input.
    Material,
    /// Caches inner results by parameter values.
    Memoize(Memoize),
    /// Sorts its input.
    Sort(Sort),
    /// Sorts input already sorted on a prefix of the keys.
    IncrementalSort(IncrementalSort),
    /// Groups sorted input.
    Group(Group),
    /// Computes aggregates.
    Agg(Agg),
    /// Computes window functions.
    WindowAgg(WindowAgg),
    /// Removes adjacent duplicates.
    Unique(Unique),
    /// Collects rows from parallel workers.
    Gather(Gather),
    /// Collects sorted rows from parallel workers.
    GatherMerge(GatherMerge),
    /// Builds the hash table of a hash join.
    Hash(Hash),
    /// `INTERSECT` / `EXCEPT`.
    SetOp(SetOp),
    /// Locks rows for `FOR UPDATE` and friends.
    LockRows(LockRows),
    /// `LIMIT` / `OFFSET`.
    Limit(Limit),
}

impl Default for PlanKind {
    fn default() -> Self {
        PlanKind::Result(ResultPlan::default())
    }
}

/// `Result` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultPlan {
    /// Conditions not depending on any input row.
    pub resconstantqual: Vec<Expr>,
}

/// Action taken on an `INSERT` conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnConflictAction {
    /// No `ON CONFLICT` clause.
    #[default]
    None,
    /// `DO NOTHING`.
    Nothing,
    /// `DO UPDATE`.
    Update,
}

/// Row locking strength requested by a row mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowMarkType {
    /// `FOR UPDATE`.
    Exclusive,
    /// `FOR NO KEY UPDATE`.
    NoKeyExclusive,
    /// `FOR SHARE`.
    Share,
    /// `FOR KEY SHARE`.
    KeyShare,
    /// Re-fetch by tuple id without locking.
    Reference,
    /// Copy the whole row.
    #[default]
    Copy,
}

/// Row identity bookkeeping for locking and re-checking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanRowMark {
    /// Range table index of the marked relation.
    pub rti: Index,
    /// Range table index of the parent relation.
    pub prti: Index,
    /// Unique id among row marks.
    pub rowmark_id: Index,
    /// Locking strategy.
    pub mark_type: RowMarkType,
    /// Union of strategies of all children.
    pub all_mark_types: u32,
    /// Whether this is a parent of an inheritance tree.
    pub is_parent: bool,
}

/// `ModifyTable` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModifyTable {
    /// Command kind.
    pub operation: CmdType,
    /// Whether to set the command tag.
    pub can_set_tag: bool,
    /// Range table index of the table named in the statement.
    pub nominal_relation: Index,
    /// Root of a partition tree, or `0`.
    pub root_relation: Index,
    /// Whether partition key columns are updated.
    pub part_cols_updated: bool,
    /// Range table indexes of the target relations.
    pub result_relations: Vec<Index>,
    /// Updated column numbers per result relation.
    pub update_colnos_lists: Vec<Vec<AttrNumber>>,
    /// `WITH CHECK OPTION` quals per result relation.
    pub with_check_option_lists: Vec<Vec<Expr>>,
    /// `RETURNING` lists per result relation.
    pub returning_lists: Vec<Vec<TargetEntry>>,
    /// Row marks for the non-target relations.
    pub row_marks: Vec<PlanRowMark>,
    /// Param id for re-check rows.
    pub epq_param: i32,
    /// `ON CONFLICT` action.
    pub on_conflict_action: OnConflictAction,
    /// Arbiter unique indexes.
    pub arbiter_indexes: Vec<Oid>,
    /// `DO UPDATE SET` target list.
    pub on_conflict_set: Vec<TargetEntry>,
    /// Column numbers assigned by `DO UPDATE SET`.
    pub on_conflict_cols: Vec<AttrNumber>,
    /// `DO UPDATE ... WHERE`.
    pub on_conflict_where: Option<Expr>,
    /// Range table index of the `EXCLUDED` pseudo relation.
    pub excl_rel_rti: Index,
    /// Target list of the `EXCLUDED` pseudo relation.
    pub excl_rel_tlist: Vec<TargetEntry>,
}

/// `Append` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Append {
    /// Range table indexes of the appended relations.
    pub apprelids: Bitmapset,
    /// Members.
    pub appendplans: Vec<Plan>,
    /// How many members are asynchronous.
    pub nasyncplans: i32,
    /// Index of the first partial member.
    pub first_partial_plan: i32,
    /// Partition pruning info index, `-1` if none.
    pub part_prune_index: i32,
}

/// `MergeAppend` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MergeAppend {
    /// Range table indexes of the appended relations.
    pub apprelids: Bitmapset,
    /// Members, each sorted on `sort_cols`.
    pub mergeplans: Vec<Plan>,
    /// Merge keys.
    pub sort_cols: Vec<SortColumn>,
    /// Partition pruning info index, `-1` if none.
    pub part_prune_index: i32,
}

/// `RecursiveUnion` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecursiveUnion {
    /// Param id of the working table.
    pub wt_param: i32,
    /// Duplicate detection keys for `UNION` (empty for `UNION ALL`).
    pub dup_cols: Vec<GroupColumn>,
    /// Estimated group count.
    pub num_groups: i64,
}

/// `BitmapAnd` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BitmapAnd {
    /// Members.
    pub bitmapplans: Vec<Plan>,
}

/// `BitmapOr` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BitmapOr {
    /// Whether the bitmap is shared between workers.
    pub isshared: bool,
    /// Members.
    pub bitmapplans: Vec<Plan>,
}

/// `SeqScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeqScan {
    /// Scan prefix.
    pub scan: Scan,
}

/// `SampleScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Sampling method and arguments.
    pub tablesample: TableSampleClause,
}

/// `IndexScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Index relation.
    pub indexid: Oid,
    /// Index conditions in executable form.
    pub indexqual: Vec<Expr>,
    /// Index conditions in original form.
    pub indexqualorig: Vec<Expr>,
    /// Ordering expressions in executable form.
    pub indexorderby: Vec<Expr>,
    /// Ordering expressions in original form.
    pub indexorderbyorig: Vec<Expr>,
    /// Ordering operators.
    pub indexorderbyops: Vec<Oid>,
    /// Scan direction.
    pub indexorderdir: ScanDirection,
}

/// `IndexOnlyScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexOnlyScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Index relation.
    pub indexid: Oid,
    /// Index conditions, referencing `indextlist` through `INDEX_VAR`.
    pub indexqual: Vec<Expr>,
    /// Conditions re-checked on lossy matches.
    pub recheckqual: Vec<Expr>,
    /// Ordering expressions.
    pub indexorderby: Vec<Expr>,
    /// Columns available from the index.
    pub indextlist: Vec<TargetEntry>,
    /// Scan direction.
    pub indexorderdir: ScanDirection,
}

/// `BitmapIndexScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BitmapIndexScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Index relation.
    pub indexid: Oid,
    /// Whether the bitmap is shared between workers.
    pub isshared: bool,
    /// Index conditions in executable form.
    pub indexqual: Vec<Expr>,
    /// Index conditions in original form.
    pub indexqualorig: Vec<Expr>,
}

/// `BitmapHeapScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BitmapHeapScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Index conditions re-checked against heap rows.
    pub bitmapqualorig: Vec<Expr>,
}

/// `TidScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TidScan {
    /// Scan prefix.
    pub scan: Scan,
    /// OR-ed tuple id conditions.
    pub tidquals: Vec<Expr>,
}

/// `TidRangeScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TidRangeScan {
    /// Scan prefix.
    pub scan: Scan,
    /// AND-ed tuple id range conditions.
    pub tidrangequals: Vec<Expr>,
}

/// Whether a sub-query scan can be elided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubqueryScanStatus {
    /// Not yet checked.
    #[default]
    Unknown,
    /// Projection-free pass-through.
    Trivial,
    /// Does real work.
    Nontrivial,
}

/// `SubqueryScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubqueryScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Plan of the sub-query.
    pub subplan: Box<Plan>,
    /// Elision status.
    pub scanstatus: SubqueryScanStatus,
}

/// `FunctionScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Functions whose results are zipped together.
    pub functions: Vec<RangeTblFunction>,
    /// `WITH ORDINALITY`.
    pub funcordinality: bool,
}

/// `ValuesScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValuesScan {
    /// Rows of expressions.
    pub values_lists: Vec<Vec<Expr>>,
    /// Scan prefix.
    pub scan: Scan,
}

/// `TableFuncScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableFuncScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Table function definition.
    pub tablefunc: TableFunc,
}

/// `CteScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CteScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Sub-plan id of the CTE's plan.
    pub cte_plan_id: i32,
    /// Param id signalling CTE output.
    pub cte_param: i32,
}

/// `NamedTuplestoreScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NamedTuplestoreScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Name of the ephemeral relation.
    pub enrname: String,
}

/// `WorkTableScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkTableScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Param id of the working table.
    pub wt_param: i32,
}

/// `ForeignScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForeignScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Command kind, for pushed-down modifications.
    pub operation: CmdType,
    /// Target relation of a pushed-down modification.
    pub result_relation: Index,
    /// User to check permissions as.
    pub check_as_user: Oid,
    /// Foreign server.
    pub fs_server: Oid,
    /// Expressions evaluated by the wrapper.
    pub fdw_exprs: Vec<Expr>,
    /// Target list describing the returned rows.
    pub fdw_scan_tlist: Vec<TargetEntry>,
    /// Quals re-checked locally.
    pub fdw_recheck_quals: Vec<Expr>,
    /// Range table indexes represented, including outer joins.
    pub fs_relids: Bitmapset,
    /// Base relation range table indexes represented.
    pub fs_base_relids: Bitmapset,
    /// Whether system columns are fetched.
    pub fs_system_col: bool,
}

/// `CustomScan` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomScan {
    /// Scan prefix.
    pub scan: Scan,
    /// Provider flags.
    pub flags: u32,
    /// Child plans.
    pub custom_plans: Vec<Plan>,
    /// Expressions evaluated by the provider.
    pub custom_exprs: Vec<Expr>,
    /// Target list describing the returned rows.
    pub custom_scan_tlist: Vec<TargetEntry>,
    /// Range table indexes represented.
    pub custom_relids: Bitmapset,
    /// Provider name.
    pub methods_name: String,
}

/// A param passed from the outer side of a nested loop to its inner side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NestLoopParam {
    /// Param id.
    pub paramno: i32,
    /// Outer column supplying the value.
    pub paramval: Var,
}

/// `NestLoop` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NestLoop {
    /// Join prefix.
    pub join: Join,
    /// Params supplied to the inner side.
    pub nest_params: Vec<NestLoopParam>,
}

/// `MergeJoin` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MergeJoin {
    /// Join prefix.
    pub join: Join,
    /// Whether mark/restore on the inner side can be skipped.
    pub skip_mark_restore: bool,
    /// Merge conditions.
    pub mergeclauses: Vec<Expr>,
    /// Operator families per clause.
    pub merge_families: Vec<Oid>,
    /// Collations per clause.
    pub merge_collations: Vec<Oid>,
    /// Descending order per clause.
    pub merge_reversals: Vec<bool>,
    /// Nulls-first per clause.
    pub merge_nulls_first: Vec<bool>,
}

/// `HashJoin` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HashJoin {
    /// Join prefix.
    pub join: Join,
    /// Hash conditions.
    pub hashclauses: Vec<Expr>,
    /// Equality operators per clause.
    pub hashoperators: Vec<Oid>,
    /// Collations per clause.
    pub hashcollations: Vec<Oid>,
    /// Outer-side hash keys.
    pub hashkeys: Vec<Expr>,
}

/// `Memoize` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Memoize {
    /// Cache key expressions.
    pub param_exprs: Vec<Expr>,
    /// Hash equality operators per key.
    pub hash_operators: Vec<Oid>,
    /// Collations per key.
    pub collations: Vec<Oid>,
    /// Each key yields at most one row.
    pub singlerow: bool,
    /// Keys compared bytewise rather than by equality operator.
    pub binary_mode: bool,
    /// Estimated cache capacity in entries.
    pub est_entries: u32,
    /// Params whose change invalidates the key.
    pub keyparamids: Bitmapset,
    /// Estimated lookups.
    pub est_calls: f64,
    /// Estimated distinct keys.
    pub est_unique_keys: f64,
    /// Estimated hit ratio in `[0, 1]`.
    pub est_hit_ratio: f64,
}

/// `Sort` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sort {
    /// Sort keys.
    pub sort_cols: Vec<SortColumn>,
}

/// `IncrementalSort` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncrementalSort {
    /// Sort prefix.
    pub sort: Sort,
    /// Number of leading keys the input is already sorted by.
    pub n_presorted_cols: usize,
}

/// `Group` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    /// Grouping keys.
    pub grp_cols: Vec<GroupColumn>,
}

/// How an `Agg` node groups its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggStrategy {
    /// Single group.
    #[default]
    Plain,
    /// Sorted input.
    Sorted,
    /// Hash table.
    Hashed,
    /// Mix of sorted and hashed grouping sets.
    Mixed,
}

/// `Agg` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Agg {
    /// Grouping strategy.
    pub aggstrategy: AggStrategy,
    /// Partial aggregation mode.
    pub aggsplit: super::primnodes::AggSplit,
    /// Grouping keys.
    pub grp_cols: Vec<GroupColumn>,
    /// Estimated group count.
    pub num_groups: i64,
    /// Estimated transition state size in bytes.
    pub transition_space: u64,
    /// Params used by aggregate arguments.
    pub agg_params: Bitmapset,
}

/// `WindowAgg` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowAgg {
    /// Window name for display.
    pub winname: Option<String>,
    /// Window clause reference.
    pub winref: Index,
    /// Partition keys.
    pub part_cols: Vec<GroupColumn>,
    /// Order keys.
    pub ord_cols: Vec<GroupColumn>,
    /// Frame option bits.
    pub frame_options: i32,
    /// Frame start offset.
    pub start_offset: Option<Expr>,
    /// Frame end offset.
    pub end_offset: Option<Expr>,
    /// Conditions that stop evaluation once false, executable form.
    pub run_condition: Vec<Expr>,
    /// Same conditions in original form.
    pub run_condition_orig: Vec<Expr>,
    /// Topmost window aggregate of the query level.
    pub top_window: bool,
}

/// `Unique` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Unique {
    /// Uniqueness keys.
    pub uniq_cols: Vec<GroupColumn>,
}

/// `Gather` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Gather {
    /// Planned worker count.
    pub num_workers: i32,
    /// Param signalling a rescan, or `-1`.
    pub rescan_param: i32,
    /// Run the child in exactly one process.
    pub single_copy: bool,
    /// Hide this node from EXPLAIN.
    pub invisible: bool,
    /// Params evaluated before starting workers.
    pub init_param: Bitmapset,
}

/// `GatherMerge` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GatherMerge {
    /// Planned worker count.
    pub num_workers: i32,
    /// Param signalling a rescan, or `-1`.
    pub rescan_param: i32,
    /// Merge keys.
    pub sort_cols: Vec<SortColumn>,
    /// Params evaluated before starting workers.
    pub init_param: Bitmapset,
}

/// `Hash` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hash {
    /// Inner-side hash keys.
    pub hashkeys: Vec<Expr>,
    /// Relation whose statistics drive skew handling.
    pub skew_table: Oid,
    /// Column driving skew handling.
    pub skew_column: AttrNumber,
    /// Whether skew statistics include inheritance children.
    pub skew_inherit: bool,
    /// Estimated total rows across all workers.
    pub rows_total: f64,
}

/// Set operation performed by `SetOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SetOpCmd {
    /// `INTERSECT`.
    #[default]
    Intersect,
    /// `INTERSECT ALL`.
    IntersectAll,
    /// `EXCEPT`.
    Except,
    /// `EXCEPT ALL`.
    ExceptAll,
}

/// How `SetOp` matches rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SetOpStrategy {
    /// Sorted input.
    #[default]
    Sorted,
    /// Hash table.
    Hashed,
}

/// `SetOp` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetOp {
    /// Operation.
    pub cmd: SetOpCmd,
    /// Strategy.
    pub strategy: SetOpStrategy,
    /// Comparison keys.
    pub cmp_cols: Vec<GroupColumn>,
    /// Estimated group count.
    pub num_groups: i64,
}

/// `LockRows` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LockRows {
    /// Relations to lock.
    pub row_marks: Vec<PlanRowMark>,
    /// Param id for re-check rows.
    pub epq_param: i32,
}

/// Whether `LIMIT` includes ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LimitOption {
    /// Plain count.
    #[default]
    Count,
    /// `FETCH ... WITH TIES`.
    WithTies,
}

/// `Limit` node data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Limit {
    /// `OFFSET`.
    pub limit_offset: Option<Expr>,
    /// `LIMIT`.
    pub limit_count: Option<Expr>,
    /// Tie handling.
    pub limit_option: LimitOption,
    /// Keys used to detect ties.
    pub uniq_cols: Vec<GroupColumn>,
}

impl PlanKind {
    /// Discriminator of this variant.
    pub fn tag(&self) -> NodeTag {
        match self {
            PlanKind::Result(_) => NodeTag::Result,
            PlanKind::ProjectSet => NodeTag::ProjectSet,
            PlanKind::ModifyTable(_) => NodeTag::ModifyTable,
            PlanKind::Append(_) => NodeTag::Append,
            PlanKind::MergeAppend(_) => NodeTag::MergeAppend,
            PlanKind::RecursiveUnion(_) => NodeTag::RecursiveUnion,
            PlanKind::BitmapAnd(_) => NodeTag::BitmapAnd,
            PlanKind::BitmapOr(_) => NodeTag::BitmapOr,
            PlanKind::SeqScan(_) => NodeTag::SeqScan,
            PlanKind::SampleScan(_) => NodeTag::SampleScan,
            PlanKind::IndexScan(_) => NodeTag::IndexScan,
            PlanKind::IndexOnlyScan(_) => NodeTag::IndexOnlyScan,
            PlanKind::BitmapIndexScan(_) => NodeTag::BitmapIndexScan,
            PlanKind::BitmapHeapScan(_) => NodeTag::BitmapHeapScan,
            PlanKind::TidScan(_) => NodeTag::TidScan,
            PlanKind::TidRangeScan(_) => NodeTag::TidRangeScan,
            PlanKind::SubqueryScan(_) => NodeTag::SubqueryScan,
            PlanKind::FunctionScan(_) => NodeTag::FunctionScan,
            PlanKind::ValuesScan(_) => NodeTag::ValuesScan,
            PlanKind::TableFuncScan(_) => NodeTag::TableFuncScan,
            PlanKind::CteScan(_) => NodeTag::CteScan,
            PlanKind::NamedTuplestoreScan(_) => NodeTag::NamedTuplestoreScan,
            PlanKind::WorkTableScan(_) => NodeTag::WorkTableScan,
            PlanKind::ForeignScan(_) => NodeTag::ForeignScan,
            PlanKind::CustomScan(_) => NodeTag::CustomScan,
            PlanKind::NestLoop(_) => NodeTag::NestLoop,
            PlanKind::MergeJoin(_) => NodeTag::MergeJoin,
            PlanKind::HashJoin(_) => NodeTag::HashJoin,
            PlanKind::Material => NodeTag::Material,
            PlanKind::Memoize(_) => NodeTag::Memoize,
            PlanKind::Sort(_) => NodeTag::Sort,
            PlanKind::IncrementalSort(_) => NodeTag::IncrementalSort,
            PlanKind::Group(_) => NodeTag::Group,
            PlanKind::Agg(_) => NodeTag::Agg,
            PlanKind::WindowAgg(_) => NodeTag::WindowAgg,
            PlanKind::Unique(_) => NodeTag::Unique,
            PlanKind::Gather(_) => NodeTag::Gather,
            PlanKind::GatherMerge(_) => NodeTag::GatherMerge,
            PlanKind::Hash(_) => NodeTag::Hash,
            PlanKind::SetOp(_) => NodeTag::SetOp,
            PlanKind::LockRows(_) => NodeTag::LockRows,
            PlanKind::Limit(_) => NodeTag::Limit,
        }
    }
}

impl Plan {
    /// Creates a node of the given variant with every common field zeroed.
    pub fn new(kind: PlanKind) -> Self {
        Plan {
            kind,
            ..Plan::default()
        }
    }

    /// Discriminator of this node.
    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    /// Runtime downcast check against the prefix chain.
    pub fn is_a(&self, tag: NodeTag) -> bool {
        self.tag().is_a(tag)
    }

    /// The embedded scan prefix, for scan nodes.
    pub fn as_scan(&self) -> Option<&Scan> {
        Some(match &self.kind {
            PlanKind::SeqScan(s) => &s.scan,
            PlanKind::SampleScan(s) => &s.scan,
            PlanKind::IndexScan(s) => &s.scan,
            PlanKind::IndexOnlyScan(s) => &s.scan,
            PlanKind::BitmapIndexScan(s) => &s.scan,
            PlanKind::BitmapHeapScan(s) => &s.scan,
            PlanKind::TidScan(s) => &s.scan,
            PlanKind::TidRangeScan(s) => &s.scan,
            PlanKind::SubqueryScan(s) => &s.scan,
            PlanKind::FunctionScan(s) => &s.scan,
            PlanKind::ValuesScan(s) => &s.scan,
            PlanKind::TableFuncScan(s) => &s.scan,
            PlanKind::CteScan(s) => &s.scan,
            PlanKind::NamedTuplestoreScan(s) => &s.scan,
            PlanKind::WorkTableScan(s) => &s.scan,
            PlanKind::ForeignScan(s) => &s.scan,
            PlanKind::CustomScan(s) => &s.scan,
            _ => return None,
        })
    }

    /// The embedded join prefix, for join nodes.
    pub fn as_join(&self) -> Option<&Join> {
        match &self.kind {
            PlanKind::NestLoop(j) => Some(&j.join),
            PlanKind::MergeJoin(j) => Some(&j.join),
            PlanKind::HashJoin(j) => Some(&j.join),
            _ => None,
        }
    }

    /// Outer child.
    pub fn outer_plan(&self) -> Option<&Plan> {
        self.lefttree.as_deref()
    }

    /// Inner child.
    pub fn inner_plan(&self) -> Option<&Plan> {
        self.righttree.as_deref()
    }

    /// Children held outside `lefttree`/`righttree`: append members, bitmap
    /// members, the sub-query of a sub-query scan and custom scan children.
    pub fn member_plans(&self) -> Vec<&Plan> {
        match &self.kind {
            PlanKind::Append(a) => a.appendplans.iter().collect(),
            PlanKind::MergeAppend(m) => m.mergeplans.iter().collect(),
            PlanKind::BitmapAnd(b) => b.bitmapplans.iter().collect(),
            PlanKind::BitmapOr(b) => b.bitmapplans.iter().collect(),
            PlanKind::SubqueryScan(s) => vec![&*s.subplan],
            PlanKind::CustomScan(c) => c.custom_plans.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`Plan::member_plans`].
    pub fn member_plans_mut(&mut self) -> Vec<&mut Plan> {
        match &mut self.kind {
            PlanKind::Append(a) => a.appendplans.iter_mut().collect(),
            PlanKind::MergeAppend(m) => m.mergeplans.iter_mut().collect(),
            PlanKind::BitmapAnd(b) => b.bitmapplans.iter_mut().collect(),
            PlanKind::BitmapOr(b) => b.bitmapplans.iter_mut().collect(),
            PlanKind::SubqueryScan(s) => vec![&mut *s.subplan],
            PlanKind::CustomScan(c) => c.custom_plans.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    /// All direct child plans: outer, inner, then members.
    pub fn child_plans(&self) -> Vec<&Plan> {
        let mut children: Vec<&Plan> = Vec::new();
        children.extend(self.lefttree.as_deref());
        children.extend(self.righttree.as_deref());
        children.extend(self.member_plans());
        children
    }

    /// Roots of every expression this node owns, excluding child plans and
    /// init plans.
    pub fn expr_roots(&self) -> Vec<&Expr> {
        let mut out: Vec<&Expr> = Vec::new();
        out.extend(self.targetlist.iter().map(|tle| &tle.expr));
        out.extend(&self.qual);
        match &self.kind {
            PlanKind::Result(r) => out.extend(&r.resconstantqual),
            PlanKind::ModifyTable(m) => {
                for list in &m.with_check_option_lists {
                    out.extend(list);
                }
                for list in &m.returning_lists {
                    out.extend(list.iter().map(|tle| &tle.expr));
                }
                out.extend(m.on_conflict_set.iter().map(|tle| &tle.expr));
                out.extend(m.on_conflict_where.as_ref());
                out.extend(m.excl_rel_tlist.iter().map(|tle| &tle.expr));
            }
            PlanKind::SampleScan(s) => {
                out.extend(&s.tablesample.args);
                out.extend(s.tablesample.repeatable.as_ref());
            }
            PlanKind::IndexScan(s) => {
                out.extend(&s.indexqual);
                out.extend(&s.indexqualorig);
                out.extend(&s.indexorderby);
                out.extend(&s.indexorderbyorig);
            }
            PlanKind::IndexOnlyScan(s) => {
                out.extend(&s.indexqual);
                out.extend(&s.recheckqual);
                out.extend(&s.indexorderby);
                out.extend(s.indextlist.iter().map(|tle| &tle.expr));
            }
            PlanKind::BitmapIndexScan(s) => {
                out.extend(&s.indexqual);
                out.extend(&s.indexqualorig);
            }
            PlanKind::BitmapHeapScan(s) => out.extend(&s.bitmapqualorig),
            PlanKind::TidScan(s) => out.extend(&s.tidquals),
            PlanKind::TidRangeScan(s) => out.extend(&s.tidrangequals),
            PlanKind::FunctionScan(s) => out.extend(s.functions.iter().map(|f| &f.funcexpr)),
            PlanKind::ValuesScan(s) => {
                for row in &s.values_lists {
                    out.extend(row);
                }
            }
            PlanKind::TableFuncScan(s) => {
                out.extend(s.tablefunc.docexpr.as_ref());
                out.extend(s.tablefunc.rowexpr.as_ref());
                out.extend(s.tablefunc.colexprs.iter().flatten());
            }
            PlanKind::ForeignScan(s) => {
                out.extend(&s.fdw_exprs);
                out.extend(s.fdw_scan_tlist.iter().map(|tle| &tle.expr));
                out.extend(&s.fdw_recheck_quals);
            }
            PlanKind::CustomScan(s) => {
                out.extend(&s.custom_exprs);
                out.extend(s.custom_scan_tlist.iter().map(|tle| &tle.expr));
            }
            PlanKind::NestLoop(j) => out.extend(&j.join.joinqual),
            PlanKind::MergeJoin(j) => {
                out.extend(&j.join.joinqual);
                out.extend(&j.mergeclauses);
            }
            PlanKind::HashJoin(j) => {
                out.extend(&j.join.joinqual);
                out.extend(&j.hashclauses);
                out.extend(&j.hashkeys);
            }
            PlanKind::Memoize(m) => out.extend(&m.param_exprs),
            PlanKind::WindowAgg(w) => {
                out.extend(w.start_offset.as_ref());
                out.extend(w.end_offset.as_ref());
                out.extend(&w.run_condition);
                out.extend(&w.run_condition_orig);
            }
            PlanKind::Hash(h) => out.extend(&h.hashkeys),
            PlanKind::Limit(l) => {
                out.extend(l.limit_offset.as_ref());
                out.extend(l.limit_count.as_ref());
            }
            PlanKind::ProjectSet
            | PlanKind::Append(_)
            | PlanKind::MergeAppend(_)
            | PlanKind::RecursiveUnion(_)
            | PlanKind::BitmapAnd(_)
            | PlanKind::BitmapOr(_)
            | PlanKind::SeqScan(_)
            | PlanKind::SubqueryScan(_)
            | PlanKind::CteScan(_)
            | PlanKind::NamedTuplestoreScan(_)
            | PlanKind::WorkTableScan(_)
            | PlanKind::Material
            | PlanKind::Sort(_)
            | PlanKind::IncrementalSort(_)
            | PlanKind::Group(_)
            | PlanKind::Agg(_)
            | PlanKind::Unique(_)
            | PlanKind::Gather(_)
            | PlanKind::GatherMerge(_)
            | PlanKind::SetOp(_)
            | PlanKind::LockRows(_) => {}
        }
        out
    }

    /// Mutable counterpart of [`Plan::expr_roots`], in the same order.
    pub fn expr_roots_mut(&mut self) -> Vec<&mut Expr> {
        let mut out: Vec<&mut Expr> = Vec::new();
        out.extend(self.targetlist.iter_mut().map(|tle| &mut tle.expr));
        out.extend(&mut self.qual);
        match &mut self.kind {
            PlanKind::Result(r) => out.extend(&mut r.resconstantqual),
            PlanKind::ModifyTable(m) => {
                for list in &mut m.with_check_option_lists {
                    out.extend(list);
                }
                for list in &mut m.returning_lists {
                    out.extend(list.iter_mut().map(|tle| &mut tle.expr));
                }
                out.extend(m.on_conflict_set.iter_mut().map(|tle| &mut tle.expr));
                out.extend(m.on_conflict_where.as_mut());
                out.extend(m.excl_rel_tlist.iter_mut().map(|tle| &mut tle.expr));
            }
            PlanKind::SampleScan(s) => {
                out.extend(&mut s.tablesample.args);
                out.extend(s.tablesample.repeatable.as_mut());
            }
            PlanKind::IndexScan(s) => {
                out.extend(&mut s.indexqual);
                out.extend(&mut s.indexqualorig);
                out.extend(&mut s.indexorderby);
                out.extend(&mut s.indexorderbyorig);
            }
            PlanKind::IndexOnlyScan(s) => {
                out.extend(&mut s.indexqual);
                out.extend(&mut s.recheckqual);
                out.extend(&mut s.indexorderby);
                out.extend(s.indextlist.iter_mut().map(|tle| &mut tle.expr));
            }
            PlanKind::BitmapIndexScan(s) => {
                out.extend(&mut s.indexqual);
                out.extend(&mut s.indexqualorig);
            }
            PlanKind::BitmapHeapScan(s) => out.extend(&mut s.bitmapqualorig),
            PlanKind::TidScan(s) => out.extend(&mut s.tidquals),
            PlanKind::TidRangeScan(s) => out.extend(&mut s.tidrangequals),
            PlanKind::FunctionScan(s) => {
                out.extend(s.functions.iter_mut().map(|f| &mut f.funcexpr))
            }
            PlanKind::ValuesScan(s) => {
                for row in &mut s.values_lists {
                    out.extend(row);
                }
            }
            PlanKind::TableFuncScan(s) => {
                out.extend(s.tablefunc.docexpr.as_mut());
                out.extend(s.tablefunc.rowexpr.as_mut());
                out.extend(s.tablefunc.colexprs.iter_mut().flatten());
            }
            PlanKind::ForeignScan(s) => {
                out.extend(&mut s.fdw_exprs);
                out.extend(s.fdw_scan_tlist.iter_mut().map(|tle| &mut tle.expr));
                out.extend(&mut s.fdw_recheck_quals);
            }
            PlanKind::CustomScan(s) => {
                out.extend(&mut s.custom_exprs);
                out.extend(s.custom_scan_tlist.iter_mut().map(|tle| &mut tle.expr));
            }
            PlanKind::NestLoop(j) => out.extend(&mut j.join.joinqual),
            PlanKind::MergeJoin(j) => {
                out.extend(&mut j.join.joinqual);
                out.extend(&mut j.mergeclauses);
            }
            PlanKind::HashJoin(j) => {
                out.extend(&mut j.join.joinqual);
                out.extend(&mut j.hashclauses);
                out.extend(&mut j.hashkeys);
            }
            PlanKind::Memoize(m) => out.extend(&mut m.param_exprs),
            PlanKind::WindowAgg(w) => {
                out.extend(w.start_offset.as_mut());
                out.extend(w.end_offset.as_mut());
                out.extend(&mut w.run_condition);
                out.extend(&mut w.run_condition_orig);
            }
            PlanKind::Hash(h) => out.extend(&mut h.hashkeys),
            PlanKind::Limit(l) => {
                out.extend(l.limit_offset.as_mut());
                out.extend(l.limit_count.as_mut());
            }
            PlanKind::ProjectSet
            | PlanKind::Append(_)
            | PlanKind::MergeAppend(_)
            | PlanKind::RecursiveUnion(_)
            | PlanKind::BitmapAnd(_)
            | PlanKind::BitmapOr(_)
            | PlanKind::SeqScan(_)
            | PlanKind::SubqueryScan(_)
            | PlanKind::CteScan(_)
            | PlanKind::NamedTuplestoreScan(_)
            | PlanKind::WorkTableScan(_)
            | PlanKind::Material
            | PlanKind::Sort(_)
            | PlanKind::IncrementalSort(_)
            | PlanKind::Group(_)
            | PlanKind::Agg(_)
            | PlanKind::Unique(_)
            | PlanKind::Gather(_)
            | PlanKind::GatherMerge(_)
            | PlanKind::SetOp(_)
            | PlanKind::LockRows(_) => {}
        }
        out
    }

    /// Sum of `disabled_nodes` over the direct children, widened so that
    /// counts read from untrusted plans cannot overflow.
    pub fn child_disabled_nodes(&self) -> i64 {
        self.child_plans()
            .iter()
            .map(|p| i64::from(p.disabled_nodes))
            .sum()
    }

    /// True when this node itself, rather than a descendant, is disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled_nodes > 0 && i64::from(self.disabled_nodes) > self.child_disabled_nodes()
    }
}

/// A finished plan for one statement plus the side data it refers to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlannedStmt {
    /// Statement kind.
    pub command_type: CmdType,
    /// Query fingerprint, `0` if not computed.
    pub query_id: u64,
    /// Has `RETURNING`.
    pub has_returning: bool,
    /// Has a data-modifying CTE.
    pub has_modifying_cte: bool,
    /// Sets the command tag.
    pub can_set_tag: bool,
    /// Must be re-planned when the transaction's snapshot changes.
    pub transient_plan: bool,
    /// Depends on the current role.
    pub depends_on_role: bool,
    /// Requires parallel mode.
    pub parallel_mode_needed: bool,
    /// JIT compilation flags.
    pub jit_flags: i32,
    /// Root of the plan tree.
    pub plan_tree: Plan,
    /// Range table.
    pub rtable: RangeTable,
    /// Range table indexes of relations that cannot be pruned.
    pub unprunable_relids: Bitmapset,
    /// Permission records.
    pub perm_infos: Vec<RtePermissionInfo>,
    /// Range table indexes of result relations.
    pub result_relations: Vec<Index>,
    /// Plans of sub-selects, indexed by `SubPlan::plan_id - 1`.
    pub subplans: Vec<Plan>,
    /// Ids of sub-plans that need rewind support.
    pub rewind_plan_ids: Bitmapset,
    /// Row marks for `FOR UPDATE` and friends.
    pub row_marks: Vec<PlanRowMark>,
    /// Relations the plan depends on.
    pub relation_oids: Vec<Oid>,
    /// Types of executor params, indexed by param id.
    pub param_exec_types: Vec<Oid>,
    /// Start of this statement in the source text.
    pub stmt_location: ParseLoc,
    /// Length of this statement in bytes; `0` means "to end of string".
    pub stmt_len: i32,
}

impl PlannedStmt {
    /// Wraps a plan tree with otherwise empty statement data.
    pub fn new(command_type: CmdType, plan_tree: Plan) -> Self {
        PlannedStmt {
            command_type,
            can_set_tag: true,
            plan_tree,
            ..PlannedStmt::default()
        }
    }

    /// Plan of the sub-select with the given one-based id.
    pub fn subplan(&self, plan_id: i32) -> Option<&Plan> {
        let idx = usize::try_from(plan_id).ok()?.checked_sub(1)?;
        self.subplans.get(idx)
    }
}
