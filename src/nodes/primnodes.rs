//! Expression nodes found in target lists, qualifiers and plan-specific
//! expression fields.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use super::parsenodes::Query;
use super::{AttrNumber, Bitmapset, Diagnostic, FnCache, Index, NodeTag, Oid, ParseLoc};

/// `varno` value referring to the inner child plan's target list.
pub const INNER_VAR: i32 = -1;
/// `varno` value referring to the outer child plan's target list.
pub const OUTER_VAR: i32 = -2;
/// `varno` value referring to an index or scan-specific target list.
pub const INDEX_VAR: i32 = -3;
/// `varno` value used for row identity columns.
pub const ROWID_VAR: i32 = -4;

/// A column reference.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Var {
    /// Range table index, or one of the special `*_VAR` values.
    pub varno: i32,
    /// Column number; `0` means the whole row.
    pub varattno: AttrNumber,
    /// Column type.
    pub vartype: Oid,
    /// Type modifier, `-1` when not applicable.
    pub vartypmod: i32,
    /// Collation, or `0`.
    pub varcollid: Oid,
    /// Outer joins that can null this column.
    pub varnullingrels: Bitmapset,
    /// How many query levels up the referenced relation lives.
    pub varlevelsup: u32,
    /// Syntactic range table index before join flattening.
    pub varnosyn: Diagnostic<Index>,
    /// Syntactic column number before join flattening.
    pub varattnosyn: Diagnostic<AttrNumber>,
    /// Token location.
    pub location: ParseLoc,
}

/// A constant's payload.
///
/// Payloads compare by representation, so a `NaN` float equals itself and
/// `0.0` differs from `-0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Datum {
    /// Boolean value.
    Bool(bool),
    /// Any integer-like value.
    Int(i64),
    /// Any floating point value.
    Float(#[serde(with = "float_text")] f64),
    /// Textual value; also used for types whose output form is text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

/// Non-finite floats are written as `"NaN"`, `"Infinity"` and `"-Infinity"`
/// since JSON has no literal for them.
mod float_text {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(t) => match t.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float datum \"{other}\""))),
            },
        }
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Bool(a), Datum::Bool(b)) => a == b,
            (Datum::Int(a), Datum::Int(b)) => a == b,
            (Datum::Float(a), Datum::Float(b)) => a.to_bits() == b.to_bits(),
            (Datum::Text(a), Datum::Text(b)) => a == b,
            (Datum::Bytes(a), Datum::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

/// A constant value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Const {
    /// Value type.
    pub consttype: Oid,
    /// Type modifier.
    pub consttypmod: i32,
    /// Collation.
    pub constcollid: Oid,
    /// Storage length; `-1` for variable length.
    pub constlen: i16,
    /// Payload, `None` for SQL NULL.
    pub constvalue: Option<Datum>,
    /// Whether the value is passed by value.
    pub constbyval: bool,
    /// Token location.
    pub location: ParseLoc,
}

impl Const {
    /// True for a NULL constant.
    pub fn is_null(&self) -> bool {
        self.constvalue.is_none()
    }
}

/// Where a parameter value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamKind {
    /// Supplied by the client (`$n`).
    #[default]
    Extern,
    /// Computed by the executor (nest loop or sub-plan output).
    Exec,
    /// Output column of a sub-link.
    Sublink,
    /// Output of a multi-assignment sub-select.
    Multiexpr,
}

/// A parameter reference.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Param {
    /// Parameter source.
    pub paramkind: ParamKind,
    /// Parameter number.
    pub paramid: i32,
    /// Parameter type.
    pub paramtype: Oid,
    /// Type modifier.
    pub paramtypmod: i32,
    /// Collation.
    pub paramcollid: Oid,
    /// Token location.
    pub location: ParseLoc,
}

/// How a function-like node was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoercionForm {
    /// `f(x)`.
    #[default]
    ExplicitCall,
    /// `x::type` or `CAST(x AS type)`.
    ExplicitCast,
    /// Inserted by the parser; not shown when deparsing.
    ImplicitCast,
    /// Special SQL syntax such as `EXTRACT`.
    SqlSyntax,
}

/// A function call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FuncExpr {
    /// Function id.
    pub funcid: Oid,
    /// Result type.
    pub funcresulttype: Oid,
    /// Whether the function returns a set.
    pub funcretset: bool,
    /// Whether variadic arguments were combined into an array.
    pub funcvariadic: bool,
    /// Display form.
    pub funcformat: CoercionForm,
    /// Result collation.
    pub funccollid: Oid,
    /// Input collation.
    pub inputcollid: Oid,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Executor lookup cache.
    #[serde(skip)]
    pub fn_cache: FnCache,
    /// Token location.
    pub location: ParseLoc,
}

/// A binary or prefix operator invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OpExpr {
    /// Operator id.
    pub opno: Oid,
    /// Underlying function id.
    pub opfuncid: Oid,
    /// Result type.
    pub opresulttype: Oid,
    /// Whether the operator returns a set.
    pub opretset: bool,
    /// Result collation.
    pub opcollid: Oid,
    /// Input collation.
    pub inputcollid: Oid,
    /// One (prefix) or two arguments.
    pub args: Vec<Expr>,
    /// Executor lookup cache.
    #[serde(skip)]
    pub fn_cache: FnCache,
    /// Token location.
    pub location: ParseLoc,
}

/// `scalar op ANY/ALL (array)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScalarArrayOpExpr {
    /// Operator id.
    pub opno: Oid,
    /// Underlying function id.
    pub opfuncid: Oid,
    /// `true` for ANY, `false` for ALL.
    pub use_or: bool,
    /// Input collation.
    pub inputcollid: Oid,
    /// Scalar and array arguments.
    pub args: Vec<Expr>,
    /// Token location.
    pub location: ParseLoc,
}

/// Boolean connective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoolExprType {
    /// Conjunction.
    #[default]
    And,
    /// Disjunction.
    Or,
    /// Negation.
    Not,
}

/// `AND` / `OR` / `NOT`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoolExpr {
    /// Connective.
    pub boolop: BoolExprType,
    /// Operands.
    pub args: Vec<Expr>,
    /// Token location.
    pub location: ParseLoc,
}

/// Aggregate flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggKind {
    /// Plain aggregate.
    #[default]
    Normal,
    /// `WITHIN GROUP` ordered-set aggregate.
    OrderedSet,
    /// Hypothetical-set aggregate.
    HypotheticalSet,
}

/// Bit flags describing partial aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggSplit(pub u8);

impl AggSplit {
    /// Inputs are partial transition values.
    pub const COMBINE: u8 = 0x01;
    /// Do not apply the final function.
    pub const SKIPFINAL: u8 = 0x02;
    /// Serialize transition values.
    pub const SERIALIZE: u8 = 0x04;
    /// Deserialize transition values.
    pub const DESERIALIZE: u8 = 0x08;

    /// Ordinary one-stage aggregation.
    pub const SIMPLE: AggSplit = AggSplit(0);
    /// Lower half of a two-stage aggregation.
    pub const INITIAL_SERIAL: AggSplit = AggSplit(Self::SKIPFINAL | Self::SERIALIZE);
    /// Upper half of a two-stage aggregation.
    pub const FINAL_DESERIAL: AggSplit = AggSplit(Self::COMBINE | Self::DESERIALIZE);

    /// True when combining partial states.
    pub fn combine(self) -> bool {
        self.0 & Self::COMBINE != 0
    }

    /// True when the final function is skipped.
    pub fn skip_final(self) -> bool {
        self.0 & Self::SKIPFINAL != 0
    }
}

/// A sort or grouping clause item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SortGroupClause {
    /// Matches a `TargetEntry::ressortgroupref`.
    pub tle_sort_group_ref: Index,
    /// Equality operator.
    pub eqop: Oid,
    /// Ordering operator, `0` if not sortable.
    pub sortop: Oid,
    /// Whether nulls sort first.
    pub nulls_first: bool,
    /// Whether hashing is possible.
    pub hashable: bool,
}

/// An aggregate call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggref {
    /// Aggregate function id.
    pub aggfnoid: Oid,
    /// Result type.
    pub aggtype: Oid,
    /// Result collation.
    pub aggcollid: Oid,
    /// Input collation.
    pub inputcollid: Oid,
    /// Resolved transition type.
    pub aggtranstype: Oid,
    /// Declared argument types.
    pub aggargtypes: Vec<Oid>,
    /// Direct arguments of an ordered-set aggregate.
    pub aggdirectargs: Vec<Expr>,
    /// Aggregated arguments.
    pub args: Vec<TargetEntry>,
    /// `ORDER BY` inside the call.
    pub aggorder: Vec<SortGroupClause>,
    /// `DISTINCT` inside the call.
    pub aggdistinct: Vec<SortGroupClause>,
    /// `FILTER (WHERE ...)`.
    pub aggfilter: Option<Expr>,
    /// `agg(*)`.
    pub aggstar: bool,
    /// Whether a `VARIADIC` array was passed.
    pub aggvariadic: bool,
    /// Aggregate flavour.
    pub aggkind: AggKind,
    /// Query levels up of the aggregate's level.
    pub agglevelsup: u32,
    /// Partial aggregation mode.
    pub aggsplit: AggSplit,
    /// Aggregate number within the plan node.
    pub aggno: i32,
    /// Transition state number within the plan node.
    pub aggtransno: i32,
    /// Token location.
    pub location: ParseLoc,
}

/// A window function call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowFunc {
    /// Function id.
    pub winfnoid: Oid,
    /// Result type.
    pub wintype: Oid,
    /// Result collation.
    pub wincollid: Oid,
    /// Input collation.
    pub inputcollid: Oid,
    /// Arguments.
    pub args: Vec<Expr>,
    /// `FILTER (WHERE ...)`.
    pub aggfilter: Option<Expr>,
    /// Index of the owning window clause.
    pub winref: Index,
    /// `f(*)`.
    pub winstar: bool,
    /// Whether this is a plain aggregate used as a window function.
    pub winagg: bool,
    /// Token location.
    pub location: ParseLoc,
}

/// Flavour of a sub-select in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubLinkType {
    /// `EXISTS (...)`.
    Exists,
    /// `x op ALL (...)`.
    All,
    /// `x op ANY (...)`.
    Any,
    /// `(a, b) op (...)`.
    RowCompare,
    /// Scalar sub-select.
    #[default]
    Expr,
    /// Multi-column assignment source.
    MultiExpr,
    /// `ARRAY(...)`.
    Array,
    /// Only used for CTE sub-plans.
    Cte,
}

/// An unplanned sub-select.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubLink {
    /// Flavour.
    pub sub_link_type: SubLinkType,
    /// Id for multi-assignment sub-links.
    pub sub_link_id: i32,
    /// Combining expression for ANY/ALL/row comparisons.
    pub testexpr: Option<Expr>,
    /// Operator name for ANY/ALL/row comparisons.
    pub oper_name: Vec<String>,
    /// The sub-select.
    pub subselect: Box<Query>,
    /// Token location.
    pub location: ParseLoc,
}

/// A planned sub-select.
///
/// `plan_id` refers to an entry of `PlannedStmt::subplans`; the referenced
/// plan is owned by the statement, never by this node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubPlan {
    /// Flavour.
    pub sub_link_type: SubLinkType,
    /// Combining expression, referencing output params by id.
    pub testexpr: Option<Expr>,
    /// Output params the test expression consumes.
    pub param_ids: Vec<i32>,
    /// One-based index into `PlannedStmt::subplans`.
    pub plan_id: i32,
    /// Display name, e.g. `SubPlan 1` or `InitPlan 2`.
    pub plan_name: String,
    /// Type of the first output column.
    pub first_col_type: Oid,
    /// Typmod of the first output column.
    pub first_col_typmod: i32,
    /// Collation of the first output column.
    pub first_col_collation: Oid,
    /// Whether results are stored in a hash table.
    pub use_hash_table: bool,
    /// Whether unknown may be treated as false.
    pub unknown_eq_false: bool,
    /// Whether the sub-plan may run in a worker.
    pub parallel_safe: bool,
    /// Params set by an init plan.
    pub set_param: Vec<i32>,
    /// Params passed down from the parent.
    pub par_param: Vec<i32>,
    /// Values for `par_param`.
    pub args: Vec<Expr>,
    /// Estimated startup cost.
    pub startup_cost: f64,
    /// Estimated cost per call.
    pub per_call_cost: f64,
}

/// Extracts one field from a composite value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldSelect {
    /// Composite input.
    pub arg: Expr,
    /// Field number.
    pub fieldnum: AttrNumber,
    /// Field type.
    pub resulttype: Oid,
    /// Field typmod.
    pub resulttypmod: i32,
    /// Field collation.
    pub resultcollid: Oid,
}

/// Replaces fields of a composite value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldStore {
    /// Composite input.
    pub arg: Expr,
    /// New field values.
    pub newvals: Vec<Expr>,
    /// Field numbers being replaced.
    pub fieldnums: Vec<AttrNumber>,
    /// Composite result type.
    pub resulttype: Oid,
}

/// Binary-compatible relabeling.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelabelType {
    /// Input.
    pub arg: Expr,
    /// Output type.
    pub resulttype: Oid,
    /// Output typmod.
    pub resulttypmod: i32,
    /// Output collation.
    pub resultcollid: Oid,
    /// Display form.
    pub relabelformat: CoercionForm,
    /// Token location.
    pub location: ParseLoc,
}

/// Coercion through text I/O.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoerceViaIO {
    /// Input.
    pub arg: Expr,
    /// Output type.
    pub resulttype: Oid,
    /// Output collation.
    pub resultcollid: Oid,
    /// Display form.
    pub coerceformat: CoercionForm,
    /// Token location.
    pub location: ParseLoc,
}

/// Element-wise array coercion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayCoerceExpr {
    /// Input array.
    pub arg: Expr,
    /// Per-element expression, reading the element through a `CaseTestExpr`.
    pub elemexpr: Expr,
    /// Output type.
    pub resulttype: Oid,
    /// Output typmod.
    pub resulttypmod: i32,
    /// Output collation.
    pub resultcollid: Oid,
    /// Display form.
    pub coerceformat: CoercionForm,
    /// Token location.
    pub location: ParseLoc,
}

/// Conversion between row types of an inheritance tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConvertRowtypeExpr {
    /// Input row.
    pub arg: Expr,
    /// Output row type.
    pub resulttype: Oid,
    /// Display form.
    pub convertformat: CoercionForm,
    /// Token location.
    pub location: ParseLoc,
}

/// `expr COLLATE name`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollateExpr {
    /// Input.
    pub arg: Expr,
    /// Collation.
    pub coll_oid: Oid,
    /// Token location.
    pub location: ParseLoc,
}

/// `CASE ... END`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaseExpr {
    /// Result type.
    pub casetype: Oid,
    /// Result collation.
    pub casecollid: Oid,
    /// Comparison subject for the simple form.
    pub arg: Option<Expr>,
    /// `WHEN` arms.
    pub args: Vec<CaseWhen>,
    /// `ELSE` result.
    pub defresult: Option<Expr>,
    /// Token location.
    pub location: ParseLoc,
}

/// One `WHEN cond THEN result` arm.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaseWhen {
    /// Condition.
    pub expr: Expr,
    /// Result.
    pub result: Expr,
    /// Token location.
    pub location: ParseLoc,
}

/// Placeholder for a value supplied by an enclosing expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaseTestExpr {
    /// Value type.
    pub type_id: Oid,
    /// Value typmod.
    pub type_mod: i32,
    /// Value collation.
    pub collation: Oid,
}

/// `ARRAY[...]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayExpr {
    /// Array type.
    pub array_typeid: Oid,
    /// Array collation.
    pub array_collid: Oid,
    /// Element type.
    pub element_typeid: Oid,
    /// Elements.
    pub elements: Vec<Expr>,
    /// Whether elements are themselves arrays.
    pub multidims: bool,
    /// Token location.
    pub location: ParseLoc,
}

/// `ROW(...)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowExpr {
    /// Fields.
    pub args: Vec<Expr>,
    /// Row type.
    pub row_typeid: Oid,
    /// Display form.
    pub row_format: CoercionForm,
    /// Field names.
    pub colnames: Vec<String>,
    /// Token location.
    pub location: ParseLoc,
}

/// `COALESCE(...)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoalesceExpr {
    /// Result type.
    pub coalescetype: Oid,
    /// Result collation.
    pub coalescecollid: Oid,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Token location.
    pub location: ParseLoc,
}

/// Which extreme a `MinMaxExpr` picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MinMaxOp {
    /// `GREATEST(...)`.
    #[default]
    Greatest,
    /// `LEAST(...)`.
    Least,
}

/// `GREATEST(...)` / `LEAST(...)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MinMaxExpr {
    /// Result type.
    pub minmaxtype: Oid,
    /// Result collation.
    pub minmaxcollid: Oid,
    /// Input collation.
    pub inputcollid: Oid,
    /// Which extreme.
    pub op: MinMaxOp,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Token location.
    pub location: ParseLoc,
}

/// `IS [NOT] NULL` flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NullTestType {
    /// `IS NULL`.
    #[default]
    IsNull,
    /// `IS NOT NULL`.
    IsNotNull,
}

/// `expr IS [NOT] NULL`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NullTest {
    /// Input.
    pub arg: Expr,
    /// Flavour.
    pub nulltesttype: NullTestType,
    /// Whether the input is a row tested field-wise.
    pub argisrow: bool,
    /// Token location.
    pub location: ParseLoc,
}

/// `IS [NOT] TRUE/FALSE/UNKNOWN` flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoolTestType {
    /// `IS TRUE`.
    #[default]
    IsTrue,
    /// `IS NOT TRUE`.
    IsNotTrue,
    /// `IS FALSE`.
    IsFalse,
    /// `IS NOT FALSE`.
    IsNotFalse,
    /// `IS UNKNOWN`.
    IsUnknown,
    /// `IS NOT UNKNOWN`.
    IsNotUnknown,
}

/// `expr IS [NOT] TRUE/FALSE/UNKNOWN`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BooleanTest {
    /// Input.
    pub arg: Expr,
    /// Flavour.
    pub booltesttype: BoolTestType,
    /// Token location.
    pub location: ParseLoc,
}

/// Coercion to a domain type with constraint checks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoerceToDomain {
    /// Input.
    pub arg: Expr,
    /// Domain type.
    pub resulttype: Oid,
    /// Domain typmod.
    pub resulttypmod: i32,
    /// Domain collation.
    pub resultcollid: Oid,
    /// Display form.
    pub coercionformat: CoercionForm,
    /// Token location.
    pub location: ParseLoc,
}

/// The `VALUE` placeholder inside a domain check constraint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoerceToDomainValue {
    /// Base type.
    pub type_id: Oid,
    /// Base typmod.
    pub type_mod: i32,
    /// Collation.
    pub collation: Oid,
    /// Token location.
    pub location: ParseLoc,
}

/// One column of a target list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetEntry {
    /// Computed value.
    pub expr: Expr,
    /// Column position, starting at 1.
    pub resno: AttrNumber,
    /// Column name, if any.
    pub resname: Option<String>,
    /// Non-zero when referenced by a sort or group clause.
    pub ressortgroupref: Index,
    /// Source table, if a simple column reference.
    pub resorigtbl: Oid,
    /// Source column, if a simple column reference.
    pub resorigcol: AttrNumber,
    /// Computed for internal use only and hidden from the client.
    pub resjunk: bool,
}

/// Any expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column reference.
    Var(Box<Var>),
    /// Constant.
    Const(Box<Const>),
    /// Parameter reference.
    Param(Box<Param>),
    /// Aggregate call.
    Aggref(Box<Aggref>),
    /// Window function call.
    WindowFunc(Box<WindowFunc>),
    /// Function call.
    FuncExpr(Box<FuncExpr>),
    /// Operator call.
    OpExpr(Box<OpExpr>),
    /// `op ANY/ALL (array)`.
    ScalarArrayOpExpr(Box<ScalarArrayOpExpr>),
    /// `AND` / `OR` / `NOT`.
    BoolExpr(Box<BoolExpr>),
    /// Unplanned sub-select.
    SubLink(Box<SubLink>),
    /// Planned sub-select.
    SubPlan(Box<SubPlan>),
    /// Composite field extraction.
    FieldSelect(Box<FieldSelect>),
    /// Composite field replacement.
    FieldStore(Box<FieldStore>),
    /// Binary-compatible relabel.
    RelabelType(Box<RelabelType>),
    /// I/O coercion.
    CoerceViaIO(Box<CoerceViaIO>),
    /// Array element coercion.
    ArrayCoerceExpr(Box<ArrayCoerceExpr>),
    /// Row type conversion.
    ConvertRowtypeExpr(Box<ConvertRowtypeExpr>),
    /// `COLLATE`.
    CollateExpr(Box<CollateExpr>),
    /// `CASE`.
    CaseExpr(Box<CaseExpr>),
    /// Placeholder inside `CASE` and array coercions.
    CaseTestExpr(Box<CaseTestExpr>),
    /// `ARRAY[...]`.
    ArrayExpr(Box<ArrayExpr>),
    /// `ROW(...)`.
    RowExpr(Box<RowExpr>),
    /// `COALESCE(...)`.
    CoalesceExpr(Box<CoalesceExpr>),
    /// `GREATEST` / `LEAST`.
    MinMaxExpr(Box<MinMaxExpr>),
    /// `IS [NOT] NULL`.
    NullTest(Box<NullTest>),
    /// `IS [NOT] TRUE/FALSE/UNKNOWN`.
    BooleanTest(Box<BooleanTest>),
    /// Domain coercion.
    CoerceToDomain(Box<CoerceToDomain>),
    /// Domain `VALUE` placeholder.
    CoerceToDomainValue(Box<CoerceToDomainValue>),
}

impl Default for Expr {
    fn default() -> Self {
        Expr::Const(Box::default())
    }
}

impl Expr {
    /// Discriminator of this expression.
    pub fn tag(&self) -> NodeTag {
        match self {
            Expr::Var(_) => NodeTag::Var,
            Expr::Const(_) => NodeTag::Const,
            Expr::Param(_) => NodeTag::Param,
            Expr::Aggref(_) => NodeTag::Aggref,
            Expr::WindowFunc(_) => NodeTag::WindowFunc,
            Expr::FuncExpr(_) => NodeTag::FuncExpr,
            Expr::OpExpr(_) => NodeTag::OpExpr,
            Expr::ScalarArrayOpExpr(_) => NodeTag::ScalarArrayOpExpr,
            Expr::BoolExpr(_) => NodeTag::BoolExpr,
            Expr::SubLink(_) => NodeTag::SubLink,
            Expr::SubPlan(_) => NodeTag::SubPlan,
            Expr::FieldSelect(_) => NodeTag::FieldSelect,
            Expr::FieldStore(_) => NodeTag::FieldStore,
            Expr::RelabelType(_) => NodeTag::RelabelType,
            Expr::CoerceViaIO(_) => NodeTag::CoerceViaIO,
            Expr::ArrayCoerceExpr(_) => NodeTag::ArrayCoerceExpr,
            Expr::ConvertRowtypeExpr(_) => NodeTag::ConvertRowtypeExpr,
            Expr::CollateExpr(_) => NodeTag::CollateExpr,
            Expr::CaseExpr(_) => NodeTag::CaseExpr,
            Expr::CaseTestExpr(_) => NodeTag::CaseTestExpr,
            Expr::ArrayExpr(_) => NodeTag::ArrayExpr,
            Expr::RowExpr(_) => NodeTag::RowExpr,
            Expr::CoalesceExpr(_) => NodeTag::CoalesceExpr,
            Expr::MinMaxExpr(_) => NodeTag::MinMaxExpr,
            Expr::NullTest(_) => NodeTag::NullTest,
            Expr::BooleanTest(_) => NodeTag::BooleanTest,
            Expr::CoerceToDomain(_) => NodeTag::CoerceToDomain,
            Expr::CoerceToDomainValue(_) => NodeTag::CoerceToDomainValue,
        }
    }

    /// Returns the column reference, if this is one.
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Expr::Var(var) => Some(var),
            _ => None,
        }
    }

    /// Returns the constant, if this is one.
    pub fn as_const(&self) -> Option<&Const> {
        match self {
            Expr::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Calls `f` on each direct child expression, in a fixed order, stopping
    /// at the first break.
    pub fn try_visit_children<'a, B>(
        &'a self,
        f: &mut dyn FnMut(&'a Expr) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        match self {
            Expr::Var(_)
            | Expr::Const(_)
            | Expr::Param(_)
            | Expr::CaseTestExpr(_)
            | Expr::CoerceToDomainValue(_) => {}
            Expr::Aggref(agg) => {
                for arg in &agg.aggdirectargs {
                    f(arg)?;
                }
                for tle in &agg.args {
                    f(&tle.expr)?;
                }
                if let Some(filter) = &agg.aggfilter {
                    f(filter)?;
                }
            }
            Expr::WindowFunc(wf) => {
                for arg in &wf.args {
                    f(arg)?;
                }
                if let Some(filter) = &wf.aggfilter {
                    f(filter)?;
                }
            }
            Expr::FuncExpr(e) => e.args.iter().try_for_each(&mut *f)?,
            Expr::OpExpr(e) => e.args.iter().try_for_each(&mut *f)?,
            Expr::ScalarArrayOpExpr(e) => e.args.iter().try_for_each(&mut *f)?,
            Expr::BoolExpr(e) => e.args.iter().try_for_each(&mut *f)?,
            Expr::SubLink(sublink) => {
                if let Some(test) = &sublink.testexpr {
                    f(test)?;
                }
            }
            Expr::SubPlan(subplan) => {
                if let Some(test) = &subplan.testexpr {
                    f(test)?;
                }
                subplan.args.iter().try_for_each(&mut *f)?;
            }
            Expr::FieldSelect(e) => f(&e.arg)?,
            Expr::FieldStore(e) => {
                f(&e.arg)?;
                e.newvals.iter().try_for_each(&mut *f)?;
            }
            Expr::RelabelType(e) => f(&e.arg)?,
            Expr::CoerceViaIO(e) => f(&e.arg)?,
            Expr::ArrayCoerceExpr(e) => {
                f(&e.arg)?;
                f(&e.elemexpr)?;
            }
            Expr::ConvertRowtypeExpr(e) => f(&e.arg)?,
            Expr::CollateExpr(e) => f(&e.arg)?,
            Expr::CaseExpr(case) => {
                if let Some(arg) = &case.arg {
                    f(arg)?;
                }
                for when in &case.args {
                    f(&when.expr)?;
                    f(&when.result)?;
                }
                if let Some(def) = &case.defresult {
                    f(def)?;
                }
            }
            Expr::ArrayExpr(e) => e.elements.iter().try_for_each(&mut *f)?,
            Expr::RowExpr(e) => e.args.iter().try_for_each(&mut *f)?,
            Expr::CoalesceExpr(e) => e.args.iter().try_for_each(&mut *f)?,
            Expr::MinMaxExpr(e) => e.args.iter().try_for_each(&mut *f)?,
            Expr::NullTest(e) => f(&e.arg)?,
            Expr::BooleanTest(e) => f(&e.arg)?,
            Expr::CoerceToDomain(e) => f(&e.arg)?,
        }
        ControlFlow::Continue(())
    }

    /// Calls `f` on each direct child expression.
    pub fn visit_children<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        let _ = self.try_visit_children::<()>(&mut |child| {
            f(child);
            ControlFlow::Continue(())
        });
    }

    /// Direct child expressions, in visiting order.
    pub fn children(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.visit_children(&mut |child| out.push(child));
        out
    }

    /// Calls `f` on each direct child expression mutably, in the same order
    /// as [`Expr::try_visit_children`].
    pub fn visit_mut_children(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        match self {
            Expr::Var(_)
            | Expr::Const(_)
            | Expr::Param(_)
            | Expr::CaseTestExpr(_)
            | Expr::CoerceToDomainValue(_) => {}
            Expr::Aggref(agg) => {
                agg.aggdirectargs.iter_mut().for_each(&mut *f);
                for tle in &mut agg.args {
                    f(&mut tle.expr);
                }
                if let Some(filter) = &mut agg.aggfilter {
                    f(filter);
                }
            }
            Expr::WindowFunc(wf) => {
                wf.args.iter_mut().for_each(&mut *f);
                if let Some(filter) = &mut wf.aggfilter {
                    f(filter);
                }
            }
            Expr::FuncExpr(e) => e.args.iter_mut().for_each(f),
            Expr::OpExpr(e) => e.args.iter_mut().for_each(f),
            Expr::ScalarArrayOpExpr(e) => e.args.iter_mut().for_each(f),
            Expr::BoolExpr(e) => e.args.iter_mut().for_each(f),
            Expr::SubLink(sublink) => {
                if let Some(test) = &mut sublink.testexpr {
                    f(test);
                }
            }
            Expr::SubPlan(subplan) => {
                if let Some(test) = &mut subplan.testexpr {
                    f(test);
                }
                subplan.args.iter_mut().for_each(f);
            }
            Expr::FieldSelect(e) => f(&mut e.arg),
            Expr::FieldStore(e) => {
                f(&mut e.arg);
                e.newvals.iter_mut().for_each(f);
            }
            Expr::RelabelType(e) => f(&mut e.arg),
            Expr::CoerceViaIO(e) => f(&mut e.arg),
            Expr::ArrayCoerceExpr(e) => {
                f(&mut e.arg);
                f(&mut e.elemexpr);
            }
            Expr::ConvertRowtypeExpr(e) => f(&mut e.arg),
            Expr::CollateExpr(e) => f(&mut e.arg),
            Expr::CaseExpr(case) => {
                if let Some(arg) = &mut case.arg {
                    f(arg);
                }
                for when in &mut case.args {
                    f(&mut when.expr);
                    f(&mut when.result);
                }
                if let Some(def) = &mut case.defresult {
                    f(def);
                }
            }
            Expr::ArrayExpr(e) => e.elements.iter_mut().for_each(f),
            Expr::RowExpr(e) => e.args.iter_mut().for_each(f),
            Expr::CoalesceExpr(e) => e.args.iter_mut().for_each(f),
            Expr::MinMaxExpr(e) => e.args.iter_mut().for_each(f),
            Expr::NullTest(e) => f(&mut e.arg),
            Expr::BooleanTest(e) => f(&mut e.arg),
            Expr::CoerceToDomain(e) => f(&mut e.arg),
        }
    }
}
