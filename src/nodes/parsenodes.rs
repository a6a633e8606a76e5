//! Parse-side records that survive into planned statements: range table
//! entries, permission info, aliases, option elements and a minimal analyzed
//! [`Query`] used by the query-tree walker.

use serde::{Deserialize, Serialize};

use super::plannodes::CmdType;
use super::primnodes::{Expr, SortGroupClause, TargetEntry};
use super::{AttrNumber, Bitmapset, Index, Oid, ParseLoc};
use crate::error::{PlanError, Result};

/// A table or column alias list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Alias {
    /// Relation alias.
    pub aliasname: String,
    /// Column aliases, possibly fewer than the relation has columns.
    pub colnames: Vec<String>,
}

impl Alias {
    /// Alias without column names.
    pub fn new(name: impl Into<String>) -> Self {
        Alias {
            aliasname: name.into(),
            colnames: Vec::new(),
        }
    }
}

/// Join semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JoinType {
    /// Matching pairs only.
    #[default]
    Inner,
    /// Plus unmatched outer rows.
    Left,
    /// Plus unmatched rows of both sides.
    Full,
    /// Plus unmatched inner rows.
    Right,
    /// Outer rows with at least one match.
    Semi,
    /// Outer rows with no match.
    Anti,
    /// Inner rows with at least one match.
    RightSemi,
    /// Inner rows with no match.
    RightAnti,
    /// Inner side made unique, then inner-joined.
    UniqueOuter,
    /// Outer side made unique, then inner-joined.
    UniqueInner,
}

impl JoinType {
    /// Name used in node headers and the `Join Type` property.
    pub fn display_name(self) -> &'static str {
        match self {
            JoinType::Inner => "Inner",
            JoinType::Left => "Left",
            JoinType::Full => "Full",
            JoinType::Right => "Right",
            JoinType::Semi => "Semi",
            JoinType::Anti => "Anti",
            JoinType::RightSemi => "Right Semi",
            JoinType::RightAnti => "Right Anti",
            JoinType::UniqueOuter => "Unique Outer",
            JoinType::UniqueInner => "Unique Inner",
        }
    }
}

/// One function of a `FROM` function call list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeTblFunction {
    /// The call.
    pub funcexpr: Expr,
    /// Number of output columns.
    pub funccolcount: i32,
    /// Column names for a record-returning function.
    pub funccolnames: Vec<String>,
    /// Column types for a record-returning function.
    pub funccoltypes: Vec<Oid>,
    /// Executor params the call depends on.
    pub funcparams: Bitmapset,
}

/// `TABLESAMPLE method (args) [REPEATABLE (seed)]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableSampleClause {
    /// Sampling method handler function.
    pub tsmhandler: Oid,
    /// Method arguments.
    pub args: Vec<Expr>,
    /// Seed expression.
    pub repeatable: Option<Expr>,
}

/// Kind of table function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableFuncType {
    /// `XMLTABLE`.
    #[default]
    XmlTable,
    /// `JSON_TABLE`.
    JsonTable,
}

/// `XMLTABLE` / `JSON_TABLE` definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableFunc {
    /// Function kind.
    pub functype: TableFuncType,
    /// Input document.
    pub docexpr: Option<Expr>,
    /// Row-generating path expression.
    pub rowexpr: Option<Expr>,
    /// Output column names.
    pub colnames: Vec<String>,
    /// Output column types.
    pub coltypes: Vec<Oid>,
    /// Per-column path expressions.
    pub colexprs: Vec<Option<Expr>>,
    /// Token location.
    pub location: ParseLoc,
}

/// Per-relation permission requirements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RtePermissionInfo {
    /// Relation.
    pub relid: Oid,
    /// Whether inheritance children are checked too.
    pub inh: bool,
    /// Required privilege bits.
    pub required_perms: u64,
    /// User to check as, `0` for the current user.
    pub check_as_user: Oid,
    /// Columns read.
    pub selected_cols: Bitmapset,
    /// Columns inserted.
    pub inserted_cols: Bitmapset,
    /// Columns updated.
    pub updated_cols: Bitmapset,
}

/// Variant data of a range table entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RteKind {
    /// A physical relation.
    Relation {
        /// Relation oid.
        relid: Oid,
        /// Relation kind code (`r`, `v`, `m`, `p`, `f`, ...).
        relkind: char,
        /// Lock mode acquired at executor start.
        rellockmode: i32,
        /// One-based index into the permission list, `0` if none.
        perminfoindex: Index,
        /// Include inheritance children.
        inh: bool,
        /// `TABLESAMPLE` clause.
        tablesample: Option<TableSampleClause>,
    },
    /// A sub-select in `FROM`; the query is dropped once planned.
    Subquery {
        /// The sub-select, if still attached.
        subquery: Option<Box<Query>>,
    },
    /// A join.
    Join {
        /// Join semantics.
        jointype: JoinType,
        /// Number of merged `USING` columns.
        joinmergedcols: i32,
        /// Expressions for each join output column.
        joinaliasvars: Vec<Expr>,
        /// Left input column numbers.
        joinleftcols: Vec<AttrNumber>,
        /// Right input column numbers.
        joinrightcols: Vec<AttrNumber>,
    },
    /// Function calls in `FROM`.
    Function {
        /// The calls.
        functions: Vec<RangeTblFunction>,
        /// `WITH ORDINALITY`.
        funcordinality: bool,
    },
    /// `XMLTABLE` / `JSON_TABLE`.
    TableFunc {
        /// Definition.
        tablefunc: TableFunc,
    },
    /// `VALUES` list.
    Values {
        /// Rows.
        values_lists: Vec<Vec<Expr>>,
    },
    /// CTE reference.
    Cte {
        /// CTE name.
        ctename: String,
        /// Query levels up of the CTE definition.
        ctelevelsup: u32,
        /// Recursive self-reference.
        self_reference: bool,
    },
    /// Ephemeral named relation such as a transition table.
    NamedTuplestore {
        /// Relation name.
        enrname: String,
        /// Estimated row count.
        enrtuples: f64,
        /// Underlying relation, if any.
        relid: Oid,
    },
    /// Empty `FROM` placeholder.
    Result,
    /// Grouping step output.
    Group {
        /// Grouping expressions.
        groupexprs: Vec<Expr>,
    },
}

impl Default for RteKind {
    fn default() -> Self {
        RteKind::Result
    }
}

/// Discriminator of a range table entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RteKindTag {
    /// [`RteKind::Relation`].
    Relation,
    /// [`RteKind::Subquery`].
    Subquery,
    /// [`RteKind::Join`].
    Join,
    /// [`RteKind::Function`].
    Function,
    /// [`RteKind::TableFunc`].
    TableFunc,
    /// [`RteKind::Values`].
    Values,
    /// [`RteKind::Cte`].
    Cte,
    /// [`RteKind::NamedTuplestore`].
    NamedTuplestore,
    /// [`RteKind::Result`].
    Result,
    /// [`RteKind::Group`].
    Group,
}

impl RteKindTag {
    /// Lower-case display name.
    pub fn name(self) -> &'static str {
        match self {
            RteKindTag::Relation => "relation",
            RteKindTag::Subquery => "subquery",
            RteKindTag::Join => "join",
            RteKindTag::Function => "function",
            RteKindTag::TableFunc => "tablefunc",
            RteKindTag::Values => "values",
            RteKindTag::Cte => "cte",
            RteKindTag::NamedTuplestore => "namedtuplestore",
            RteKindTag::Result => "result",
            RteKindTag::Group => "group",
        }
    }
}

impl RteKind {
    /// Discriminator of this kind.
    pub fn tag(&self) -> RteKindTag {
        match self {
            RteKind::Relation { .. } => RteKindTag::Relation,
            RteKind::Subquery { .. } => RteKindTag::Subquery,
            RteKind::Join { .. } => RteKindTag::Join,
            RteKind::Function { .. } => RteKindTag::Function,
            RteKind::TableFunc { .. } => RteKindTag::TableFunc,
            RteKind::Values { .. } => RteKindTag::Values,
            RteKind::Cte { .. } => RteKindTag::Cte,
            RteKind::NamedTuplestore { .. } => RteKindTag::NamedTuplestore,
            RteKind::Result => RteKindTag::Result,
            RteKind::Group { .. } => RteKindTag::Group,
        }
    }
}

/// One entry of a range table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeTblEntry {
    /// Variant data.
    pub kind: RteKind,
    /// User-written alias.
    pub alias: Option<Alias>,
    /// Effective names: alias, else relation name, plus column names.
    pub eref: Alias,
    /// `LATERAL`.
    pub lateral: bool,
    /// Explicitly listed in `FROM`.
    pub in_from_cl: bool,
    /// Sub-query is a security barrier view.
    pub security_barrier: bool,
}

impl RangeTblEntry {
    /// A plain relation entry named `name`.
    pub fn relation(relid: Oid, name: impl Into<String>, colnames: Vec<String>) -> Self {
        RangeTblEntry {
            kind: RteKind::Relation {
                relid,
                relkind: 'r',
                rellockmode: 1,
                perminfoindex: 0,
                inh: false,
                tablesample: None,
            },
            alias: None,
            eref: Alias {
                aliasname: name.into(),
                colnames,
            },
            lateral: false,
            in_from_cl: true,
            security_barrier: false,
        }
    }

    /// Relation oid for relation entries.
    pub fn relid(&self) -> Option<Oid> {
        match &self.kind {
            RteKind::Relation { relid, .. } => Some(*relid),
            _ => None,
        }
    }

    /// Kind discriminator.
    pub fn rtekind(&self) -> RteKindTag {
        self.kind.tag()
    }
}

/// Kind discriminator of `rte`.
pub fn get_rtekind(rte: &RangeTblEntry) -> RteKindTag {
    rte.rtekind()
}

/// One-based range table. Entries flattened away by the planner are `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeTable(pub Vec<Option<RangeTblEntry>>);

impl RangeTable {
    /// Empty range table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its one-based index.
    pub fn push(&mut self, rte: RangeTblEntry) -> Index {
        self.0.push(Some(rte));
        self.0.len() as Index
    }

    /// Entry at one-based index `i`; `None` when out of range or flattened.
    pub fn fetch(&self, i: Index) -> Option<&RangeTblEntry> {
        let idx = (i as usize).checked_sub(1)?;
        self.0.get(idx)?.as_ref()
    }

    /// Like [`RangeTable::fetch`] but reports a missing entry as an error.
    pub fn rt_fetch(&self, i: Index) -> Result<&RangeTblEntry> {
        self.fetch(i)
            .ok_or_else(|| PlanError::internal(format!("invalid range table index {i}")))
    }

    /// Number of slots, including flattened ones.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no slots.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Present entries with their one-based indexes.
    pub fn iter(&self) -> impl Iterator<Item = (Index, &RangeTblEntry)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, rte)| rte.as_ref().map(|rte| (i as Index + 1, rte)))
    }

    /// Mutable counterpart of [`RangeTable::iter`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Index, &mut RangeTblEntry)> + '_ {
        self.0
            .iter_mut()
            .enumerate()
            .filter_map(|(i, rte)| rte.as_mut().map(|rte| (i as Index + 1, rte)))
    }
}

impl FromIterator<RangeTblEntry> for RangeTable {
    fn from_iter<I: IntoIterator<Item = RangeTblEntry>>(iter: I) -> Self {
        RangeTable(iter.into_iter().map(Some).collect())
    }
}

/// Reference to a range table entry inside a join tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeTblRef {
    /// One-based range table index.
    pub rtindex: Index,
}

/// An explicit `JOIN` in the join tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinExpr {
    /// Join semantics.
    pub jointype: JoinType,
    /// `NATURAL`.
    pub is_natural: bool,
    /// Left input.
    pub larg: JoinTreeNode,
    /// Right input.
    pub rarg: JoinTreeNode,
    /// `USING` column names.
    pub using_clause: Vec<String>,
    /// `ON` condition.
    pub quals: Option<Expr>,
    /// Alias of the join.
    pub alias: Option<Alias>,
    /// Range table index of the join's entry.
    pub rtindex: Index,
}

/// A `FROM` list with its `WHERE` condition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FromExpr {
    /// Items, implicitly cross-joined.
    pub fromlist: Vec<JoinTreeNode>,
    /// `WHERE` condition.
    pub quals: Option<Expr>,
}

/// A join tree item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinTreeNode {
    /// A range table reference.
    RangeTblRef(RangeTblRef),
    /// An explicit join.
    JoinExpr(Box<JoinExpr>),
    /// A nested `FROM` list.
    FromExpr(Box<FromExpr>),
}

impl Default for JoinTreeNode {
    fn default() -> Self {
        JoinTreeNode::FromExpr(Box::default())
    }
}

/// A `WITH` list item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommonTableExpr {
    /// CTE name.
    pub ctename: String,
    /// Column aliases.
    pub aliascolnames: Vec<String>,
    /// The CTE's query.
    pub ctequery: Box<Query>,
    /// Whether it is `RECURSIVE` and self-referencing.
    pub cterecursive: bool,
    /// Token location.
    pub location: ParseLoc,
}

/// An analyzed statement, reduced to what tree walkers need.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    /// Statement kind.
    pub command_type: CmdType,
    /// Query fingerprint.
    pub query_id: u64,
    /// Sets the command tag.
    pub can_set_tag: bool,
    /// `WITH` list.
    pub cte_list: Vec<CommonTableExpr>,
    /// Range table.
    pub rtable: RangeTable,
    /// Permission records.
    pub rteperminfos: Vec<RtePermissionInfo>,
    /// `FROM` / `WHERE`.
    pub jointree: FromExpr,
    /// Output columns.
    pub target_list: Vec<TargetEntry>,
    /// `RETURNING`.
    pub returning_list: Vec<TargetEntry>,
    /// `GROUP BY`.
    pub group_clause: Vec<SortGroupClause>,
    /// `HAVING`.
    pub having_qual: Option<Expr>,
    /// `ORDER BY`.
    pub sort_clause: Vec<SortGroupClause>,
    /// `OFFSET`.
    pub limit_offset: Option<Expr>,
    /// `LIMIT`.
    pub limit_count: Option<Expr>,
    /// Contains aggregates.
    pub has_aggs: bool,
    /// Contains sub-links.
    pub has_sub_links: bool,
    /// Start of this statement in the source text.
    pub stmt_location: ParseLoc,
    /// Length in bytes; `0` means "to end of string".
    pub stmt_len: i32,
}

/// Argument of a generic option element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefElemArg {
    /// Integer literal.
    Integer(i64),
    /// Numeric literal in textual form.
    Float(String),
    /// Boolean literal.
    Boolean(bool),
    /// Identifier or string literal.
    String(String),
    /// Type name.
    TypeName(String),
    /// Qualified name.
    List(Vec<String>),
    /// `*`.
    Star,
}

/// A generic `name [value]` option.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DefElem {
    /// Namespace qualifier, if any.
    pub defnamespace: Option<String>,
    /// Option name, already lower-cased.
    pub defname: String,
    /// Value, if given.
    pub arg: Option<DefElemArg>,
    /// Location of the option name.
    pub location: ParseLoc,
}

impl DefElem {
    /// Option with an optional value and no location.
    pub fn new(name: impl Into<String>, arg: Option<DefElemArg>) -> Self {
        DefElem {
            defnamespace: None,
            defname: name.into(),
            arg,
            location: ParseLoc::UNKNOWN,
        }
    }

    /// Option with only a string value.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        DefElem::new(name, Some(DefElemArg::String(value.into())))
    }

    /// The value in textual form; an absent value is an error.
    pub fn get_string(&self) -> Result<String> {
        let Some(arg) = &self.arg else {
            return Err(PlanError::option_at(
                format!("{} requires a parameter", self.defname),
                self.location.offset(),
            ));
        };
        Ok(match arg {
            DefElemArg::Integer(i) => i.to_string(),
            DefElemArg::Float(f) => f.clone(),
            DefElemArg::Boolean(b) => (if *b { "true" } else { "false" }).to_string(),
            DefElemArg::String(s) | DefElemArg::TypeName(s) => s.clone(),
            DefElemArg::List(names) => names.join("."),
            DefElemArg::Star => "*".to_string(),
        })
    }

    /// The value as a boolean; an absent value means `true`.
    pub fn get_boolean(&self) -> Result<bool> {
        let Some(arg) = &self.arg else {
            return Ok(true);
        };
        if let DefElemArg::Integer(i) = arg {
            match i {
                0 => return Ok(false),
                1 => return Ok(true),
                _ => {}
            }
        } else {
            let value = self.get_string()?;
            match value.to_ascii_lowercase().as_str() {
                "true" | "on" => return Ok(true),
                "false" | "off" => return Ok(false),
                _ => {}
            }
        }
        Err(PlanError::option_at(
            format!("{} requires a Boolean value", self.defname),
            self.location.offset(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_table_is_one_based_and_skips_holes() {
        let mut rtable = RangeTable::new();
        assert_eq!(rtable.push(RangeTblEntry::relation(100, "t", vec![])), 1);
        rtable.0.push(None);
        assert_eq!(rtable.push(RangeTblEntry::relation(101, "u", vec![])), 3);
        assert!(rtable.fetch(0).is_none());
        assert_eq!(rtable.fetch(1).and_then(|r| r.relid()), Some(100));
        assert!(rtable.fetch(2).is_none());
        assert!(rtable.rt_fetch(9).is_err());
        let indexes: Vec<_> = rtable.iter().map(|(i, _)| i).collect();
        assert_eq!(indexes, vec![1, 3]);
        assert_eq!(get_rtekind(rtable.rt_fetch(3).unwrap()), RteKindTag::Relation);
    }

    #[test]
    fn boolean_option_values() {
        let mut opt = DefElem::new("analyze", None);
        assert!(opt.get_boolean().unwrap());
        opt.arg = Some(DefElemArg::String("OFF".into()));
        assert!(!opt.get_boolean().unwrap());
        opt.arg = Some(DefElemArg::Integer(1));
        assert!(opt.get_boolean().unwrap());
        opt.arg = Some(DefElemArg::Integer(2));
        let err = opt.get_boolean().unwrap_err();
        assert_eq!(err.to_string(), "analyze requires a Boolean value");
        opt.arg = Some(DefElemArg::String("maybe".into()));
        assert!(opt.get_boolean().is_err());
    }

    #[test]
    fn string_option_requires_value() {
        let opt = DefElem {
            location: ParseLoc(12),
            ..DefElem::new("format", None)
        };
        let err = opt.get_string().unwrap_err();
        assert_eq!(err.to_string(), "format requires a parameter");
        assert_eq!(err.location(), Some(12));
        assert_eq!(DefElem::string("format", "json").get_string().unwrap(), "json");
    }
}
