//! Catalog lookups needed while rendering plans.
//!
//! Rendering only ever asks the catalog for names. [`CatalogLookup`] is the
//! seam to the system catalogs; [`InMemoryCatalog`] is a serde-friendly
//! implementation for tests and the command-line renderer. Built-in types,
//! operators, functions and collations are answered from static tables when
//! an implementation does not know better.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::nodes::Oid;

/// `bool`.
pub const BOOLOID: Oid = 16;
/// `bytea`.
pub const BYTEAOID: Oid = 17;
/// `name`.
pub const NAMEOID: Oid = 19;
/// `int8`.
pub const INT8OID: Oid = 20;
/// `int2`.
pub const INT2OID: Oid = 21;
/// `int4`.
pub const INT4OID: Oid = 23;
/// `text`.
pub const TEXTOID: Oid = 25;
/// `oid`.
pub const OIDOID: Oid = 26;
/// `tid`.
pub const TIDOID: Oid = 27;
/// `json`.
pub const JSONOID: Oid = 114;
/// `float4`.
pub const FLOAT4OID: Oid = 700;
/// `float8`.
pub const FLOAT8OID: Oid = 701;
/// `unknown`.
pub const UNKNOWNOID: Oid = 705;
/// `bpchar`.
pub const BPCHAROID: Oid = 1042;
/// `varchar`.
pub const VARCHAROID: Oid = 1043;
/// `date`.
pub const DATEOID: Oid = 1082;
/// `timestamp`.
pub const TIMESTAMPOID: Oid = 1114;
/// `timestamptz`.
pub const TIMESTAMPTZOID: Oid = 1184;
/// `interval`.
pub const INTERVALOID: Oid = 1186;
/// `numeric`.
pub const NUMERICOID: Oid = 1700;
/// `record`.
pub const RECORDOID: Oid = 2249;
/// `anyarray`.
pub const ANYARRAYOID: Oid = 2277;
/// `void`.
pub const VOIDOID: Oid = 2278;
/// `uuid`.
pub const UUIDOID: Oid = 2950;
/// `jsonb`.
pub const JSONBOID: Oid = 3802;

/// The database default collation.
pub const DEFAULT_COLLATION_OID: Oid = 100;
/// The `C` collation.
pub const C_COLLATION_OID: Oid = 950;
/// The `POSIX` collation.
pub const POSIX_COLLATION_OID: Oid = 951;

/// `pg_catalog`.
pub const PG_CATALOG_NAMESPACE: Oid = 11;
/// `public`.
pub const PG_PUBLIC_NAMESPACE: Oid = 2200;

const BUILTIN_TYPES: &[(Oid, &str)] = &[
    (BOOLOID, "boolean"),
    (BYTEAOID, "bytea"),
    (NAMEOID, "name"),
    (INT8OID, "bigint"),
    (INT2OID, "smallint"),
    (INT4OID, "integer"),
    (TEXTOID, "text"),
    (OIDOID, "oid"),
    (TIDOID, "tid"),
    (JSONOID, "json"),
    (FLOAT4OID, "real"),
    (FLOAT8OID, "double precision"),
    (UNKNOWNOID, "unknown"),
    (1000, "boolean[]"),
    (1005, "smallint[]"),
    (1007, "integer[]"),
    (1009, "text[]"),
    (1016, "bigint[]"),
    (1021, "real[]"),
    (1022, "double precision[]"),
    (BPCHAROID, "character"),
    (VARCHAROID, "character varying"),
    (DATEOID, "date"),
    (TIMESTAMPOID, "timestamp without time zone"),
    (TIMESTAMPTZOID, "timestamp with time zone"),
    (INTERVALOID, "interval"),
    (NUMERICOID, "numeric"),
    (RECORDOID, "record"),
    (ANYARRAYOID, "anyarray"),
    (VOIDOID, "void"),
    (UUIDOID, "uuid"),
    (JSONBOID, "jsonb"),
];

const BUILTIN_ARRAYS: &[(Oid, Oid)] = &[
    (BOOLOID, 1000),
    (INT2OID, 1005),
    (INT4OID, 1007),
    (TEXTOID, 1009),
    (INT8OID, 1016),
    (FLOAT4OID, 1021),
    (FLOAT8OID, 1022),
];

const BUILTIN_COLLATIONS: &[(Oid, &str)] = &[
    (DEFAULT_COLLATION_OID, "default"),
    (C_COLLATION_OID, "C"),
    (POSIX_COLLATION_OID, "POSIX"),
];

/// Operator metadata used by the deparser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorInfo {
    /// Operator symbol, e.g. `=`.
    pub name: String,
    /// Left operand type; [`crate::nodes::INVALID_OID`] for prefix operators.
    #[serde(default)]
    pub left_type: Oid,
    /// Right operand type.
    #[serde(default)]
    pub right_type: Oid,
}

impl OperatorInfo {
    fn infix(name: &str, ty: Oid) -> Self {
        OperatorInfo {
            name: name.to_string(),
            left_type: ty,
            right_type: ty,
        }
    }

    /// True for operators written before their only operand.
    pub fn is_prefix(&self) -> bool {
        self.left_type == 0
    }
}

fn builtin_operator(oid: Oid) -> Option<OperatorInfo> {
    let (name, ty) = match oid {
        91 => ("=", BOOLOID),
        96 => ("=", INT4OID),
        97 => ("<", INT4OID),
        98 => ("=", TEXTOID),
        410 => ("=", INT8OID),
        411 => ("<>", INT8OID),
        412 => ("<", INT8OID),
        413 => (">", INT8OID),
        514 => ("*", INT4OID),
        518 => ("<>", INT4OID),
        521 => (">", INT4OID),
        523 => ("<=", INT4OID),
        525 => (">=", INT4OID),
        531 => ("<>", TEXTOID),
        551 => ("+", INT4OID),
        555 => ("-", INT4OID),
        664 => ("<", TEXTOID),
        666 => (">", TEXTOID),
        1054 => ("=", BPCHAROID),
        1209 => ("~~", TEXTOID),
        1752 => ("=", NUMERICOID),
        1754 => ("<", NUMERICOID),
        1756 => (">", NUMERICOID),
        558 => {
            return Some(OperatorInfo {
                name: "-".into(),
                left_type: 0,
                right_type: INT4OID,
            })
        }
        _ => return None,
    };
    Some(OperatorInfo::infix(name, ty))
}

fn builtin_function(oid: Oid) -> Option<&'static str> {
    Some(match oid {
        870 => "lower",
        871 => "upper",
        1067 => "generate_series",
        1299 => "now",
        1317 => "length",
        2101 => "avg",
        2108 => "sum",
        2116 => "max",
        2132 => "min",
        2147 => "count",
        2803 => "count",
        3100 => "row_number",
        3101 => "rank",
        3308 => "bernoulli",
        3313 => "system",
        _ => return None,
    })
}

/// Name of a built-in type, without typmod decoration.
pub fn builtin_type_name(oid: Oid) -> Option<&'static str> {
    BUILTIN_TYPES
        .iter()
        .find(|(t, _)| *t == oid)
        .map(|(_, name)| *name)
}

/// Array type whose elements are `elem`, for built-in element types.
pub fn builtin_array_type(elem: Oid) -> Option<Oid> {
    BUILTIN_ARRAYS
        .iter()
        .find(|(e, _)| *e == elem)
        .map(|(_, arr)| *arr)
}

/// Name lookups against the system catalogs.
///
/// Missing objects yield `None`; the `get_*` helpers in this module turn
/// that into a [`PlanError::CatalogLookup`].
pub trait CatalogLookup: Send + Sync {
    /// Name of a relation (table, index, view, ...).
    fn rel_name(&self, relid: Oid) -> Option<String>;
    /// Namespace containing a relation.
    fn rel_namespace(&self, relid: Oid) -> Option<Oid>;
    /// Name of a namespace.
    fn namespace_name(&self, nspid: Oid) -> Option<String>;
    /// True for the session's temporary namespace.
    fn is_temp_namespace(&self, _nspid: Oid) -> bool {
        false
    }
    /// Name of a function or aggregate.
    fn func_name(&self, funcid: Oid) -> Option<String> {
        builtin_function(funcid).map(str::to_string)
    }
    /// Namespace of a function.
    fn func_namespace(&self, funcid: Oid) -> Option<Oid> {
        builtin_function(funcid).map(|_| PG_CATALOG_NAMESPACE)
    }
    /// Operator metadata.
    fn operator(&self, opno: Oid) -> Option<OperatorInfo> {
        builtin_operator(opno)
    }
    /// Display name of a type, without typmod.
    fn type_name(&self, typid: Oid) -> Option<String> {
        builtin_type_name(typid).map(str::to_string)
    }
    /// Name of a collation.
    fn collation_name(&self, collid: Oid) -> Option<String> {
        BUILTIN_COLLATIONS
            .iter()
            .find(|(c, _)| *c == collid)
            .map(|(_, name)| name.to_string())
    }
    /// Default collation of a type, [`crate::nodes::INVALID_OID`] for
    /// types that are not collatable.
    fn type_collation(&self, typid: Oid) -> Oid {
        match typid {
            TEXTOID | VARCHAROID | BPCHAROID => DEFAULT_COLLATION_OID,
            NAMEOID => C_COLLATION_OID,
            _ => 0,
        }
    }
    /// Default `<` and `>` operators of a type's btree ordering.
    fn ordering_operators(&self, typid: Oid) -> Option<(Oid, Oid)> {
        builtin_ordering_operators(typid)
    }
    /// Planner-relevant settings whose values differ from the built-in
    /// defaults, as `(name, value)` pairs in name order.
    fn modified_settings(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

fn builtin_ordering_operators(typid: Oid) -> Option<(Oid, Oid)> {
    Some(match typid {
        INT4OID => (97, 521),
        INT8OID => (412, 413),
        TEXTOID => (664, 666),
        NUMERICOID => (1754, 1756),
        _ => return None,
    })
}

/// Catalog-backed relation name, failing when the relation is unknown.
pub fn get_rel_name(catalog: &dyn CatalogLookup, relid: Oid) -> Result<String> {
    catalog
        .rel_name(relid)
        .ok_or_else(|| PlanError::catalog("relation", relid))
}

/// Namespace of a relation.
pub fn get_rel_namespace(catalog: &dyn CatalogLookup, relid: Oid) -> Result<Oid> {
    catalog
        .rel_namespace(relid)
        .ok_or_else(|| PlanError::catalog("relation", relid))
}

/// Name of a namespace, with the temporary namespace shown as `pg_temp`.
pub fn get_namespace_name_or_temp(catalog: &dyn CatalogLookup, nspid: Oid) -> Result<String> {
    if catalog.is_temp_namespace(nspid) {
        return Ok("pg_temp".to_string());
    }
    catalog
        .namespace_name(nspid)
        .ok_or_else(|| PlanError::catalog("namespace", nspid))
}

/// Name of a function.
pub fn get_func_name(catalog: &dyn CatalogLookup, funcid: Oid) -> Result<String> {
    catalog
        .func_name(funcid)
        .ok_or_else(|| PlanError::catalog("function", funcid))
}

/// Symbol of an operator.
pub fn get_opname(catalog: &dyn CatalogLookup, opno: Oid) -> Result<String> {
    get_operator(catalog, opno).map(|op| op.name)
}

/// Full operator metadata.
pub fn get_operator(catalog: &dyn CatalogLookup, opno: Oid) -> Result<OperatorInfo> {
    catalog
        .operator(opno)
        .ok_or_else(|| PlanError::catalog("operator", opno))
}

/// Name of a collation.
pub fn get_collation_name(catalog: &dyn CatalogLookup, collid: Oid) -> Result<String> {
    catalog
        .collation_name(collid)
        .ok_or_else(|| PlanError::catalog("collation", collid))
}

/// SQL spelling of a type including its modifier, e.g. `character varying(10)`.
pub fn format_type(catalog: &dyn CatalogLookup, typid: Oid, typmod: i32) -> Result<String> {
    let base = catalog
        .type_name(typid)
        .ok_or_else(|| PlanError::catalog("type", typid))?;
    if typmod < 0 {
        return Ok(base);
    }
    Ok(match typid {
        VARCHAROID | BPCHAROID if typmod >= 4 => format!("{base}({})", typmod - 4),
        NUMERICOID if typmod >= 4 => {
            let raw = typmod - 4;
            format!("{base}({},{})", (raw >> 16) & 0xffff, raw & 0xffff)
        }
        TIMESTAMPOID => format!("timestamp({typmod}) without time zone"),
        TIMESTAMPTZOID => format!("timestamp({typmod}) with time zone"),
        _ => base,
    })
}

/// Lock method a lock mode belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMethod {
    /// Regular table-level locks.
    Default,
    /// Advisory locks.
    User,
}

const LOCK_MODE_NAMES: [&str; 9] = [
    "INVALID",
    "AccessShareLock",
    "RowShareLock",
    "RowExclusiveLock",
    "ShareUpdateExclusiveLock",
    "ShareLock",
    "ShareRowExclusiveLock",
    "ExclusiveLock",
    "AccessExclusiveLock",
];

/// Textual name of a numeric lock mode. Both lock methods share one
/// conflict table and therefore one set of names.
pub fn get_lockmode_name(_method: LockMethod, mode: i32) -> Result<&'static str> {
    usize::try_from(mode)
        .ok()
        .and_then(|m| LOCK_MODE_NAMES.get(m))
        .copied()
        .ok_or_else(|| PlanError::internal(format!("unrecognized lock mode: {mode}")))
}

/// Relation entry of an [`InMemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInfo {
    /// Relation name.
    pub name: String,
    /// Containing namespace.
    #[serde(default = "default_namespace")]
    pub namespace: Oid,
}

fn default_namespace() -> Oid {
    PG_PUBLIC_NAMESPACE
}

/// Function entry of an [`InMemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Function name.
    pub name: String,
    /// Containing namespace.
    #[serde(default = "default_namespace")]
    pub namespace: Oid,
}

/// Catalog held in hash maps, with the built-in tables as fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryCatalog {
    relations: FxHashMap<Oid, RelationInfo>,
    namespaces: FxHashMap<Oid, String>,
    temp_namespace: Option<Oid>,
    functions: FxHashMap<Oid, FunctionInfo>,
    operators: FxHashMap<Oid, OperatorInfo>,
    types: FxHashMap<Oid, String>,
    collations: FxHashMap<Oid, String>,
    settings: Vec<(String, String)>,
}

impl InMemoryCatalog {
    /// Empty catalog that knows `pg_catalog`, `public` and the built-ins.
    pub fn new() -> Self {
        let mut catalog = Self::default();
        catalog
            .namespaces
            .insert(PG_CATALOG_NAMESPACE, "pg_catalog".into());
        catalog
            .namespaces
            .insert(PG_PUBLIC_NAMESPACE, "public".into());
        catalog
    }

    /// Registers a relation in `public`.
    pub fn with_relation(self, relid: Oid, name: impl Into<String>) -> Self {
        self.with_relation_in(relid, name, PG_PUBLIC_NAMESPACE)
    }

    /// Registers a relation in the given namespace.
    pub fn with_relation_in(mut self, relid: Oid, name: impl Into<String>, namespace: Oid) -> Self {
        self.relations.insert(
            relid,
            RelationInfo {
                name: name.into(),
                namespace,
            },
        );
        self
    }

    /// Registers a namespace.
    pub fn with_namespace(mut self, nspid: Oid, name: impl Into<String>) -> Self {
        self.namespaces.insert(nspid, name.into());
        self
    }

    /// Marks a namespace as the session's temporary namespace.
    pub fn with_temp_namespace(mut self, nspid: Oid) -> Self {
        self.temp_namespace = Some(nspid);
        self.namespaces
            .entry(nspid)
            .or_insert_with(|| format!("pg_temp_{nspid}"));
        self
    }

    /// Registers a function in `public`.
    pub fn with_function(mut self, funcid: Oid, name: impl Into<String>) -> Self {
        self.functions.insert(
            funcid,
            FunctionInfo {
                name: name.into(),
                namespace: PG_PUBLIC_NAMESPACE,
            },
        );
        self
    }

    /// Registers a binary operator.
    pub fn with_operator(mut self, opno: Oid, name: impl Into<String>, operand: Oid) -> Self {
        self.operators.insert(
            opno,
            OperatorInfo {
                name: name.into(),
                left_type: operand,
                right_type: operand,
            },
        );
        self
    }

    /// Registers a type name.
    pub fn with_type(mut self, typid: Oid, name: impl Into<String>) -> Self {
        self.types.insert(typid, name.into());
        self
    }

    /// Registers a collation name.
    pub fn with_collation(mut self, collid: Oid, name: impl Into<String>) -> Self {
        self.collations.insert(collid, name.into());
        self
    }

    /// Records a non-default setting reported by `SETTINGS`.
    pub fn with_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push((name.into(), value.into()));
        self.settings.sort();
        self
    }
}

impl CatalogLookup for InMemoryCatalog {
    fn rel_name(&self, relid: Oid) -> Option<String> {
        self.relations.get(&relid).map(|r| r.name.clone())
    }

    fn rel_namespace(&self, relid: Oid) -> Option<Oid> {
        self.relations.get(&relid).map(|r| r.namespace)
    }

    fn namespace_name(&self, nspid: Oid) -> Option<String> {
        self.namespaces.get(&nspid).cloned().or_else(|| match nspid {
            PG_CATALOG_NAMESPACE => Some("pg_catalog".into()),
            PG_PUBLIC_NAMESPACE => Some("public".into()),
            _ => None,
        })
    }

    fn is_temp_namespace(&self, nspid: Oid) -> bool {
        self.temp_namespace == Some(nspid)
    }

    fn func_name(&self, funcid: Oid) -> Option<String> {
        self.functions
            .get(&funcid)
            .map(|f| f.name.clone())
            .or_else(|| builtin_function(funcid).map(str::to_string))
    }

    fn func_namespace(&self, funcid: Oid) -> Option<Oid> {
        self.functions
            .get(&funcid)
            .map(|f| f.namespace)
            .or_else(|| builtin_function(funcid).map(|_| PG_CATALOG_NAMESPACE))
    }

    fn operator(&self, opno: Oid) -> Option<OperatorInfo> {
        self.operators
            .get(&opno)
            .cloned()
            .or_else(|| builtin_operator(opno))
    }

    fn type_name(&self, typid: Oid) -> Option<String> {
        self.types
            .get(&typid)
            .cloned()
            .or_else(|| builtin_type_name(typid).map(str::to_string))
    }

    fn collation_name(&self, collid: Oid) -> Option<String> {
        self.collations.get(&collid).cloned().or_else(|| {
            BUILTIN_COLLATIONS
                .iter()
                .find(|(c, _)| *c == collid)
                .map(|(_, name)| name.to_string())
        })
    }

    fn modified_settings(&self) -> Vec<(String, String)> {
        self.settings.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_relation_reports_oid() {
        let catalog = InMemoryCatalog::new().with_relation(16384, "t");
        assert_eq!(get_rel_name(&catalog, 16384).unwrap(), "t");
        let err = get_rel_name(&catalog, 99).unwrap_err();
        assert_eq!(err.to_string(), "cache lookup failed for relation 99");
    }

    #[test]
    fn temp_namespace_reads_as_pg_temp() {
        let catalog = InMemoryCatalog::new()
            .with_temp_namespace(16000)
            .with_relation_in(16384, "scratch", 16000);
        let nsp = get_rel_namespace(&catalog, 16384).unwrap();
        assert_eq!(get_namespace_name_or_temp(&catalog, nsp).unwrap(), "pg_temp");
        assert_eq!(
            get_namespace_name_or_temp(&catalog, PG_PUBLIC_NAMESPACE).unwrap(),
            "public"
        );
    }

    #[test]
    fn type_formatting_includes_modifiers() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(format_type(&catalog, INT4OID, -1).unwrap(), "integer");
        assert_eq!(
            format_type(&catalog, VARCHAROID, 14).unwrap(),
            "character varying(10)"
        );
        assert_eq!(
            format_type(&catalog, NUMERICOID, ((10 << 16) | 2) + 4).unwrap(),
            "numeric(10,2)"
        );
        assert!(format_type(&catalog, 123_456, -1).is_err());
    }

    #[test]
    fn lock_modes() {
        assert_eq!(
            get_lockmode_name(LockMethod::Default, 1).unwrap(),
            "AccessShareLock"
        );
        assert_eq!(
            get_lockmode_name(LockMethod::User, 8).unwrap(),
            "AccessExclusiveLock"
        );
        assert!(get_lockmode_name(LockMethod::Default, 9).is_err());
    }

    #[test]
    fn builtins_back_user_entries() {
        let catalog = InMemoryCatalog::new().with_operator(96, "===", INT4OID);
        assert_eq!(get_opname(&catalog, 96).unwrap(), "===");
        assert_eq!(get_opname(&catalog, 97).unwrap(), "<");
        assert!(catalog.operator(558).is_some_and(|op| op.is_prefix()));
        assert_eq!(builtin_array_type(INT4OID), Some(1007));
        assert_eq!(get_func_name(&catalog, 2147).unwrap(), "count");
    }

    #[test]
    fn catalog_survives_json() {
        let catalog = InMemoryCatalog::new()
            .with_relation(16384, "t")
            .with_setting("work_mem", "8MB");
        let text = serde_json::to_string(&catalog).unwrap();
        let back: InMemoryCatalog = serde_json::from_str(&text).unwrap();
        assert_eq!(back, catalog);
        let partial: InMemoryCatalog =
            serde_json::from_str(r#"{"relations": {"5": {"name": "x"}}}"#).unwrap();
        assert_eq!(get_rel_name(&partial, 5).unwrap(), "x");
        assert_eq!(partial.rel_namespace(5), Some(PG_PUBLIC_NAMESPACE));
    }
}
