//! Bound parameter values of a statement.

use serde::{Deserialize, Serialize};

use crate::nodes::primnodes::Datum;
use crate::nodes::Oid;
use crate::ruleutils::datum_output;

/// One bound `$n` value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamExternData {
    /// Value, or `None` for SQL NULL.
    pub value: Option<Datum>,
    /// Declared type.
    #[serde(default)]
    pub ptype: Oid,
}

impl ParamExternData {
    /// Non-null value of type `ptype`.
    pub fn new(value: Datum, ptype: Oid) -> Self {
        ParamExternData {
            value: Some(value),
            ptype,
        }
    }

    /// SQL NULL of type `ptype`.
    pub fn null(ptype: Oid) -> Self {
        ParamExternData { value: None, ptype }
    }
}

/// Values bound to `$1`, `$2`, ... in order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamListInfo {
    /// Parameters, `$1` first.
    pub params: Vec<ParamExternData>,
}

impl ParamListInfo {
    /// Wraps a parameter vector.
    pub fn new(params: Vec<ParamExternData>) -> Self {
        ParamListInfo { params }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Renders `$1 = 'v1', $2 = NULL, ...` for logging.
///
/// Each value is printed as a quoted literal. When `maxlen` is non-negative,
/// values longer than `maxlen` bytes are cut on a character boundary and
/// marked with `...` inside the quotes.
pub fn build_param_log_string(params: &ParamListInfo, maxlen: i32) -> String {
    let mut out = String::new();
    for (i, param) in params.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("${} = ", i + 1));
        match &param.value {
            None => out.push_str("NULL"),
            Some(value) => append_quoted(&mut out, &datum_output(value), maxlen),
        }
    }
    out
}

fn append_quoted(out: &mut String, value: &str, maxlen: i32) {
    let (shown, clipped) = match usize::try_from(maxlen) {
        Ok(limit) if value.len() > limit => (clip_to_boundary(value, limit), true),
        _ => (value, false),
    };
    out.push('\'');
    for c in shown.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    if clipped {
        out.push_str("...");
    }
    out.push('\'');
}

fn clip_to_boundary(value: &str, limit: usize) -> &str {
    let mut end = limit.min(value.len());
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{INT4OID, TEXTOID};

    fn sample() -> ParamListInfo {
        ParamListInfo::new(vec![
            ParamExternData::new(Datum::Int(42), INT4OID),
            ParamExternData::null(TEXTOID),
            ParamExternData::new(Datum::Text("it's".into()), TEXTOID),
        ])
    }

    #[test]
    fn unlimited_values_are_quoted() {
        assert_eq!(
            build_param_log_string(&sample(), -1),
            "$1 = '42', $2 = NULL, $3 = 'it''s'"
        );
    }

    #[test]
    fn long_values_are_clipped_with_ellipsis() {
        let long = "x".repeat(64);
        let params = ParamListInfo::new(vec![ParamExternData::new(Datum::Text(long.clone()), TEXTOID)]);
        assert_eq!(build_param_log_string(&params, 8), "$1 = 'xxxxxxxx...'");
        assert_eq!(build_param_log_string(&params, -1), format!("$1 = '{long}'"));
    }

    #[test]
    fn clipping_respects_character_boundaries() {
        let params = ParamListInfo::new(vec![ParamExternData::new(Datum::Text("aé".into()), TEXTOID)]);
        assert_eq!(build_param_log_string(&params, 2), "$1 = 'a...'");
    }

    #[test]
    fn exact_length_is_not_clipped() {
        let params = ParamListInfo::new(vec![ParamExternData::new(Datum::Text("abcd".into()), TEXTOID)]);
        assert_eq!(build_param_log_string(&params, 4), "$1 = 'abcd'");
    }
}
