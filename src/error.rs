use std::io;

use thiserror::Error;

use crate::nodes::Oid;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors raised while building, traversing or rendering plans.
///
/// Variants map onto the failure classes a caller needs to tell apart:
/// internal inconsistencies abort the whole operation, option and catalog
/// errors abort a single command, and I/O failures are passed through.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Build inconsistency such as an unbalanced group or a bad enum value.
    #[error("internal error: {message}")]
    Internal {
        /// Human readable description.
        message: String,
    },
    /// A command option was unknown, malformed or combined illegally.
    #[error("{message}")]
    Option {
        /// Message shown to the user.
        message: String,
        /// Byte offset of the offending option inside the command text.
        location: Option<usize>,
    },
    /// The catalog had no entry for an object referenced by the plan.
    #[error("cache lookup failed for {what} {oid}")]
    CatalogLookup {
        /// Kind of catalog object (relation, type, ...).
        what: &'static str,
        /// Offending object id.
        oid: Oid,
    },
    /// Setting name inside a reserved prefix is not known.
    #[error("invalid configuration parameter name \"{name}\"")]
    UnknownSetting {
        /// Fully qualified setting name.
        name: String,
    },
    /// Setting value could not be parsed.
    #[error("invalid value for parameter \"{name}\": \"{value}\"")]
    InvalidSetting {
        /// Fully qualified setting name.
        name: String,
        /// Rejected value.
        value: String,
    },
    /// Caller lacks the privilege required to change a setting.
    #[error("permission denied to set parameter \"{name}\"")]
    PermissionDenied {
        /// Fully qualified setting name.
        name: String,
    },
    /// A configuration file could not be parsed.
    #[error("configuration error: {message}")]
    Config {
        /// Parser diagnostic.
        message: String,
    },
    /// Failure writing or reading output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Failure encoding or decoding a serialized node tree.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PlanError {
    /// Builds an internal error from anything displayable.
    pub fn internal(message: impl Into<String>) -> Self {
        PlanError::Internal {
            message: message.into(),
        }
    }

    /// Builds an option error without a parse location.
    pub fn option(message: impl Into<String>) -> Self {
        PlanError::Option {
            message: message.into(),
            location: None,
        }
    }

    /// Builds an option error pointing at `location`.
    pub fn option_at(message: impl Into<String>, location: Option<usize>) -> Self {
        PlanError::Option {
            message: message.into(),
            location,
        }
    }

    /// Builds a catalog lookup failure.
    pub fn catalog(what: &'static str, oid: Oid) -> Self {
        PlanError::CatalogLookup { what, oid }
    }

    /// Parse location attached to the error, if any.
    pub fn location(&self) -> Option<usize> {
        match self {
            PlanError::Option { location, .. } => *location,
            _ => None,
        }
    }

    /// Returns true when the error indicates an internal inconsistency that
    /// should not be recovered from.
    pub fn is_internal(&self) -> bool {
        matches!(self, PlanError::Internal { .. })
    }

    /// Stable error code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::Internal { .. } => "XX000",
            PlanError::Option { .. } => "42601",
            PlanError::CatalogLookup { .. } => "XX000",
            PlanError::UnknownSetting { .. } => "42704",
            PlanError::InvalidSetting { .. } => "22023",
            PlanError::PermissionDenied { .. } => "42501",
            PlanError::Config { .. } => "F0000",
            PlanError::Io(_) => "58030",
            PlanError::Serialize(_) => "22P02",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_errors_carry_location() {
        let err = PlanError::option_at("unrecognized EXPLAIN option \"bicycle\"", Some(9));
        assert_eq!(err.location(), Some(9));
        assert_eq!(err.to_string(), "unrecognized EXPLAIN option \"bicycle\"");
        assert_eq!(err.code(), "42601");
    }

    #[test]
    fn catalog_error_mentions_oid() {
        let err = PlanError::catalog("relation", 16384);
        assert_eq!(err.to_string(), "cache lookup failed for relation 16384");
        assert!(!err.is_internal());
    }
}
