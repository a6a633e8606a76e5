//! Plan trees, their traversal, and the EXPLAIN machinery built on them.
//!
//! The [`nodes`] module holds the closed-world node model and the generic
//! operations over it. [`explain`] renders planned statements in four
//! formats, [`executor`] exposes the hook chain around statement execution,
//! and [`auto_explain`] / [`overexplain`] are bundled extensions that use
//! both.

#![warn(missing_docs)]

pub mod auto_explain;
pub mod catalog;
pub mod error;
pub mod executor;
pub mod explain;
pub mod instrument;
pub mod logging;
pub mod memctx;
pub mod nodes;
pub mod overexplain;
pub mod params;
pub mod ruleutils;

pub use error::{PlanError, Result};
pub use explain::{ExplainFormat, ExplainState};
pub use nodes::{Node, NodeTag};
