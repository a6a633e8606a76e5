//! Textual form of node trees.
//!
//! Nodes are written as JSON objects keyed by their kind. Executor caches are
//! skipped on output and come back empty; everything else survives a round
//! trip, so `string_to_node(&node_to_string(n)?)? == n`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Node;
use crate::error::Result;

/// Writes `node` in its textual form.
pub fn node_to_string(node: &Node) -> Result<String> {
    Ok(serde_json::to_string(node)?)
}

/// Writes `node` in its textual form, indented for reading.
pub fn node_to_string_pretty(node: &Node) -> Result<String> {
    Ok(serde_json::to_string_pretty(node)?)
}

/// Reads a node back from [`node_to_string`] output.
pub fn string_to_node(text: &str) -> Result<Node> {
    Ok(serde_json::from_str(text)?)
}

/// Writes any node type, not just the generic [`Node`] wrapper.
pub fn to_text<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Reads any node type written by [`to_text`].
pub fn from_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}
