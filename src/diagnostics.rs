//! Flattening of per-node validation errors.
//!
//! The parser attaches errors to individual nodes. Callers want one ordered
//! list per file, each entry tagged with the line range of the node that
//! reported it. Traversal is pre-order: a node's own errors come before its
//! children's, siblings left to right. Identical messages from different
//! nodes are all kept.

use crate::ast::{LineRange, Node};
use serde::Serialize;
use std::fmt;

/// A soft error found while parsing, located by line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsingError {
    pub message: String,
    pub lines: LineRange,
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.lines, self.message)
    }
}

/// Collect every validation error in the tree, in pre-order.
pub fn collect_errors(node: &Node) -> Vec<ParsingError> {
    node.errors
        .iter()
        .map(|error| ParsingError {
            message: error.message.clone(),
            lines: node.lines,
        })
        .chain(node.children.iter().flat_map(collect_errors))
        .collect()
}
