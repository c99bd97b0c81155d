//! Network-subsystem error type.

use thiserror::Error;

use tam_core::NodeId;

/// Errors produced by `tam-network`.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("node index {node} out of range (network has {node_count} nodes)")]
    InvalidNodeIndex { node: NodeId, node_count: usize },

    #[error("link {link:?} has invalid length {weight} (must be finite and >= 0)")]
    InvalidEdgeWeight { link: String, weight: f64 },

    #[error("no path from {from} to {to}")]
    NoPathExists { from: NodeId, to: NodeId },

    #[error("node {node:?} has a non-finite position")]
    InvalidPosition { node: String },

    #[error("duplicate node id {0:?}")]
    DuplicateNode(String),

    #[error("duplicate link id {0:?}")]
    DuplicateLink(String),

    #[error("link references unknown node {0:?}")]
    UnknownNode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type SpatialResult<T> = Result<T, SpatialError>;
