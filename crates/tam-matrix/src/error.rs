//! Error types for tam-matrix.

use thiserror::Error;

use tam_core::ClusterId;
use tam_network::SpatialError;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error("number of clusters must be positive")]
    NoClusters,

    #[error("{what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what:     &'static str,
        expected: usize,
        got:      usize,
    },

    #[error("node {node} has cluster label {label}, but only {num_clusters} clusters exist")]
    LabelOutOfRange {
        node:         usize,
        label:        u32,
        num_clusters: usize,
    },

    #[error("cluster {0} has no member nodes")]
    EmptyCluster(ClusterId),

    #[error("label file references unknown node {0:?}")]
    UnknownNode(String),

    #[error("node {0:?} has no cluster label")]
    MissingLabel(String),

    #[error("edge index {edge} out of range (matrix has {edge_count} rows)")]
    EdgeOutOfRange { edge: usize, edge_count: usize },

    #[error("diagonal column {0} must be empty")]
    DiagonalNotEmpty(usize),

    #[error("stale TAM cache: {0}")]
    StaleCache(String),

    #[error("TAM cache encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type MatrixResult<T> = Result<T, MatrixError>;
