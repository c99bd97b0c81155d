use thiserror::Error;

use tam_core::{CoreError, Hour, OdPair};
use tam_matrix::MatrixError;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("sensor edge set is empty; the fitting loss is undefined")]
    NoObservedEdges,

    #[error("invalid fit configuration: {0}")]
    InvalidConfig(String),

    #[error("{what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what:     &'static str,
        expected: usize,
        got:      usize,
    },

    #[error("sensor edge {edge} out of range (target has {edge_count} edges)")]
    InvalidEdgeIndex { edge: usize, edge_count: usize },

    #[error("target value for edge {edge}, hour {hour} is not finite")]
    NonFiniteTarget { edge: usize, hour: usize },

    #[error("flow {flow} for pair {pair} at {hour} exceeds {limit} trips per cell")]
    TooManyTrips { pair: OdPair, hour: Hour, flow: f32, limit: u64 },

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type FitResult<T> = Result<T, FitError>;
