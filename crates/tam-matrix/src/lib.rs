//! `tam-matrix`: the traffic assignment matrix (TAM).
//!
//! `TAM[e, i·Z + j] = 1` when edge `e` lies on the selected shortest path
//! from the centroid node of cluster `i` to the centroid node of cluster `j`.
//! Multiplying the TAM by an OD flow matrix (Z² × hours) yields per-edge,
//! per-hour flows.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                  |
//! |----------------|-----------------------------------------------------------|
//! | [`cluster`]    | `ClusterAssignment`, label CSV loader                     |
//! | [`matrix`]     | `TrafficAssignmentMatrix` (sparse columns, dense export, products) |
//! | [`assemble`]   | `assemble`, `assemble_with`, `AssemblyReport`             |
//! | [`cache`]      | `TamCache`, `save_tam`, `load_tam`, `CacheKey`            |
//! | [`error`]      | `MatrixError`, `MatrixResult<T>`                          |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                    |
//! |------------|-----------------------------------------------------------|
//! | `parallel` | *(default)* One Rayon task per origin centroid.           |

pub mod assemble;
pub mod cache;
pub mod cluster;
pub mod error;
pub mod matrix;

#[cfg(test)]
mod tests;

pub use assemble::{assemble, assemble_with, AssemblyReport};
pub use cache::{load_tam, save_tam, CacheKey, CacheOutcome, CachedTam, TamCache};
pub use cluster::{load_labels_csv, load_labels_reader, ClusterAssignment};
pub use error::{MatrixError, MatrixResult};
pub use matrix::TrafficAssignmentMatrix;
