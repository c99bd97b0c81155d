//! `tam-network`: road network graph, spatial index and shortest paths.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                      |
//! |-------------|---------------------------------------------------------------|
//! | [`network`] | `RoadNetwork` (CSR + R-tree), `RoadNetworkBuilder`            |
//! | [`search`]  | `PathSearch` trait, `DijkstraSearch`, `BreadthFirstSearch`, `ShortestPathTree`, `Route` |
//! | [`loader`]  | `load_network_csv` / `load_network_readers`                   |
//! | [`error`]   | `SpatialError`, `SpatialResult<T>`                            |

pub mod error;
pub mod loader;
pub mod network;
pub mod search;


pub use error::{SpatialError, SpatialResult};
pub use loader::{load_network_csv, load_network_readers};
pub use network::{RoadNetwork, RoadNetworkBuilder};
pub use search::{BreadthFirstSearch, CostPolicy, DijkstraSearch, PathSearch, Route, ShortestPathTree};
