//! `tam-core`: foundational types shared by every `tam-*` crate.
//!
//! This crate has no `tam-*` dependencies and only two external ones
//! (`rand` and `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module        | Contents                                               |
//! |---------------|--------------------------------------------------------|
//! | [`ids`]       | `NodeId`, `EdgeId`, `ClusterId`, `OdPair`              |
//! | [`geo`]       | `Point2` planar coordinates, centroid helper           |
//! | [`time`]      | `Hour`, `HOURS_PER_DAY`, clock-time formatting         |
//! | [`rng`]       | `SeededRng` deterministic RNG wrapper                  |
//! | [`error`]     | `CoreError`, `CoreResult`                              |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::Point2;
pub use ids::{ClusterId, EdgeId, NodeId, OdPair};
pub use rng::SeededRng;
pub use time::{Hour, HOURS_PER_DAY};
