//! `tam-fit`: fits hourly cluster-to-cluster flows to sensor counts.
//!
//! Given a [`TrafficAssignmentMatrix`](tam_matrix::TrafficAssignmentMatrix)
//! and a [`SensorTarget`], [`FlowFitter`] finds a non-negative `W`
//! (`Z² × 24`) whose assigned edge flows `TAM · W` best match the counts on
//! the sensor edges.
//!
//! | Module        | Contents                                                  |
//! |---------------|-----------------------------------------------------------|
//! | [`target`]    | `SensorTarget`, counts CSV loader                         |
//! | [`config`]    | `FitConfig` hyper-parameters                              |
//! | [`adam`]      | `Adam` optimiser state                                    |
//! | [`fitter`]    | `FlowFitter`, `FittedFlows`, `StepMetrics`, `fit`         |
//! | [`observer`]  | `FitObserver` and the stock observers                     |
//! | [`trips`]     | `sample_trips`: synthetic trips from fitted flows         |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use tam_fit::{fit, load_counts_csv, FitConfig, LogObserver};
//!
//! let target = load_counts_csv(Path::new("counts.csv"), &network)?;
//! let (best, summary) = fit(&tam, &target, FitConfig::default(), &mut LogObserver)?;
//! let od = best.od(); // (Z, Z, 24)
//! ```

pub mod adam;
pub mod config;
pub mod error;
pub mod fitter;
pub mod observer;
pub mod target;
pub mod trips;


pub use adam::Adam;
pub use config::FitConfig;
pub use error::{FitError, FitResult};
pub use fitter::{fit, uncovered_sensor_edges, FitSummary, FittedFlows, FlowFitter, StepMetrics};
pub use observer::{FitObserver, HistoryObserver, LogObserver, NoopObserver};
pub use target::{load_counts_csv, load_counts_reader, SensorTarget};
pub use trips::{sample_trips, trip_count, Trip, MAX_TRIPS_PER_CELL, RETURN_AFTER_HOURS};
