//! `tam-output`: CSV writers for fitting results.
//!
//! | File              | Columns                                                 |
//! |-------------------|---------------------------------------------------------|
//! | `fit_metrics.csv` | `step,loss,mad` (every logged step)                     |
//! | `od_flows.csv`    | `origin,destination,hour,flow` (best snapshot)          |
//! | `link_flows.csv`  | `edge_id,hour,flow` (predicted `TAM · W + bias`)        |
//! | `clusters.csv`    | `cluster,node_id`                                       |
//! | `trips.csv`       | `trip_id,origin_node,destination_node,departure,return` |
//!
//! [`FitOutputObserver`] implements `tam_fit::FitObserver` and fills the first
//! two during a run; the rest are written directly through [`OutputWriter`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use tam_output::{CsvWriter, FitOutputObserver};
//!
//! let mut obs = FitOutputObserver::new(CsvWriter::new(Path::new("./output"))?);
//! fitter.run(&mut obs);
//! if let Some(e) = obs.take_error() { eprintln!("output error: {e}"); }
//! let mut writer = obs.into_writer();
//! writer.write_link_flows(&link_rows(&network, &fitter.predict()?)?)?;
//! writer.finish()?;
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(test)]
mod tests;

pub use self::csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::FitOutputObserver;
pub use row::{
    cluster_rows, link_rows, od_rows, trip_rows, ClusterRow, LinkFlowRow, MetricRow, OdFlowRow, TripRow,
};
pub use writer::OutputWriter;
