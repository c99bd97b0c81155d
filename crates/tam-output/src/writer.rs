//! The `OutputWriter` trait implemented by output backends.

use crate::{ClusterRow, LinkFlowRow, MetricRow, OdFlowRow, OutputResult, TripRow};

/// Sink for fit results.
///
/// [`FitOutputObserver`][crate::FitOutputObserver] stores errors internally
/// and exposes them through `take_error`; direct callers get them back from
/// each method.
pub trait OutputWriter {
    fn write_metrics(&mut self, row: &MetricRow) -> OutputResult<()>;

    /// Replace the stored OD flow snapshot with `rows`.
    fn write_od_flows(&mut self, rows: &[OdFlowRow]) -> OutputResult<()>;

    fn write_link_flows(&mut self, rows: &[LinkFlowRow]) -> OutputResult<()>;

    fn write_clusters(&mut self, rows: &[ClusterRow]) -> OutputResult<()>;

    fn write_trips(&mut self, rows: &[TripRow]) -> OutputResult<()>;

    /// Flush all underlying file handles.
    ///
    /// Safe to call more than once; rows written afterwards are flushed by
    /// the next call.
    fn finish(&mut self) -> OutputResult<()>;
}
