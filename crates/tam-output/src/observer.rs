//! `FitOutputObserver<W>`: bridges `FitObserver` to an `OutputWriter`.

use tam_fit::{FitObserver, FitSummary, FittedFlows, StepMetrics};

use crate::row::{od_rows, MetricRow};
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`FitObserver`] that records logged metrics and keeps `od_flows` at the
/// best snapshot, rewritten at every checkpoint and when the fit ends.
///
/// Errors from the writer are stored internally because `FitObserver`
/// methods have no return value.  After `run` returns, check for errors with
/// [`take_error`][Self::take_error].
pub struct FitOutputObserver<W: OutputWriter> {
    writer:     W,
    last_error: Option<OutputError>,
}

impl<W: OutputWriter> FitOutputObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, last_error: None }
    }

    /// Take the stored write error (if any) after `run` returns.
    ///
    /// Returns `None` if all writes succeeded.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Unwrap the inner writer, e.g. to append link flows and trips.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> FitObserver for FitOutputObserver<W> {
    fn on_log(&mut self, metrics: &StepMetrics) {
        let result = self.writer.write_metrics(&MetricRow::from(metrics));
        self.store_err(result);
    }

    fn on_checkpoint(&mut self, _step: u64, best: &FittedFlows) {
        let result = self.writer.write_od_flows(&od_rows(best));
        self.store_err(result);
        let result = self.writer.finish();
        self.store_err(result);
    }

    fn on_fit_end(&mut self, _summary: &FitSummary, best: Option<&FittedFlows>) {
        if let Some(best) = best {
            let result = self.writer.write_od_flows(&od_rows(best));
            self.store_err(result);
        }
        let result = self.writer.finish();
        self.store_err(result);
    }
}
