//! Fitting observer trait for progress reporting and data collection.

use log::{debug, info};

use crate::{FitSummary, FittedFlows, StepMetrics};

/// Callbacks invoked by [`FlowFitter::run`][crate::FlowFitter::run].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example: stop once the loss is small enough
///
/// ```rust,ignore
/// struct StopBelow { threshold: f32, hit: bool }
///
/// impl FitObserver for StopBelow {
///     fn on_step(&mut self, m: &StepMetrics) {
///         self.hit |= m.loss < self.threshold;
///     }
///     fn should_stop(&mut self) -> bool { self.hit }
/// }
/// ```
pub trait FitObserver {
    /// Called after every step with the metrics of the parameters it
    /// started from.
    fn on_step(&mut self, _metrics: &StepMetrics) {}

    /// Called on steps that are a multiple of `config.log_interval`.
    fn on_log(&mut self, _metrics: &StepMetrics) {}

    /// Called whenever a step sets a new lowest loss.
    fn on_new_best(&mut self, _best: &FittedFlows) {}

    /// Called on steps that are a positive multiple of
    /// `config.save_interval`, with the best snapshot so far.
    fn on_checkpoint(&mut self, _step: u64, _best: &FittedFlows) {}

    /// Called once when `run` returns.
    fn on_fit_end(&mut self, _summary: &FitSummary, _best: Option<&FittedFlows>) {}

    /// Polled before every step; returning `true` ends the run at that
    /// step boundary.
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// A [`FitObserver`] that does nothing.
pub struct NoopObserver;

impl FitObserver for NoopObserver {}

/// Reports metrics through the `log` facade.
pub struct LogObserver;

impl FitObserver for LogObserver {
    fn on_log(&mut self, m: &StepMetrics) {
        info!("step {:>6}: loss {:.6}  mad {:.4}", m.step, m.loss, m.mad);
    }

    fn on_new_best(&mut self, best: &FittedFlows) {
        debug!("new best loss {:.6} at step {}", best.loss, best.step);
    }

    fn on_fit_end(&mut self, summary: &FitSummary, best: Option<&FittedFlows>) {
        match best {
            Some(b) => info!(
                "fit finished after {} steps: best loss {:.6}, mad {:.4} (step {}), total flow {:.1}",
                summary.steps_run, b.loss, b.mad, b.step, b.total()
            ),
            None => info!("fit finished after {} steps without a finite loss", summary.steps_run),
        }
    }
}

/// Retains every callback's payload; used by tests and by callers that want
/// the loss curve in memory.
#[derive(Debug, Default)]
pub struct HistoryObserver {
    pub steps:       Vec<StepMetrics>,
    pub logged:      Vec<StepMetrics>,
    /// Step numbers that set a new best.
    pub improved_at: Vec<u64>,
    pub checkpoints: Vec<u64>,
    pub summary:     Option<FitSummary>,
}

impl HistoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn losses(&self) -> Vec<f32> {
        self.steps.iter().map(|m| m.loss).collect()
    }
}

impl FitObserver for HistoryObserver {
    fn on_step(&mut self, m: &StepMetrics) {
        self.steps.push(*m);
    }

    fn on_log(&mut self, m: &StepMetrics) {
        self.logged.push(*m);
    }

    fn on_new_best(&mut self, best: &FittedFlows) {
        self.improved_at.push(best.step);
    }

    fn on_checkpoint(&mut self, step: u64, _best: &FittedFlows) {
        self.checkpoints.push(step);
    }

    fn on_fit_end(&mut self, summary: &FitSummary, _best: Option<&FittedFlows>) {
        self.summary = Some(summary.clone());
    }
}

// ── Composition ───────────────────────────────────────────────────────────────

impl<O: FitObserver + ?Sized> FitObserver for &mut O {
    fn on_step(&mut self, m: &StepMetrics) {
        (**self).on_step(m)
    }
    fn on_log(&mut self, m: &StepMetrics) {
        (**self).on_log(m)
    }
    fn on_new_best(&mut self, best: &FittedFlows) {
        (**self).on_new_best(best)
    }
    fn on_checkpoint(&mut self, step: u64, best: &FittedFlows) {
        (**self).on_checkpoint(step, best)
    }
    fn on_fit_end(&mut self, summary: &FitSummary, best: Option<&FittedFlows>) {
        (**self).on_fit_end(summary, best)
    }
    fn should_stop(&mut self) -> bool {
        (**self).should_stop()
    }
}

/// Both observers see every callback; either may stop the run.
impl<A: FitObserver, B: FitObserver> FitObserver for (A, B) {
    fn on_step(&mut self, m: &StepMetrics) {
        self.0.on_step(m);
        self.1.on_step(m);
    }
    fn on_log(&mut self, m: &StepMetrics) {
        self.0.on_log(m);
        self.1.on_log(m);
    }
    fn on_new_best(&mut self, best: &FittedFlows) {
        self.0.on_new_best(best);
        self.1.on_new_best(best);
    }
    fn on_checkpoint(&mut self, step: u64, best: &FittedFlows) {
        self.0.on_checkpoint(step, best);
        self.1.on_checkpoint(step, best);
    }
    fn on_fit_end(&mut self, summary: &FitSummary, best: Option<&FittedFlows>) {
        self.0.on_fit_end(summary, best);
        self.1.on_fit_end(summary, best);
    }
    fn should_stop(&mut self) -> bool {
        // Poll both so stateful observers see every boundary.
        let a = self.0.should_stop();
        let b = self.1.should_stop();
        a || b
    }
}
