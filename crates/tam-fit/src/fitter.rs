//! The flow-fitting loop.
//!
//! Fits `W` (`Z² × 24`, non-negative) and an optional `bias` (`24`) so that
//!
//! ```text
//! R = TAM · W + bias          (E × 24)
//! ```
//!
//! matches the sensor target on the observed edges, minimising the masked
//! mean squared error over `|S| · 24` cells.
//!
//! # One step
//!
//! ```text
//! ① Forward   R on sensor rows only; loss = Σ(R-T)² / n, mad = Σ|R-T| / n
//! ② Best      if loss < best loss, snapshot the parameters that produced it
//! ③ Gradient  G = 2(R-T)/n on sensor rows; ∇W = TAMᵀ·G; ∇bias = Σ_rows G
//! ④ Update    Adam on W (and bias)
//! ⑤ Project   W ← max(W, 0)
//! ```
//!
//! Only the TAM rows of sensor edges influence the loss, so the fitter
//! precomputes, for each sensor edge, the OD columns whose path uses it and
//! never touches the other `E - |S|` rows.

use std::time::Instant;

use log::{debug, info};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2};

use tam_core::{EdgeId, Hour, OdPair, SeededRng, HOURS_PER_DAY};
use tam_matrix::TrafficAssignmentMatrix;

use crate::{Adam, FitConfig, FitError, FitObserver, FitResult, SensorTarget};

// ── Metrics and snapshots ─────────────────────────────────────────────────────

/// Loss and mean absolute deviation of the parameters entering step `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub step: u64,
    pub loss: f32,
    pub mad:  f32,
}

/// A parameter snapshot with the metrics it was evaluated at.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedFlows {
    pub num_clusters: usize,
    /// `(Z², 24)`, origin-major rows.
    pub w:            Array2<f32>,
    pub bias:         Option<Array1<f32>>,
    pub loss:         f32,
    pub mad:          f32,
    /// Step at which `loss` was measured.
    pub step:         u64,
}

impl FittedFlows {
    /// Flows reshaped to `(Z, Z, 24)`: `[origin, destination, hour]`.
    pub fn od(&self) -> Array3<f32> {
        let z = self.num_clusters;
        Array3::from_shape_fn((z, z, HOURS_PER_DAY), |(i, j, h)| self.w[[i * z + j, h]])
    }

    #[inline]
    pub fn flow(&self, pair: OdPair, hour: Hour) -> f32 {
        self.w[[pair.column(self.num_clusters), hour.index()]]
    }

    /// Sum of all OD flows.
    pub fn total(&self) -> f32 {
        self.w.sum()
    }

    /// Predicted per-edge, per-hour flows `(E, 24)`.
    pub fn predict(&self, tam: &TrafficAssignmentMatrix) -> FitResult<Array2<f32>> {
        predict(tam, self.w.view(), self.bias.as_ref().map(|b| b.view()))
    }
}

/// Outcome of [`FlowFitter::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    /// Steps executed by this call.
    pub steps_run: u64,
    /// Metrics of the final executed step.
    pub last:      Option<StepMetrics>,
    pub best_step: Option<u64>,
    pub best_loss: Option<f32>,
    /// `true` if the observer stopped the run before the step budget.
    pub cancelled: bool,
}

// ── FlowFitter ────────────────────────────────────────────────────────────────

struct Gradients {
    w:    Array2<f32>,
    bias: Array1<f32>,
}

/// Gradient-descent fitter over a borrowed TAM and target.
///
/// ```rust,ignore
/// let mut fitter = FlowFitter::new(&tam, &target, FitConfig::default())?;
/// let summary = fitter.run(&mut LogObserver);
/// let best = fitter.into_best();
/// ```
pub struct FlowFitter<'a> {
    tam:            &'a TrafficAssignmentMatrix,
    target:         &'a SensorTarget,
    config:         FitConfig,
    /// OD columns marked on each sensor edge, parallel to
    /// `target.sensor_edges()`.
    sensor_columns: Vec<Vec<u32>>,
    w:              Array2<f32>,
    bias:           Option<Array1<f32>>,
    adam_w:         Adam,
    adam_bias:      Option<Adam>,
    grads:          Gradients,
    steps_taken:    u64,
    best:           Option<FittedFlows>,
}

impl<'a> FlowFitter<'a> {
    /// Validate inputs and initialise `W` uniformly in `[0, 1)` from
    /// `config.seed` (bias, if enabled, starts at zero).
    ///
    /// Fails with [`FitError::NoObservedEdges`] when the target has no
    /// sensor edges.
    pub fn new(
        tam:    &'a TrafficAssignmentMatrix,
        target: &'a SensorTarget,
        config: FitConfig,
    ) -> FitResult<Self> {
        check_inputs(tam, target, &config)?;
        let mut rng = SeededRng::new(config.seed);
        let w = Array2::from_shape_fn((tam.num_columns(), HOURS_PER_DAY), |_| rng.unit_f32());
        let bias = config.use_bias.then(|| Array1::zeros(HOURS_PER_DAY));
        Ok(Self::from_parts(tam, target, config, w, bias, 0, None))
    }

    /// Continue from a snapshot.  The step counter resumes at
    /// `checkpoint.step` and the snapshot becomes the current best.
    /// Optimiser moments restart from zero.
    pub fn resume_from(
        tam:        &'a TrafficAssignmentMatrix,
        target:     &'a SensorTarget,
        config:     FitConfig,
        checkpoint: &FittedFlows,
    ) -> FitResult<Self> {
        check_inputs(tam, target, &config)?;
        if checkpoint.num_clusters != tam.num_clusters() {
            return Err(FitError::ShapeMismatch {
                what:     "checkpoint clusters",
                expected: tam.num_clusters(),
                got:      checkpoint.num_clusters,
            });
        }
        if checkpoint.w.dim() != (tam.num_columns(), HOURS_PER_DAY) {
            return Err(FitError::ShapeMismatch {
                what:     "checkpoint flow rows",
                expected: tam.num_columns(),
                got:      checkpoint.w.nrows(),
            });
        }
        let mut w = checkpoint.w.as_standard_layout().into_owned();
        w.mapv_inplace(|x| x.max(0.0));

        let bias = match (&checkpoint.bias, config.use_bias) {
            (Some(b), true) if b.len() != HOURS_PER_DAY => {
                return Err(FitError::ShapeMismatch { what: "checkpoint bias", expected: HOURS_PER_DAY, got: b.len() });
            }
            (Some(b), true) => Some(b.clone()),
            (None, true) => Some(Array1::zeros(HOURS_PER_DAY)),
            (Some(_), false) => {
                debug!("checkpoint carries a bias but use_bias is off; dropping it");
                None
            }
            (None, false) => None,
        };

        let step = checkpoint.step;
        Ok(Self::from_parts(tam, target, config, w, bias, step, Some(checkpoint.clone())))
    }

    fn from_parts(
        tam:         &'a TrafficAssignmentMatrix,
        target:      &'a SensorTarget,
        config:      FitConfig,
        w:           Array2<f32>,
        bias:        Option<Array1<f32>>,
        steps_taken: u64,
        best:        Option<FittedFlows>,
    ) -> Self {
        let adam_w = Adam::new(w.len(), &config);
        let adam_bias = bias.as_ref().map(|b| Adam::new(b.len(), &config));
        let grads = Gradients { w: Array2::zeros(w.raw_dim()), bias: Array1::zeros(HOURS_PER_DAY) };
        Self {
            sensor_columns: sensor_columns(tam, target),
            tam,
            target,
            config,
            w,
            bias,
            adam_w,
            adam_bias,
            grads,
            steps_taken,
            best,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Steps executed so far (including those of a resumed checkpoint).
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn w(&self) -> ArrayView2<'_, f32> {
        self.w.view()
    }

    pub fn bias(&self) -> Option<ArrayView1<'_, f32>> {
        self.bias.as_ref().map(|b| b.view())
    }

    /// Lowest-loss snapshot seen so far.
    pub fn best(&self) -> Option<&FittedFlows> {
        self.best.as_ref()
    }

    /// Evaluate the current parameters without stepping.
    pub fn current(&self) -> FittedFlows {
        let (loss, mad) = evaluate(
            &self.sensor_columns,
            self.target,
            self.w.view(),
            self.bias.as_ref().map(|b| b.view()),
            None,
        );
        self.snapshot(StepMetrics { step: self.steps_taken, loss, mad })
    }

    /// The best snapshot, or the current parameters if no step has run.
    pub fn into_best(self) -> FittedFlows {
        match self.best {
            Some(best) => best,
            None => self.current(),
        }
    }

    /// Predicted per-edge, per-hour flows `(E, 24)` for the current parameters.
    pub fn predict(&self) -> FitResult<Array2<f32>> {
        predict(self.tam, self.w.view(), self.bias.as_ref().map(|b| b.view()))
    }

    // ── Stepping ──────────────────────────────────────────────────────────

    /// Execute one optimiser step and return the metrics of the parameters
    /// it started from.
    pub fn step(&mut self) -> StepMetrics {
        self.advance().0
    }

    /// Step until `config.steps` have been taken or the observer asks to stop.
    pub fn run<O: FitObserver>(&mut self, observer: &mut O) -> FitSummary {
        let started = Instant::now();
        let first_step = self.steps_taken;
        let mut last = None;
        let mut cancelled = false;

        while self.steps_taken < self.config.steps {
            if observer.should_stop() {
                info!("fit cancelled at step {}", self.steps_taken);
                cancelled = true;
                break;
            }
            let (metrics, improved) = self.advance();
            observer.on_step(&metrics);
            if improved {
                if let Some(best) = &self.best {
                    observer.on_new_best(best);
                }
            }
            if metrics.step % self.config.log_interval == 0 {
                observer.on_log(&metrics);
            }
            if self.config.save_interval > 0
                && metrics.step > 0
                && metrics.step % self.config.save_interval == 0
            {
                if let Some(best) = &self.best {
                    observer.on_checkpoint(metrics.step, best);
                }
            }
            last = Some(metrics);
        }

        let summary = FitSummary {
            steps_run: self.steps_taken - first_step,
            last,
            best_step: self.best.as_ref().map(|b| b.step),
            best_loss: self.best.as_ref().map(|b| b.loss),
            cancelled,
        };
        info!(
            "fit ran {} steps in {:.2?}; best loss {:?} at step {:?}",
            summary.steps_run,
            started.elapsed(),
            summary.best_loss,
            summary.best_step
        );
        observer.on_fit_end(&summary, self.best.as_ref());
        summary
    }

    fn advance(&mut self) -> (StepMetrics, bool) {
        let (loss, mad) = evaluate(
            &self.sensor_columns,
            self.target,
            self.w.view(),
            self.bias.as_ref().map(|b| b.view()),
            Some(&mut self.grads),
        );
        let metrics = StepMetrics { step: self.steps_taken, loss, mad };

        let improved = loss.is_finite() && self.best.as_ref().is_none_or(|b| loss < b.loss);
        if improved {
            self.best = Some(self.snapshot(metrics));
        }

        self.adam_w.step(self.w.iter_mut(), self.grads.w.iter());
        if let (Some(bias), Some(adam)) = (self.bias.as_mut(), self.adam_bias.as_mut()) {
            adam.step(bias.iter_mut(), self.grads.bias.iter());
        }
        self.w.mapv_inplace(|x| x.max(0.0));

        self.steps_taken += 1;
        (metrics, improved)
    }

    fn snapshot(&self, metrics: StepMetrics) -> FittedFlows {
        FittedFlows {
            num_clusters: self.tam.num_clusters(),
            w:            self.w.clone(),
            bias:         self.bias.clone(),
            loss:         metrics.loss,
            mad:          metrics.mad,
            step:         metrics.step,
        }
    }
}

/// Construct a fitter, run it to completion and return the best snapshot.
///
/// Input errors surface before the observer sees any step.
pub fn fit<O: FitObserver>(
    tam:      &TrafficAssignmentMatrix,
    target:   &SensorTarget,
    config:   FitConfig,
    observer: &mut O,
) -> FitResult<(FittedFlows, FitSummary)> {
    let mut fitter = FlowFitter::new(tam, target, config)?;
    let summary = fitter.run(observer);
    Ok((fitter.into_best(), summary))
}

/// Sensor edges whose TAM row is empty can never be matched by `W` alone.
pub fn uncovered_sensor_edges(tam: &TrafficAssignmentMatrix, target: &SensorTarget) -> Vec<EdgeId> {
    sensor_columns(tam, target)
        .iter()
        .zip(target.sensor_edges())
        .filter(|(columns, _)| columns.is_empty())
        .map(|(_, &e)| e)
        .collect()
}

// ── Internals ─────────────────────────────────────────────────────────────────

fn check_inputs(tam: &TrafficAssignmentMatrix, target: &SensorTarget, config: &FitConfig) -> FitResult<()> {
    config.validate()?;
    if target.edge_count() != tam.edge_count() {
        return Err(FitError::ShapeMismatch {
            what:     "target edges vs TAM rows",
            expected: tam.edge_count(),
            got:      target.edge_count(),
        });
    }
    if target.sensor_edges().is_empty() {
        return Err(FitError::NoObservedEdges);
    }
    Ok(())
}

fn sensor_columns(tam: &TrafficAssignmentMatrix, target: &SensorTarget) -> Vec<Vec<u32>> {
    let mut slot: Vec<Option<usize>> = vec![None; tam.edge_count()];
    for (s, e) in target.sensor_edges().iter().enumerate() {
        slot[e.index()] = Some(s);
    }
    let mut columns = vec![Vec::new(); target.sensor_count()];
    for (c, edges) in tam.columns() {
        for e in edges {
            if let Some(s) = slot[e.index()] {
                columns[s].push(c as u32);
            }
        }
    }
    columns
}

/// Masked loss and MAD; fills `grads` with `∂loss/∂W` and `∂loss/∂bias`
/// when given.
fn evaluate(
    sensor_columns: &[Vec<u32>],
    target:         &SensorTarget,
    w:              ArrayView2<'_, f32>,
    bias:           Option<ArrayView1<'_, f32>>,
    mut grads:      Option<&mut Gradients>,
) -> (f32, f32) {
    let n = (target.sensor_count() * HOURS_PER_DAY) as f64;
    let scale = (2.0 / n) as f32;
    if let Some(g) = grads.as_deref_mut() {
        g.w.fill(0.0);
        g.bias.fill(0.0);
    }

    let mut pred = Array1::<f32>::zeros(HOURS_PER_DAY);
    let mut sq_sum = 0.0f64;
    let mut abs_sum = 0.0f64;
    for (columns, edge) in sensor_columns.iter().zip(target.sensor_edges()) {
        pred.fill(0.0);
        for &c in columns {
            pred += &w.row(c as usize);
        }
        if let Some(b) = bias {
            pred += &b;
        }
        let diff = &pred - &target.values().row(edge.index());
        for &d in &diff {
            sq_sum += f64::from(d) * f64::from(d);
            abs_sum += f64::from(d.abs());
        }

        if let Some(g) = grads.as_deref_mut() {
            let row_grad = diff * scale;
            for &c in columns {
                g.w.row_mut(c as usize).scaled_add(1.0, &row_grad);
            }
            g.bias.scaled_add(1.0, &row_grad);
        }
    }
    ((sq_sum / n) as f32, (abs_sum / n) as f32)
}

fn predict(
    tam:  &TrafficAssignmentMatrix,
    w:    ArrayView2<'_, f32>,
    bias: Option<ArrayView1<'_, f32>>,
) -> FitResult<Array2<f32>> {
    let mut out = tam.apply(w)?;
    if let Some(b) = bias {
        out += &b;
    }
    Ok(out)
}
