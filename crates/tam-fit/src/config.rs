//! Fitting configuration.

use serde::{Deserialize, Serialize};

use crate::{FitError, FitResult};

/// Hyper-parameters of one fitting run.
///
/// Deserialises from partial documents: missing fields take their defaults.
///
/// ```json
/// { "steps": 5000, "learning_rate": 0.01, "use_bias": true }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Total optimiser steps.  A resumed fitter counts the checkpoint's
    /// steps toward this budget.
    pub steps:         u64,
    /// Adam step size.
    pub learning_rate: f32,
    pub beta1:         f32,
    pub beta2:         f32,
    pub epsilon:       f32,
    /// Report metrics every this many steps (step 0 included).
    pub log_interval:  u64,
    /// Hand the best snapshot to the observer every this many steps.
    /// `0` disables periodic checkpoints.
    pub save_interval: u64,
    /// Fit an unconstrained per-hour additive bias alongside `W`.
    pub use_bias:      bool,
    /// Seed for the initial `W`.
    pub seed:          u64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            steps:         1_000,
            learning_rate: 0.001,
            beta1:         0.9,
            beta2:         0.999,
            epsilon:       1e-8,
            log_interval:  100,
            save_interval: 0,
            use_bias:      false,
            seed:          42,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> FitResult<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(FitError::InvalidConfig(format!("{name} must lie in [0, 1), got {beta}")));
            }
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(FitError::InvalidConfig(format!("epsilon must be positive, got {}", self.epsilon)));
        }
        if self.log_interval == 0 {
            return Err(FitError::InvalidConfig("log_interval must be at least 1".into()));
        }
        Ok(())
    }
}
