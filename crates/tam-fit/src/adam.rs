//! Adam optimiser over a flat parameter slice.

use crate::FitConfig;

/// First- and second-moment state for one parameter tensor.
///
/// Bias-corrected update per element:
///
/// ```text
/// m ← β₁·m + (1-β₁)·g
/// v ← β₂·v + (1-β₂)·g²
/// p ← p - lr/(1-β₁ᵗ) · m / (√v/√(1-β₂ᵗ) + ε)
/// ```
#[derive(Debug, Clone)]
pub struct Adam {
    lr:      f32,
    beta1:   f32,
    beta2:   f32,
    epsilon: f32,
    m:       Vec<f32>,
    v:       Vec<f32>,
    t:       u64,
}

impl Adam {
    pub fn new(len: usize, config: &FitConfig) -> Self {
        Self {
            lr:      config.learning_rate,
            beta1:   config.beta1,
            beta2:   config.beta2,
            epsilon: config.epsilon,
            m:       vec![0.0; len],
            v:       vec![0.0; len],
            t:       0,
        }
    }

    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }

    /// Updates applied so far.
    pub fn steps(&self) -> u64 {
        self.t
    }

    /// Apply one update.  `params` and `grads` are walked in lockstep and
    /// must yield the same `len()` elements in the same order on every call;
    /// extra elements on either side are ignored.
    pub fn step<'p, 'g, P, G>(&mut self, params: P, grads: G)
    where
        P: IntoIterator<Item = &'p mut f32>,
        G: IntoIterator<Item = &'g f32>,
    {
        self.t += 1;
        let t = self.t.min(i32::MAX as u64) as i32;
        let bias1 = 1.0 - self.beta1.powi(t);
        let bias2_sqrt = (1.0 - self.beta2.powi(t)).sqrt();
        let step_size = self.lr / bias1;

        for (((p, &g), m), v) in params.into_iter().zip(grads).zip(&mut self.m).zip(&mut self.v) {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            *p -= step_size * *m / (v.sqrt() / bias2_sqrt + self.epsilon);
        }
    }
}
