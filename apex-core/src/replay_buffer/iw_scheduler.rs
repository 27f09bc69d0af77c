//! Scheduling the exponent of importance sampling ratios for PER.
use serde::{Deserialize, Serialize};

/// Scheduler of the exponent $\beta$ of importance sampling ratios.
///
/// $\beta$ increases linearly from `beta_0` to `1.0` over `beta_steps` calls
/// of [`BetaScheduler::add_n_samples`], then stays at `1.0`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BetaScheduler {
    /// Initial value of $\beta$.
    pub beta_0: f32,

    /// Sample calls when beta reaches 1.
    pub beta_steps: usize,

    /// Current sample calls.
    pub n_samples: usize,
}

impl BetaScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f32, beta_steps: usize) -> Self {
        Self {
            beta_0,
            beta_steps,
            n_samples: 0,
        }
    }

    /// Gets the exponent of importance sampling ratios.
    pub fn beta(&self) -> f32 {
        if self.n_samples >= self.beta_steps {
            1.
        } else {
            let d = 1. - self.beta_0;
            self.beta_0 + d * (self.n_samples as f32 / self.beta_steps as f32)
        }
    }

    /// Counts a call of `sample`.
    pub fn add_n_samples(&mut self) {
        self.n_samples = self.n_samples.saturating_add(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_linear_then_clamped() {
        let mut s = BetaScheduler::new(0.4, 4);
        let mut betas = vec![];
        for _ in 0..6 {
            betas.push(s.beta());
            s.add_n_samples();
        }
        let expected = [0.4, 0.55, 0.7, 0.85, 1.0, 1.0];
        for (b, e) in betas.iter().zip(expected.iter()) {
            assert!((b - e).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_steps() {
        let s = BetaScheduler::new(0.4, 0);
        assert_eq!(s.beta(), 1.0);
    }
}
