use super::{Sample, SamplingPolicy};
use crate::{
    error::ApexError,
    replay_buffer::{compute_priority, BetaScheduler, ReplayBufferConfig, SumTree},
};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, Rng};

/// Proportional prioritized experience replay.
///
/// A slot `i` is sampled with probability $P(i) = p_i / \sum_k p_k$, where the
/// priority $p_i = (|\delta_i| + \epsilon)^\alpha$ is computed from the latest
/// TD-error $\delta_i$. Transitions merged without priorities get the top
/// priority, so that they are likely sampled at least once.
///
/// Sampling is stratified: the total priority is split into `n` equal segments
/// and one value is drawn uniformly in each. The importance sampling ratio of
/// a sampled slot is $(\min_j P(j) / P(i))^\beta$ with the minimum taken over
/// the batch, so the largest ratio in a batch is 1.
pub struct ProportionalPolicy {
    sum_tree: SumTree,
    top_priority: f32,
    update_top_priority: bool,
    alpha: f32,
    epsilon: f32,
    beta_scheduler: BetaScheduler,
}

impl ProportionalPolicy {
    /// Creates a policy for a buffer of the given configuration.
    pub fn new(config: &ReplayBufferConfig) -> Self {
        Self {
            sum_tree: SumTree::new(config.capacity),
            top_priority: config.top_priority,
            update_top_priority: config.update_top_priority,
            alpha: config.per_alpha,
            epsilon: config.per_epsilon,
            beta_scheduler: BetaScheduler::new(config.beta0, config.beta_steps),
        }
    }

    /// Priority assigned to transitions merged without priorities.
    pub fn top_priority(&self) -> f32 {
        self.top_priority
    }

    /// Total priority of the buffer.
    pub fn total_priority(&self) -> f64 {
        self.sum_tree.total_priority()
    }

    /// Priority of a memory slot.
    pub fn priority(&self, index: usize) -> f64 {
        self.sum_tree.get(index)
    }

    fn raise_top_priority(&mut self, priorities: &[f32]) {
        if self.update_top_priority {
            self.top_priority = priorities.iter().cloned().fold(self.top_priority, f32::max);
        }
    }
}

impl SamplingPolicy for ProportionalPolicy {
    fn on_merge(&mut self, start: usize, len: usize, priorities: Option<&[f32]>) {
        let capacity = self.sum_tree.capacity();
        for k in 0..len {
            let p = match priorities {
                Some(ps) => ps[k],
                None => self.top_priority,
            };
            self.sum_tree.update((start + k) % capacity, p as f64);
        }
        if let Some(ps) = priorities {
            self.raise_top_priority(ps);
        }
    }

    fn sample(&mut self, n: usize, _size: usize, rng: &mut StdRng) -> Sample {
        let total = self.sum_tree.total_priority();
        let segment = total / n as f64;
        let beta = self.beta_scheduler.beta();

        let (indices, probs): (Vec<_>, Vec<_>) = (0..n)
            .map(|i| {
                let value = segment * i as f64 + rng.gen::<f64>() * segment;
                let (p, ix) = self.sum_tree.find(value);
                (ix, p / total)
            })
            .unzip();

        let min_prob = probs.iter().cloned().fold(f64::INFINITY, f64::min);
        let is_ratio = probs
            .iter()
            .map(|&prob| (min_prob / prob).powf(beta as f64) as f32)
            .collect();
        self.beta_scheduler.add_n_samples();
        trace!("Sampled {} slots, total priority {}, beta {}", n, total, beta);

        Sample {
            indices,
            is_ratio,
            episode_lens: None,
        }
    }

    fn update_priorities(&mut self, td_errors: &[f32], indices: &[usize]) -> Result<()> {
        let priorities = td_errors
            .iter()
            .map(|&td| compute_priority(td, self.alpha, self.epsilon))
            .collect::<Vec<_>>();

        for (position, &priority) in priorities.iter().enumerate() {
            if !(priority.is_finite() && priority > 0.) {
                return Err(ApexError::InvalidPriority { priority, position })?;
            }
        }

        for (&ix, &p) in indices.iter().zip(priorities.iter()) {
            self.sum_tree.update(ix, p as f64);
        }
        self.raise_top_priority(&priorities);
        Ok(())
    }

    fn uses_priorities(&self) -> bool {
        true
    }

    fn beta(&self) -> Option<f32> {
        Some(self.beta_scheduler.beta())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    fn policy(alpha: f32, epsilon: f32) -> ProportionalPolicy {
        let config = ReplayBufferConfig::default()
            .capacity(8)
            .min_size(0)
            .per_alpha(alpha)
            .per_epsilon(epsilon)
            .beta0(0.4)
            .beta_steps(4);
        ProportionalPolicy::new(&config)
    }

    #[test]
    fn test_new_transitions_get_top_priority() {
        let mut p = policy(0.6, 0.01);
        p.on_merge(6, 4, None);
        for ix in [6, 7, 0, 1] {
            assert_eq!(p.priority(ix), 2.);
        }
        assert_eq!(p.priority(2), 0.);
        assert_eq!(p.total_priority(), 8.);
    }

    #[test]
    fn test_update_transforms_and_tracks_top() {
        let mut p = policy(1., 0.);
        p.on_merge(0, 4, None);
        p.update_priorities(&[-10., 10., 10., 10.], &[0, 1, 2, 3]).unwrap();
        assert_eq!(p.total_priority(), 40.);
        assert_eq!(p.top_priority(), 10.);

        p.on_merge(4, 1, None);
        assert_eq!(p.priority(4), 10.);
    }

    #[test]
    fn test_invalid_update_leaves_tree_unchanged() {
        let mut p = policy(0.6, 0.01);
        p.on_merge(0, 2, None);
        let res = p.update_priorities(&[1., f32::NAN], &[0, 1]);
        assert!(res.is_err());
        assert_eq!(p.priority(0), 2.);
        assert_eq!(p.priority(1), 2.);
    }

    #[test]
    fn test_is_ratio_and_beta() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut p = policy(1., 0.);
        p.on_merge(0, 2, Some(&[1., 3.]));
        assert_eq!(p.beta(), Some(0.4));

        let sample = p.sample(2, 2, &mut rng);
        // segment width 2: the first value falls in [0, 2), the second in [2, 4)
        assert_eq!(sample.indices[1], 1);
        assert!(sample.is_ratio.iter().all(|&w| w > 0. && w <= 1.));
        assert!((p.beta().unwrap() - 0.55).abs() < 1e-6);
    }
}
