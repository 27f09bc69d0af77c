//! Local buffer of a worker.
use super::LocalBufferConfig;
use crate::{
    error::ApexError,
    replay_buffer::{worker_priorities, BatchBase, TransitionBatch},
};
use anyhow::Result;
use log::trace;

/// Accumulates steps of a rollout and folds them into multi-step transitions.
///
/// Each call of [`LocalBuffer::add`] appends one time step of `n_envs` rows.
/// [`LocalBuffer::sample`] returns the stored steps env-major, i.e., all steps of
/// the first environment, then all steps of the second, and so on, with rewards
/// folded over up to `n_steps` steps:
///
/// - `reward = Σ_k γ^k r_{t+k}`,
/// - `next_obs`, `is_terminated` and `is_truncated` of the last folded step,
/// - `steps` the number of folded steps.
///
/// Folding stops after a terminated or truncated step and at the end of the
/// stored window.
pub struct LocalBuffer<O: BatchBase, A: BatchBase> {
    config: LocalBufferConfig,
    steps: Vec<TransitionBatch<O, A>>,
    values: Vec<Option<(Vec<f32>, Vec<f32>)>>,
}

impl<O: BatchBase, A: BatchBase> LocalBuffer<O, A> {
    /// Creates an empty buffer.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(config: &LocalBufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            steps: Vec::with_capacity(config.seqlen),
            values: Vec::with_capacity(config.seqlen),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LocalBufferConfig {
        &self.config
    }

    /// Appends a time step of `n_envs` rows.
    pub fn add(&mut self, step: TransitionBatch<O, A>) -> Result<()> {
        self.check_step(&step)?;
        self.steps.push(step);
        self.values.push(None);
        Ok(())
    }

    /// Appends a time step with value estimates used for worker-side prioritization.
    ///
    /// `q[e]` is the value of the action taken in environment `e`, `next_q[e]` the
    /// bootstrap value at its next observation.
    pub fn add_with_values(
        &mut self,
        step: TransitionBatch<O, A>,
        q: Vec<f32>,
        next_q: Vec<f32>,
    ) -> Result<()> {
        self.check_step(&step)?;
        for (column, v) in [("q", &q), ("next_q", &next_q)] {
            if v.len() != self.config.n_envs {
                return Err(ApexError::ColumnLength {
                    column,
                    expected: self.config.n_envs,
                    actual: v.len(),
                })?;
            }
        }
        self.steps.push(step);
        self.values.push(Some((q, next_q)));
        Ok(())
    }

    fn check_step(&self, step: &TransitionBatch<O, A>) -> Result<()> {
        step.validate()?;
        if step.len() != self.config.n_envs {
            return Err(ApexError::ColumnLength {
                column: "step",
                expected: self.config.n_envs,
                actual: step.len(),
            })?;
        }
        Ok(())
    }

    /// Returns the number of stored time steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no steps are stored.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns `true` if `seqlen` steps are stored.
    pub fn is_full(&self) -> bool {
        self.steps.len() >= self.config.seqlen
    }

    /// Clears the stored steps.
    pub fn reset(&mut self) {
        self.steps.clear();
        self.values.clear();
    }

    /// Returns the stored steps as multi-step transitions, env-major.
    ///
    /// Priorities are attached if worker-side prioritization is enabled and every
    /// step was added with value estimates.
    pub fn sample(&self) -> TransitionBatch<O, A> {
        let n_envs = self.config.n_envs;
        let len = self.steps.len();
        let n_steps = self.config.n_steps.max(1);
        let gamma = self.config.gamma;

        let with_values = self.config.worker_side_prioritization
            && !self.values.is_empty()
            && self.values.iter().all(|v| v.is_some());
        let flat = TransitionBatch::concat(
            self.steps
                .iter()
                .map(|s| s.select(&(0..s.len()).collect::<Vec<_>>()))
                .collect(),
        );
        let row = |t: usize, e: usize| t * n_envs + e;
        let is_done = |ix: usize| flat.is_terminated[ix] == 1 || flat.is_truncated[ix] == 1;

        let total = n_envs * len;
        let mut first_ixs = Vec::with_capacity(total);
        let mut last_ixs = Vec::with_capacity(total);
        let mut reward = Vec::with_capacity(total);
        let mut steps = Vec::with_capacity(total);
        let mut q = Vec::with_capacity(total);
        let mut next_q = Vec::with_capacity(total);

        for e in 0..n_envs {
            for t in 0..len {
                let mut r = 0.;
                let mut discount = 1.;
                let mut last = t;
                for k in 0..n_steps {
                    if t + k >= len {
                        break;
                    }
                    last = t + k;
                    r += discount * flat.reward[row(last, e)];
                    discount *= gamma;
                    if is_done(row(last, e)) {
                        break;
                    }
                }

                first_ixs.push(row(t, e));
                last_ixs.push(row(last, e));
                reward.push(r);
                steps.push((last - t + 1) as u32);
                if with_values {
                    if let (Some((q_t, _)), Some((_, nq_last))) = (&self.values[t], &self.values[last]) {
                        q.push(q_t[e]);
                        next_q.push(nq_last[e]);
                    }
                }
            }
        }

        let mut batch = TransitionBatch {
            obs: flat.obs.sample(&first_ixs),
            act: flat.act.sample(&first_ixs),
            next_obs: flat.next_obs.sample(&last_ixs),
            reward,
            is_terminated: flat.is_terminated.sample(&last_ixs),
            is_truncated: flat.is_truncated.sample(&last_ixs),
            steps,
            priority: None,
        };

        if with_values {
            let priority = worker_priorities(
                &batch,
                &q,
                &next_q,
                gamma,
                self.config.per_alpha,
                self.config.per_epsilon,
            );
            batch.priority = Some(priority);
        }
        trace!("Sampled {} transitions from local buffer", batch.len());

        batch
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::replay_buffer::{ReplayBuffer, ReplayBufferConfig, ReplayKind};

    type Local = LocalBuffer<Vec<f32>, Vec<i64>>;
    type Batch = TransitionBatch<Vec<f32>, Vec<i64>>;

    /// A step of two environments with observations `t` and `10 + t`.
    fn step(t: usize, reward: [f32; 2], terminated: [i8; 2]) -> Batch {
        let t = t as f32;
        let mut b = Batch::from_rows(
            vec![t, 10. + t],
            vec![t as i64, 10 + t as i64],
            vec![t + 1., 11. + t],
            reward.to_vec(),
        );
        b.is_terminated = terminated.to_vec();
        b
    }

    #[test]
    fn test_transpose_time_major_to_env_major() -> Result<()> {
        let config = LocalBufferConfig::default().n_envs(2).seqlen(3).n_steps(1);
        let mut buffer = Local::build(&config)?;
        for t in 0..3 {
            assert!(!buffer.is_full());
            buffer.add(step(t, [t as f32, 10. + t as f32], [0, 0]))?;
        }
        assert!(buffer.is_full());

        let batch = buffer.sample();
        assert_eq!(batch.obs, vec![0., 1., 2., 10., 11., 12.]);
        assert_eq!(batch.act, vec![0, 1, 2, 10, 11, 12]);
        assert_eq!(batch.next_obs, vec![1., 2., 3., 11., 12., 13.]);
        assert_eq!(batch.reward, vec![0., 1., 2., 10., 11., 12.]);
        assert_eq!(batch.steps, vec![1; 6]);
        assert_eq!(batch.priority, None);

        buffer.reset();
        assert_eq!(buffer.len(), 0);
        assert!(buffer.sample().is_empty());
        Ok(())
    }

    #[test]
    fn test_n_step_folding() -> Result<()> {
        let config = LocalBufferConfig::default()
            .n_envs(2)
            .seqlen(4)
            .n_steps(3)
            .gamma(0.5);
        let mut buffer = Local::build(&config)?;
        // the second environment terminates at t = 1
        buffer.add(step(0, [1., 1.], [0, 0]))?;
        buffer.add(step(1, [1., 1.], [0, 1]))?;
        buffer.add(step(2, [1., 1.], [0, 0]))?;
        buffer.add(step(3, [1., 1.], [0, 0]))?;

        let batch = buffer.sample();
        assert_eq!(
            batch.reward,
            vec![1.75, 1.75, 1.5, 1., 1.5, 1., 1.5, 1.]
        );
        assert_eq!(batch.steps, vec![3, 3, 2, 1, 2, 1, 2, 1]);
        assert_eq!(batch.next_obs, vec![3., 4., 4., 4., 12., 12., 14., 14.]);
        assert_eq!(batch.is_terminated, vec![0, 0, 0, 0, 1, 1, 0, 0]);
        assert_eq!(batch.discount(), vec![1., 1., 1., 1., 0., 0., 1., 1.]);
        Ok(())
    }

    #[test]
    fn test_add_rejects_wrong_number_of_envs() -> Result<()> {
        let config = LocalBufferConfig::default().n_envs(3);
        let mut buffer = Local::build(&config)?;
        assert!(buffer.add(step(0, [0., 0.], [0, 0])).is_err());
        assert!(buffer.is_empty());
        Ok(())
    }

    #[test]
    fn test_worker_side_priorities() -> Result<()> {
        let config = LocalBufferConfig::default()
            .n_envs(2)
            .seqlen(2)
            .n_steps(1)
            .gamma(1.)
            .per_alpha(1.)
            .per_epsilon(0.5)
            .worker_side_prioritization(true);
        let mut buffer = Local::build(&config)?;
        buffer.add_with_values(step(0, [1., 2.], [0, 1]), vec![0., 0.], vec![1., 5.])?;
        buffer.add_with_values(step(1, [1., 2.], [0, 0]), vec![3., 1.], vec![0., 0.])?;

        let batch = buffer.sample();
        // env 0: |1 + 1 - 0|, |1 + 0 - 3|; env 1: |2 - 0| (terminal), |2 + 0 - 1|
        assert_eq!(batch.priority, Some(vec![2.5, 2.5, 2.5, 1.5]));

        buffer.reset();
        buffer.add(step(0, [1., 2.], [0, 0]))?;
        assert_eq!(buffer.sample().priority, None);
        Ok(())
    }

    #[test]
    fn test_zero_td_error_keeps_positive_priority() -> Result<()> {
        let config = LocalBufferConfig::default()
            .seqlen(2)
            .n_steps(1)
            .gamma(1.)
            .worker_side_prioritization(true);
        let mut buffer = Local::build(&config)?;
        let mut tr = TransitionBatch::from_rows(vec![0.], vec![0], vec![1.], vec![1.]);
        tr.is_terminated = vec![1];
        buffer.add_with_values(tr, vec![1.], vec![0.])?;

        let batch = buffer.sample();
        let priority = batch.priority.clone().unwrap();
        assert!(priority[0] > 0.);

        // the central buffer accepts the flush as it is
        let mut replay = ReplayBuffer::build(
            &ReplayBufferConfig::default()
                .kind(ReplayKind::Proportional)
                .capacity(4)
                .min_size(1),
        )?;
        replay.merge(batch, 1)?;
        assert_eq!(replay.len(), 1);
        Ok(())
    }

    #[test]
    fn test_build_rejects_zero_epsilon_with_worker_priorities() {
        let config = LocalBufferConfig::default()
            .worker_side_prioritization(true)
            .per_epsilon(0.);
        assert!(Local::build(&config).is_err());
        assert!(Local::build(&config.worker_side_prioritization(false)).is_ok());
    }
}
