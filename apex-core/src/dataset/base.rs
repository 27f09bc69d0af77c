use crate::{
    replay_buffer::{BatchBase, SampledBatch},
    ReplayService,
};
use anyhow::Result;

/// Source of batches for the learner.
pub trait Dataset<O: BatchBase, A: BatchBase> {
    /// Returns `true` if batches can be sampled.
    fn good_to_learn(&self) -> Result<bool>;

    /// Samples a batch.
    fn sample(&mut self) -> Result<SampledBatch<O, A>>;
}

impl<O, A, D> Dataset<O, A> for Box<D>
where
    O: BatchBase,
    A: BatchBase,
    D: Dataset<O, A> + ?Sized,
{
    fn good_to_learn(&self) -> Result<bool> {
        (**self).good_to_learn()
    }

    fn sample(&mut self) -> Result<SampledBatch<O, A>> {
        (**self).sample()
    }
}

/// A [`Dataset`] sampling from a [`ReplayService`] on every call.
pub struct ReplayDataset<S> {
    service: S,
    batch_size: Option<usize>,
}

impl<S> ReplayDataset<S> {
    /// Creates a dataset. `None` uses the batch size of the replay buffer.
    pub fn new(service: S, batch_size: Option<usize>) -> Self {
        Self {
            service,
            batch_size,
        }
    }
}

impl<O, A, S> Dataset<O, A> for ReplayDataset<S>
where
    O: BatchBase,
    A: BatchBase,
    S: ReplayService<O, A>,
{
    fn good_to_learn(&self) -> Result<bool> {
        self.service.good_to_learn()
    }

    fn sample(&mut self) -> Result<SampledBatch<O, A>> {
        self.service.sample(self.batch_size)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::replay_buffer::{ReplayBufferConfig, SharedReplayBuffer, TransitionBatch};

    #[test]
    fn test_replay_dataset() -> Result<()> {
        let config = ReplayBufferConfig::default().capacity(8).min_size(2);
        let buffer = SharedReplayBuffer::<Vec<f32>, Vec<i64>>::build(&config)?;
        let mut dataset = ReplayDataset::new(buffer.clone(), Some(3));
        assert!(!dataset.good_to_learn()?);
        assert!(dataset.sample().is_err());

        buffer.merge(
            TransitionBatch::from_rows(vec![0., 1.], vec![0, 1], vec![1., 2.], vec![0., 0.]),
            2,
        )?;
        assert!(dataset.good_to_learn()?);
        assert_eq!(dataset.sample()?.len(), 3);
        Ok(())
    }
}
