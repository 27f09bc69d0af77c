//! Replay buffer shared among threads.
use super::{BatchBase, ReplayBuffer, ReplayBufferConfig, SampledBatch, TransitionBatch};
use crate::{error::ApexError, ReplayService};
use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// A [`ReplayBuffer`] behind a single mutex.
///
/// Every operation holds the lock for its whole duration, so the operations are
/// linearized: a sample never observes a partially applied merge or priority update,
/// and the schedule of beta advances once per sample.
///
/// Cloning gives another handle to the same buffer.
///
/// ```mermaid
/// flowchart LR
///   W1[Worker 1] -->|merge| M((Mutex))
///   W2[Worker 2] -->|merge| M
///   L[Learner] -->|sample / update_priorities| M
///   M --- B[ReplayBuffer]
/// ```
pub struct SharedReplayBuffer<O: BatchBase, A: BatchBase> {
    inner: Arc<Mutex<ReplayBuffer<O, A>>>,
}

impl<O: BatchBase, A: BatchBase> Clone for SharedReplayBuffer<O, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<O: BatchBase, A: BatchBase> SharedReplayBuffer<O, A> {
    /// Builds a shared replay buffer.
    pub fn build(config: &ReplayBufferConfig) -> Result<Self> {
        Ok(Self::new(ReplayBuffer::build(config)?))
    }

    /// Wraps an existing replay buffer.
    pub fn new(buffer: ReplayBuffer<O, A>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Runs `f` with exclusive access to the buffer.
    pub fn with<T>(&self, f: impl FnOnce(&mut ReplayBuffer<O, A>) -> T) -> Result<T> {
        let mut buffer = self.lock()?;
        Ok(f(&mut buffer))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReplayBuffer<O, A>>> {
        match self.inner.lock() {
            Ok(guard) => Ok(guard),
            Err(_) => Err(ApexError::LockPoisoned("replay buffer"))?,
        }
    }
}

impl<O: BatchBase, A: BatchBase> ReplayService<O, A> for SharedReplayBuffer<O, A> {
    fn merge(&self, batch: TransitionBatch<O, A>, batch_size: usize) -> Result<()> {
        self.lock()?.merge(batch, batch_size)
    }

    fn sample(&self, batch_size: Option<usize>) -> Result<SampledBatch<O, A>> {
        self.lock()?.sample(batch_size)
    }

    fn update_priorities(&self, priorities: &[f32], indices: &[usize]) -> Result<()> {
        self.lock()?.update_priorities(priorities, indices)
    }

    fn good_to_learn(&self) -> Result<bool> {
        Ok(self.lock()?.good_to_learn())
    }

    fn is_full(&self) -> Result<bool> {
        Ok(self.lock()?.is_full())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}
