//! Circular-storage core of the replay buffer.
use super::{
    BatchBase, EpisodicPolicy, ProportionalPolicy, ReplayBufferConfig, ReplayKind, Sample,
    SampledBatch, SamplingPolicy, TransitionBatch, UniformPolicy,
};
use crate::error::ApexError;
use anyhow::Result;
use log::{info, trace};
use rand::{rngs::StdRng, SeedableRng};

/// A replay buffer of a fixed capacity.
///
/// Transitions are written in a circular manner: once `capacity` transitions have been
/// stored, the oldest ones are overwritten. Which slots are sampled is decided by a
/// [`SamplingPolicy`] selected by [`ReplayBufferConfig::kind`].
///
/// The buffer is not synchronized. Use
/// [`SharedReplayBuffer`](super::SharedReplayBuffer) to share it among threads.
pub struct ReplayBuffer<O: BatchBase, A: BatchBase> {
    /// Maximum number of transitions.
    capacity: usize,

    /// Number of transitions ever written. The next slot is `mem_idx % capacity`.
    mem_idx: usize,

    /// Number of written slots, at most `capacity`.
    size: usize,

    min_size: usize,

    batch_size: usize,

    kind: ReplayKind,

    storage: TransitionBatch<O, A>,

    policy: Box<dyn SamplingPolicy>,

    rng: StdRng,
}

impl<O: BatchBase, A: BatchBase> ReplayBuffer<O, A> {
    /// Builds a replay buffer.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(config: &ReplayBufferConfig) -> Result<Self> {
        config.validate()?;

        let capacity = config.capacity;
        let policy: Box<dyn SamplingPolicy> = match config.kind {
            ReplayKind::Uniform => Box::new(UniformPolicy),
            ReplayKind::Proportional => Box::new(ProportionalPolicy::new(config)),
            ReplayKind::Episodic => Box::new(EpisodicPolicy::new(capacity)),
        };
        info!(
            "Build replay buffer: kind = {:?}, capacity = {}, min_size = {}",
            config.kind, capacity, config.min_size
        );

        Ok(Self {
            capacity,
            mem_idx: 0,
            size: 0,
            min_size: config.min_size,
            batch_size: config.batch_size,
            kind: config.kind,
            storage: TransitionBatch::with_capacity(capacity),
            policy,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Adds all transitions of `batch`.
    pub fn add(&mut self, batch: TransitionBatch<O, A>) -> Result<()> {
        let batch_size = batch.len();
        self.merge(batch, batch_size)
    }

    /// Merges the first `batch_size` transitions of `batch`.
    ///
    /// If the batch carries priorities and the sampling policy uses them, they are
    /// stored as they are; otherwise new transitions get the top priority.
    /// For [`ReplayKind::Episodic`], the merged transitions form one episode.
    ///
    /// Nothing is written if an error is returned.
    pub fn merge(&mut self, mut batch: TransitionBatch<O, A>, batch_size: usize) -> Result<()> {
        batch.validate()?;

        if batch_size > batch.len() {
            return Err(ApexError::InvalidBatchSize {
                batch_size,
                len: batch.len(),
            })?;
        }
        if batch_size > self.capacity {
            return Err(ApexError::BatchTooLarge {
                batch_size,
                capacity: self.capacity,
            })?;
        }
        if batch_size == 0 {
            return Ok(());
        }
        if batch_size < batch.len() {
            let ixs = (0..batch_size).collect::<Vec<_>>();
            batch = batch.select(&ixs);
        }

        let priority = match batch.priority.take() {
            Some(ps) if self.policy.uses_priorities() => {
                for (position, &priority) in ps.iter().enumerate() {
                    if !(priority.is_finite() && priority > 0.) {
                        return Err(ApexError::InvalidPriority { priority, position })?;
                    }
                }
                Some(ps)
            }
            _ => None,
        };

        let start = self.next_slot();
        self.storage.write(start, batch);
        self.policy.on_merge(start, batch_size, priority.as_deref());

        self.mem_idx += batch_size;
        self.size = self.mem_idx.min(self.capacity);
        trace!("Merged {} transitions at slot {}", batch_size, start);

        Ok(())
    }

    /// Samples a batch of transitions.
    ///
    /// `None` uses the configured batch size. For [`ReplayKind::Episodic`] the size
    /// is the number of episodes.
    ///
    /// Returns [`ApexError::NotGoodToLearn`] if [`ReplayBuffer::good_to_learn`] is `false`.
    pub fn sample(&mut self, batch_size: Option<usize>) -> Result<SampledBatch<O, A>> {
        if !self.good_to_learn() {
            return Err(ApexError::NotGoodToLearn {
                size: self.size,
                min_size: self.min_size,
            })?;
        }

        let n = batch_size.unwrap_or(self.batch_size);
        let Sample {
            indices,
            is_ratio,
            episode_lens,
        } = self.policy.sample(n, self.size, &mut self.rng);

        Ok(SampledBatch {
            transitions: self.storage.select(&indices),
            is_ratio,
            indices,
            episode_lens,
        })
    }

    /// Updates priorities of the transitions at `indices` from TD-errors.
    ///
    /// Nothing is written if an error is returned.
    pub fn update_priorities(&mut self, td_errors: &[f32], indices: &[usize]) -> Result<()> {
        if td_errors.len() != indices.len() {
            return Err(ApexError::PriorityLength {
                priorities: td_errors.len(),
                indices: indices.len(),
            })?;
        }
        if let Some(&index) = indices.iter().find(|&&ix| ix >= self.size) {
            return Err(ApexError::IndexOutOfRange {
                index,
                len: self.size,
            })?;
        }
        if let Some(position) = td_errors.iter().position(|td| td.is_nan()) {
            return Err(ApexError::InvalidPriority {
                priority: td_errors[position],
                position,
            })?;
        }

        self.policy.update_priorities(td_errors, indices)
    }

    /// Returns `true` if the buffer holds at least `min_size` transitions.
    pub fn good_to_learn(&self) -> bool {
        self.size > 0 && self.size >= self.min_size && self.policy.is_ready()
    }

    /// Returns `true` if every slot has been written.
    pub fn is_full(&self) -> bool {
        self.size >= self.capacity
    }

    /// Returns the number of transitions.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the buffer has no transitions.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of transitions ever written, including overwritten ones.
    pub fn mem_idx(&self) -> usize {
        self.mem_idx
    }

    /// Returns the slot to be written next.
    pub fn next_slot(&self) -> usize {
        self.mem_idx % self.capacity
    }

    /// Returns the sampling strategy.
    pub fn kind(&self) -> ReplayKind {
        self.kind
    }

    /// Returns the current exponent of importance sampling ratios, if any.
    pub fn beta(&self) -> Option<f32> {
        self.policy.beta()
    }
}
