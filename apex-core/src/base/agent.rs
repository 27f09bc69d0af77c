//! Agent.
use crate::{
    record::Record,
    replay_buffer::{BatchBase, SampledBatch},
};
use anyhow::Result;

/// Output of an optimization step.
#[derive(Debug)]
pub struct LearnOutput {
    /// TD-errors of the sampled transitions, in the order of the batch.
    ///
    /// These are converted into priorities by the replay buffer.
    pub td_errors: Vec<f32>,

    /// Information of the optimization step, e.g., loss.
    pub record: Record,
}

/// Represents a trainable model on batches sampled from a replay buffer.
pub trait Agent<O: BatchBase, A: BatchBase> {
    /// Performs an optimization step on the given batch.
    ///
    /// Importance sampling ratios in `batch.is_ratio` should weight the loss.
    fn learn(&mut self, batch: &SampledBatch<O, A>) -> Result<LearnOutput>;

    /// Copies the online parameters into the target network.
    fn sync_target(&mut self);
}
