//! Messages exchanged among threads.
use anyhow::Result;
use apex_core::replay_buffer::{SampledBatch, TransitionBatch};
use crossbeam_channel::Sender;

/// Transitions flushed by a worker.
pub struct PushedItemMessage<T> {
    /// ID of the worker.
    pub id: usize,

    /// Flushed transitions.
    pub transitions: T,
}

/// Summary of an episode finished by a worker.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeInfo {
    /// ID of the worker.
    pub worker_id: usize,

    /// Sum of rewards.
    pub score: f32,

    /// Number of steps.
    pub epslen: usize,
}

/// Result of an evaluation by [`Evaluator`](crate::Evaluator).
#[derive(Clone, Debug, PartialEq)]
pub struct EvalInfo {
    /// Version of the evaluated weights.
    pub version: usize,

    /// Mean sum of rewards over the evaluation episodes.
    pub score: f32,

    /// Mean number of steps over the evaluation episodes.
    pub epslen: f32,
}

/// Requests served by [`ReplayServer`](crate::ReplayServer).
///
/// Each request carries the channel the reply is sent to.
pub enum ReplayBufferMessage<O, A> {
    /// Merges the first `batch_size` transitions of a batch.
    Merge {
        /// Transitions.
        batch: TransitionBatch<O, A>,
        /// Number of transitions to merge.
        batch_size: usize,
        /// Reply channel.
        reply: Sender<Result<()>>,
    },

    /// Samples a batch.
    Sample {
        /// Batch size, `None` for the default.
        batch_size: Option<usize>,
        /// Reply channel.
        reply: Sender<Result<SampledBatch<O, A>>>,
    },

    /// Updates priorities from TD-errors.
    UpdatePriorities {
        /// TD-errors.
        td_errors: Vec<f32>,
        /// Memory slots.
        indices: Vec<usize>,
        /// Reply channel.
        reply: Sender<Result<()>>,
    },

    /// Asks if the buffer is ready for sampling.
    GoodToLearn(Sender<bool>),

    /// Asks if the buffer is full.
    IsFull(Sender<bool>),

    /// Asks the number of transitions.
    Len(Sender<usize>),

    /// Stops the server.
    Stop,
}
