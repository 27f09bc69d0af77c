//! Framework-agnostic API of the central replay buffer.
use crate::replay_buffer::{BatchBase, SampledBatch, TransitionBatch};
use anyhow::Result;

/// The API surface of the central replay buffer.
///
/// Callers are concurrent, so every method takes `&self`. Implementations must
/// linearize the calls: a sample never observes a partially applied merge or
/// priority update.
///
/// Implemented by [`SharedReplayBuffer`](crate::replay_buffer::SharedReplayBuffer), which
/// guards the buffer with a single mutex, and by channel-based clients of a replay
/// service running on another thread.
pub trait ReplayService<O: BatchBase, A: BatchBase> {
    /// Merges the first `batch_size` transitions of `batch` into the buffer.
    ///
    /// The merge is all-or-nothing: on error the buffer is unchanged.
    fn merge(&self, batch: TransitionBatch<O, A>, batch_size: usize) -> Result<()>;

    /// Samples a batch. `None` uses the configured batch size.
    fn sample(&self, batch_size: Option<usize>) -> Result<SampledBatch<O, A>>;

    /// Updates priorities of the transitions at `indices` from TD-errors.
    fn update_priorities(&self, priorities: &[f32], indices: &[usize]) -> Result<()>;

    /// Returns `true` if the buffer holds enough transitions to be sampled.
    fn good_to_learn(&self) -> Result<bool>;

    /// Returns `true` if every slot of the buffer has been written.
    fn is_full(&self) -> Result<bool>;

    /// Returns the number of transitions in the buffer.
    fn len(&self) -> Result<usize>;
}
