//! Sampling policies of the replay buffer.
//!
//! A [`SamplingPolicy`] decides which memory slots are sampled and with which
//! importance sampling ratios. The transition storage itself is owned by
//! [`ReplayBuffer`](super::ReplayBuffer), which notifies the policy of every
//! merge.
mod episodic;
mod proportional;
mod uniform;
use anyhow::Result;
pub use episodic::EpisodicPolicy;
pub use proportional::ProportionalPolicy;
use rand::rngs::StdRng;
pub use uniform::UniformPolicy;

/// Memory slots chosen by a [`SamplingPolicy`].
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Memory slots, in the order of the batch.
    pub indices: Vec<usize>,

    /// Importance sampling ratios, one per index.
    pub is_ratio: Vec<f32>,

    /// Lengths of consecutive episodes in `indices`, for episodic sampling.
    pub episode_lens: Option<Vec<usize>>,
}

impl Sample {
    /// Creates a sample with unit importance sampling ratios.
    pub fn uniform(indices: Vec<usize>) -> Self {
        let is_ratio = vec![1.; indices.len()];
        Self {
            indices,
            is_ratio,
            episode_lens: None,
        }
    }
}

/// Strategy of choosing memory slots.
///
/// Methods are called by [`ReplayBuffer`](super::ReplayBuffer) with the
/// arguments already validated: slots are in `[0, capacity)`, lengths match
/// and given priorities are finite and positive.
pub trait SamplingPolicy: Send {
    /// Called after `len` transitions have been written from slot `start`,
    /// wrapping at capacity.
    ///
    /// `priorities` are the precomputed priorities of the written transitions.
    fn on_merge(&mut self, start: usize, len: usize, priorities: Option<&[f32]>);

    /// Chooses `n` memory slots out of the `size` slots written so far.
    fn sample(&mut self, n: usize, size: usize, rng: &mut StdRng) -> Sample;

    /// Updates priorities of the slots at `indices` from TD-errors.
    ///
    /// On error the policy is unchanged.
    fn update_priorities(&mut self, td_errors: &[f32], indices: &[usize]) -> Result<()>;

    /// Returns `true` if [`SamplingPolicy::sample`] can be called.
    fn is_ready(&self) -> bool {
        true
    }

    /// Returns `true` if precomputed priorities given to `merge` are used.
    fn uses_priorities(&self) -> bool {
        false
    }

    /// Current exponent of importance sampling ratios, if any.
    fn beta(&self) -> Option<f32> {
        None
    }
}
