//! Central replay buffer with uniform, proportional and episodic sampling.
//!
//! [`ReplayBuffer`] is a circular transition store. The way slots are sampled is
//! delegated to a [`SamplingPolicy`], selected by [`ReplayKind`]:
//!
//! - [`UniformPolicy`]: uniform sampling, importance sampling ratios are 1.
//! - [`ProportionalPolicy`]: prioritized experience replay backed by a [`SumTree`].
//! - [`EpisodicPolicy`]: merges and samples whole episodes.
//!
//! [`SharedReplayBuffer`] puts the buffer behind a single mutex so that workers
//! and the learner can use it concurrently.
//!
//! # Examples
//!
//! ```
//! use apex_core::replay_buffer::{ReplayBuffer, ReplayBufferConfig, ReplayKind, TransitionBatch};
//!
//! let config = ReplayBufferConfig::default()
//!     .kind(ReplayKind::Proportional)
//!     .capacity(8)
//!     .min_size(4)
//!     .batch_size(4);
//! let mut buffer = ReplayBuffer::<Vec<f32>, Vec<i64>>::build(&config).unwrap();
//!
//! for i in 0..4 {
//!     let tr = TransitionBatch::from_rows(vec![i as f32], vec![0], vec![i as f32 + 1.], vec![0.]);
//!     buffer.add(tr).unwrap();
//! }
//! assert!(buffer.good_to_learn());
//!
//! let batch = buffer.sample(None).unwrap();
//! assert_eq!(batch.len(), 4);
//! ```
mod base;
mod batch;
mod config;
mod iw_scheduler;
mod policy;
mod priority;
mod shared;
mod sum_tree;
pub use base::ReplayBuffer;
pub use batch::{BatchBase, SampledBatch, TransitionBatch};
pub use config::{ReplayBufferConfig, ReplayKind};
pub use iw_scheduler::BetaScheduler;
pub use policy::{EpisodicPolicy, ProportionalPolicy, Sample, SamplingPolicy, UniformPolicy};
pub use priority::{compute_priority, n_step_td_errors, worker_priorities};
pub use shared::SharedReplayBuffer;
pub use sum_tree::SumTree;
