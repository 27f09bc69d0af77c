#![warn(missing_docs)]
//! Core components of an Ape-X style training architecture.
//!
//! Experience flows from workers into a [`local_buffer::LocalBuffer`], is
//! flushed into a central [`replay_buffer::ReplayBuffer`] and sampled from it
//! by the learner through a [`dataset::Dataset`]. Priorities computed from the
//! learner's TD-errors flow back into the buffer.
//!
//! ```mermaid
//! graph LR
//!     W[Worker]-->|TransitionBatch|L[LocalBuffer]
//!     L -->|merge|R[SharedReplayBuffer]
//!     R -->|SampledBatch|D[Dataset]
//!     D --> A[Learner]
//!     A -->|update_priorities|R
//! ```
pub mod dataset;
pub mod dummy;
pub mod error;
pub mod local_buffer;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Agent, Env, LearnOutput, Policy, ReplayService, Step, StepProcessor, SyncModel,
    TransitionStepProcessor,
};
pub use error::ApexError;
