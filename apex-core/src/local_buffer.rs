//! Worker-side buffer of transitions.
//!
//! A [`LocalBuffer`] accumulates the steps of a worker's rollout and turns them
//! into one contiguous batch of multi-step transitions, which is merged into the
//! central replay buffer at once. [`GatheringBuffer`] collects such batches from
//! several producers until a target number has arrived.
mod base;
mod config;
mod gather;
pub use base::LocalBuffer;
pub use config::LocalBufferConfig;
pub use gather::GatheringBuffer;
