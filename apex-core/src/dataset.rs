//! Datasets feeding the learner.
//!
//! A [`Dataset`] decouples how batches are fetched from what the learner does with
//! them. [`ReplayDataset`] calls the replay service directly, while
//! [`PrefetchDataset`] keeps a queue of batches filled by a background thread.
mod base;
mod prefetch;
pub use base::{Dataset, ReplayDataset};
pub use prefetch::{PrefetchConfig, PrefetchDataset};
