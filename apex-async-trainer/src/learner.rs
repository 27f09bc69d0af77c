//! Learner running on its own thread.
mod base;
mod config;
mod stat;
pub use base::{Learner, LearnerHandle};
pub use config::LearnerConfig;
pub use stat::LearnerStat;
