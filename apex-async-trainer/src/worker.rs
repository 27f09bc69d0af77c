//! Workers interacting with environments.
mod base;
mod config;
mod stat;
pub use base::Worker;
pub use config::{RunMode, WorkerConfig};
pub use stat::{worker_stats_fmt, WorkerStat};
