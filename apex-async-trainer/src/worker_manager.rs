//! Management of worker threads.
mod base;
mod config;
pub use base::WorkerManager;
pub use config::WorkerManagerConfig;
