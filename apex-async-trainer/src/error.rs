//! Errors in the library.
use thiserror::Error;

/// Errors in asynchronous training.
#[derive(Debug, Error)]
pub enum AsyncTrainerError {
    /// Failed to send transitions from a worker.
    #[error("Failed to send a message for pushing transitions")]
    SendMsgForPush,

    /// The other end of a channel has gone.
    #[error("Channel to {0} is disconnected")]
    Disconnected(&'static str),

    /// A thread panicked.
    #[error("Thread of {0} panicked")]
    ThreadPanicked(String),

    /// A lock is poisoned.
    #[error("Lock of {0} is poisoned")]
    LockPoisoned(&'static str),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
