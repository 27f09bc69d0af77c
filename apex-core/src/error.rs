//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum ApexError {
    /// Sampling was requested before the buffer held `min_size` transitions.
    #[error("Not enough transitions to start learning: {size} in buffer, {min_size} required")]
    NotGoodToLearn {
        /// Transitions in the buffer.
        size: usize,
        /// Minimum transitions required.
        min_size: usize,
    },

    /// Columns of a batch have different lengths.
    #[error("Column `{column}` has {actual} rows, expected {expected}")]
    ColumnLength {
        /// Name of the column.
        column: &'static str,
        /// Expected number of rows.
        expected: usize,
        /// Actual number of rows.
        actual: usize,
    },

    /// A merged batch does not fit into the buffer.
    #[error("Batch of {batch_size} transitions exceeds capacity {capacity}")]
    BatchTooLarge {
        /// Number of transitions in the batch.
        batch_size: usize,
        /// Capacity of the buffer.
        capacity: usize,
    },

    /// The number of transitions to merge exceeds the length of the batch.
    #[error("Cannot merge {batch_size} transitions from a batch of {len}")]
    InvalidBatchSize {
        /// Requested number of transitions.
        batch_size: usize,
        /// Number of transitions in the batch.
        len: usize,
    },

    /// A priority is NaN, infinite or not positive.
    #[error("Invalid priority {priority} at position {position}")]
    InvalidPriority {
        /// The offending value.
        priority: f32,
        /// Position in the given priorities.
        position: usize,
    },

    /// A memory index does not point at a stored transition.
    #[error("Index {index} out of range for {len} stored transitions")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of stored transitions.
        len: usize,
    },

    /// Priorities and indices have different lengths.
    #[error("{priorities} priorities given for {indices} indices")]
    PriorityLength {
        /// Number of priorities.
        priorities: usize,
        /// Number of indices.
        indices: usize,
    },

    /// A thread panicked while holding the lock of a shared buffer.
    #[error("Lock of {0} is poisoned")]
    LockPoisoned(&'static str),

    /// The thread behind a channel has stopped.
    #[error("{0} has stopped")]
    Disconnected(&'static str),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
