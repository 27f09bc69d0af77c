//! Statistics reported by the learner and workers.
//!
//! A [`Record`] maps names to [`RecordValue`]s. Records are handed to a
//! [`Recorder`], which decides where they go:
//!
//! * [`LogRecorder`] renders records through the `log` facade.
//! * [`BufferedRecorder`] keeps records in memory.
//! * [`NullRecorder`] discards them.
//!
//! ```rust
//! use apex_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.25);
//! record.insert("score", RecordValue::Scalar(10.));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod log_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use log_recorder::LogRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
