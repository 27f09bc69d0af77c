use super::{Record, Recorder};
use log::info;

/// A recorder rendering records with `log::info!`.
///
/// Each record is written as one line of `name = value` pairs, ordered by name.
#[derive(Default)]
pub struct LogRecorder {
    prefix: String,
}

impl LogRecorder {
    /// Creates a recorder. `prefix` is put at the head of each line.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn render(&self, record: &Record) -> String {
        let body = record
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        if self.prefix.is_empty() {
            body
        } else {
            format!("{}: {}", self.prefix, body)
        }
    }
}

impl Recorder for LogRecorder {
    fn write(&mut self, record: Record) {
        info!("{}", self.render(&record));
    }
}
