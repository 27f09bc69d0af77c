use super::{Record, Recorder};
use std::sync::{Arc, Mutex};

/// A recorder keeping records in memory.
///
/// Clones share the same buffer, so a clone can be moved into the learner thread
/// while the original is inspected after the thread is joined.
#[derive(Clone, Default)]
pub struct BufferedRecorder {
    buf: Arc<Mutex<Vec<Record>>>,
}

impl BufferedRecorder {
    /// Creates the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records written so far.
    pub fn records(&self) -> Vec<Record> {
        match self.buf.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the number of records written so far.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Returns `true` if no record has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Recorder for BufferedRecorder {
    /// Pushes a [`Record`] to the buffer.
    fn write(&mut self, record: Record) {
        match self.buf.lock() {
            Ok(mut buf) => buf.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clones_share_records() {
        let recorder = BufferedRecorder::new();
        let mut clone = recorder.clone();
        clone.write(Record::from_scalar("a", 1.));
        clone.write(Record::from_scalar("a", 2.));
        let records = recorder.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get_scalar("a"), Ok(2.));
    }
}
