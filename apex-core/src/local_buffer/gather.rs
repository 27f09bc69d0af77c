//! Two-tier buffer collecting flushed batches from several producers.
use crate::{
    error::ApexError,
    replay_buffer::{BatchBase, TransitionBatch},
};
use anyhow::Result;
use log::debug;
use std::sync::{Mutex, MutexGuard};

/// Collects batches until `target_batches` of them have arrived.
///
/// The buffer has its own lock, independent of the lock of the central replay
/// buffer. [`GatheringBuffer::take`] concatenates the collected batches and
/// empties the buffer under the same lock, so a batch is taken exactly once.
pub struct GatheringBuffer<O: BatchBase, A: BatchBase> {
    target_batches: usize,
    batches: Mutex<Vec<TransitionBatch<O, A>>>,
}

impl<O: BatchBase, A: BatchBase> GatheringBuffer<O, A> {
    /// Creates a buffer full after `target_batches` batches, at least one.
    pub fn new(target_batches: usize) -> Self {
        let target_batches = target_batches.max(1);
        Self {
            target_batches,
            batches: Mutex::new(Vec::with_capacity(target_batches)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<TransitionBatch<O, A>>>> {
        match self.batches.lock() {
            Ok(guard) => Ok(guard),
            Err(_) => Err(ApexError::LockPoisoned("gathering buffer"))?,
        }
    }

    /// Adds a flushed batch.
    pub fn push(&self, batch: TransitionBatch<O, A>) -> Result<()> {
        batch.validate()?;
        self.lock()?.push(batch);
        Ok(())
    }

    /// Returns the number of collected batches.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns `true` if `target_batches` batches have been collected.
    pub fn is_full(&self) -> Result<bool> {
        Ok(self.lock()?.len() >= self.target_batches)
    }

    /// Concatenates the collected batches and clears the buffer.
    ///
    /// Returns `None` if the buffer is not full.
    pub fn take(&self) -> Result<Option<TransitionBatch<O, A>>> {
        let mut batches = self.lock()?;
        if batches.len() < self.target_batches {
            return Ok(None);
        }
        let n = batches.len();
        let batch = TransitionBatch::concat(std::mem::take(&mut *batches));
        debug!("Gathered {} batches, {} transitions", n, batch.len());
        Ok(Some(batch))
    }

    /// Concatenates whatever has been collected, even if the buffer is not full.
    ///
    /// Returns `None` if nothing has been collected.
    pub fn drain(&self) -> Result<Option<TransitionBatch<O, A>>> {
        let mut batches = self.lock()?;
        if batches.is_empty() {
            return Ok(None);
        }
        Ok(Some(TransitionBatch::concat(std::mem::take(&mut *batches))))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{sync::Arc, thread};

    type Batch = TransitionBatch<Vec<f32>, Vec<i64>>;

    fn batch(x: f32) -> Batch {
        Batch::from_rows(vec![x, x], vec![0, 0], vec![x, x], vec![0., 0.])
    }

    #[test]
    fn test_take_after_target() -> Result<()> {
        let buffer = GatheringBuffer::new(2);
        buffer.push(batch(1.))?;
        assert!(!buffer.is_full()?);
        assert!(buffer.take()?.is_none());

        buffer.push(batch(2.))?;
        assert!(buffer.is_full()?);
        let b = buffer.take()?.unwrap();
        assert_eq!(b.obs, vec![1., 1., 2., 2.]);
        assert_eq!(buffer.len()?, 0);
        assert!(buffer.drain()?.is_none());
        Ok(())
    }

    #[test]
    fn test_concurrent_producers() -> Result<()> {
        let buffer = Arc::new(GatheringBuffer::<Vec<f32>, Vec<i64>>::new(4));
        let handles = (0..8)
            .map(|i| {
                let buffer = buffer.clone();
                thread::spawn(move || buffer.push(batch(i as f32)))
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap()?;
        }

        let mut n_rows = 0;
        while let Some(b) = buffer.take()? {
            n_rows += b.len();
        }
        assert_eq!(n_rows, 16);
        Ok(())
    }
}
