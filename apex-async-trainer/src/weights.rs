//! Publication of model weights from the learner to workers.
use crate::AsyncTrainerError;
use anyhow::Result;
use log::debug;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    thread,
    time::Duration,
};

/// Weights of a model with the learner's train step count at publication.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightsSnapshot<W> {
    /// Number of train steps of the learner when the weights were published.
    pub version: usize,

    /// Weights.
    pub weights: W,
}

/// Holds the latest published [`WeightsSnapshot`].
///
/// Publishing swaps the snapshot as a whole, so a pull returns either the
/// previous or the new snapshot, never a mix of both. Pulled snapshots are
/// immutable and stay valid after later publications. Cloning gives another
/// handle to the same hub.
pub struct WeightHub<W> {
    current: Arc<RwLock<Option<Arc<WeightsSnapshot<W>>>>>,
}

impl<W> Clone for WeightHub<W> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

impl<W> Default for WeightHub<W> {
    fn default() -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
        }
    }
}

impl<W> WeightHub<W> {
    /// Creates a hub without weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes weights.
    pub fn publish(&self, version: usize, weights: W) -> Result<()> {
        let snapshot = Arc::new(WeightsSnapshot { version, weights });
        match self.current.write() {
            Ok(mut current) => *current = Some(snapshot),
            Err(_) => return Err(AsyncTrainerError::LockPoisoned("weight hub"))?,
        }
        debug!("Published weights, version {}", version);
        Ok(())
    }

    /// Returns the latest snapshot, `None` before the first publication.
    pub fn pull(&self) -> Result<Option<Arc<WeightsSnapshot<W>>>> {
        match self.current.read() {
            Ok(current) => Ok(current.clone()),
            Err(_) => Err(AsyncTrainerError::LockPoisoned("weight hub"))?,
        }
    }

    /// Returns the version of the latest snapshot.
    pub fn version(&self) -> Result<Option<usize>> {
        Ok(self.pull()?.map(|s| s.version))
    }

    /// Blocks until the first publication.
    ///
    /// Returns `None` if `stop` is set before that.
    pub fn wait_first(
        &self,
        stop: &AtomicBool,
        poll: Duration,
    ) -> Result<Option<Arc<WeightsSnapshot<W>>>> {
        loop {
            if let Some(snapshot) = self.pull()? {
                return Ok(Some(snapshot));
            }
            if stop.load(Ordering::SeqCst) {
                return Ok(None);
            }
            thread::sleep(poll);
        }
    }
}
