use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`WorkerManager`](super::WorkerManager).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct WorkerManagerConfig {
    /// Number of workers.
    ///
    /// The default value is 4.
    pub n_workers: usize,

    /// Number of flushed batches concatenated into a single merge.
    ///
    /// With more than one, flushes are collected in a
    /// [`GatheringBuffer`](apex_core::local_buffer::GatheringBuffer) first.
    /// Use 1 with episodic replay, as each merge is taken as one episode.
    /// The default value is 1.
    pub batches_per_merge: usize,

    /// Capacity of the channel from workers to the forwarding thread.
    ///
    /// Workers block on flushing while the channel is full.
    /// The default value is 1000.
    pub channel_capacity: usize,
}

impl Default for WorkerManagerConfig {
    fn default() -> Self {
        Self {
            n_workers: 4,
            batches_per_merge: 1,
            channel_capacity: 1000,
        }
    }
}

impl WorkerManagerConfig {
    /// Sets the number of workers.
    pub fn n_workers(mut self, v: usize) -> Self {
        self.n_workers = v;
        self
    }

    /// Sets the number of flushed batches per merge.
    pub fn batches_per_merge(mut self, v: usize) -> Self {
        self.batches_per_merge = v;
        self
    }

    /// Sets the capacity of the channel from workers.
    pub fn channel_capacity(mut self, v: usize) -> Self {
        self.channel_capacity = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
