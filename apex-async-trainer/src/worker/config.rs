//! Configuration of [`Worker`](super::Worker).
use anyhow::Result;
use apex_core::local_buffer::LocalBufferConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// How long a worker rolls out between weight pulls.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// A fixed number of environment steps.
    NSteps(usize),

    /// Until the end of the current episode.
    ///
    /// The local buffer is flushed only at the end of every episode, so each
    /// flush holds exactly one whole episode regardless of `seqlen`.
    Episode,
}

/// Configuration of [`Worker`](super::Worker).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct WorkerConfig {
    /// Rollout length between weight pulls.
    pub run_mode: RunMode,

    /// Names of the parameters pulled from the learner. `None` pulls all.
    pub pull_names: Option<Vec<String>>,

    /// Base seed of environments. Worker `i` uses `seed + i`.
    pub seed: i64,

    /// Interval of polling for the first weights in milliseconds.
    pub poll_interval_ms: u64,

    /// Configuration of the local buffer.
    ///
    /// `n_envs` is forced to 1, as a worker steps a single environment.
    /// `seqlen` is ignored in [`RunMode::Episode`].
    pub local_buffer: LocalBufferConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::NSteps(50),
            pull_names: None,
            seed: 42,
            poll_interval_ms: 10,
            local_buffer: LocalBufferConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Sets the run mode.
    pub fn run_mode(mut self, v: RunMode) -> Self {
        self.run_mode = v;
        self
    }

    /// Sets the names of the pulled parameters.
    pub fn pull_names(mut self, v: Option<Vec<String>>) -> Self {
        self.pull_names = v;
        self
    }

    /// Sets the base seed.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the polling interval for the first weights.
    pub fn poll_interval_ms(mut self, v: u64) -> Self {
        self.poll_interval_ms = v;
        self
    }

    /// Sets the configuration of the local buffer.
    pub fn local_buffer(mut self, v: LocalBufferConfig) -> Self {
        self.local_buffer = v;
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
