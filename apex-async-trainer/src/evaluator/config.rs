//! Configuration of [`Evaluator`](super::Evaluator).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Evaluator`](super::Evaluator).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EvaluatorConfig {
    /// Number of episodes run for each evaluated version of the weights.
    pub n_episodes: usize,

    /// Seed of the evaluation environment.
    pub seed: i64,

    /// Interval of polling for new weights in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            n_episodes: 10,
            seed: 1_000,
            poll_interval_ms: 100,
        }
    }
}

impl EvaluatorConfig {
    /// Sets the number of evaluation episodes.
    pub fn n_episodes(mut self, v: usize) -> Self {
        self.n_episodes = v;
        self
    }

    /// Sets the seed of the evaluation environment.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the polling interval for new weights.
    pub fn poll_interval_ms(mut self, v: u64) -> Self {
        self.poll_interval_ms = v;
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
