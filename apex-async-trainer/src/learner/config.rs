use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Learner`](super::Learner).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LearnerConfig {
    /// The maximum number of train steps.
    pub max_train_steps: usize,

    /// Interval of synchronizing the target network in train steps.
    pub target_sync_interval: usize,

    /// Interval of publishing weights to workers in train steps.
    pub publish_interval: usize,

    /// Interval of recording in train steps.
    pub record_interval: usize,

    /// Interval of polling the dataset until it is ready, in milliseconds.
    pub poll_interval_ms: u64,

    /// Names of the published parameters. `None` publishes all.
    pub publish_names: Option<Vec<String>>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            max_train_steps: 10_000,
            target_sync_interval: 100,
            publish_interval: 10,
            record_interval: 100,
            poll_interval_ms: 1_000,
            publish_names: None,
        }
    }
}

impl LearnerConfig {
    /// Sets the number of train steps.
    pub fn max_train_steps(mut self, v: usize) -> Self {
        self.max_train_steps = v;
        self
    }

    /// Sets the interval of synchronizing the target network.
    pub fn target_sync_interval(mut self, v: usize) -> Self {
        self.target_sync_interval = v;
        self
    }

    /// Sets the interval of publishing weights.
    pub fn publish_interval(mut self, v: usize) -> Self {
        self.publish_interval = v;
        self
    }

    /// Sets the interval of recording.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v;
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval_ms(mut self, v: u64) -> Self {
        self.poll_interval_ms = v;
        self
    }

    /// Sets the names of the published parameters.
    pub fn publish_names(mut self, v: Option<Vec<String>>) -> Self {
        self.publish_names = v;
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

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_learner_config() -> Result<()> {
        let config = LearnerConfig::default()
            .max_train_steps(500)
            .publish_names(Some(vec!["q_table".into()]));

        let dir = TempDir::new("learner_config")?;
        let path = dir.path().join("learner_config.yaml");
        config.save(&path)?;
        assert_eq!(config, LearnerConfig::load(&path)?);
        Ok(())
    }
}
