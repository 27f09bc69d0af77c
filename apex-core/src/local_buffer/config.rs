//! Configuration of [`LocalBuffer`](super::LocalBuffer).
use crate::error::ApexError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`LocalBuffer`](super::LocalBuffer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LocalBufferConfig {
    /// Number of environments stepped together. Each step added to the buffer
    /// has this many rows.
    pub n_envs: usize,

    /// Number of steps stored before the buffer is full.
    pub seqlen: usize,

    /// Maximum number of steps folded into a transition.
    pub n_steps: usize,

    /// Discount factor.
    pub gamma: f32,

    /// If `true`, priorities are computed from value estimates before flushing.
    pub worker_side_prioritization: bool,

    /// Prioritization exponent, used with `worker_side_prioritization`.
    pub per_alpha: f32,

    /// Priority offset, used with `worker_side_prioritization`. Must be positive
    /// then, so that a zero TD-error still gives a positive priority.
    pub per_epsilon: f32,
}

impl Default for LocalBufferConfig {
    fn default() -> Self {
        Self {
            n_envs: 1,
            seqlen: 50,
            n_steps: 3,
            gamma: 0.99,
            worker_side_prioritization: false,
            per_alpha: 0.6,
            per_epsilon: 0.01,
        }
    }
}

impl LocalBufferConfig {
    /// Sets the number of environments.
    pub fn n_envs(mut self, v: usize) -> Self {
        self.n_envs = v;
        self
    }

    /// Sets the number of steps stored before flushing.
    pub fn seqlen(mut self, v: usize) -> Self {
        self.seqlen = v;
        self
    }

    /// Sets the number of steps folded into a transition.
    pub fn n_steps(mut self, v: usize) -> Self {
        self.n_steps = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Enables or disables worker-side prioritization.
    pub fn worker_side_prioritization(mut self, v: bool) -> Self {
        self.worker_side_prioritization = v;
        self
    }

    /// Sets the prioritization exponent.
    pub fn per_alpha(mut self, v: f32) -> Self {
        self.per_alpha = v;
        self
    }

    /// Sets the priority offset.
    pub fn per_epsilon(mut self, v: f32) -> Self {
        self.per_epsilon = v;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(ApexError::InvalidConfig(msg))? };

        if self.n_envs == 0 {
            invalid("n_envs must be positive".into())?;
        }
        if self.seqlen == 0 {
            invalid("seqlen must be positive".into())?;
        }
        if self.worker_side_prioritization {
            if !(self.per_alpha >= 0.) {
                invalid(format!("per_alpha ({}) must be non-negative", self.per_alpha))?;
            }
            if !(self.per_epsilon.is_finite() && self.per_epsilon > 0.) {
                invalid(format!(
                    "per_epsilon ({}) must be positive with worker-side prioritization",
                    self.per_epsilon
                ))?;
            }
        }
        Ok(())
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
