//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use crate::error::ApexError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Sampling strategy of the replay buffer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ReplayKind {
    /// Uniform sampling, no priorities.
    Uniform,

    /// Proportional prioritized experience replay.
    Proportional,

    /// Whole-episode storage and sampling.
    Episodic,
}

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
///
/// # Examples
///
/// ```
/// use apex_core::replay_buffer::{ReplayBufferConfig, ReplayKind};
///
/// let config = ReplayBufferConfig::default()
///     .kind(ReplayKind::Proportional)
///     .capacity(100_000)
///     .min_size(5_000)
///     .per_alpha(0.6)
///     .beta0(0.4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Sampling strategy.
    #[serde(rename = "type")]
    pub kind: ReplayKind,

    /// Maximum number of transitions. The oldest transitions are overwritten
    /// once the buffer is full.
    pub capacity: usize,

    /// Batch size used when `sample()` is called without one.
    pub batch_size: usize,

    /// Number of transitions required before sampling, see `good_to_learn()`.
    pub min_size: usize,

    /// Exponent applied to `|td_error| + per_epsilon` to obtain priorities.
    pub per_alpha: f32,

    /// Offset added to `|td_error|` so that every transition keeps a chance
    /// of being sampled.
    pub per_epsilon: f32,

    /// Initial exponent of importance sampling ratios.
    pub beta0: f32,

    /// Number of `sample()` calls over which beta is annealed to 1.
    pub beta_steps: usize,

    /// Priority given to transitions merged without priorities, until a
    /// larger priority is observed.
    pub top_priority: f32,

    /// If `true`, `update_priorities()` raises `top_priority` to the largest
    /// priority written.
    pub update_top_priority: bool,

    /// Random seed for sampling.
    pub seed: u64,
}

impl Default for ReplayBufferConfig {
    /// Creates a default configuration:
    /// - `kind = Proportional`
    /// - `capacity = 100_000`
    /// - `batch_size = 64`
    /// - `min_size = 5_000`
    /// - `per_alpha = 0.6`, `per_epsilon = 0.01`
    /// - `beta0 = 0.4`, `beta_steps = 100_000`
    /// - `top_priority = 2.0`, `update_top_priority = true`
    /// - `seed = 42`
    fn default() -> Self {
        Self {
            kind: ReplayKind::Proportional,
            capacity: 100_000,
            batch_size: 64,
            min_size: 5_000,
            per_alpha: 0.6,
            per_epsilon: 0.01,
            beta0: 0.4,
            beta_steps: 100_000,
            top_priority: 2.,
            update_top_priority: true,
            seed: 42,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the sampling strategy.
    pub fn kind(mut self, kind: ReplayKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the default batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the number of transitions required before sampling.
    pub fn min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Sets the prioritization exponent.
    pub fn per_alpha(mut self, per_alpha: f32) -> Self {
        self.per_alpha = per_alpha;
        self
    }

    /// Sets the priority offset.
    pub fn per_epsilon(mut self, per_epsilon: f32) -> Self {
        self.per_epsilon = per_epsilon;
        self
    }

    /// Sets the initial importance sampling exponent.
    pub fn beta0(mut self, beta0: f32) -> Self {
        self.beta0 = beta0;
        self
    }

    /// Sets the number of `sample()` calls to anneal beta over.
    pub fn beta_steps(mut self, beta_steps: usize) -> Self {
        self.beta_steps = beta_steps;
        self
    }

    /// Sets the initial top priority.
    pub fn top_priority(mut self, top_priority: f32) -> Self {
        self.top_priority = top_priority;
        self
    }

    /// Sets if `update_priorities()` tracks the running maximum.
    pub fn update_top_priority(mut self, update_top_priority: bool) -> Self {
        self.update_top_priority = update_top_priority;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks the values of the configuration.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(ApexError::InvalidConfig(msg))? };

        if self.capacity == 0 {
            invalid("capacity must be positive".into())?;
        }
        if self.batch_size == 0 {
            invalid("batch_size must be positive".into())?;
        }
        if self.min_size > self.capacity {
            invalid(format!(
                "min_size ({}) exceeds capacity ({})",
                self.min_size, self.capacity
            ))?;
        }
        if !(self.per_alpha >= 0.) {
            invalid(format!("per_alpha ({}) must be non-negative", self.per_alpha))?;
        }
        if !(self.per_epsilon >= 0.) {
            invalid(format!("per_epsilon ({}) must be non-negative", self.per_epsilon))?;
        }
        if !(0. ..=1.).contains(&self.beta0) {
            invalid(format!("beta0 ({}) must be in [0, 1]", self.beta0))?;
        }
        if !(self.top_priority.is_finite() && self.top_priority > 0.) {
            invalid(format!("top_priority ({}) must be positive", self.top_priority))?;
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
