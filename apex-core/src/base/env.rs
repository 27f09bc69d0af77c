//! Environment.
use super::Step;
use anyhow::Result;
use std::fmt::Debug;

/// Represents an environment, typically an MDP.
///
/// The environment is not vectorized. A worker owns exactly one instance.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Clone + Debug;

    /// Action of the environment.
    type Act: Clone + Debug;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performes an environment step.
    ///
    /// When the episode ends, the environment resets itself and the initial
    /// observation of the next episode is returned in [`Step::init_obs`].
    fn step(&mut self, a: &Self::Act) -> Result<Step<Self>>
    where
        Self: Sized;
}
