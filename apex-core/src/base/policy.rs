//! Policy.
use super::Env;

/// A policy on an environment.
///
/// Policy is a mapping from an observation to an action.
/// The mapping can be either of deterministic or stochastic.
pub trait Policy<E: Env> {
    /// Sample an action given an observation.
    fn sample(&mut self, obs: &E::Obs) -> E::Act;

    /// Returns `(q, next_q)` for a transition, used for worker-side prioritization.
    ///
    /// `q` is the value of `act` at `obs`, `next_q` the bootstrap value at `next_obs`.
    /// Policies without a value estimate return `None`, which disables
    /// worker-side prioritization for the rollout.
    #[allow(unused_variables)]
    fn q_values(&mut self, obs: &E::Obs, act: &E::Act, next_obs: &E::Obs) -> Option<(f32, f32)> {
        None
    }
}
