//! Environment step.
use super::Env;
use crate::replay_buffer::{BatchBase, TransitionBatch};
use std::marker::PhantomData;

/// Represents an action, observation and reward tuple `(a_t, o_t+1, r_t)`
/// with some additional information.
///
/// An environment emits [`Step`] object at every interaction steps.
/// This object might be used to create transitions `(o_t, a_t, o_t+1, r_t)`.
pub struct Step<E: Env> {
    /// Action.
    pub act: E::Act,

    /// Observation after the action.
    pub obs: E::Obs,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if episode is terminated.
    pub is_terminated: bool,

    /// Flag denoting if episode is truncated.
    pub is_truncated: bool,

    /// Initial observation of the next episode, set when the episode ended.
    pub init_obs: Option<E::Obs>,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(
        obs: E::Obs,
        act: E::Act,
        reward: f32,
        is_terminated: bool,
        is_truncated: bool,
        init_obs: Option<E::Obs>,
    ) -> Self {
        Step {
            act,
            obs,
            reward,
            is_terminated,
            is_truncated,
            init_obs,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}

/// Process [`Step`] and output an item [`Self::Output`].
///
/// Workers use this trait to turn the environment steps into rows appended
/// to their [`LocalBuffer`](crate::local_buffer::LocalBuffer).
///
/// [`Self::Output`]: StepProcessor::Output
pub trait StepProcessor<E: Env> {
    /// The type of transitions produced by this trait.
    type Output;

    /// Resets the object.
    fn reset(&mut self, init_obs: E::Obs);

    /// Returns the observation the next action should be taken on.
    fn prev_obs(&self) -> Option<&E::Obs>;

    /// Processes a [`Step`] object.
    fn process(&mut self, step: Step<E>) -> Self::Output;
}

/// Converts [`Step`]s into one-row [`TransitionBatch`]es.
///
/// It performs 1-step backup. Multi-step returns are folded later by the
/// [`LocalBuffer`](crate::local_buffer::LocalBuffer).
pub struct TransitionStepProcessor<E: Env, O, A> {
    prev_obs: Option<E::Obs>,
    phantom: PhantomData<(O, A)>,
}

impl<E: Env, O, A> Default for TransitionStepProcessor<E, O, A> {
    fn default() -> Self {
        Self {
            prev_obs: None,
            phantom: PhantomData,
        }
    }
}

impl<E: Env, O, A> TransitionStepProcessor<E, O, A> {
    /// Creates a processor. [`StepProcessor::reset`] must be called before processing.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E, O, A> StepProcessor<E> for TransitionStepProcessor<E, O, A>
where
    E: Env,
    O: BatchBase<Item = E::Obs>,
    A: BatchBase<Item = E::Act>,
{
    type Output = TransitionBatch<O, A>;

    fn reset(&mut self, init_obs: E::Obs) {
        self.prev_obs = Some(init_obs);
    }

    fn prev_obs(&self) -> Option<&E::Obs> {
        self.prev_obs.as_ref()
    }

    /// # Panics
    ///
    /// Panics if [`StepProcessor::reset`] has not been called.
    fn process(&mut self, step: Step<E>) -> Self::Output {
        let is_done = step.is_done();
        let obs = self
            .prev_obs
            .replace(step.obs.clone())
            .expect("prev_obs is not set. Forgot to call reset()?");

        if is_done {
            if let Some(init_obs) = step.init_obs {
                self.prev_obs.replace(init_obs);
            }
        }

        TransitionBatch {
            obs: O::from_items(vec![obs]),
            act: A::from_items(vec![step.act]),
            next_obs: O::from_items(vec![step.obs]),
            reward: vec![step.reward],
            is_terminated: vec![step.is_terminated as i8],
            is_truncated: vec![step.is_truncated as i8],
            steps: vec![1],
            priority: None,
        }
    }
}
