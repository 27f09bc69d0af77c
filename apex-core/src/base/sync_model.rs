//! Synchronization of model weights.

/// A model whose weights are published by the learner and pulled by workers.
pub trait SyncModel {
    /// Weights of the model.
    ///
    /// Workers receive their own copy, never a reference into the learner's
    /// live parameters.
    type Weights: Clone + Send + Sync + 'static;

    /// Returns a copy of the weights.
    ///
    /// `names` selects a subset of the parameters; `None` returns all of them.
    fn get_weights(&self, names: Option<&[String]>) -> Self::Weights;

    /// Overwrites the parameters present in `weights`.
    fn set_weights(&mut self, weights: &Self::Weights);

    /// Returns the number of optimization steps applied to the model.
    fn train_steps(&self) -> usize {
        0
    }
}
