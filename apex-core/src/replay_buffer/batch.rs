//! Column-wise storage of transitions.
use crate::error::ApexError;
use anyhow::Result;

/// Column storage of a single field of transitions, e.g., observations.
///
/// A column holds `len()` rows. The replay buffer allocates its columns once
/// with [`BatchBase::new`] and writes incoming batches into them with
/// [`BatchBase::push`], wrapping at the end.
pub trait BatchBase: Sized {
    /// A single row.
    type Item: Clone;

    /// Creates a column of `capacity` rows with default values.
    fn new(capacity: usize) -> Self;

    /// Creates a column from rows.
    fn from_items(items: Vec<Self::Item>) -> Self;

    /// Returns the number of rows.
    fn len(&self) -> usize;

    /// Returns `true` if the column has no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the rows of `data` starting at row `ix`, wrapping at `len()`.
    fn push(&mut self, ix: usize, data: Self);

    /// Gathers the rows at `ixs`.
    fn sample(&self, ixs: &[usize]) -> Self;
}

impl<T: Clone + Default> BatchBase for Vec<T> {
    type Item = T;

    fn new(capacity: usize) -> Self {
        vec![T::default(); capacity]
    }

    fn from_items(items: Vec<T>) -> Self {
        items
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn push(&mut self, ix: usize, data: Self) {
        let capacity = Vec::len(self);
        for (k, v) in data.into_iter().enumerate() {
            self[(ix + k) % capacity] = v;
        }
    }

    fn sample(&self, ixs: &[usize]) -> Self {
        ixs.iter().map(|&ix| self[ix].clone()).collect()
    }
}

/// A batch of transitions stored column-wise.
///
/// The `i`-th row is the transition `(obs[i], act[i], next_obs[i], reward[i])`.
/// The discount of a row is `0` if the episode terminated, `1` otherwise;
/// `steps[i]` is the number of environment steps folded into `reward[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionBatch<O, A> {
    /// Observations.
    pub obs: O,

    /// Actions.
    pub act: A,

    /// Observations after `steps` environment steps.
    pub next_obs: O,

    /// Rewards, multi-step returns when `steps > 1`.
    pub reward: Vec<f32>,

    /// Episode termination flags.
    pub is_terminated: Vec<i8>,

    /// Episode truncation flags.
    pub is_truncated: Vec<i8>,

    /// Number of environment steps in each transition.
    pub steps: Vec<u32>,

    /// Priorities computed by the producer, if any.
    pub priority: Option<Vec<f32>>,
}

impl<O: BatchBase, A: BatchBase> TransitionBatch<O, A> {
    /// Creates a batch of `capacity` rows with default values and no priorities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            obs: O::new(capacity),
            act: A::new(capacity),
            next_obs: O::new(capacity),
            reward: vec![0.; capacity],
            is_terminated: vec![0; capacity],
            is_truncated: vec![0; capacity],
            steps: vec![1; capacity],
            priority: None,
        }
    }

    /// Creates a batch of non-terminal 1-step transitions from rows.
    pub fn from_rows(
        obs: Vec<O::Item>,
        act: Vec<A::Item>,
        next_obs: Vec<O::Item>,
        reward: Vec<f32>,
    ) -> Self {
        let n = reward.len();
        Self {
            obs: O::from_items(obs),
            act: A::from_items(act),
            next_obs: O::from_items(next_obs),
            reward,
            is_terminated: vec![0; n],
            is_truncated: vec![0; n],
            steps: vec![1; n],
            priority: None,
        }
    }

    /// Sets precomputed priorities.
    pub fn with_priority(mut self, priority: Vec<f32>) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Returns the number of transitions.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch has no transitions.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Returns `1 - is_terminated` as floats.
    pub fn discount(&self) -> Vec<f32> {
        self.is_terminated.iter().map(|&d| 1. - d as f32).collect()
    }

    /// Checks that all columns have the same number of rows.
    pub fn validate(&self) -> Result<()> {
        let expected = self.len();
        let check = |column: &'static str, actual: usize| -> Result<()> {
            if actual != expected {
                Err(ApexError::ColumnLength {
                    column,
                    expected,
                    actual,
                })?
            }
            Ok(())
        };
        check("obs", self.obs.len())?;
        check("act", self.act.len())?;
        check("next_obs", self.next_obs.len())?;
        check("is_terminated", self.is_terminated.len())?;
        check("is_truncated", self.is_truncated.len())?;
        check("steps", self.steps.len())?;
        if let Some(priority) = &self.priority {
            check("priority", priority.len())?;
        }
        Ok(())
    }

    /// Writes the rows of `data` starting at row `ix`, wrapping at `len()`.
    ///
    /// Priorities of `data` are not stored.
    pub fn write(&mut self, ix: usize, data: Self) {
        self.obs.push(ix, data.obs);
        self.act.push(ix, data.act);
        self.next_obs.push(ix, data.next_obs);
        BatchBase::push(&mut self.reward, ix, data.reward);
        BatchBase::push(&mut self.is_terminated, ix, data.is_terminated);
        BatchBase::push(&mut self.is_truncated, ix, data.is_truncated);
        BatchBase::push(&mut self.steps, ix, data.steps);
    }

    /// Gathers the rows at `ixs`, including priorities if present.
    pub fn select(&self, ixs: &[usize]) -> Self {
        Self {
            obs: self.obs.sample(ixs),
            act: self.act.sample(ixs),
            next_obs: self.next_obs.sample(ixs),
            reward: self.reward.sample(ixs),
            is_terminated: self.is_terminated.sample(ixs),
            is_truncated: self.is_truncated.sample(ixs),
            steps: self.steps.sample(ixs),
            priority: self.priority.as_ref().map(|p| p.sample(ixs)),
        }
    }

    /// Concatenates batches in order.
    pub fn concat(batches: Vec<Self>) -> Self {
        let total = batches.iter().map(|b| b.len()).sum();
        let with_priority = !batches.is_empty() && batches.iter().all(|b| b.priority.is_some());
        let mut out = Self::with_capacity(total);
        let mut priority = Vec::with_capacity(if with_priority { total } else { 0 });
        let mut ix = 0;

        for mut batch in batches {
            let len = batch.len();
            if with_priority {
                priority.extend(batch.priority.take().into_iter().flatten());
            }
            out.write(ix, batch);
            ix += len;
        }
        if with_priority {
            out.priority = Some(priority);
        }
        out
    }
}

/// A batch sampled from a replay buffer.
#[derive(Clone, Debug)]
pub struct SampledBatch<O, A> {
    /// Sampled transitions.
    pub transitions: TransitionBatch<O, A>,

    /// Importance sampling ratios, all `1` for uniform sampling.
    pub is_ratio: Vec<f32>,

    /// Memory slots of the sampled transitions, used to update priorities.
    pub indices: Vec<usize>,

    /// Lengths of the sampled episodes, only given by episodic sampling.
    ///
    /// Episodes are stored consecutively in `transitions`.
    pub episode_lens: Option<Vec<usize>>,
}

impl<O: BatchBase, A: BatchBase> SampledBatch<O, A> {
    /// Returns the number of transitions.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the batch has no transitions.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type Batch = TransitionBatch<Vec<f32>, Vec<i64>>;

    fn batch(xs: &[f32]) -> Batch {
        Batch::from_rows(
            xs.to_vec(),
            xs.iter().map(|&x| x as i64).collect(),
            xs.iter().map(|&x| x + 1.).collect(),
            xs.to_vec(),
        )
    }

    #[test]
    fn test_write_wraps() {
        let mut storage = Batch::with_capacity(4);
        storage.write(3, batch(&[1., 2., 3.]));
        assert_eq!(storage.obs, vec![2., 3., 0., 1.]);
        assert_eq!(storage.next_obs, vec![3., 4., 0., 2.]);
        assert_eq!(storage.act, vec![2, 3, 0, 1]);
    }

    #[test]
    fn test_validate_detects_length_mismatch() {
        let mut b = batch(&[1., 2.]);
        assert!(b.validate().is_ok());
        b.steps = vec![1];
        let err = b.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ApexError>(),
            Some(&ApexError::ColumnLength {
                column: "steps",
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_concat_keeps_order_and_priorities() {
        let a = batch(&[1., 2.]).with_priority(vec![0.1, 0.2]);
        let b = batch(&[3.]).with_priority(vec![0.3]);
        let c = Batch::concat(vec![a, b]);
        assert_eq!(c.obs, vec![1., 2., 3.]);
        assert_eq!(c.priority, Some(vec![0.1, 0.2, 0.3]));

        let d = Batch::concat(vec![batch(&[1.]), batch(&[2.]).with_priority(vec![1.])]);
        assert_eq!(d.priority, None);
    }
}
