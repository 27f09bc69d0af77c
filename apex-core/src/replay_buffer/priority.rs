//! Priorities from TD-errors.
use super::{BatchBase, TransitionBatch};

/// Converts a TD-error into a priority, `(|td_error| + epsilon)^alpha`.
#[inline]
pub fn compute_priority(td_error: f32, alpha: f32, epsilon: f32) -> f32 {
    (td_error.abs() + epsilon).powf(alpha)
}

/// Computes multi-step TD-errors.
///
/// For each row, `target = reward + discount * gamma^steps * next_q` and the
/// TD-error is `target - q`.
///
/// # Panics
///
/// Panics if the slices have different lengths.
pub fn n_step_td_errors(
    reward: &[f32],
    discount: &[f32],
    steps: &[u32],
    q: &[f32],
    next_q: &[f32],
    gamma: f32,
) -> Vec<f32> {
    let n = reward.len();
    assert!(discount.len() == n && steps.len() == n && q.len() == n && next_q.len() == n);

    (0..n)
        .map(|i| {
            let target = reward[i] + discount[i] * gamma.powi(steps[i] as i32) * next_q[i];
            target - q[i]
        })
        .collect()
}

/// Computes priorities of a batch on the producer side from value estimates.
///
/// `q[i]` is the value of the action taken at `obs[i]`, `next_q[i]` the bootstrap
/// value at `next_obs[i]`.
pub fn worker_priorities<O: BatchBase, A: BatchBase>(
    batch: &TransitionBatch<O, A>,
    q: &[f32],
    next_q: &[f32],
    gamma: f32,
    alpha: f32,
    epsilon: f32,
) -> Vec<f32> {
    n_step_td_errors(
        &batch.reward,
        &batch.discount(),
        &batch.steps,
        q,
        next_q,
        gamma,
    )
    .into_iter()
    .map(|td| compute_priority(td, alpha, epsilon))
    .collect()
}
