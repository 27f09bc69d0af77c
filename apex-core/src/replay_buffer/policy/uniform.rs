use super::{Sample, SamplingPolicy};
use anyhow::Result;
use rand::{rngs::StdRng, Rng};

/// Uniform sampling with replacement.
///
/// Priorities are ignored and importance sampling ratios are always 1.
#[derive(Clone, Debug, Default)]
pub struct UniformPolicy;

impl SamplingPolicy for UniformPolicy {
    fn on_merge(&mut self, _start: usize, _len: usize, _priorities: Option<&[f32]>) {}

    fn sample(&mut self, n: usize, size: usize, rng: &mut StdRng) -> Sample {
        let indices = (0..n).map(|_| rng.gen_range(0..size)).collect();
        Sample::uniform(indices)
    }

    fn update_priorities(&mut self, _td_errors: &[f32], _indices: &[usize]) -> Result<()> {
        Ok(())
    }
}
