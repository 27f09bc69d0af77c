use super::{Sample, SamplingPolicy};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, Rng};

#[derive(Clone, Debug, PartialEq)]
struct Episode {
    start: usize,
    len: usize,
}

/// Whole-episode sampling.
///
/// Each merge is one episode occupying a contiguous run of slots. An episode
/// is dropped from the index as soon as any of its slots is overwritten, so
/// only complete episodes are ever sampled.
pub struct EpisodicPolicy {
    capacity: usize,
    episodes: Vec<Episode>,
}

/// Returns `true` if `slot` is in the run of `len` slots from `start`, wrapping at `capacity`.
#[inline]
fn covers(start: usize, len: usize, slot: usize, capacity: usize) -> bool {
    (slot + capacity - start) % capacity < len
}

impl EpisodicPolicy {
    /// Creates a policy for a buffer of the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            episodes: vec![],
        }
    }

    /// Number of complete episodes in the buffer.
    pub fn n_episodes(&self) -> usize {
        self.episodes.len()
    }
}

impl SamplingPolicy for EpisodicPolicy {
    fn on_merge(&mut self, start: usize, len: usize, _priorities: Option<&[f32]>) {
        if len == 0 {
            return;
        }
        let capacity = self.capacity;
        let n_before = self.episodes.len();
        self.episodes.retain(|e| {
            !(covers(start, len, e.start, capacity) || covers(e.start, e.len, start, capacity))
        });
        if self.episodes.len() < n_before {
            trace!("Evicted {} episodes", n_before - self.episodes.len());
        }
        self.episodes.push(Episode { start, len });
    }

    fn sample(&mut self, n: usize, _size: usize, rng: &mut StdRng) -> Sample {
        let mut indices = vec![];
        let mut episode_lens = Vec::with_capacity(n);

        for _ in 0..n {
            let e = &self.episodes[rng.gen_range(0..self.episodes.len())];
            indices.extend((0..e.len).map(|k| (e.start + k) % self.capacity));
            episode_lens.push(e.len);
        }

        Sample {
            is_ratio: vec![1.; indices.len()],
            indices,
            episode_lens: Some(episode_lens),
        }
    }

    fn update_priorities(&mut self, _td_errors: &[f32], _indices: &[usize]) -> Result<()> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        !self.episodes.is_empty()
    }
}
