use std::time::Duration;

/// Stats of [`Learner`](crate::Learner).
#[derive(Clone, Debug, Default)]
pub struct LearnerStat {
    /// The number of train steps at the end of the loop.
    pub train_steps: usize,

    /// The number of episodes reported by workers.
    pub episodes: usize,

    /// Duration of the training loop, excluding the wait for the dataset.
    pub duration: Duration,
}

impl LearnerStat {
    /// Returns a formatted string for reporting.
    pub fn fmt(&self) -> String {
        let d = self.duration.as_secs_f32();
        let p = if d > 0. {
            self.train_steps as f32 / d
        } else {
            0.
        };
        format!(
            "train steps: {}, episodes: {}, duration [sec]: {}, train steps per sec: {}",
            self.train_steps, self.episodes, d, p
        )
    }
}
