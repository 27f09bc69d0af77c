use std::time::Duration;

/// Stats of the rollout loop in each [`Worker`](crate::Worker).
#[derive(Clone, Debug, Default)]
pub struct WorkerStat {
    /// The number of environment steps.
    pub env_steps: usize,

    /// The number of finished episodes.
    pub episodes: usize,

    /// The number of flushes of the local buffer.
    pub flushes: usize,

    /// Duration of the rollout loop.
    pub duration: Duration,
}

/// Returns a formatted string of the set of [`WorkerStat`] for reporting.
pub fn worker_stats_fmt(stats: &[WorkerStat]) -> String {
    let mut s = "worker id, env steps, episodes, flushes, duration [sec], steps per sec\n".to_string();
    for (i, stat) in stats.iter().enumerate() {
        let n = stat.env_steps;
        let d = stat.duration.as_secs_f32();
        let p = if d > 0. { (n as f32) / d } else { 0. };
        s += format!(
            "{}, {}, {}, {}, {}, {}\n",
            i, n, stat.episodes, stat.flushes, d, p
        )
        .as_str();
    }
    s
}
