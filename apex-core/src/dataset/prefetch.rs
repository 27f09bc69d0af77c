use super::Dataset;
use crate::{
    error::ApexError,
    replay_buffer::{BatchBase, SampledBatch},
    ReplayService,
};
use anyhow::Result;
use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// Configuration of [`PrefetchDataset`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PrefetchConfig {
    /// Number of batches kept in the queue.
    pub queue_size: usize,

    /// Batch size, `None` uses the batch size of the replay buffer.
    pub batch_size: Option<usize>,

    /// Interval of polling `good_to_learn()` in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            queue_size: 4,
            batch_size: None,
            poll_interval_ms: 100,
        }
    }
}

impl PrefetchConfig {
    /// Sets the queue size.
    pub fn queue_size(mut self, v: usize) -> Self {
        self.queue_size = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: Option<usize>) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval_ms(mut self, v: u64) -> Self {
        self.poll_interval_ms = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// A [`Dataset`] backed by a prefetching thread.
///
/// The thread waits until the replay service is ready, then keeps a bounded queue
/// of sampled batches full. It is stopped and joined by [`PrefetchDataset::stop`]
/// or when the dataset is dropped.
pub struct PrefetchDataset<O: BatchBase, A: BatchBase> {
    r_batch: Receiver<SampledBatch<O, A>>,
    s_stop: Sender<()>,
    ready: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<O, A> PrefetchDataset<O, A>
where
    O: BatchBase + Send + 'static,
    A: BatchBase + Send + 'static,
{
    /// Spawns the prefetching thread.
    pub fn spawn<S>(service: S, config: &PrefetchConfig) -> Self
    where
        S: ReplayService<O, A> + Send + 'static,
    {
        let (s_batch, r_batch) = bounded(config.queue_size.max(1));
        let (s_stop, r_stop) = bounded(1);
        let ready = Arc::new(AtomicBool::new(false));
        let handle = {
            let ready = ready.clone();
            let batch_size = config.batch_size;
            let poll = Duration::from_millis(config.poll_interval_ms);
            thread::spawn(move || {
                Self::run(service, batch_size, poll, s_batch, r_stop, ready);
            })
        };

        Self {
            r_batch,
            s_stop,
            ready,
            handle: Some(handle),
        }
    }

    fn run<S: ReplayService<O, A>>(
        service: S,
        batch_size: Option<usize>,
        poll: Duration,
        s_batch: Sender<SampledBatch<O, A>>,
        r_stop: Receiver<()>,
        ready: Arc<AtomicBool>,
    ) {
        info!("Start prefetch thread");
        loop {
            match service.good_to_learn() {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    warn!("Prefetch thread stopped: {}", e);
                    return;
                }
            }
            match r_stop.recv_timeout(poll) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => return,
            }
        }
        ready.store(true, Ordering::SeqCst);

        loop {
            let batch = match service.sample(batch_size) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Prefetch thread stopped: {}", e);
                    break;
                }
            };
            select! {
                send(s_batch, batch) -> res => {
                    if res.is_err() {
                        break;
                    }
                }
                recv(r_stop) -> _ => break,
            }
        }
        info!("Stop prefetch thread");
    }
}

impl<O: BatchBase, A: BatchBase> PrefetchDataset<O, A> {
    /// Stops and joins the prefetching thread.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.s_stop.try_send(()).ok();
            if handle.join().is_err() {
                warn!("Prefetch thread panicked");
            }
        }
    }
}

impl<O: BatchBase, A: BatchBase> Dataset<O, A> for PrefetchDataset<O, A> {
    fn good_to_learn(&self) -> Result<bool> {
        Ok(self.ready.load(Ordering::SeqCst))
    }

    /// Blocks until a batch is available.
    fn sample(&mut self) -> Result<SampledBatch<O, A>> {
        match self.r_batch.recv() {
            Ok(batch) => Ok(batch),
            Err(_) => Err(ApexError::Disconnected("prefetch thread"))?,
        }
    }
}

impl<O: BatchBase, A: BatchBase> Drop for PrefetchDataset<O, A> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::replay_buffer::{ReplayBufferConfig, SharedReplayBuffer, TransitionBatch};
    use tempdir::TempDir;

    #[test_log::test]
    fn test_prefetch_dataset() -> Result<()> {
        let config = ReplayBufferConfig::default().capacity(16).min_size(4);
        let buffer = SharedReplayBuffer::<Vec<f32>, Vec<i64>>::build(&config)?;
        let prefetch_config = PrefetchConfig::default()
            .queue_size(2)
            .batch_size(Some(5))
            .poll_interval_ms(1);
        let mut dataset = PrefetchDataset::spawn(buffer.clone(), &prefetch_config);
        assert!(!dataset.good_to_learn()?);

        buffer.merge(
            TransitionBatch::from_rows(
                vec![0., 1., 2., 3.],
                vec![0; 4],
                vec![1., 2., 3., 4.],
                vec![0.; 4],
            ),
            4,
        )?;
        for _ in 0..5 {
            assert_eq!(dataset.sample()?.len(), 5);
        }
        assert!(dataset.good_to_learn()?);

        dataset.stop();
        // batches left in the queue are still delivered, then the channel is closed
        while dataset.sample().is_ok() {}
        Ok(())
    }

    #[test]
    fn test_stop_while_waiting() -> Result<()> {
        let config = ReplayBufferConfig::default().capacity(16).min_size(4);
        let buffer = SharedReplayBuffer::<Vec<f32>, Vec<i64>>::build(&config)?;
        let mut dataset = PrefetchDataset::spawn(buffer, &PrefetchConfig::default());
        dataset.stop();
        assert!(dataset.sample().is_err());
        Ok(())
    }

    #[test]
    fn test_serde_prefetch_config() -> Result<()> {
        let config = PrefetchConfig::default().batch_size(Some(32));
        let dir = TempDir::new("prefetch_config")?;
        let path = dir.path().join("prefetch_config.yaml");
        config.save(&path)?;
        assert_eq!(config, PrefetchConfig::load(&path)?);
        Ok(())
    }
}
