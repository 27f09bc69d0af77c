use super::WorkerManagerConfig;
use crate::{
    AsyncTrainerError, EpisodeInfo, PushedItemMessage, WeightHub, Worker, WorkerConfig,
    WorkerStat,
};
use anyhow::Result;
use apex_core::{
    local_buffer::GatheringBuffer,
    replay_buffer::{BatchBase, TransitionBatch},
    Env, Policy, ReplayService, SyncModel,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{info, warn};
use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages [`Worker`]s.
///
/// [`WorkerManager::run`] spawns a thread for each worker and a forwarding thread.
/// The forwarding thread receives the transitions flushed by the workers and
/// merges them into a [`ReplayService`], concatenating `batches_per_merge`
/// flushes into a single merge when it is more than one.
///
/// ```mermaid
/// flowchart LR
///   W1[Worker 1] -->|PushedItemMessage| F[Forwarding thread]
///   W2[Worker 2] -->|PushedItemMessage| F
///   F -->|merge| R[ReplayService]
///   H[WeightHub] -->|pull| W1
///   H -->|pull| W2
/// ```
pub struct WorkerManager<E, P, O, A>
where
    E: Env,
    P: Policy<E> + SyncModel,
    O: BatchBase<Item = E::Obs>,
    A: BatchBase<Item = E::Act>,
{
    config: WorkerManagerConfig,
    worker_config: WorkerConfig,
    env_config: E::Config,

    /// Policies, one for each worker, moved into the threads by `run()`.
    policies: Vec<P>,

    hub: WeightHub<P::Weights>,

    /// Flag to stop workers.
    stop: Arc<AtomicBool>,

    /// Sender of [`EpisodeInfo`]s to the learner.
    info_sender: Sender<EpisodeInfo>,

    workers: Vec<JoinHandle<Result<WorkerStat>>>,
    forwarder: Option<JoinHandle<usize>>,
    phantom: PhantomData<(O, A)>,
}

impl<E, P, O, A> WorkerManager<E, P, O, A>
where
    E: Env + 'static,
    P: Policy<E> + SyncModel + Send + 'static,
    O: BatchBase<Item = E::Obs> + Send + 'static,
    A: BatchBase<Item = E::Act> + Send + 'static,
    E::Config: Send + 'static,
{
    /// Builds a [`WorkerManager`].
    ///
    /// `policies` must have one policy for each of `config.n_workers` workers.
    pub fn build(
        config: &WorkerManagerConfig,
        worker_config: &WorkerConfig,
        env_config: &E::Config,
        policies: Vec<P>,
        hub: WeightHub<P::Weights>,
        info_sender: Sender<EpisodeInfo>,
    ) -> Result<Self> {
        if policies.len() != config.n_workers {
            return Err(AsyncTrainerError::InvalidConfig(format!(
                "{} policies are given for {} workers",
                policies.len(),
                config.n_workers
            )))?;
        }

        Ok(Self {
            config: config.clone(),
            worker_config: worker_config.clone(),
            env_config: env_config.clone(),
            policies,
            hub,
            stop: Arc::new(AtomicBool::new(false)),
            info_sender,
            workers: vec![],
            forwarder: None,
            phantom: PhantomData,
        })
    }

    /// Runs threads for [`Worker`]s and a thread merging their samples into `service`.
    ///
    /// Each worker blocks until the first weights are published in the [`WeightHub`].
    pub fn run<S>(&mut self, service: S)
    where
        S: ReplayService<O, A> + Send + 'static,
    {
        let (s, r) = bounded(self.config.channel_capacity.max(1));

        for (id, policy) in std::mem::take(&mut self.policies).into_iter().enumerate() {
            let worker = Worker::<E, P, O, A>::build(
                id,
                &self.worker_config,
                &self.env_config,
                policy,
                self.hub.clone(),
                self.stop.clone(),
            );
            let sender = s.clone();
            let info_sender = self.info_sender.clone();
            let handle = thread::spawn(move || worker.run(sender, info_sender));
            self.workers.push(handle);
        }
        info!("Started {} workers", self.workers.len());

        // The forwarding thread exits when all workers drop their senders
        drop(s);
        let batches_per_merge = self.config.batches_per_merge;
        let handle = thread::spawn(move || Self::handle_message(r, service, batches_per_merge));
        self.forwarder = Some(handle);
    }

    /// Loop waiting [`PushedItemMessage`]s from [`Worker`]s.
    ///
    /// Returns the number of merged transitions.
    fn handle_message<S: ReplayService<O, A>>(
        receiver: Receiver<PushedItemMessage<TransitionBatch<O, A>>>,
        service: S,
        batches_per_merge: usize,
    ) -> usize {
        info!("Starts thread for message handling");
        let gather = (batches_per_merge > 1).then(|| GatheringBuffer::new(batches_per_merge));
        let mut n_merged = 0;

        for msg in receiver.iter() {
            let batch = match &gather {
                None => Some(msg.transitions),
                Some(gather) => match gather.push(msg.transitions).and_then(|_| gather.take()) {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!("Dropped transitions from worker {}: {}", msg.id, e);
                        None
                    }
                },
            };
            if let Some(batch) = batch {
                n_merged += Self::merge(&service, batch);
            }
        }

        if let Some(gather) = gather {
            match gather.drain() {
                Ok(Some(batch)) => n_merged += Self::merge(&service, batch),
                Ok(None) => {}
                Err(e) => warn!("Dropped gathered transitions: {}", e),
            }
        }
        info!(
            "Stopped thread for message handling, {} transitions merged",
            n_merged
        );
        n_merged
    }

    fn merge<S: ReplayService<O, A>>(service: &S, batch: TransitionBatch<O, A>) -> usize {
        let n = batch.len();
        match service.merge(batch, n) {
            Ok(()) => n,
            Err(e) => {
                warn!("Failed to merge {} transitions: {}", n, e);
                0
            }
        }
    }
}

impl<E, P, O, A> WorkerManager<E, P, O, A>
where
    E: Env,
    P: Policy<E> + SyncModel,
    O: BatchBase<Item = E::Obs>,
    A: BatchBase<Item = E::Act>,
{
    /// Stops worker threads.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Returns the flag stopping the workers.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Waits until all workers and the forwarding thread finish.
    ///
    /// All threads are joined before the first error, if any, is returned.
    pub fn join(self) -> Result<Vec<WorkerStat>> {
        let mut stats = Vec::with_capacity(self.workers.len());
        let mut error = None;

        for (id, handle) in self.workers.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(stat)) => stats.push(stat),
                Ok(Err(e)) => {
                    warn!("Worker {} stopped with an error: {}", id, e);
                    error.get_or_insert(e);
                }
                Err(_) => {
                    error.get_or_insert(
                        AsyncTrainerError::ThreadPanicked(format!("worker {}", id)).into(),
                    );
                }
            }
        }

        if let Some(handle) = self.forwarder {
            if handle.join().is_err() {
                error.get_or_insert(
                    AsyncTrainerError::ThreadPanicked("message handling".into()).into(),
                );
            }
        }

        match error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Stops and joins workers.
    pub fn stop_and_join(self) -> Result<Vec<WorkerStat>> {
        self.stop();
        self.join()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::RunMode;
    use apex_core::{
        dummy::{ActBatch, ChainEnv, ChainEnvConfig, ObsBatch, QTablePolicy, QTableWeights},
        local_buffer::LocalBufferConfig,
        replay_buffer::{ReplayBufferConfig, ReplayKind, SharedReplayBuffer},
    };
    use crossbeam_channel::unbounded;
    use std::{thread::sleep, time::Duration};
    use test_log::test;

    type Manager = WorkerManager<ChainEnv, QTablePolicy, ObsBatch, ActBatch>;

    const CAPACITY: usize = 1_000_000;

    fn policies(n: usize) -> Vec<QTablePolicy> {
        (0..n).map(|i| QTablePolicy::new(5, 0.5, i as u64)).collect()
    }

    fn wait_len(buffer: &SharedReplayBuffer<ObsBatch, ActBatch>, n: usize) -> Result<usize> {
        for _ in 0..1000 {
            let len = buffer.len()?;
            if len >= n {
                return Ok(len);
            }
            sleep(Duration::from_millis(5));
        }
        buffer.len()
    }

    #[test]
    fn test_rejects_wrong_number_of_policies() {
        let (s_info, _r_info) = unbounded();
        let manager = Manager::build(
            &WorkerManagerConfig::default().n_workers(3),
            &WorkerConfig::default(),
            &ChainEnvConfig::default(),
            policies(2),
            WeightHub::new(),
            s_info,
        );
        assert!(manager.is_err());
    }

    #[test]
    fn test_workers_fill_replay_buffer() -> Result<()> {
        let buffer = SharedReplayBuffer::build(&ReplayBufferConfig::default().capacity(CAPACITY))?;
        let hub = WeightHub::<QTableWeights>::new();
        let worker_config = WorkerConfig::default()
            .run_mode(RunMode::NSteps(8))
            .local_buffer(LocalBufferConfig::default().seqlen(8));
        let (s_info, r_info) = unbounded();
        let mut manager = Manager::build(
            &WorkerManagerConfig::default().n_workers(2),
            &worker_config,
            &ChainEnvConfig::default(),
            policies(2),
            hub.clone(),
            s_info,
        )?;
        manager.run(buffer.clone());

        // Workers wait for the first weights
        sleep(Duration::from_millis(20));
        assert_eq!(buffer.len()?, 0);

        hub.publish(0, QTablePolicy::new(5, 0., 0).get_weights(None))?;
        assert!(wait_len(&buffer, 80)? >= 80);

        let stats = manager.stop_and_join()?;
        assert_eq!(stats.len(), 2);
        let flushes = stats.iter().map(|s| s.flushes).sum::<usize>();
        assert_eq!(buffer.len()?, CAPACITY.min(8 * flushes));
        assert!(r_info.try_recv().is_ok());
        Ok(())
    }

    #[test]
    fn test_gathered_merges() -> Result<()> {
        let buffer = SharedReplayBuffer::build(&ReplayBufferConfig::default().capacity(CAPACITY))?;
        let hub = WeightHub::<QTableWeights>::new();
        hub.publish(0, QTablePolicy::new(5, 0., 0).get_weights(None))?;
        let worker_config = WorkerConfig::default()
            .run_mode(RunMode::NSteps(4))
            .local_buffer(LocalBufferConfig::default().seqlen(4));
        let (s_info, _r_info) = unbounded();
        let mut manager = Manager::build(
            &WorkerManagerConfig::default()
                .n_workers(2)
                .batches_per_merge(3),
            &worker_config,
            &ChainEnvConfig::default(),
            policies(2),
            hub,
            s_info,
        )?;
        manager.run(buffer.clone());
        assert!(wait_len(&buffer, 12)? >= 12);

        // Leftovers in the gathering buffer are merged when the workers stop
        let stats = manager.stop_and_join()?;
        let flushes = stats.iter().map(|s| s.flushes).sum::<usize>();
        assert_eq!(buffer.len()?, CAPACITY.min(4 * flushes));
        Ok(())
    }

    #[test]
    fn test_worker_side_priorities_are_merged() -> Result<()> {
        let config = ReplayBufferConfig::default()
            .kind(ReplayKind::Proportional)
            .capacity(CAPACITY);
        let buffer = SharedReplayBuffer::build(&config)?;
        let hub = WeightHub::<QTableWeights>::new();
        hub.publish(0, QTablePolicy::new(5, 0., 0).get_weights(None))?;
        let local_config = LocalBufferConfig::default()
            .seqlen(8)
            .worker_side_prioritization(true);
        let worker_config = WorkerConfig::default()
            .run_mode(RunMode::NSteps(8))
            .local_buffer(local_config);
        let (s_info, _r_info) = unbounded();
        let mut manager = Manager::build(
            &WorkerManagerConfig::default().n_workers(2),
            &worker_config,
            &ChainEnvConfig::default(),
            policies(2),
            hub,
            s_info,
        )?;
        manager.run(buffer.clone());
        assert!(wait_len(&buffer, 80)? >= 80);

        // No flush is rejected by the central buffer
        let stats = manager.stop_and_join()?;
        let flushes = stats.iter().map(|s| s.flushes).sum::<usize>();
        assert_eq!(buffer.len()?, CAPACITY.min(8 * flushes));
        Ok(())
    }
}
