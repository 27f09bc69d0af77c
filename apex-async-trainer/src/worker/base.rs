use super::{RunMode, WorkerConfig, WorkerStat};
use crate::{AsyncTrainerError, EpisodeInfo, PushedItemMessage, WeightHub};
use anyhow::{anyhow, Result};
use apex_core::{
    local_buffer::LocalBuffer,
    replay_buffer::{BatchBase, TransitionBatch},
    Env, Policy, StepProcessor, SyncModel, TransitionStepProcessor,
};
use crossbeam_channel::Sender;
use log::{debug, info, trace};
use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Runs interaction between a [`Policy`] and an [`Env`], taking samples.
///
/// The loop of a worker is
///
/// 1. pull the latest weights from the [`WeightHub`] if they are newer than the
///    ones in the policy,
/// 2. roll out for the length given by [`RunMode`], adding transitions to a
///    [`LocalBuffer`],
/// 3. flush the local buffer into the channel to the
///    [`WorkerManager`](crate::WorkerManager) whenever it is full in
///    [`RunMode::NSteps`], and only at the end of each episode in
///    [`RunMode::Episode`], so that every flush is one whole episode,
///
/// until the stop flag is set. The rollout uses the same weights throughout.
/// Transitions left in the local buffer at the stop are discarded.
pub struct Worker<E, P, O, A>
where
    E: Env,
    P: Policy<E> + SyncModel,
    O: BatchBase<Item = E::Obs>,
    A: BatchBase<Item = E::Act>,
{
    id: usize,
    config: WorkerConfig,
    env_config: E::Config,
    policy: P,
    hub: WeightHub<P::Weights>,
    stop: Arc<AtomicBool>,
    phantom: PhantomData<(O, A)>,
}

impl<E, P, O, A> Worker<E, P, O, A>
where
    E: Env,
    P: Policy<E> + SyncModel,
    O: BatchBase<Item = E::Obs>,
    A: BatchBase<Item = E::Act>,
{
    /// Builds a worker. The environment is built when [`Worker::run`] is called.
    pub fn build(
        id: usize,
        config: &WorkerConfig,
        env_config: &E::Config,
        policy: P,
        hub: WeightHub<P::Weights>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            config: config.clone(),
            env_config: env_config.clone(),
            policy,
            hub,
            stop,
            phantom: PhantomData,
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Runs the rollout loop until the stop flag is set.
    ///
    /// Flushed transitions are sent to `sender`, finished episodes to
    /// `info_sender`. Episode infos are dropped if that channel is full.
    pub fn run(
        mut self,
        sender: Sender<PushedItemMessage<TransitionBatch<O, A>>>,
        info_sender: Sender<EpisodeInfo>,
    ) -> Result<WorkerStat> {
        let time = Instant::now();
        let mut stat = WorkerStat::default();
        let mut env = E::build(&self.env_config, self.config.seed + self.id as i64)?;
        let mut step_proc = TransitionStepProcessor::<E, O, A>::new();
        step_proc.reset(env.reset()?);
        let local_config = self.config.local_buffer.clone().n_envs(1);
        let prioritize = local_config.worker_side_prioritization;
        let mut buffer = LocalBuffer::<O, A>::build(&local_config)?;
        let episodic = self.config.run_mode == RunMode::Episode;

        // Blocks until the learner publishes the first weights
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let mut version = match self.hub.wait_first(&self.stop, poll)? {
            Some(snapshot) => {
                self.policy.set_weights(&snapshot.weights);
                snapshot.version
            }
            None => return Ok(stat),
        };
        info!("Starts worker {} with weights of version {}", self.id, version);

        let (mut score, mut epslen) = (0f32, 0usize);
        while !self.stopped() {
            if let Some(snapshot) = self.hub.pull()? {
                if snapshot.version != version {
                    self.policy.set_weights(&snapshot.weights);
                    version = snapshot.version;
                    trace!("Worker {} pulled weights of version {}", self.id, version);
                }
            }

            let n_steps = match self.config.run_mode {
                RunMode::NSteps(n) => n.max(1),
                RunMode::Episode => usize::MAX,
            };
            for _ in 0..n_steps {
                let obs = step_proc
                    .prev_obs()
                    .cloned()
                    .ok_or_else(|| anyhow!("Step processor of worker {} is not reset", self.id))?;
                let act = self.policy.sample(&obs);
                let step = env.step(&act)?;
                let is_done = step.is_done();
                score += step.reward;
                epslen += 1;
                stat.env_steps += 1;

                let values = if prioritize {
                    self.policy.q_values(&obs, &act, &step.obs)
                } else {
                    None
                };
                let tr = step_proc.process(step);
                match values {
                    Some((q, next_q)) => buffer.add_with_values(tr, vec![q], vec![next_q])?,
                    None => buffer.add(tr)?,
                }

                if !episodic && buffer.is_full() {
                    self.flush(&mut buffer, &sender, &mut stat)?;
                }

                if is_done {
                    stat.episodes += 1;
                    let info = EpisodeInfo {
                        worker_id: self.id,
                        score,
                        epslen,
                    };
                    if info_sender.try_send(info).is_err() {
                        trace!("Worker {} dropped an episode info", self.id);
                    }
                    score = 0.;
                    epslen = 0;

                    if episodic {
                        if !buffer.is_empty() {
                            self.flush(&mut buffer, &sender, &mut stat)?;
                        }
                        break;
                    }
                }

                if self.stopped() {
                    break;
                }
            }
        }

        stat.duration = time.elapsed();
        info!("Stopped worker {}", self.id);
        Ok(stat)
    }

    fn flush(
        &self,
        buffer: &mut LocalBuffer<O, A>,
        sender: &Sender<PushedItemMessage<TransitionBatch<O, A>>>,
        stat: &mut WorkerStat,
    ) -> Result<()> {
        let transitions = buffer.sample();
        buffer.reset();
        debug!("Worker {} flushes {} transitions", self.id, transitions.len());

        let msg = PushedItemMessage {
            id: self.id,
            transitions,
        };
        if sender.send(msg).is_err() {
            return Err(AsyncTrainerError::SendMsgForPush)?;
        }
        stat.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use apex_core::{
        dummy::{ActBatch, ChainEnv, ChainEnvConfig, ObsBatch, QTablePolicy, QTableWeights},
        local_buffer::LocalBufferConfig,
        replay_buffer::{ReplayBuffer, ReplayBufferConfig, ReplayKind},
    };
    use crossbeam_channel::unbounded;
    use std::thread;
    use test_log::test;

    type ChainWorker = Worker<ChainEnv, QTablePolicy, ObsBatch, ActBatch>;

    fn env_config() -> ChainEnvConfig {
        ChainEnvConfig {
            n_states: 3,
            max_steps: 10,
            slip: 0.,
        }
    }

    #[test]
    fn test_worker_flushes_episodes() -> Result<()> {
        let config = WorkerConfig::default()
            .run_mode(RunMode::Episode)
            .local_buffer(LocalBufferConfig::default().seqlen(10).n_steps(1));
        let hub = WeightHub::<QTableWeights>::new();
        let stop = Arc::new(AtomicBool::new(false));
        let (s, r) = unbounded();
        let (s_info, r_info) = unbounded();

        // A greedy policy walks right, so each episode has 2 steps
        let policy = QTablePolicy::new(3, 0., 0);
        hub.publish(0, policy.get_weights(None))?;
        let worker = ChainWorker::build(0, &config, &env_config(), policy, hub, stop.clone());
        let handle = thread::spawn(move || worker.run(s, s_info));

        let msg = r.recv()?;
        assert_eq!(msg.id, 0);
        assert_eq!(msg.transitions.obs, vec![0., 1.]);
        assert_eq!(msg.transitions.reward, vec![0., 1.]);
        assert_eq!(msg.transitions.is_terminated, vec![0, 1]);
        assert_eq!(
            r_info.recv()?,
            EpisodeInfo {
                worker_id: 0,
                score: 1.,
                epslen: 2
            }
        );

        stop.store(true, Ordering::SeqCst);
        let stat = handle.join().unwrap()?;
        assert!(stat.flushes >= 1);
        assert_eq!(stat.env_steps % 2, 0);
        Ok(())
    }

    #[test]
    fn test_worker_waits_first_weights() -> Result<()> {
        let config = WorkerConfig::default().poll_interval_ms(1);
        let hub = WeightHub::<QTableWeights>::new();
        let stop = Arc::new(AtomicBool::new(true));
        let (s, _r) = unbounded();
        let (s_info, _r_info) = unbounded();

        let policy = QTablePolicy::new(3, 0., 0);
        let worker = ChainWorker::build(0, &config, &env_config(), policy, hub, stop);
        let stat = worker.run(s, s_info)?;
        assert_eq!(stat.env_steps, 0);
        Ok(())
    }

    #[test]
    fn test_worker_side_prioritization() -> Result<()> {
        let local_config = LocalBufferConfig::default()
            .seqlen(4)
            .n_steps(1)
            .gamma(1.)
            .worker_side_prioritization(true)
            .per_alpha(1.)
            .per_epsilon(0.5);
        let config = WorkerConfig::default()
            .run_mode(RunMode::NSteps(4))
            .local_buffer(local_config);
        let hub = WeightHub::<QTableWeights>::new();
        let stop = Arc::new(AtomicBool::new(false));
        let (s, r) = unbounded();
        let (s_info, _r_info) = unbounded();

        let policy = QTablePolicy::new(3, 0., 0);
        hub.publish(0, policy.get_weights(None))?;
        let worker = ChainWorker::build(1, &config, &env_config(), policy, hub, stop.clone());
        let handle = thread::spawn(move || worker.run(s, s_info));

        // With a zero Q-table, the priority of a transition is |reward| + epsilon
        let msg = r.recv()?;
        stop.store(true, Ordering::SeqCst);
        assert_eq!(msg.id, 1);
        assert_eq!(msg.transitions.priority, Some(vec![0.5, 1.5, 0.5, 1.5]));
        handle.join().unwrap()?;

        let mut replay = ReplayBuffer::build(
            &ReplayBufferConfig::default()
                .kind(ReplayKind::Proportional)
                .capacity(8)
                .min_size(1),
        )?;
        replay.merge(msg.transitions, 4)?;
        assert_eq!(replay.len(), 4);
        Ok(())
    }

    #[test]
    fn test_worker_rejects_zero_epsilon_with_worker_priorities() -> Result<()> {
        let local_config = LocalBufferConfig::default()
            .worker_side_prioritization(true)
            .per_epsilon(0.);
        let config = WorkerConfig::default().local_buffer(local_config);
        let hub = WeightHub::<QTableWeights>::new();
        let stop = Arc::new(AtomicBool::new(false));
        let (s, _r) = unbounded();
        let (s_info, _r_info) = unbounded();

        let policy = QTablePolicy::new(3, 0., 0);
        hub.publish(0, policy.get_weights(None))?;
        let worker = ChainWorker::build(0, &config, &env_config(), policy, hub, stop);
        assert!(worker.run(s, s_info).is_err());
        Ok(())
    }

    #[test]
    fn test_worker_flushes_whole_episodes_longer_than_seqlen() -> Result<()> {
        let config = WorkerConfig::default()
            .run_mode(RunMode::Episode)
            .local_buffer(LocalBufferConfig::default().seqlen(3).n_steps(1));
        let hub = WeightHub::<QTableWeights>::new();
        let stop = Arc::new(AtomicBool::new(false));
        let (s, r) = unbounded();
        let (s_info, _r_info) = unbounded();

        // Walking right on a long chain, every episode is truncated after 10 steps
        let env_config = ChainEnvConfig {
            n_states: 20,
            max_steps: 10,
            slip: 0.,
        };
        let policy = QTablePolicy::new(20, 0., 0);
        hub.publish(0, policy.get_weights(None))?;
        let worker = ChainWorker::build(0, &config, &env_config, policy, hub, stop.clone());
        let handle = thread::spawn(move || worker.run(s, s_info));

        for _ in 0..2 {
            let msg = r.recv()?;
            assert_eq!(msg.transitions.len(), 10);
            assert_eq!(msg.transitions.obs, (0..10).map(|i| i as f32).collect::<Vec<_>>());
            assert_eq!(msg.transitions.is_truncated[9], 1);
            assert!(msg.transitions.is_truncated[..9].iter().all(|&d| d == 0));
        }

        stop.store(true, Ordering::SeqCst);
        let stat = handle.join().unwrap()?;
        assert_eq!(stat.flushes, stat.episodes);
        Ok(())
    }
}
