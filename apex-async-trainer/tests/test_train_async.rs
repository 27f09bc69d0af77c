use anyhow::Result;
use apex_async_trainer::{
    train_async, EvaluatorConfig, Learner, LearnerConfig, ReplayServer, RunMode, WeightHub, WorkerConfig,
    WorkerManager, WorkerManagerConfig,
};
use apex_core::{
    dataset::{PrefetchConfig, ReplayDataset},
    dummy::{ActBatch, ChainEnv, ChainEnvConfig, ObsBatch, QTableAgent, QTablePolicy},
    local_buffer::LocalBufferConfig,
    record::BufferedRecorder,
    replay_buffer::{ReplayBufferConfig, ReplayKind},
};
use crossbeam_channel::unbounded;
use test_log::test;

const N_STATES: usize = 5;
const MAX_STEPS: usize = 20;
const N_WORKERS: usize = 2;
const LR: f32 = 0.5;
const GAMMA: f32 = 0.9;
const MAX_TRAIN_STEPS: usize = 300;
const RECORD_INTERVAL: usize = 100;

fn env_config() -> ChainEnvConfig {
    ChainEnvConfig {
        n_states: N_STATES,
        max_steps: MAX_STEPS,
        slip: 0.,
    }
}

fn policies() -> Vec<QTablePolicy> {
    (0..N_WORKERS)
        .map(|i| QTablePolicy::new(N_STATES, 0.4f32.powi(i as i32 + 1), i as u64))
        .collect()
}

fn learner_config() -> LearnerConfig {
    LearnerConfig::default()
        .max_train_steps(MAX_TRAIN_STEPS)
        .target_sync_interval(50)
        .publish_interval(10)
        .record_interval(RECORD_INTERVAL)
        .poll_interval_ms(5)
}

fn check_q_table(q_table: &[f32]) {
    // Moving right from the state next to the goal is better than moving left
    let (left, right) = (q_table[2 * (N_STATES - 2)], q_table[2 * (N_STATES - 2) + 1]);
    assert!(right > 0.5, "q_table = {:?}", q_table);
    assert!(right > left, "q_table = {:?}", q_table);
}

fn run_train_async(prefetch_config: Option<&PrefetchConfig>, evaluate: bool) -> Result<()> {
    let replay_buffer_config = ReplayBufferConfig::default()
        .kind(ReplayKind::Proportional)
        .capacity(10_000)
        .min_size(200)
        .batch_size(32);
    let worker_config = WorkerConfig::default()
        .run_mode(RunMode::NSteps(16))
        .local_buffer(LocalBufferConfig::default().seqlen(16).n_steps(3).gamma(GAMMA));
    let worker_manager_config = WorkerManagerConfig::default().n_workers(N_WORKERS);
    let recorder = BufferedRecorder::new();
    let evaluator_config = EvaluatorConfig::default().n_episodes(2).poll_interval_ms(5);
    let evaluator = evaluate.then(|| (&evaluator_config, QTablePolicy::new(N_STATES, 0., 100)));

    let (agent, learner_stat, worker_stats) =
        train_async::<ChainEnv, ObsBatch, ActBatch, _, _, _>(
            QTableAgent::new(N_STATES, LR, GAMMA),
            policies(),
            &env_config(),
            &replay_buffer_config,
            prefetch_config,
            &worker_config,
            &worker_manager_config,
            &learner_config(),
            evaluator,
            recorder.clone(),
        )?;

    assert_eq!(learner_stat.train_steps, MAX_TRAIN_STEPS);
    assert!(learner_stat.episodes > 0);
    assert_eq!(agent.n_target_syncs(), MAX_TRAIN_STEPS / 50);
    assert_eq!(worker_stats.len(), N_WORKERS);
    assert!(worker_stats.iter().all(|s| s.env_steps > 0));
    assert_eq!(recorder.len(), MAX_TRAIN_STEPS / RECORD_INTERVAL);
    check_q_table(agent.q_table());
    Ok(())
}

#[test]
fn test_train_async() -> Result<()> {
    run_train_async(None, false)
}

#[test]
fn test_train_async_with_prefetch() -> Result<()> {
    run_train_async(Some(&PrefetchConfig::default().poll_interval_ms(5)), false)
}

#[test]
fn test_train_async_with_evaluator() -> Result<()> {
    run_train_async(None, true)
}

#[test]
fn test_episodic_replay_server() -> Result<()> {
    let replay_buffer_config = ReplayBufferConfig::default()
        .kind(ReplayKind::Episodic)
        .capacity(2_000)
        .min_size(100)
        .batch_size(4);
    let server = ReplayServer::<ObsBatch, ActBatch>::spawn(&replay_buffer_config)?;
    let hub = WeightHub::new();
    let (s_info, r_info) = unbounded();

    // Each flush is a whole episode, even though episodes last longer than seqlen
    let worker_config = WorkerConfig::default()
        .run_mode(RunMode::Episode)
        .local_buffer(LocalBufferConfig::default().seqlen(5).n_steps(1));
    let mut workers = WorkerManager::<ChainEnv, QTablePolicy, ObsBatch, ActBatch>::build(
        &WorkerManagerConfig::default().n_workers(N_WORKERS),
        &worker_config,
        &env_config(),
        policies(),
        hub.clone(),
        s_info,
    )?;
    workers.run(server.client());

    let learner_config = learner_config().max_train_steps(100);
    let dataset = ReplayDataset::new(server.client(), None);
    let agent = QTableAgent::new(N_STATES, LR, GAMMA);
    let learner = Learner::build(&learner_config, agent, dataset, server.client(), hub)
        .episode_info(r_info)
        .spawn(BufferedRecorder::new());

    let (agent, learner_stat) = learner.join()?;
    let worker_stats = workers.stop_and_join()?;
    let mut buffer = server.stop()?;

    assert_eq!(learner_stat.train_steps, 100);
    assert!(worker_stats.iter().all(|s| s.flushes == s.episodes));
    assert_eq!(buffer.kind(), ReplayKind::Episodic);
    assert!(buffer.len() >= 100);

    // Every sampled episode ends with a terminal or truncated step
    let sample = buffer.sample(None)?;
    let mut end = 0;
    for len in sample.episode_lens.clone().unwrap_or_default() {
        end += len;
        let tr = &sample.transitions;
        assert_eq!(tr.is_terminated[end - 1] + tr.is_truncated[end - 1], 1);
    }
    assert_eq!(end, sample.len());
    check_q_table(agent.q_table());
    Ok(())
}
