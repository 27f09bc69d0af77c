//! Utility function.
use crate::{
    worker_stats_fmt, AsyncTrainerError, Evaluator, EvaluatorConfig, Learner, LearnerConfig,
    LearnerStat, WeightHub, WorkerConfig, WorkerManager, WorkerManagerConfig, WorkerStat,
};
use anyhow::Result;
use apex_core::{
    dataset::{Dataset, PrefetchConfig, PrefetchDataset, ReplayDataset},
    record::Recorder,
    replay_buffer::{BatchBase, ReplayBufferConfig, SharedReplayBuffer},
    Agent, Env, Policy, SyncModel,
};
use crossbeam_channel::bounded;
use log::info;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

/// Runs asynchronous training.
///
/// This function runs a [`WorkerManager`] and a [`Learner`] on threads around a
/// [`SharedReplayBuffer`]. Weights flow from the learner to workers through a
/// [`WeightHub`]. The function returns after the learner reaches
/// `learner_config.max_train_steps`, when the workers have been stopped and joined.
///
/// * `agent` - The agent to be trained.
/// * `policies` - Policies of workers, one for each worker. They must accept the
///   weights of the agent, while exploration parameters can be different.
/// * `env_config` - Configuration of the environment with which transitions are
///   sampled.
/// * `replay_buffer_config` - Configuration of the replay buffer.
/// * `prefetch_config` - If given, batches are prefetched on a separate thread.
/// * `worker_config` - Configuration of [`Worker`](crate::Worker)s. If
///   `pull_names` is given and `learner_config.publish_names` is not, the learner
///   publishes only those parameters.
/// * `worker_manager_config` - Configuration of [`WorkerManager`].
/// * `learner_config` - Configuration of [`Learner`].
/// * `evaluator` - If given, an [`Evaluator`] with this configuration and policy
///   evaluates published weights and its results are recorded by the learner.
/// * `recorder` - Receives the records of the learner.
#[allow(clippy::too_many_arguments)]
pub fn train_async<E, O, A, P, Ag, R>(
    agent: Ag,
    policies: Vec<P>,
    env_config: &E::Config,
    replay_buffer_config: &ReplayBufferConfig,
    prefetch_config: Option<&PrefetchConfig>,
    worker_config: &WorkerConfig,
    worker_manager_config: &WorkerManagerConfig,
    learner_config: &LearnerConfig,
    evaluator: Option<(&EvaluatorConfig, P)>,
    recorder: R,
) -> Result<(Ag, LearnerStat, Vec<WorkerStat>)>
where
    E: Env + 'static,
    O: BatchBase<Item = E::Obs> + Send + 'static,
    A: BatchBase<Item = E::Act> + Send + 'static,
    P: Policy<E> + SyncModel<Weights = Ag::Weights> + Send + 'static,
    Ag: Agent<O, A> + SyncModel + Send + 'static,
    R: Recorder + Send + 'static,
    E::Config: Send + 'static,
{
    let buffer = SharedReplayBuffer::<O, A>::build(replay_buffer_config)?;
    let hub = WeightHub::new();

    // Episode infos are dropped by workers while the channel is full
    let (s_info, r_info) = bounded(1000);

    let mut workers = WorkerManager::<E, P, O, A>::build(
        worker_manager_config,
        worker_config,
        env_config,
        policies,
        hub.clone(),
        s_info,
    )?;

    let learner_config = match (&learner_config.publish_names, &worker_config.pull_names) {
        (None, Some(names)) => learner_config.clone().publish_names(Some(names.clone())),
        _ => learner_config.clone(),
    };
    let dataset: Box<dyn Dataset<O, A> + Send> = match prefetch_config {
        Some(config) => Box::new(PrefetchDataset::spawn(buffer.clone(), config)),
        None => Box::new(ReplayDataset::new(buffer.clone(), None)),
    };

    let (s_eval, r_eval) = bounded(100);
    let eval_stop = Arc::new(AtomicBool::new(false));
    let evaluator = evaluator.map(|(config, policy)| {
        let evaluator =
            Evaluator::<E, P>::build(config, env_config, policy, hub.clone(), eval_stop.clone());
        let sender = s_eval.clone();
        thread::spawn(move || evaluator.run(sender))
    });
    drop(s_eval);

    // Starts sampling and training
    workers.run(buffer.clone());
    let learner = Learner::build(&learner_config, agent, dataset, buffer, hub)
        .episode_info(r_info)
        .eval_info(r_eval)
        .spawn(recorder);

    let learner_result = learner.join();
    let worker_result = workers.stop_and_join();
    eval_stop.store(true, Ordering::SeqCst);
    let eval_result = match evaluator.map(|handle| handle.join()) {
        Some(Ok(result)) => result,
        Some(Err(_)) => Err(AsyncTrainerError::ThreadPanicked("evaluator".into()).into()),
        None => Ok(0),
    };
    let (agent, learner_stat) = learner_result?;
    let worker_stats = worker_result?;
    let n_evals = eval_result?;

    info!("Stats of learner");
    info!("{}", learner_stat.fmt());
    info!("Stats of workers");
    info!("{}", worker_stats_fmt(&worker_stats));
    info!("{} evaluations", n_evals);

    Ok((agent, learner_stat, worker_stats))
}
