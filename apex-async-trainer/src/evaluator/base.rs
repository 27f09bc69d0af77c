use super::EvaluatorConfig;
use crate::{EvalInfo, WeightHub};
use anyhow::Result;
use apex_core::{Env, Policy, SyncModel};
use crossbeam_channel::Sender;
use log::{info, trace};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

/// Evaluates the weights published by the learner.
///
/// Whenever a new version of the weights appears in the [`WeightHub`], the
/// evaluator sets it on its policy, runs `n_episodes` episodes and sends the mean
/// score and length as an [`EvalInfo`]. Nothing is flushed to the replay buffer.
///
/// The policy is used as given, so it should act greedily or with the
/// exploration rate intended for evaluation.
pub struct Evaluator<E, P>
where
    E: Env,
    P: Policy<E> + SyncModel,
{
    config: EvaluatorConfig,
    env_config: E::Config,
    policy: P,
    hub: WeightHub<P::Weights>,
    stop: Arc<AtomicBool>,
}

impl<E, P> Evaluator<E, P>
where
    E: Env,
    P: Policy<E> + SyncModel,
{
    /// Builds an evaluator. The environment is built when [`Evaluator::run`] is called.
    pub fn build(
        config: &EvaluatorConfig,
        env_config: &E::Config,
        policy: P,
        hub: WeightHub<P::Weights>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config: config.clone(),
            env_config: env_config.clone(),
            policy,
            hub,
            stop,
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Runs the evaluation loop until the stop flag is set.
    ///
    /// Returns the number of finished evaluations. An evaluation interrupted by the
    /// stop flag is not sent. [`EvalInfo`]s are dropped if `sender` is full.
    pub fn run(mut self, sender: Sender<EvalInfo>) -> Result<usize> {
        let mut env = E::build(&self.env_config, self.config.seed)?;
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        if self.hub.wait_first(&self.stop, poll)?.is_none() {
            return Ok(0);
        }
        info!("Starts evaluator");

        let mut evaluated = None;
        let mut n_evals = 0;
        while !self.stopped() {
            let snapshot = match self.hub.pull()? {
                Some(snapshot) if evaluated != Some(snapshot.version) => snapshot,
                _ => {
                    thread::sleep(poll);
                    continue;
                }
            };
            self.policy.set_weights(&snapshot.weights);
            evaluated = Some(snapshot.version);

            let (score, epslen) = match self.evaluate(&mut env)? {
                Some(result) => result,
                None => break,
            };
            n_evals += 1;
            info!(
                "Evaluated weights of version {}: score = {}, epslen = {}",
                snapshot.version, score, epslen
            );

            let eval_info = EvalInfo {
                version: snapshot.version,
                score,
                epslen,
            };
            if sender.try_send(eval_info).is_err() {
                trace!("Evaluator dropped an eval info");
            }
        }

        info!("Stopped evaluator after {} evaluations", n_evals);
        Ok(n_evals)
    }

    /// Returns the mean score and length over `n_episodes`, or `None` if stopped.
    fn evaluate(&mut self, env: &mut E) -> Result<Option<(f32, f32)>> {
        let n_episodes = self.config.n_episodes.max(1);
        let (mut score, mut epslen) = (0f32, 0usize);

        for _ in 0..n_episodes {
            let mut obs = env.reset()?;
            loop {
                if self.stopped() {
                    return Ok(None);
                }
                let act = self.policy.sample(&obs);
                let step = env.step(&act)?;
                score += step.reward;
                epslen += 1;
                if step.is_done() {
                    break;
                }
                obs = step.obs;
            }
        }

        let n = n_episodes as f32;
        Ok(Some((score / n, epslen as f32 / n)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use apex_core::dummy::{ChainEnv, ChainEnvConfig, QTablePolicy, QTableWeights};
    use crossbeam_channel::unbounded;
    use test_log::test;

    type ChainEvaluator = Evaluator<ChainEnv, QTablePolicy>;

    fn env_config() -> ChainEnvConfig {
        ChainEnvConfig {
            n_states: 3,
            max_steps: 10,
            slip: 0.,
        }
    }

    #[test]
    fn test_evaluates_each_version_once() -> Result<()> {
        let config = EvaluatorConfig::default().n_episodes(3).poll_interval_ms(1);
        let hub = WeightHub::<QTableWeights>::new();
        let stop = Arc::new(AtomicBool::new(false));
        let (s, r) = unbounded();

        // A greedy policy walks right, so each episode has 2 steps
        let policy = QTablePolicy::new(3, 0., 0);
        hub.publish(0, policy.get_weights(None))?;
        let weights = policy.get_weights(None);
        let evaluator =
            ChainEvaluator::build(&config, &env_config(), policy, hub.clone(), stop.clone());
        let handle = thread::spawn(move || evaluator.run(s));

        assert_eq!(
            r.recv()?,
            EvalInfo {
                version: 0,
                score: 1.,
                epslen: 2.
            }
        );
        hub.publish(5, weights)?;
        assert_eq!(r.recv()?.version, 5);

        stop.store(true, Ordering::SeqCst);
        assert_eq!(handle.join().unwrap()?, 2);
        assert!(r.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn test_evaluator_stops_before_first_weights() -> Result<()> {
        let config = EvaluatorConfig::default().poll_interval_ms(1);
        let hub = WeightHub::<QTableWeights>::new();
        let stop = Arc::new(AtomicBool::new(true));
        let (s, r) = unbounded();

        let policy = QTablePolicy::new(3, 0., 0);
        let evaluator = ChainEvaluator::build(&config, &env_config(), policy, hub, stop);
        assert_eq!(evaluator.run(s)?, 0);
        assert!(r.try_recv().is_err());
        Ok(())
    }
}
