use super::{LearnerConfig, LearnerStat};
use crate::{AsyncTrainerError, EpisodeInfo, EvalInfo, WeightHub};
use anyhow::Result;
use apex_core::{
    dataset::Dataset,
    record::{Record, RecordValue::Scalar, Recorder},
    replay_buffer::BatchBase,
    Agent, LearnOutput, ReplayService, SyncModel,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, info, warn};
use std::{
    marker::PhantomData,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

#[inline]
fn every(steps: usize, interval: usize) -> bool {
    interval > 0 && steps % interval == 0
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Trains an [`Agent`] on batches from a [`Dataset`].
///
/// The loop runs on the thread spawned by [`Learner::spawn`]:
///
/// 1. publish the initial weights in the [`WeightHub`], so that workers start
///    rolling out,
/// 2. poll [`Dataset::good_to_learn`] every `poll_interval_ms` until it is `true`,
/// 3. repeat `sample → learn → sync target every target_sync_interval steps →
///    update priorities → publish every publish_interval steps → record every
///    record_interval steps` until `max_train_steps` or the stop signal.
///
/// The version of published weights is the train step count of the learner.
///
/// ```mermaid
/// stateDiagram-v2
///   [*] --> Publish
///   Publish --> Wait
///   Wait --> Wait: not good_to_learn
///   Wait --> Learn: good_to_learn
///   Learn --> Learn: train step
///   Learn --> [*]: max_train_steps or stop
///   Wait --> [*]: stop
/// ```
pub struct Learner<Ag, D, S, O, A>
where
    Ag: Agent<O, A> + SyncModel,
    D: Dataset<O, A>,
    S: ReplayService<O, A>,
    O: BatchBase,
    A: BatchBase,
{
    config: LearnerConfig,
    agent: Ag,
    dataset: D,

    /// Receives priority updates.
    service: S,

    hub: WeightHub<Ag::Weights>,

    /// Receives [`EpisodeInfo`]s from workers.
    info_receiver: Option<Receiver<EpisodeInfo>>,

    /// Receives [`EvalInfo`]s from an evaluator.
    eval_receiver: Option<Receiver<EvalInfo>>,

    phantom: PhantomData<(O, A)>,
}

impl<Ag, D, S, O, A> Learner<Ag, D, S, O, A>
where
    Ag: Agent<O, A> + SyncModel + Send + 'static,
    D: Dataset<O, A> + Send + 'static,
    S: ReplayService<O, A> + Send + 'static,
    O: BatchBase + Send + 'static,
    A: BatchBase + Send + 'static,
{
    /// Builds a learner.
    ///
    /// Batches are sampled from `dataset`, priorities are updated through `service`.
    pub fn build(
        config: &LearnerConfig,
        agent: Ag,
        dataset: D,
        service: S,
        hub: WeightHub<Ag::Weights>,
    ) -> Self {
        Self {
            config: config.clone(),
            agent,
            dataset,
            service,
            hub,
            info_receiver: None,
            eval_receiver: None,
            phantom: PhantomData,
        }
    }

    /// Sets the receiver of [`EpisodeInfo`]s, whose mean score and length are recorded.
    pub fn episode_info(mut self, receiver: Receiver<EpisodeInfo>) -> Self {
        self.info_receiver = Some(receiver);
        self
    }

    /// Sets the receiver of [`EvalInfo`]s. The latest result is recorded as
    /// `eval_score`, `eval_epslen` and `eval_version`.
    pub fn eval_info(mut self, receiver: Receiver<EvalInfo>) -> Self {
        self.eval_receiver = Some(receiver);
        self
    }

    /// Spawns the thread running the training loop.
    pub fn spawn<R>(self, recorder: R) -> LearnerHandle<Ag>
    where
        R: Recorder + Send + 'static,
    {
        let (s_stop, r_stop) = bounded(1);
        let handle = thread::spawn(move || {
            let result = self.run(recorder, r_stop);
            if let Err(e) = &result {
                warn!("Learner stopped with an error: {}", e);
            }
            result
        });

        LearnerHandle {
            s_stop,
            handle: Some(handle),
        }
    }

    fn publish(&self, train_steps: usize) -> Result<()> {
        let weights = self.agent.get_weights(self.config.publish_names.as_deref());
        self.hub.publish(train_steps, weights)
    }

    /// Returns `true` if stop is requested or the handle has gone.
    fn wait_dataset(&self, r_stop: &Receiver<()>) -> Result<bool> {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            if self.dataset.good_to_learn()? {
                return Ok(false);
            }
            match r_stop.recv_timeout(poll) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => return Ok(true),
            }
        }
    }

    fn run(mut self, mut recorder: impl Recorder, r_stop: Receiver<()>) -> Result<(Ag, LearnerStat)> {
        let mut train_steps = self.agent.train_steps();
        let mut stat = LearnerStat {
            train_steps,
            ..Default::default()
        };
        self.publish(train_steps)?;

        info!("Waiting for the dataset to be ready");
        if self.wait_dataset(&r_stop)? {
            info!("Stopped learner before training");
            return Ok((self.agent, stat));
        }
        info!("Starts training from step {}", train_steps);

        let start = Instant::now();
        let mut time = Instant::now();
        let mut steps_since_record = 0;
        let (mut scores, mut epslens) = (vec![], vec![]);
        let mut last_eval = None;

        while train_steps < self.config.max_train_steps {
            match r_stop.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => {
                    info!("Received the stop signal");
                    break;
                }
            }

            let batch = self.dataset.sample()?;
            let LearnOutput {
                td_errors,
                mut record,
            } = self.agent.learn(&batch)?;
            train_steps += 1;
            steps_since_record += 1;

            if every(train_steps, self.config.target_sync_interval) {
                self.agent.sync_target();
                debug!("Synchronized the target network at step {}", train_steps);
            }
            self.service.update_priorities(&td_errors, &batch.indices)?;
            if every(train_steps, self.config.publish_interval) {
                self.publish(train_steps)?;
            }

            if let Some(receiver) = &self.info_receiver {
                for info in receiver.try_iter() {
                    scores.push(info.score);
                    epslens.push(info.epslen as f32);
                }
            }
            if let Some(receiver) = &self.eval_receiver {
                if let Some(eval) = receiver.try_iter().last() {
                    last_eval = Some(eval);
                }
            }

            if every(train_steps, self.config.record_interval) {
                let secs = time.elapsed().as_secs_f32();
                if secs > 0. {
                    record.insert(
                        "train_steps_per_sec",
                        Scalar(steps_since_record as f32 / secs),
                    );
                }
                record.insert("train_steps", Scalar(train_steps as f32));
                record.insert("replay_len", Scalar(self.service.len()? as f32));
                Self::record_episodes(&mut record, &scores, &epslens);
                if let Some(eval) = last_eval.take() {
                    record.insert("eval_score", Scalar(eval.score));
                    record.insert("eval_epslen", Scalar(eval.epslen));
                    record.insert("eval_version", Scalar(eval.version as f32));
                }
                recorder.write(record);

                stat.episodes += scores.len();
                scores.clear();
                epslens.clear();
                steps_since_record = 0;
                time = Instant::now();
            }
        }

        self.publish(train_steps)?;
        stat.train_steps = train_steps;
        stat.episodes += scores.len();
        stat.duration = start.elapsed();
        info!("Stopped learner at step {}", train_steps);
        Ok((self.agent, stat))
    }

    fn record_episodes(record: &mut Record, scores: &[f32], epslens: &[f32]) {
        if scores.is_empty() {
            return;
        }
        let n = scores.len() as f32;
        record.insert("episodes", Scalar(n));
        record.insert("mean_score", Scalar(scores.iter().sum::<f32>() / n));
        record.insert("mean_epslen", Scalar(epslens.iter().sum::<f32>() / n));
    }
}

/// Handle of the thread spawned by [`Learner::spawn`].
///
/// Dropping the handle stops the learner at its next step.
pub struct LearnerHandle<Ag> {
    s_stop: Sender<()>,
    handle: Option<JoinHandle<Result<(Ag, LearnerStat)>>>,
}

impl<Ag> LearnerHandle<Ag> {
    /// Signals the learner to stop.
    pub fn stop(&self) {
        self.s_stop.try_send(()).ok();
    }

    /// Returns `true` if the training loop has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Waits until the learner finishes and returns the trained agent.
    pub fn join(mut self) -> Result<(Ag, LearnerStat)> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(AsyncTrainerError::ThreadPanicked("learner".into()))?,
            },
            None => Err(AsyncTrainerError::Disconnected("learner"))?,
        }
    }

    /// Stops and joins the learner.
    pub fn stop_and_join(self) -> Result<(Ag, LearnerStat)> {
        self.stop();
        self.join()
    }
}
