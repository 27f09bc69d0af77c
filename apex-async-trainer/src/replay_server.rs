//! Replay buffer owned by a dedicated thread.
use crate::{messages::ReplayBufferMessage, AsyncTrainerError};
use anyhow::Result;
use apex_core::{
    replay_buffer::{BatchBase, ReplayBuffer, ReplayBufferConfig, SampledBatch, TransitionBatch},
    ReplayService,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{info, warn};
use std::thread::{self, JoinHandle};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Serves a [`ReplayBuffer`] on its own thread.
///
/// Requests are processed one at a time in arrival order, which linearizes
/// merges, samples and priority updates without a lock.
///
/// ```mermaid
/// flowchart LR
///   C1[ReplayClient] -->|ReplayBufferMessage| S[ReplayServer thread]
///   C2[ReplayClient] -->|ReplayBufferMessage| S
///   S -->|reply| C1
///   S -->|reply| C2
///   S --- B[ReplayBuffer]
/// ```
pub struct ReplayServer<O: BatchBase, A: BatchBase> {
    sender: Sender<ReplayBufferMessage<O, A>>,
    handle: Option<JoinHandle<ReplayBuffer<O, A>>>,
}

impl<O, A> ReplayServer<O, A>
where
    O: BatchBase + Send + 'static,
    A: BatchBase + Send + 'static,
{
    /// Builds a replay buffer and spawns the thread serving it.
    pub fn spawn(config: &ReplayBufferConfig) -> Result<Self> {
        Ok(Self::serve(ReplayBuffer::build(config)?))
    }

    /// Spawns the thread serving an existing replay buffer.
    pub fn serve(buffer: ReplayBuffer<O, A>) -> Self {
        let (sender, receiver) = unbounded();
        let handle = thread::spawn(move || Self::run(buffer, receiver));
        Self {
            sender,
            handle: Some(handle),
        }
    }

    fn run(
        mut buffer: ReplayBuffer<O, A>,
        receiver: Receiver<ReplayBufferMessage<O, A>>,
    ) -> ReplayBuffer<O, A> {
        info!("Start replay server");
        for msg in receiver.iter() {
            // Clients may have gone while waiting for the reply.
            match msg {
                ReplayBufferMessage::Merge {
                    batch,
                    batch_size,
                    reply,
                } => {
                    reply.send(buffer.merge(batch, batch_size)).ok();
                }
                ReplayBufferMessage::Sample { batch_size, reply } => {
                    reply.send(buffer.sample(batch_size)).ok();
                }
                ReplayBufferMessage::UpdatePriorities {
                    td_errors,
                    indices,
                    reply,
                } => {
                    reply
                        .send(buffer.update_priorities(&td_errors, &indices))
                        .ok();
                }
                ReplayBufferMessage::GoodToLearn(reply) => {
                    reply.send(buffer.good_to_learn()).ok();
                }
                ReplayBufferMessage::IsFull(reply) => {
                    reply.send(buffer.is_full()).ok();
                }
                ReplayBufferMessage::Len(reply) => {
                    reply.send(buffer.len()).ok();
                }
                ReplayBufferMessage::Stop => break,
            }
        }
        info!("Stop replay server, {} transitions", buffer.len());
        buffer
    }
}

impl<O: BatchBase, A: BatchBase> ReplayServer<O, A> {
    /// Returns a client of this server.
    pub fn client(&self) -> ReplayClient<O, A> {
        ReplayClient {
            sender: self.sender.clone(),
        }
    }

    /// Stops the server and returns the replay buffer.
    ///
    /// Requests sent after this call fail with a disconnection error.
    pub fn stop(mut self) -> Result<ReplayBuffer<O, A>> {
        self.sender.send(ReplayBufferMessage::Stop).ok();
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(buffer) => Ok(buffer),
                Err(_) => Err(AsyncTrainerError::ThreadPanicked("replay server".into()))?,
            },
            None => Err(AsyncTrainerError::Disconnected("replay server"))?,
        }
    }
}

impl<O: BatchBase, A: BatchBase> Drop for ReplayServer<O, A> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.sender.send(ReplayBufferMessage::Stop).ok();
            if handle.join().is_err() {
                warn!("Replay server panicked");
            }
        }
    }
}

/// Handle of a [`ReplayServer`], usable from any thread.
pub struct ReplayClient<O: BatchBase, A: BatchBase> {
    sender: Sender<ReplayBufferMessage<O, A>>,
}

impl<O: BatchBase, A: BatchBase> Clone for ReplayClient<O, A> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<O: BatchBase, A: BatchBase> ReplayClient<O, A> {
    fn request<T>(&self, msg: impl FnOnce(Sender<T>) -> ReplayBufferMessage<O, A>) -> Result<T> {
        let (s, r) = bounded(1);
        if self.sender.send(msg(s)).is_err() {
            return Err(AsyncTrainerError::Disconnected("replay server"))?;
        }
        match r.recv() {
            Ok(reply) => Ok(reply),
            Err(_) => Err(AsyncTrainerError::Disconnected("replay server"))?,
        }
    }
}

impl<O: BatchBase, A: BatchBase> ReplayService<O, A> for ReplayClient<O, A> {
    fn merge(&self, batch: TransitionBatch<O, A>, batch_size: usize) -> Result<()> {
        self.request(|reply| ReplayBufferMessage::Merge {
            batch,
            batch_size,
            reply,
        })?
    }

    fn sample(&self, batch_size: Option<usize>) -> Result<SampledBatch<O, A>> {
        self.request(|reply| ReplayBufferMessage::Sample { batch_size, reply })?
    }

    fn update_priorities(&self, td_errors: &[f32], indices: &[usize]) -> Result<()> {
        self.request(|reply| ReplayBufferMessage::UpdatePriorities {
            td_errors: td_errors.to_vec(),
            indices: indices.to_vec(),
            reply,
        })?
    }

    fn good_to_learn(&self) -> Result<bool> {
        self.request(ReplayBufferMessage::GoodToLearn)
    }

    fn is_full(&self) -> Result<bool> {
        self.request(ReplayBufferMessage::IsFull)
    }

    fn len(&self) -> Result<usize> {
        self.request(ReplayBufferMessage::Len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use apex_core::replay_buffer::ReplayKind;
    use test_log::test;

    type Obs = Vec<f32>;
    type Act = Vec<i64>;

    fn batch(start: usize, n: usize) -> TransitionBatch<Obs, Act> {
        let obs = (start..start + n).map(|i| i as f32).collect::<Vec<_>>();
        let next_obs = obs.iter().map(|o| o + 1.).collect();
        TransitionBatch::from_rows(obs, vec![0; n], next_obs, vec![0.; n])
    }

    #[test]
    fn test_serves_requests() -> Result<()> {
        let config = ReplayBufferConfig::default()
            .kind(ReplayKind::Proportional)
            .capacity(4)
            .min_size(2)
            .batch_size(3);
        let server = ReplayServer::<Obs, Act>::spawn(&config)?;
        let client = server.client();

        assert!(!client.good_to_learn()?);
        assert!(client.sample(None).is_err());
        client.merge(batch(0, 3), 3)?;
        assert_eq!(client.len()?, 3);
        assert!(!client.is_full()?);
        assert!(client.merge(batch(0, 5), 5).is_err());

        let sampled = client.clone().sample(None)?;
        assert_eq!(sampled.len(), 3);
        client.update_priorities(&vec![1.; 3], &sampled.indices)?;
        assert!(client.update_priorities(&[f32::NAN], &[0]).is_err());

        let buffer = server.stop()?;
        assert_eq!(buffer.len(), 3);
        assert!(client.len().is_err());
        Ok(())
    }

    #[test]
    fn test_concurrent_clients() -> Result<()> {
        let config = ReplayBufferConfig::default().capacity(1000).min_size(1);
        let server = ReplayServer::<Obs, Act>::spawn(&config)?;

        let producers = (0..4)
            .map(|i| {
                let client = server.client();
                thread::spawn(move || -> Result<()> {
                    for j in 0..25 {
                        client.merge(batch(100 * i + 4 * j, 4), 4)?;
                    }
                    Ok(())
                })
            })
            .collect::<Vec<_>>();
        for p in producers {
            p.join().unwrap()?;
        }

        let client = server.client();
        assert_eq!(client.len()?, 400);
        let sampled = client.sample(Some(50))?;
        for i in 0..sampled.len() {
            assert_eq!(
                sampled.transitions.next_obs[i],
                sampled.transitions.obs[i] + 1.
            );
        }
        Ok(())
    }
}
