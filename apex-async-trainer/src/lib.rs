#![warn(missing_docs)]
//! Asynchronous trainer of an Ape-X style architecture.
//!
//! The code might look like below.
//!
//! ```ignore
//! let agent = QTableAgent::new(5, 0.1, 0.99);
//! let policies = (0..n_workers)
//!     .map(|i| QTablePolicy::new(5, 0.4f32.powi(i as i32 + 1), i as u64))
//!     .collect::<Vec<_>>();
//!
//! // Runs workers and the learner until max_train_steps
//! let (agent, learner_stat, worker_stats) = train_async::<ChainEnv, ObsBatch, ActBatch, _, _, _>(
//!     agent,
//!     policies,
//!     &env_config,
//!     &replay_buffer_config,
//!     None,
//!     &worker_config,
//!     &worker_manager_config,
//!     &learner_config,
//!     Some((&EvaluatorConfig::default(), QTablePolicy::new(5, 0., 0))),
//!     LogRecorder::new("learner"),
//! )?;
//! ```
//!
//! Training process consists of the following components:
//!
//! * [`Worker`] manages an environment and a policy. It rolls out episodes with
//!   the weights most recently pulled from the [`WeightHub`] and flushes its local
//!   buffer of multi-step transitions to the [`WorkerManager`].
//! * [`WorkerManager`] runs the workers on threads and forwards their flushes
//!   into a [`ReplayService`](apex_core::ReplayService), the shared replay buffer.
//! * [`Learner`] samples batches from the replay buffer, trains the agent,
//!   updates priorities from TD-errors and publishes weights to the hub.
//! * [`Evaluator`] runs evaluation episodes with each new version of the weights
//!   and reports the results to the learner as [`EvalInfo`]s.
//!
//! [`ReplayServer`] is an alternative to the shared replay buffer. It owns the
//! buffer on a thread and serves requests from [`ReplayClient`]s over channels.
//!
//! ```mermaid
//! flowchart TB
//!   subgraph W[WorkerManager]
//!     W1[Worker 1]
//!     W2[Worker 2]
//!     F[Forwarding thread]
//!   end
//!   W1 -->|PushedItemMessage| F
//!   W2 -->|PushedItemMessage| F
//!   F -->|merge| R[Replay buffer]
//!   R -->|sample| L[Learner]
//!   L -->|update_priorities| R
//!   L -->|publish| H[WeightHub]
//!   H -->|pull| W1
//!   H -->|pull| W2
//!   W1 -.->|EpisodeInfo| L
//!   H -->|pull| E[Evaluator]
//!   E -.->|EvalInfo| L
//! ```
mod error;
mod evaluator;
mod learner;
mod messages;
mod replay_server;
mod util;
mod weights;
mod worker;
mod worker_manager;
pub use apex_core::SyncModel;
pub use error::AsyncTrainerError;
pub use evaluator::{Evaluator, EvaluatorConfig};
pub use learner::{Learner, LearnerConfig, LearnerHandle, LearnerStat};
pub use messages::{EpisodeInfo, EvalInfo, PushedItemMessage, ReplayBufferMessage};
pub use replay_server::{ReplayClient, ReplayServer};
pub use util::train_async;
pub use weights::{WeightHub, WeightsSnapshot};
pub use worker::{worker_stats_fmt, RunMode, Worker, WorkerConfig, WorkerStat};
pub use worker_manager::{WorkerManager, WorkerManagerConfig};
