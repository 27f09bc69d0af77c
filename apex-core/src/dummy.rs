//! Toy environment and models for tests.
//!
//! [`ChainEnv`] is a walk on a chain of states, rewarded at the right end.
//! [`QTablePolicy`] and [`QTableAgent`] act on and learn a tabular action-value
//! function over it. Observations are stored in `Vec<f32>` columns and actions
//! in `Vec<i64>` columns.
use crate::{
    record::{Record, RecordValue},
    replay_buffer::SampledBatch,
    Agent, Env, LearnOutput, Policy, Step, SyncModel,
};
use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column of observations.
pub type ObsBatch = Vec<f32>;

/// Column of actions.
pub type ActBatch = Vec<i64>;

/// Named weights of the tabular models.
pub type QTableWeights = BTreeMap<String, Vec<f32>>;

const Q_TABLE: &str = "q_table";

/// Configuration of [`ChainEnv`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChainEnvConfig {
    /// Number of states. The episode terminates at the last state.
    pub n_states: usize,

    /// Episodes are truncated after this number of steps.
    pub max_steps: usize,

    /// Probability that the action is flipped.
    pub slip: f32,
}

impl Default for ChainEnvConfig {
    fn default() -> Self {
        Self {
            n_states: 5,
            max_steps: 20,
            slip: 0.,
        }
    }
}

/// A walk on a chain.
///
/// Action `1` moves right, `0` moves left; the leftmost state is a wall. Reaching
/// the last state gives reward 1 and terminates the episode.
pub struct ChainEnv {
    config: ChainEnvConfig,
    pos: usize,
    t: usize,
    rng: StdRng,
}

impl Env for ChainEnv {
    type Config = ChainEnvConfig;
    type Obs = f32;
    type Act = i64;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if config.n_states < 2 {
            bail!("ChainEnv needs at least 2 states, got {}", config.n_states);
        }
        Ok(Self {
            config: config.clone(),
            pos: 0,
            t: 0,
            rng: StdRng::seed_from_u64(seed as u64),
        })
    }

    fn reset(&mut self) -> Result<f32> {
        self.pos = 0;
        self.t = 0;
        Ok(0.)
    }

    fn step(&mut self, a: &i64) -> Result<Step<Self>> {
        let a = match *a {
            0 | 1 => *a,
            _ => bail!("Invalid action {}", a),
        };
        let a = if self.rng.gen::<f32>() < self.config.slip {
            1 - a
        } else {
            a
        };

        self.pos = if a == 1 {
            self.pos + 1
        } else {
            self.pos.saturating_sub(1)
        };
        self.t += 1;

        let is_terminated = self.pos == self.config.n_states - 1;
        let is_truncated = !is_terminated && self.t >= self.config.max_steps;
        let reward = if is_terminated { 1. } else { 0. };
        let obs = self.pos as f32;
        let init_obs = if is_terminated || is_truncated {
            Some(self.reset()?)
        } else {
            None
        };

        Ok(Step::new(obs, a, reward, is_terminated, is_truncated, init_obs))
    }
}

#[inline]
fn state(obs: f32, n_states: usize) -> usize {
    (obs.max(0.).round() as usize).min(n_states - 1)
}

#[inline]
fn cell(s: usize, a: i64) -> usize {
    2 * s + a.clamp(0, 1) as usize
}

fn max_q(q_table: &[f32], s: usize) -> f32 {
    q_table[2 * s].max(q_table[2 * s + 1])
}

fn select_weights(q_table: &[f32], names: Option<&[String]>) -> QTableWeights {
    let mut weights = QTableWeights::new();
    if names.map_or(true, |names| names.iter().any(|n| n == Q_TABLE)) {
        weights.insert(Q_TABLE.to_string(), q_table.to_vec());
    }
    weights
}

fn load_weights(q_table: &mut Vec<f32>, weights: &QTableWeights) {
    if let Some(q) = weights.get(Q_TABLE) {
        if q.len() == q_table.len() {
            q_table.copy_from_slice(q);
        }
    }
}

/// Epsilon-greedy policy on a Q-table.
#[derive(Clone)]
pub struct QTablePolicy {
    n_states: usize,
    q_table: Vec<f32>,
    epsilon: f32,
    rng: StdRng,
}

impl QTablePolicy {
    /// Creates a policy with a zero Q-table.
    pub fn new(n_states: usize, epsilon: f32, seed: u64) -> Self {
        Self {
            n_states,
            q_table: vec![0.; 2 * n_states],
            epsilon,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns the Q-table, two values per state.
    pub fn q_table(&self) -> &[f32] {
        &self.q_table
    }
}

impl Policy<ChainEnv> for QTablePolicy {
    fn sample(&mut self, obs: &f32) -> i64 {
        let s = state(*obs, self.n_states);
        if self.rng.gen::<f32>() < self.epsilon {
            self.rng.gen_range(0..2)
        } else if self.q_table[2 * s + 1] >= self.q_table[2 * s] {
            1
        } else {
            0
        }
    }

    fn q_values(&mut self, obs: &f32, act: &i64, next_obs: &f32) -> Option<(f32, f32)> {
        let s = state(*obs, self.n_states);
        let s_next = state(*next_obs, self.n_states);
        Some((self.q_table[cell(s, *act)], max_q(&self.q_table, s_next)))
    }
}

impl SyncModel for QTablePolicy {
    type Weights = QTableWeights;

    fn get_weights(&self, names: Option<&[String]>) -> QTableWeights {
        select_weights(&self.q_table, names)
    }

    fn set_weights(&mut self, weights: &QTableWeights) {
        load_weights(&mut self.q_table, weights);
    }
}

/// Tabular Q-learning with a target table.
pub struct QTableAgent {
    n_states: usize,
    q_table: Vec<f32>,
    target: Vec<f32>,
    lr: f32,
    gamma: f32,
    train_steps: usize,
    n_target_syncs: usize,
}

impl QTableAgent {
    /// Creates an agent with zero tables.
    pub fn new(n_states: usize, lr: f32, gamma: f32) -> Self {
        Self {
            n_states,
            q_table: vec![0.; 2 * n_states],
            target: vec![0.; 2 * n_states],
            lr,
            gamma,
            train_steps: 0,
            n_target_syncs: 0,
        }
    }

    /// Returns the Q-table, two values per state.
    pub fn q_table(&self) -> &[f32] {
        &self.q_table
    }

    /// Returns how many times the target table has been synchronized.
    pub fn n_target_syncs(&self) -> usize {
        self.n_target_syncs
    }
}

impl Agent<ObsBatch, ActBatch> for QTableAgent {
    fn learn(&mut self, batch: &SampledBatch<ObsBatch, ActBatch>) -> Result<LearnOutput> {
        let tr = &batch.transitions;
        let discount = tr.discount();
        let mut td_errors = Vec::with_capacity(batch.len());
        let mut loss = 0.;

        for i in 0..batch.len() {
            let s = state(tr.obs[i], self.n_states);
            let s_next = state(tr.next_obs[i], self.n_states);
            let ix = cell(s, tr.act[i]);
            let bootstrap =
                discount[i] * self.gamma.powi(tr.steps[i] as i32) * max_q(&self.target, s_next);
            let td = tr.reward[i] + bootstrap - self.q_table[ix];

            self.q_table[ix] += self.lr * batch.is_ratio[i] * td;
            loss += batch.is_ratio[i] * td * td;
            td_errors.push(td);
        }
        self.train_steps += 1;

        let loss = if batch.is_empty() {
            0.
        } else {
            loss / batch.len() as f32
        };
        Ok(LearnOutput {
            td_errors,
            record: Record::from_slice(&[("loss", RecordValue::Scalar(loss))]),
        })
    }

    fn sync_target(&mut self) {
        self.target.copy_from_slice(&self.q_table);
        self.n_target_syncs += 1;
    }
}

impl SyncModel for QTableAgent {
    type Weights = QTableWeights;

    fn get_weights(&self, names: Option<&[String]>) -> QTableWeights {
        select_weights(&self.q_table, names)
    }

    fn set_weights(&mut self, weights: &QTableWeights) {
        load_weights(&mut self.q_table, weights);
    }

    fn train_steps(&self) -> usize {
        self.train_steps
    }
}
