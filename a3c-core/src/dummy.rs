//! In-memory environment and model used in tests.
//!
//! [`DummyEnv`] runs fixed-length episodes with a constant reward and logs
//! every call into a shared [`DummyEnvLog`]. [`DummyModel`] has a single
//! trainable weight, used as the value estimate of every observation, and logs
//! the size of every batch it is optimized on.
use crate::{Env, Model, ModelRole, OptimizeStat, RolloutBatch, Step};
use anyhow::{anyhow, Result};
use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

/// Width of the observation vector of the simulator.
pub const OBS_DIM: usize = 29;

/// Width of the action vector of the simulator.
pub const ACT_DIM: usize = 2;

/// Calls made on a [`DummyEnv`].
#[derive(Clone, Debug, PartialEq)]
pub enum DummyEnvEvent {
    /// `reset(relaunch)` was called.
    Reset {
        /// Worker owning the session.
        worker_id: usize,
        /// Argument of the call.
        relaunch: bool,
    },

    /// `step()` was called.
    Step {
        /// Worker owning the session.
        worker_id: usize,
    },

    /// `end()` was called.
    End {
        /// Worker owning the session.
        worker_id: usize,
    },
}

/// Shared log of [`DummyEnvEvent`]s.
pub type DummyEnvLog = Arc<Mutex<Vec<DummyEnvEvent>>>;

/// Configuration of [`DummyEnv`].
#[derive(Clone, Debug)]
pub struct DummyEnvConfig {
    /// Number of steps until an episode is done.
    pub episode_len: usize,

    /// Reward of every step.
    pub reward: f32,

    /// If set, `step()` fails once this many steps were taken in total.
    pub fail_at_step: Option<usize>,

    /// Calls made on all environments built from this configuration.
    pub log: DummyEnvLog,
}

impl Default for DummyEnvConfig {
    fn default() -> Self {
        Self {
            episode_len: 20,
            reward: 1.0,
            fail_at_step: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl DummyEnvConfig {
    /// Sets the episode length.
    pub fn episode_len(mut self, v: usize) -> Self {
        self.episode_len = v;
        self
    }

    /// Makes `step()` fail after `v` steps.
    pub fn fail_at_step(mut self, v: usize) -> Self {
        self.fail_at_step = Some(v);
        self
    }

    /// Returns a copy of the logged events.
    pub fn events(&self) -> Vec<DummyEnvEvent> {
        self.log.lock().unwrap().clone()
    }
}

/// Dummy env.
pub struct DummyEnv {
    config: DummyEnvConfig,
    worker_id: usize,
    t: usize,
    total_steps: usize,
}

impl DummyEnv {
    fn obs(&self) -> Vec<f32> {
        let mut obs = vec![0f32; OBS_DIM];
        obs[0] = self.t as f32;
        obs
    }

    fn log(&self, event: DummyEnvEvent) {
        self.config.log.lock().unwrap().push(event);
    }
}

impl Env for DummyEnv {
    type Config = DummyEnvConfig;
    type Obs = Vec<f32>;
    type Act = Vec<f32>;
    type Info = ();

    fn build(config: &Self::Config, worker_id: usize, _port: u16) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            worker_id,
            t: 0,
            total_steps: 0,
        })
    }

    fn reset(&mut self, relaunch: bool) -> Result<Self::Obs> {
        self.log(DummyEnvEvent::Reset {
            worker_id: self.worker_id,
            relaunch,
        });
        self.t = 0;
        Ok(self.obs())
    }

    fn step(&mut self, act: &Self::Act) -> Result<Step<Self>> {
        if Some(self.total_steps) == self.config.fail_at_step {
            return Err(anyhow!("simulator closed the connection"));
        }
        self.log(DummyEnvEvent::Step {
            worker_id: self.worker_id,
        });
        self.t += 1;
        self.total_steps += 1;
        let is_done = self.t >= self.config.episode_len;
        Ok(Step::new(self.obs(), act.clone(), self.config.reward, is_done, ()))
    }

    fn end(&mut self) -> Result<()> {
        self.log(DummyEnvEvent::End {
            worker_id: self.worker_id,
        });
        Ok(())
    }
}

/// Configuration of [`DummyModel`].
#[derive(Clone, Debug)]
pub struct DummyModelConfig {
    /// Initial weight.
    pub init_weight: f32,

    /// If `true`, `optimize()` returns a NaN value loss.
    pub diverge: bool,

    /// Sizes of the batches passed to `optimize()` of any model built from this configuration.
    pub batch_sizes: Arc<Mutex<Vec<usize>>>,

    /// Return of the last transition of every batch passed to `optimize()`.
    pub last_returns: Arc<Mutex<Vec<f32>>>,
}

impl Default for DummyModelConfig {
    fn default() -> Self {
        Self {
            init_weight: 0.0,
            diverge: false,
            batch_sizes: Arc::new(Mutex::new(Vec::new())),
            last_returns: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl DummyModelConfig {
    /// Returns a copy of the logged batch sizes.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    /// Returns a copy of the logged last returns.
    pub fn last_returns(&self) -> Vec<f32> {
        self.last_returns.lock().unwrap().clone()
    }
}

/// Parameters of [`DummyModel`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DummyParams {
    /// Value estimate of every observation.
    pub weight: f32,

    /// Number of optimization steps applied to the parameters.
    pub n_updates: usize,
}

/// Dummy model with a single weight.
pub struct DummyModel {
    config: DummyModelConfig,
    role: ModelRole,
    params: DummyParams,
}

impl Model<DummyEnv> for DummyModel {
    type Config = DummyModelConfig;
    type Params = DummyParams;

    fn build(config: &Self::Config, role: ModelRole) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            role,
            params: DummyParams {
                weight: config.init_weight,
                n_updates: 0,
            },
        })
    }

    fn act(&mut self, _obs: &Vec<f32>) -> Result<(Vec<f32>, f32)> {
        let act = (0..ACT_DIM).map(|_| 2.0 * fastrand::f32() - 1.0).collect();
        Ok((act, self.params.weight))
    }

    fn evaluate(&mut self, _obs: &Vec<f32>) -> Result<f32> {
        Ok(self.params.weight)
    }

    fn optimize(&mut self, batch: &RolloutBatch<DummyEnv>) -> Result<OptimizeStat> {
        let learning_rate = match self.role {
            ModelRole::Authoritative { learning_rate } => learning_rate,
            ModelRole::Replica => return Err(anyhow!("optimize() called on a replica")),
        };
        self.config.batch_sizes.lock().unwrap().push(batch.len());
        if let Some(r) = batch.returns.last() {
            self.config.last_returns.lock().unwrap().push(*r);
        }

        let n = batch.len().max(1) as f32;
        let w = self.params.weight;
        let value_loss: f32 = batch.returns.iter().map(|r| (r - w) * (r - w)).sum();
        let policy_loss: f32 = -batch.advantages.iter().sum::<f32>();
        let grad = -2.0 * batch.returns.iter().map(|r| r - w).sum::<f32>() / n;
        self.params.weight -= learning_rate * grad;
        self.params.n_updates += 1;

        Ok(OptimizeStat {
            value_loss: if self.config.diverge { f32::NAN } else { value_loss },
            policy_loss,
            grad_norm: grad.abs(),
            param_norm: self.params.weight.abs(),
        })
    }

    fn params(&self) -> Self::Params {
        self.params
    }

    fn sync_from(&mut self, params: &Self::Params) {
        self.params = *params;
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(
            path,
            format!("{} {}", self.params.weight, self.params.n_updates),
        )?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let s = fs::read_to_string(path)?;
        let mut it = s.split_whitespace();
        let weight = it
            .next()
            .ok_or_else(|| anyhow!("empty checkpoint {:?}", path))?
            .parse()?;
        let n_updates = it
            .next()
            .ok_or_else(|| anyhow!("truncated checkpoint {:?}", path))?
            .parse()?;
        self.params = DummyParams { weight, n_updates };
        Ok(())
    }
}
