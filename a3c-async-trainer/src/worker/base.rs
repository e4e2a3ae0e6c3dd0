use super::{EpisodeHistory, EpisodeStats, WorkerStat};
use crate::{
    A3cConfig, EnvironmentProcessManager, GlobalModel, Leader, LocalModel, RolloutBuffer,
    TrainStat, Transition,
};
use a3c_core::{
    record::{Record, RecordValue, Recorder},
    Env, Model,
};
use anyhow::Result;
use log::{debug, info};
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

/// Per-thread state of the episode loop.
struct State<E: Env, M: Model<E>> {
    env: E,
    local: LocalModel<E, M>,
    buffer: RolloutBuffer<E>,
    history: EpisodeHistory,
    last_train: TrainStat,

    /// Episode index used for metrics and checkpoints, starting at the global counter.
    episode: usize,

    /// Episodes run since the worker started.
    local_episodes: usize,
    total_steps: usize,
    train_steps: usize,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs episodes of an [`Env`] with a replica of the shared model, training
/// the [`GlobalModel`] on the collected rollouts.
///
/// # Episode loop
///
/// 1. Sync the [`LocalModel`] from the [`GlobalModel`].
/// 2. If `local_episodes % relaunch_interval == 0`, relaunch the simulator with
///    [`EnvironmentProcessManager::create`] and call `reset(true)`, otherwise
///    soft-reset with `reset(false)`.
/// 3. Take an action sampled from the local model and push the transition to
///    the [`RolloutBuffer`]. On a terminal step the stored next observation is
///    the observation before the step.
/// 4. If the buffer is full, the episode is not done and the step limit is not
///    reached, train on the buffer bootstrapping with the value of the current
///    observation, then re-sync the local model.
/// 5. Back to step 3 until the episode is done or `max_episode_length` steps
///    were taken.
/// 6. Train on what is left in the buffer with a bootstrap value of `0`.
/// 7. Except for episode index `0`, write the rolling means of the last
///    `history_window` episodes and the last losses. The leader also saves a
///    checkpoint.
/// 8. The leader increments the global episode counter.
///
/// ```mermaid
/// graph LR
///     A[LocalModel]-->|Env::Act|B[Env]
///     B -->|Env::Obs|A
///     B -->|Transition|C[RolloutBuffer]
///     C -->|RolloutBatch|D[GlobalModel]
///     D -->|Params|A
/// ```
///
/// The worker owning the [`Leader`] token additionally counts global episodes,
/// saves checkpoints and requests a stop when `max_episodes` is reached.
pub struct Worker<E, M, R>
where
    E: Env,
    M: Model<E>,
    R: Recorder,
{
    id: usize,
    config: A3cConfig,
    env_config: E::Config,
    model_config: M::Config,
    global: Arc<GlobalModel<E, M>>,
    leader: Option<Leader<E, M>>,
    process_manager: Arc<EnvironmentProcessManager>,
    recorder: R,

    /// Stops the episode loop at the next episode boundary if set to `true`.
    stop: Arc<Mutex<bool>>,
}

impl<E, M, R> Worker<E, M, R>
where
    E: Env,
    M: Model<E>,
    R: Recorder,
{
    /// Creates a worker. Its env and local model are built when [`Worker::run`] starts.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        id: usize,
        config: A3cConfig,
        env_config: E::Config,
        model_config: M::Config,
        global: Arc<GlobalModel<E, M>>,
        leader: Option<Leader<E, M>>,
        process_manager: Arc<EnvironmentProcessManager>,
        recorder: R,
        stop: Arc<Mutex<bool>>,
    ) -> Self {
        Self {
            id,
            config,
            env_config,
            model_config,
            global,
            leader,
            process_manager,
            recorder,
            stop,
        }
    }

    /// Id of the worker.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns `true` if this worker holds the leader role.
    pub fn is_leader(&self) -> bool {
        self.leader.is_some()
    }

    fn should_stop(&self) -> bool {
        *self.stop.lock().unwrap()
    }

    /// Runs episodes until the stop flag is set.
    ///
    /// Any error of the environment, the simulator process or a training step
    /// ends the loop and is returned.
    pub fn run(&mut self) -> Result<WorkerStat> {
        let port = self.config.port(self.id);
        let time = Instant::now();
        let mut state = State {
            env: E::build(&self.env_config, self.id, port)?,
            local: LocalModel::build(&self.model_config)?,
            buffer: RolloutBuffer::new(self.config.rollout_len),
            history: EpisodeHistory::new(self.config.history_window),
            last_train: TrainStat::default(),
            episode: self.global.episodes(),
            local_episodes: 0,
            total_steps: 0,
            train_steps: 0,
        };
        info!(
            "Starting worker {} on port {} at episode {}",
            self.id, port, state.episode
        );

        while !self.should_stop() {
            self.run_episode(&mut state, port)?;
        }
        state.env.end()?;

        let stat = WorkerStat {
            episodes: state.local_episodes,
            env_steps: state.total_steps,
            train_steps: state.train_steps,
            duration: time.elapsed(),
        };
        info!("Stopped worker {}: {:?}", self.id, stat);
        Ok(stat)
    }

    fn run_episode(&mut self, s: &mut State<E, M>, port: u16) -> Result<()> {
        let gamma = self.config.gamma;
        let max_len = self.config.max_episode_length;

        s.local.sync(&self.global);
        let relaunch = s.local_episodes % self.config.relaunch_interval.max(1) == 0;
        if relaunch {
            self.process_manager.create(self.id, port)?;
        }
        let mut obs = s.env.reset(relaunch)?;

        let mut total_reward = 0f32;
        let mut value_sum = 0f32;
        let mut step_count = 0;

        loop {
            let (act, value) = s.local.act(&obs)?;
            let step = s.env.step(&act)?;
            let (reward, done) = (step.reward, step.is_done);
            let next_obs = if done { obs.clone() } else { step.obs };

            s.buffer.push(Transition {
                obs,
                act,
                reward,
                next_obs: next_obs.clone(),
                is_done: done,
                value,
            });
            obs = next_obs;
            total_reward += reward;
            value_sum += value;
            step_count += 1;
            s.total_steps += 1;

            if s.total_steps % self.config.log_interval.max(1) == 0 {
                info!(
                    "Worker {} episode {} step {} total steps {} reward {}",
                    self.id, s.episode, step_count, s.total_steps, reward
                );
                self.recorder
                    .add_scalar("summary/reward_1", reward, s.total_steps);
                self.recorder.flush();
            }

            if s.buffer.is_full() && !done && step_count < max_len {
                let bootstrap = s.local.evaluate(&obs)?;
                s.last_train = self.global.train(&mut s.buffer, gamma, bootstrap)?;
                s.train_steps += 1;
                s.local.sync(&self.global);
            }

            if done || step_count >= max_len {
                break;
            }
        }

        s.local_episodes += 1;
        s.history.push(EpisodeStats {
            total_reward,
            step_count,
            mean_value: value_sum / step_count as f32,
        });

        if !s.buffer.is_empty() {
            s.last_train = self.global.train(&mut s.buffer, gamma, 0.0)?;
            s.train_steps += 1;
        }

        if s.episode != 0 {
            if let Some(leader) = &self.leader {
                leader.save_checkpoint(s.episode)?;
            }
            self.record_episode(s);
        }

        if let Some(leader) = &self.leader {
            let n = leader.increment_episodes();
            debug!("Global episode counter: {}", n);
            if let Some(max_episodes) = self.config.max_episodes {
                if n >= max_episodes {
                    info!("Reached {} episodes, stopping workers", n);
                    *self.stop.lock().unwrap() = true;
                }
            }
        }
        s.episode += 1;

        Ok(())
    }

    fn record_episode(&mut self, s: &State<E, M>) {
        let mean_reward = s.history.mean_reward();
        let t = &s.last_train;
        info!(
            "Worker {} episode {} reward {} value loss {} policy loss {}",
            self.id, s.episode, mean_reward, t.value_loss, t.policy_loss
        );

        let record = Record::from_slice(&[
            ("Perf/Reward", RecordValue::Scalar(mean_reward)),
            ("Perf/Length", RecordValue::Scalar(s.history.mean_length())),
            ("Perf/Value", RecordValue::Scalar(s.history.mean_value())),
            ("Losses/Value Loss", RecordValue::Scalar(t.value_loss)),
            ("Losses/Policy Loss", RecordValue::Scalar(t.policy_loss)),
            ("Losses/Grad Norm", RecordValue::Scalar(t.grad_norm)),
            ("Losses/Var Norm", RecordValue::Scalar(t.param_norm)),
        ]);
        self.recorder.write(s.episode, record);
        self.recorder.flush();
    }
}
