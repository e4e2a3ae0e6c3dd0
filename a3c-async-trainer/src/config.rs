//! Configuration of asynchronous training.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    time::Duration,
};

/// Escalation policy used to terminate a simulator process.
///
/// A termination signal is sent and the process is polled up to
/// `term_attempts` times, `poll_interval_ms` apart. If it is still running,
/// it is force-killed and waited on for at most `kill_wait_ms`. A process
/// surviving that is a fatal error.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct KillPolicy {
    /// Number of termination signals sent before escalating.
    pub term_attempts: usize,

    /// Interval between liveness polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Time to wait for the process to disappear after the forced kill, in milliseconds.
    pub kill_wait_ms: u64,
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            term_attempts: 5,
            poll_interval_ms: 200,
            kill_wait_ms: 2000,
        }
    }
}

impl KillPolicy {
    /// Interval between liveness polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration of the external simulator processes.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SimulatorConfig {
    /// Path of the simulator binary.
    pub binary: String,

    /// Arguments of the simulator. `{port}` is replaced with the port of the worker.
    pub args: Vec<String>,

    /// Shell script run with `sh` after the simulator was spawned.
    pub init_script: Option<String>,

    /// Delay between spawning the simulator and running the init script, in milliseconds.
    pub settle_after_spawn_ms: u64,

    /// Delay after running the init script, in milliseconds.
    pub settle_after_init_ms: u64,

    /// How to terminate a running simulator before a relaunch.
    pub kill: KillPolicy,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            binary: "/usr/local/bin/torcs".to_string(),
            args: vec![
                "-nofuel".to_string(),
                "-nolaptime".to_string(),
                "-p".to_string(),
                "{port}".to_string(),
            ],
            init_script: Some("autostart.sh".to_string()),
            settle_after_spawn_ms: 2000,
            settle_after_init_ms: 4000,
            kill: KillPolicy::default(),
        }
    }
}

impl SimulatorConfig {
    /// Returns the arguments with `{port}` substituted.
    pub fn args_for_port(&self, port: u16) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace("{port}", &port.to_string()))
            .collect()
    }
}

/// Configuration of asynchronous advantage actor-critic training.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct A3cConfig {
    /// Number of workers, each with its own simulator.
    pub n_workers: usize,

    /// Port of the simulator of worker 0. Worker `i` uses `start_port + i`.
    pub start_port: u16,

    /// Discount factor.
    pub gamma: f32,

    /// Maximum number of steps in an episode.
    pub max_episode_length: usize,

    /// Number of transitions buffered before an intermediate training step.
    pub rollout_len: usize,

    /// A full simulator relaunch is forced every `relaunch_interval` local episodes.
    pub relaunch_interval: usize,

    /// Number of most recent checkpoints kept in `model_dir`.
    pub keep_checkpoints: usize,

    /// Learning rate of the optimizer of the shared model.
    pub learning_rate: f32,

    /// Id of the worker that saves checkpoints and counts global episodes.
    pub leader_id: usize,

    /// Training stops once the global episode counter reaches this value.
    pub max_episodes: Option<usize>,

    /// Interval of progress reports in environment steps of a worker.
    pub log_interval: usize,

    /// Number of recent episodes the reported means are computed over.
    pub history_window: usize,

    /// Where checkpoints are saved.
    pub model_dir: PathBuf,

    /// If `true`, restores the latest checkpoint in `model_dir` before training.
    pub load_model: bool,

    /// Upper bound of the random delay before each worker is started, in milliseconds.
    pub startup_stagger_max_ms: u64,

    /// Fixed delay after each worker is started, in milliseconds.
    pub startup_delay_ms: u64,

    /// Configuration of the simulator processes.
    pub simulator: SimulatorConfig,
}

impl Default for A3cConfig {
    fn default() -> Self {
        Self {
            n_workers: 1,
            start_port: 3101,
            gamma: 0.99,
            max_episode_length: 4000,
            rollout_len: 15,
            relaunch_interval: 9,
            keep_checkpoints: 5,
            learning_rate: 1e-4,
            leader_id: 0,
            max_episodes: None,
            log_interval: 30,
            history_window: 5,
            model_dir: PathBuf::from("models/a3c"),
            load_model: false,
            startup_stagger_max_ms: 15_000,
            startup_delay_ms: 500,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl A3cConfig {
    /// Constructs [`A3cConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`A3cConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Sets the number of workers.
    pub fn n_workers(mut self, v: usize) -> Self {
        self.n_workers = v;
        self
    }

    /// Sets the port of the first simulator.
    pub fn start_port(mut self, v: u16) -> Self {
        self.start_port = v;
        self
    }

    /// Sets the maximum number of steps in an episode.
    pub fn max_episode_length(mut self, v: usize) -> Self {
        self.max_episode_length = v;
        self
    }

    /// Sets the relaunch interval in local episodes.
    pub fn relaunch_interval(mut self, v: usize) -> Self {
        self.relaunch_interval = v;
        self
    }

    /// Sets the number of global episodes after which training stops.
    pub fn max_episodes(mut self, v: usize) -> Self {
        self.max_episodes = Some(v);
        self
    }

    /// Sets the leader worker.
    pub fn leader_id(mut self, v: usize) -> Self {
        self.leader_id = v;
        self
    }

    /// Sets the directory checkpoints are saved in.
    pub fn model_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.model_dir = v.into();
        self
    }

    /// Restores the latest checkpoint before training if `v` is `true`.
    pub fn load_model(mut self, v: bool) -> Self {
        self.load_model = v;
        self
    }

    /// Sets the startup stagger and the fixed startup delay, in milliseconds.
    pub fn startup_delays(mut self, stagger_max_ms: u64, delay_ms: u64) -> Self {
        self.startup_stagger_max_ms = stagger_max_ms;
        self.startup_delay_ms = delay_ms;
        self
    }

    /// Sets the simulator configuration.
    pub fn simulator(mut self, v: SimulatorConfig) -> Self {
        self.simulator = v;
        self
    }

    /// Returns the simulator port of the given worker.
    pub fn port(&self, worker_id: usize) -> u16 {
        self.start_port + worker_id as u16
    }
}
