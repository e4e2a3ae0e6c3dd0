//! Runs episodes in an environment and trains the shared model on the rollouts.
mod base;
mod history;
mod stat;
pub use base::Worker;
pub use history::{EpisodeHistory, EpisodeStats};
pub use stat::{worker_stats_fmt, WorkerStat};
