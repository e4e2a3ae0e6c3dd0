//! Rollout buffering and computation of training targets.
mod advantage;
mod buffer;
pub use advantage::{compute_targets, discount};
pub use buffer::{RolloutBuffer, Transition};
