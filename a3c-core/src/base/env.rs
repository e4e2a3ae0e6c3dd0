//! Environment.
use super::Step;
use anyhow::Result;
use std::fmt::Debug;

/// Represents one session of a simulated environment.
///
/// A session is usually a client of an external simulator process bound to a
/// port. The process itself is owned by the process manager of the trainer;
/// the environment only connects to it, and is asked to reconnect with
/// `reset(true)` after the process has been relaunched.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Clone + Debug;

    /// Action of the environment.
    type Act: Clone + Debug;

    /// Information in the [`Step`] object.
    type Info;

    /// Builds the session for the given worker, talking to the simulator on `port`.
    fn build(config: &Self::Config, worker_id: usize, port: u16) -> Result<Self>
    where
        Self: Sized;

    /// Starts a new episode and returns its first observation.
    ///
    /// With `relaunch == true` the session is fully torn down and reconnected,
    /// otherwise the running simulator is soft-reset.
    fn reset(&mut self, relaunch: bool) -> Result<Self::Obs>;

    /// Performs an environment step.
    fn step(&mut self, act: &Self::Act) -> Result<Step<Self>>
    where
        Self: Sized;

    /// Closes the session.
    fn end(&mut self) -> Result<()>;
}
