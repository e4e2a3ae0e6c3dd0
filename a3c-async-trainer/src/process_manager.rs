//! Lifecycle of the external simulator processes, one per worker.
mod base;
mod launcher;
pub use base::{CommandState, EnvironmentProcessManager, ProcessStatus};
#[cfg(test)]
pub(crate) use launcher::FakeLauncher;
pub use launcher::{ChildProcess, CommandLauncher, Launcher, SimulatorProcess};
