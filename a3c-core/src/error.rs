//! Errors in the library.
use thiserror::Error;

/// Errors raised by the training orchestration and its collaborators.
#[derive(Error, Debug)]
pub enum A3cError {
    /// Key was not found in a record.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Value in a record has an unexpected type.
    #[error("Record value type error: expected {0}")]
    RecordValueTypeError(String),

    /// The simulator process could not be spawned.
    #[error("Failed to spawn simulator {binary} on port {port}: {source}")]
    ProcessSpawn {
        /// Path of the simulator binary.
        binary: String,
        /// Port the simulator should have been bound to.
        port: u16,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A simulator process survived every termination attempt.
    #[error("Process {0} is still alive after forced termination")]
    ProcessStillAlive(u32),

    /// The post-start initialization script exited unsuccessfully.
    #[error("Initialization script {0} failed with {1}")]
    InitScript(String, String),

    /// A training step produced a loss that is not finite.
    #[error("Non-finite loss in training step: value loss {value_loss}, policy loss {policy_loss}")]
    NonFiniteLoss {
        /// Value loss returned by the model.
        value_loss: f32,
        /// Policy loss returned by the model.
        policy_loss: f32,
    },

    /// No checkpoint was found in the model directory.
    #[error("No checkpoint found in {0}")]
    CheckpointNotFound(String),

    /// A worker thread panicked.
    #[error("Worker {0} panicked")]
    WorkerPanic(usize),

    /// The worker id does not have a slot in the process table.
    #[error("Worker {0} has no slot in the process table of {1} workers")]
    UnknownWorker(usize, usize),

    /// The leader id is not the id of a worker.
    #[error("Leader id {0} is out of range for {1} workers")]
    InvalidLeader(usize, usize),
}
