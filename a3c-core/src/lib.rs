#![warn(missing_docs)]
//! Collaborator traits and metric records for asynchronous actor-critic training.
//!
//! The training orchestration in `a3c-async-trainer` talks to two external
//! collaborators, both defined here:
//!
//! * [`Env`] - one session of a simulated environment, usually backed by an
//!   external simulator process.
//! * [`Model`] - a policy/value network together with its optimizer. The same
//!   trait is implemented for the shared, authoritative instance and for the
//!   per-worker replicas; see [`ModelRole`].
//!
//! Metrics are written through [`record::Recorder`].
pub mod dummy;
pub mod error;
pub mod record;

mod base;
pub use base::{Env, Model, ModelRole, OptimizeStat, RolloutBatch, Step};
