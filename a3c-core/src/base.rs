//! Core functionalities.
mod batch;
mod env;
mod model;
mod step;
pub use batch::RolloutBatch;
pub use env::Env;
pub use model::{Model, ModelRole, OptimizeStat};
pub use step::Step;
