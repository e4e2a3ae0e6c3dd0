//! Model.
use super::{Env, RolloutBatch};
use anyhow::Result;
use std::path::Path;

/// The role a [`Model`] instance plays in asynchronous training.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ModelRole {
    /// The shared, canonical parameters. Owns the optimizer state.
    Authoritative {
        /// Learning rate of the optimizer.
        learning_rate: f32,
    },

    /// A per-worker copy used for acting, overwritten by every sync.
    Replica,
}

/// Statistics returned by an optimization step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OptimizeStat {
    /// Value loss summed over the batch.
    pub value_loss: f32,

    /// Policy loss summed over the batch.
    pub policy_loss: f32,

    /// Norm of the gradients.
    pub grad_norm: f32,

    /// Norm of the parameters after the update.
    pub param_norm: f32,
}

/// Represents a policy/value network on an environment.
///
/// The forward and backward passes live behind this trait. Both the
/// authoritative instance and the replicas implement the same contract; the
/// trainer only calls [`Model::optimize`] on the authoritative one.
pub trait Model<E: Env> {
    /// Configuration of the network.
    type Config: Clone;

    /// A copy of the parameters, used to sync replicas.
    type Params: Clone;

    /// Builds a model playing the given role.
    fn build(config: &Self::Config, role: ModelRole) -> Result<Self>
    where
        Self: Sized;

    /// Samples an action and returns it with the value estimate of `obs`.
    fn act(&mut self, obs: &E::Obs) -> Result<(E::Act, f32)>;

    /// Returns the value estimate of `obs`.
    fn evaluate(&mut self, obs: &E::Obs) -> Result<f32>;

    /// Performs an optimization step on the given batch, mutating the parameters.
    fn optimize(&mut self, batch: &RolloutBatch<E>) -> Result<OptimizeStat>;

    /// Returns a copy of the current parameters.
    fn params(&self) -> Self::Params;

    /// Overwrites the parameters with the given ones.
    fn sync_from(&mut self, params: &Self::Params);

    /// Saves the parameters to the given file.
    fn save(&self, path: &Path) -> Result<()>;

    /// Loads the parameters from the given file.
    fn load(&mut self, path: &Path) -> Result<()>;
}
