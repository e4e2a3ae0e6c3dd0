//! Batch.
use super::Env;

/// Training targets of one rollout, handed to [`Model::optimize`](crate::Model::optimize).
///
/// All vectors have the same length, the number of transitions in the rollout.
pub struct RolloutBatch<E: Env> {
    /// Observations `o_t`.
    pub obs: Vec<E::Obs>,

    /// Actions `a_t`.
    pub act: Vec<E::Act>,

    /// Discounted returns, the targets of the value head.
    pub returns: Vec<f32>,

    /// Advantages, the weights of the policy gradient.
    pub advantages: Vec<f32>,
}

impl<E: Env> RolloutBatch<E> {
    /// Returns the number of transitions.
    pub fn len(&self) -> usize {
        self.obs.len()
    }

    /// Returns `true` if the batch holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.obs.is_empty()
    }
}
