use super::compute_targets;
use a3c_core::{Env, RolloutBatch};

/// A transition `(o_t, a_t, r_t, o_t+1, done_t, V(o_t))` observed by a worker.
pub struct Transition<E: Env> {
    /// Observation before the action.
    pub obs: E::Obs,

    /// Action taken.
    pub act: E::Act,

    /// Reward received.
    pub reward: f32,

    /// Observation after the action. Equal to `obs` if the episode ended.
    pub next_obs: E::Obs,

    /// Whether the episode ended with this transition.
    pub is_done: bool,

    /// Value estimate of `obs` when the action was sampled.
    pub value: f32,
}

impl<E: Env> Clone for Transition<E> {
    fn clone(&self) -> Self {
        Self {
            obs: self.obs.clone(),
            act: self.act.clone(),
            reward: self.reward,
            next_obs: self.next_obs.clone(),
            is_done: self.is_done,
            value: self.value,
        }
    }
}

/// Ordered transitions collected by one worker since its last training step.
///
/// The buffer does not flush itself; the worker checks [`RolloutBuffer::is_full`]
/// and calls [`RolloutBuffer::take_batch`].
pub struct RolloutBuffer<E: Env> {
    capacity: usize,
    transitions: Vec<Transition<E>>,
}

impl<E: Env> RolloutBuffer<E> {
    /// Creates an empty buffer flushed every `capacity` transitions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            transitions: Vec::with_capacity(capacity),
        }
    }

    /// Appends a transition.
    pub fn push(&mut self, tr: Transition<E>) {
        self.transitions.push(tr);
    }

    /// Returns the number of buffered transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns `true` if no transition is buffered.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Returns `true` once `capacity` transitions are buffered.
    pub fn is_full(&self) -> bool {
        self.transitions.len() >= self.capacity
    }

    /// Empties the buffer and returns its transitions as training targets.
    ///
    /// `bootstrap` is the value estimate of the state following the last
    /// buffered transition.
    pub fn take_batch(&mut self, gamma: f32, bootstrap: f32) -> RolloutBatch<E> {
        let transitions = std::mem::replace(
            &mut self.transitions,
            Vec::with_capacity(self.capacity),
        );
        let rewards = transitions.iter().map(|tr| tr.reward).collect::<Vec<_>>();
        let values = transitions.iter().map(|tr| tr.value).collect::<Vec<_>>();
        let (returns, advantages) = compute_targets(&rewards, &values, bootstrap, gamma);
        let (obs, act) = transitions
            .into_iter()
            .map(|tr| (tr.obs, tr.act))
            .unzip();

        RolloutBatch {
            obs,
            act,
            returns,
            advantages,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use a3c_core::dummy::{DummyEnv, ACT_DIM, OBS_DIM};

    fn transition(t: usize, reward: f32, value: f32) -> Transition<DummyEnv> {
        let mut obs = vec![0.0; OBS_DIM];
        obs[0] = t as f32;
        Transition {
            obs: obs.clone(),
            act: vec![0.0; ACT_DIM],
            reward,
            next_obs: obs,
            is_done: false,
            value,
        }
    }

    #[test]
    fn test_take_batch_clears() {
        let mut buffer = RolloutBuffer::<DummyEnv>::new(3);
        for t in 0..3 {
            assert!(!buffer.is_full());
            buffer.push(transition(t, 1.0, 0.0));
        }
        assert!(buffer.is_full());

        let batch = buffer.take_batch(0.99, 0.0);
        assert!(buffer.is_empty());
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.obs[2][0], 2.0);
        assert!((batch.returns[0] - 2.9701).abs() < 1e-5);
        assert_eq!(batch.advantages, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_take_batch_uses_recorded_values() {
        let mut buffer = RolloutBuffer::<DummyEnv>::new(15);
        buffer.push(transition(0, 0.0, 1.0));
        buffer.push(transition(1, 0.0, 2.0));

        let batch = buffer.take_batch(1.0, 4.0);
        assert_eq!(batch.returns, vec![4.0, 4.0]);
        // A[0] = 0 + V[1] - V[0], A[1] = 0 + bootstrap - V[1]
        assert_eq!(batch.advantages, vec![1.0, 2.0]);
    }
}
