//! The shared model and the per-worker replicas.
//!
//! # Consistency
//!
//! [`GlobalModel`] exposes two atomic operations on the canonical
//! parameters: [`GlobalModel::apply_gradient`] and
//! [`GlobalModel::snapshot_read`]. Each one runs to completion without
//! interleaving with another, but there is no ordering between workers:
//! updates land in whatever order the scheduler runs them, and a worker acts
//! on (and computes targets with) a [`LocalModel`] that other workers may have
//! already superseded. Stale reads are part of the algorithm.
use crate::{checkpoint::Checkpointer, rollout::RolloutBuffer};
use a3c_core::{error::A3cError, Env, Model, ModelRole, OptimizeStat, RolloutBatch};
use anyhow::Result;
use log::debug;
use std::{
    marker::PhantomData,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

/// Result of a training step, losses normalized by the rollout length.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrainStat {
    /// Value loss per transition.
    pub value_loss: f32,

    /// Policy loss per transition.
    pub policy_loss: f32,

    /// Norm of the gradients.
    pub grad_norm: f32,

    /// Norm of the parameters.
    pub param_norm: f32,
}

/// Canonical parameters shared by all workers, with the global episode counter.
pub struct GlobalModel<E: Env, M: Model<E>> {
    model: Mutex<M>,
    episodes: AtomicUsize,
    n_updates: AtomicUsize,
    leader_issued: AtomicBool,
    phantom: PhantomData<fn() -> E>,
}

impl<E: Env, M: Model<E>> GlobalModel<E, M> {
    /// Builds the authoritative model.
    pub fn build(config: &M::Config, learning_rate: f32) -> Result<Self> {
        let model = M::build(config, ModelRole::Authoritative { learning_rate })?;
        Ok(Self::from_model(model))
    }

    /// Wraps an already built authoritative model.
    pub fn from_model(model: M) -> Self {
        Self {
            model: Mutex::new(model),
            episodes: AtomicUsize::new(0),
            n_updates: AtomicUsize::new(0),
            leader_issued: AtomicBool::new(false),
            phantom: PhantomData,
        }
    }

    /// Applies one optimization step on `batch` to the canonical parameters.
    pub fn apply_gradient(&self, batch: &RolloutBatch<E>) -> Result<OptimizeStat> {
        let stat = {
            let mut model = self.model.lock().unwrap();
            model.optimize(batch)?
        };
        self.n_updates.fetch_add(1, Ordering::Relaxed);
        Ok(stat)
    }

    /// Returns a copy of the canonical parameters.
    pub fn snapshot_read(&self) -> M::Params {
        self.model.lock().unwrap().params()
    }

    /// Runs a training step on the buffered rollout and clears the buffer.
    ///
    /// `bootstrap` is the value of the state following the rollout, `0` when
    /// the episode terminated.
    pub fn train(
        &self,
        rollout: &mut RolloutBuffer<E>,
        gamma: f32,
        bootstrap: f32,
    ) -> Result<TrainStat> {
        let batch = rollout.take_batch(gamma, bootstrap);
        let n = batch.len() as f32;
        let stat = self.apply_gradient(&batch)?;
        if !stat.value_loss.is_finite() || !stat.policy_loss.is_finite() {
            return Err(A3cError::NonFiniteLoss {
                value_loss: stat.value_loss,
                policy_loss: stat.policy_loss,
            }
            .into());
        }
        debug!("Trained on {} transitions, bootstrap {}", batch.len(), bootstrap);

        Ok(TrainStat {
            value_loss: stat.value_loss / n,
            policy_loss: stat.policy_loss / n,
            grad_norm: stat.grad_norm,
            param_norm: stat.param_norm,
        })
    }

    /// Number of episodes counted by the leader.
    pub fn episodes(&self) -> usize {
        self.episodes.load(Ordering::Acquire)
    }

    /// Number of optimization steps applied so far.
    pub fn n_updates(&self) -> usize {
        self.n_updates.load(Ordering::Relaxed)
    }

    /// Restores the parameters and the episode counter from the latest checkpoint.
    pub fn restore(&self, checkpointer: &Checkpointer) -> Result<usize> {
        let episode = {
            let mut model = self.model.lock().unwrap();
            checkpointer.restore_latest::<E, M>(&mut model)?
        };
        self.episodes.store(episode, Ordering::Release);
        Ok(episode)
    }

    /// Issues the leader role. Only the first call returns `Some`.
    pub fn leader(self: &Arc<Self>, checkpointer: Checkpointer) -> Option<Leader<E, M>> {
        if self.leader_issued.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Leader {
                global: self.clone(),
                checkpointer,
            })
        }
    }
}

/// The single worker role allowed to count episodes and save checkpoints.
///
/// Obtained once from [`GlobalModel::leader`], so at most one exists per model.
pub struct Leader<E: Env, M: Model<E>> {
    global: Arc<GlobalModel<E, M>>,
    checkpointer: Checkpointer,
}

impl<E: Env, M: Model<E>> Leader<E, M> {
    /// Increments the global episode counter and returns the new value.
    pub fn increment_episodes(&self) -> usize {
        self.global.episodes.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Saves the canonical parameters as the checkpoint of `episode`.
    pub fn save_checkpoint(&self, episode: usize) -> Result<PathBuf> {
        let model = self.global.model.lock().unwrap();
        self.checkpointer.save::<E, M>(&model, episode)
    }
}

/// A worker's replica of the model, used for acting.
pub struct LocalModel<E: Env, M: Model<E>> {
    model: M,
    phantom: PhantomData<fn() -> E>,
}

impl<E: Env, M: Model<E>> LocalModel<E, M> {
    /// Builds a replica.
    pub fn build(config: &M::Config) -> Result<Self> {
        Ok(Self {
            model: M::build(config, ModelRole::Replica)?,
            phantom: PhantomData,
        })
    }

    /// Overwrites the replica with a snapshot of the canonical parameters.
    pub fn sync(&mut self, global: &GlobalModel<E, M>) {
        let params = global.snapshot_read();
        self.model.sync_from(&params);
    }

    /// Samples an action, returned with the value estimate of `obs`.
    pub fn act(&mut self, obs: &E::Obs) -> Result<(E::Act, f32)> {
        self.model.act(obs)
    }

    /// Returns the value estimate of `obs`.
    pub fn evaluate(&mut self, obs: &E::Obs) -> Result<f32> {
        self.model.evaluate(obs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rollout::Transition;
    use a3c_core::dummy::{DummyEnv, DummyModel, DummyModelConfig, ACT_DIM, OBS_DIM};
    use std::thread;
    use tempdir::TempDir;

    type Global = GlobalModel<DummyEnv, DummyModel>;

    fn rollout(rewards: &[f32]) -> RolloutBuffer<DummyEnv> {
        let mut buffer = RolloutBuffer::new(15);
        for &reward in rewards {
            buffer.push(Transition {
                obs: vec![0.0; OBS_DIM],
                act: vec![0.0; ACT_DIM],
                reward,
                next_obs: vec![0.0; OBS_DIM],
                is_done: false,
                value: 0.0,
            });
        }
        buffer
    }

    #[test]
    fn test_train_normalizes_losses() -> Result<()> {
        let global = Global::build(&DummyModelConfig::default(), 1e-4)?;
        let mut buffer = rollout(&[1.0, 1.0, 1.0]);

        let stat = global.train(&mut buffer, 0.99, 0.0)?;
        assert!(buffer.is_empty());
        // Sum of advantages is 3, policy loss is its negation
        assert!((stat.policy_loss + 1.0).abs() < 1e-6);
        let expected_value_loss = (2.9701f32.powi(2) + 1.99f32.powi(2) + 1.0) / 3.0;
        assert!((stat.value_loss - expected_value_loss).abs() < 1e-4);
        assert_eq!(global.n_updates(), 1);
        Ok(())
    }

    #[test]
    fn test_train_rejects_non_finite_loss() -> Result<()> {
        let config = DummyModelConfig {
            diverge: true,
            ..Default::default()
        };
        let global = Global::build(&config, 1e-4)?;
        let err = global.train(&mut rollout(&[1.0]), 0.99, 0.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<A3cError>(),
            Some(A3cError::NonFiniteLoss { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_local_sync_reads_snapshot() -> Result<()> {
        let config = DummyModelConfig::default();
        let global = Global::build(&config, 0.1)?;
        let mut local = LocalModel::<DummyEnv, DummyModel>::build(&config)?;

        global.train(&mut rollout(&[1.0]), 0.99, 0.0)?;
        assert_eq!(local.evaluate(&vec![0.0; OBS_DIM])?, 0.0);

        local.sync(&global);
        assert_eq!(
            local.evaluate(&vec![0.0; OBS_DIM])?,
            global.snapshot_read().weight
        );
        Ok(())
    }

    #[test]
    fn test_single_leader() -> Result<()> {
        let tmp = TempDir::new("global_model")?;
        let checkpointer = Checkpointer::new(tmp.path(), 5)?;
        let global = Arc::new(Global::build(&DummyModelConfig::default(), 1e-4)?);

        let leader = global.leader(checkpointer.clone());
        assert!(leader.is_some());
        assert!(global.leader(checkpointer).is_none());

        let leader = leader.unwrap();
        assert_eq!(leader.increment_episodes(), 1);
        assert_eq!(leader.increment_episodes(), 2);
        assert_eq!(global.episodes(), 2);
        Ok(())
    }

    #[test]
    fn test_restore_seeds_episode_counter() -> Result<()> {
        let tmp = TempDir::new("global_model")?;
        let checkpointer = Checkpointer::new(tmp.path(), 5)?;
        let global = Arc::new(Global::build(&DummyModelConfig::default(), 0.1)?);
        global.train(&mut rollout(&[1.0, 1.0]), 0.99, 0.0)?;
        let saved = global.snapshot_read();
        global.leader(checkpointer.clone()).unwrap().save_checkpoint(7)?;

        let restored = Global::build(&DummyModelConfig::default(), 0.1)?;
        assert_eq!(restored.restore(&checkpointer)?, 7);
        assert_eq!(restored.episodes(), 7);
        assert_eq!(restored.snapshot_read(), saved);
        Ok(())
    }

    #[test]
    fn test_concurrent_updates_are_all_applied() -> Result<()> {
        let global = Arc::new(Global::build(&DummyModelConfig::default(), 1e-3)?);
        let handles = (0..4)
            .map(|_| {
                let global = global.clone();
                thread::spawn(move || -> Result<()> {
                    for _ in 0..25 {
                        global.train(&mut rollout(&[1.0, 0.5]), 0.99, 0.0)?;
                    }
                    Ok(())
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap()?;
        }

        assert_eq!(global.n_updates(), 100);
        assert_eq!(global.snapshot_read().n_updates, 100);
        Ok(())
    }
}
