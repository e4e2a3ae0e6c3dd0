//! Asynchronous advantage actor-critic (A3C) training.
//!
//! A [`Coordinator`] runs a [`Worker`] per thread. Every worker owns a
//! session of an [`Env`](a3c_core::Env), backed by an external simulator
//! process started and relaunched by the shared [`EnvironmentProcessManager`],
//! and a [`LocalModel`] replica of the shared [`GlobalModel`].
//!
//! Workers collect rollouts of at most `rollout_len` transitions, compute
//! discounted returns and one-step advantages on them, and apply training
//! steps to the [`GlobalModel`] without any ordering between workers. See the
//! [`global_model`] module for the consistency this gives.
//!
//! A single worker holds the [`Leader`] role: it counts global episodes and
//! saves checkpoints through a [`Checkpointer`].
mod checkpoint;
mod config;
mod coordinator;
pub mod global_model;
pub mod process_manager;
pub mod rollout;
mod util;
mod worker;
pub use checkpoint::Checkpointer;
pub use config::{A3cConfig, KillPolicy, SimulatorConfig};
pub use coordinator::Coordinator;
pub use global_model::{GlobalModel, Leader, LocalModel, TrainStat};
pub use process_manager::{
    ChildProcess, CommandLauncher, CommandState, EnvironmentProcessManager, Launcher,
    ProcessStatus, SimulatorProcess,
};
pub use rollout::{compute_targets, discount, RolloutBuffer, Transition};
pub use util::train_a3c;
pub use worker::{worker_stats_fmt, EpisodeHistory, EpisodeStats, Worker, WorkerStat};

#[cfg(test)]
mod test {
    use super::{A3cConfig, Coordinator, SimulatorConfig};
    use crate::process_manager::FakeLauncher;
    use a3c_core::{
        dummy::{DummyEnv, DummyEnvConfig, DummyEnvEvent, DummyModel, DummyModelConfig},
        error::A3cError,
        record::{BufferedRecorder, NullRecorder},
    };
    use anyhow::Result;
    use std::collections::HashMap;
    use tempdir::TempDir;
    use test_log::test;

    type Coordinator_ = Coordinator<DummyEnv, DummyModel, BufferedRecorder>;

    fn a3c_config(n_workers: usize, model_dir: &TempDir) -> A3cConfig {
        let simulator = SimulatorConfig {
            init_script: None,
            settle_after_spawn_ms: 0,
            settle_after_init_ms: 0,
            ..SimulatorConfig::default()
        };
        A3cConfig::default()
            .n_workers(n_workers)
            .startup_delays(20, 5)
            .model_dir(model_dir.path())
            .simulator(simulator)
    }

    #[test]
    fn test_coordinator() -> Result<()> {
        let tmp = TempDir::new("coordinator")?;
        let config = a3c_config(3, &tmp).leader_id(1).max_episodes(12);
        let env_config = DummyEnvConfig::default().episode_len(20);
        let model_config = DummyModelConfig::default();
        let launcher = FakeLauncher::default();
        let recorders = (0..3).map(|_| BufferedRecorder::new()).collect::<Vec<_>>();

        let mut coordinator =
            Coordinator_::build(&config, &env_config, &model_config, Box::new(launcher.clone()))?;
        let recorders_ = recorders.clone();
        coordinator.run(move |id| Ok(recorders_[id].clone()))?;
        let global = coordinator.global().clone();
        let stats = coordinator
            .join()
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        // Only the leader counts episodes, one per completed episode
        assert_eq!(global.episodes(), 12);
        assert_eq!(stats[1].episodes, 12);

        // Every training step of every worker reached the shared model
        let train_steps = stats.iter().map(|s| s.train_steps).sum::<usize>();
        assert_eq!(global.n_updates(), train_steps);
        let batch_sizes = model_config.batch_sizes();
        assert_eq!(batch_sizes.len(), train_steps);
        assert!(batch_sizes.iter().all(|&n| n > 0 && n <= 15));
        let env_steps = stats.iter().map(|s| s.env_steps).sum::<usize>();
        assert_eq!(batch_sizes.iter().sum::<usize>(), env_steps);

        // Each worker ran on its own port and finished its env session
        let ports = launcher
            .spawned()
            .into_iter()
            .map(|(port, _)| port)
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(ports.len(), 3);
        assert!(ports.contains(&3101) && ports.contains(&3103));
        let mut ends = HashMap::new();
        for e in env_config.events() {
            if let DummyEnvEvent::End { worker_id } = e {
                *ends.entry(worker_id).or_insert(0) += 1;
            }
        }
        assert_eq!(ends.len(), 3);
        assert!(ends.values().all(|&n| n == 1));

        // Simulators are killed after join
        assert!(launcher.alive().is_empty());

        // Checkpoints are saved by the leader only, keeping the newest 5
        let checkpointer = crate::Checkpointer::new(tmp.path(), 5)?;
        let episodes = checkpointer
            .list()?
            .into_iter()
            .map(|(e, _)| e)
            .collect::<Vec<_>>();
        assert_eq!(episodes, vec![7, 8, 9, 10, 11]);

        assert!(!recorders[1].scalars("Perf/Reward").is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_worker_does_not_stop_others() -> Result<()> {
        let tmp = TempDir::new("coordinator")?;
        let config = a3c_config(2, &tmp).max_episodes(6);
        // Every env fails on its 50th step, in its third episode
        let env_config = DummyEnvConfig::default().episode_len(20).fail_at_step(49);
        let model_config = DummyModelConfig::default();

        let mut coordinator = Coordinator::<DummyEnv, DummyModel, NullRecorder>::build(
            &config,
            &env_config,
            &model_config,
            Box::new(FakeLauncher::default()),
        )?;
        coordinator.run(|_| Ok(NullRecorder::default()))?;
        let global = coordinator.global().clone();
        let results = coordinator.join();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_err()));
        assert_eq!(global.episodes(), 2);
        Ok(())
    }

    #[test]
    fn test_resume_from_checkpoint() -> Result<()> {
        let tmp = TempDir::new("coordinator")?;
        let env_config = DummyEnvConfig::default().episode_len(5);
        let model_config = DummyModelConfig::default();

        let config = a3c_config(1, &tmp).max_episodes(4);
        let mut coordinator = Coordinator_::build(
            &config,
            &env_config,
            &model_config,
            Box::new(FakeLauncher::default()),
        )?;
        coordinator.run(|_| Ok(BufferedRecorder::new()))?;
        let global = coordinator.global().clone();
        coordinator.join().into_iter().collect::<Result<Vec<_>>>()?;

        // Episode 3 is the last saved checkpoint, after the last training step
        let config = config.load_model(true).max_episodes(6);
        let coordinator = Coordinator_::build(
            &config,
            &env_config,
            &model_config,
            Box::new(FakeLauncher::default()),
        )?;
        assert_eq!(coordinator.global().episodes(), 3);
        assert_eq!(coordinator.global().snapshot_read(), global.snapshot_read());
        assert_eq!(global.snapshot_read().n_updates, 4);
        Ok(())
    }

    #[test]
    fn test_resume_without_checkpoint_fails() -> Result<()> {
        let tmp = TempDir::new("coordinator")?;
        let config = a3c_config(1, &tmp).load_model(true);
        let err = Coordinator_::build(
            &config,
            &DummyEnvConfig::default(),
            &DummyModelConfig::default(),
            Box::new(FakeLauncher::default()),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<A3cError>(),
            Some(A3cError::CheckpointNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_leader_out_of_range_is_rejected() -> Result<()> {
        let tmp = TempDir::new("coordinator")?;
        let config = a3c_config(2, &tmp).leader_id(2);
        let launcher = FakeLauncher::default();
        let err = Coordinator_::build(
            &config,
            &DummyEnvConfig::default(),
            &DummyModelConfig::default(),
            Box::new(launcher.clone()),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<A3cError>(),
            Some(A3cError::InvalidLeader(2, 2))
        ));
        assert!(launcher.spawned().is_empty());
        Ok(())
    }

    #[test]
    fn test_stop_and_join() -> Result<()> {
        let tmp = TempDir::new("coordinator")?;
        let config = a3c_config(2, &tmp);
        let env_config = DummyEnvConfig::default().episode_len(3);
        let model_config = DummyModelConfig::default();

        let mut coordinator = Coordinator_::build(
            &config,
            &env_config,
            &model_config,
            Box::new(FakeLauncher::default()),
        )?;
        coordinator.run(|_| Ok(BufferedRecorder::new()))?;
        while model_config.batch_sizes().len() < 4 {
            std::thread::yield_now();
        }
        assert!(!coordinator.should_stop());
        let stats = coordinator
            .stop_and_join()
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(stats.len(), 2);
        Ok(())
    }
}
