//! Utility function.
use crate::{worker_stats_fmt, A3cConfig, CommandLauncher, Coordinator, WorkerStat};
use a3c_core::{record::Recorder, Env, Model};
use anyhow::Result;
use log::info;

/// Runs asynchronous advantage actor-critic training.
///
/// This function launches a simulator process and a [`Worker`](crate::Worker)
/// thread per worker of `config`, then blocks until every worker has stopped,
/// either because `config.max_episodes` was reached or because of an error.
///
/// * `config` - Configuration of training and of the simulator processes.
/// * `env_config` - Configuration of the environment sessions.
/// * `model_config` - Configuration of the shared model and of the replicas.
/// * `recorder` - Creates the metrics sink of the worker with the given id.
///
/// Returns the stats of all workers, or the error of the first failed one.
pub fn train_a3c<E, M, R, F>(
    config: &A3cConfig,
    env_config: &E::Config,
    model_config: &M::Config,
    recorder: F,
) -> Result<Vec<WorkerStat>>
where
    E: Env + 'static,
    M: Model<E> + Send + 'static,
    R: Recorder + Send + 'static,
    E::Config: Send + 'static,
    M::Config: Send + 'static,
    F: FnMut(usize) -> Result<R>,
{
    let launcher = Box::new(CommandLauncher::new(config.simulator.clone()));
    let mut coordinator = Coordinator::<E, M, R>::build(config, env_config, model_config, launcher)?;
    if let Err(e) = coordinator.run(recorder) {
        coordinator.stop_and_join();
        return Err(e);
    }

    let global = coordinator.global().clone();
    let stats = coordinator
        .join()
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    info!("Stats of workers");
    info!("{}", worker_stats_fmt(&stats));
    info!(
        "{} episodes, {} training steps",
        global.episodes(),
        global.n_updates()
    );
    Ok(stats)
}
