use crate::{
    A3cConfig, Checkpointer, EnvironmentProcessManager, GlobalModel, Launcher, Worker, WorkerStat,
};
use a3c_core::{error::A3cError, record::Recorder, Env, Model};
use anyhow::Result;
use log::{error, info};
use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

/// Starts, stops and joins [`Worker`]s.
///
/// Workers share one [`GlobalModel`] and one [`EnvironmentProcessManager`].
/// The stop flag is checked by every worker once per episode, so
/// [`Coordinator::stop`] takes effect when the running episodes end.
pub struct Coordinator<E, M, R>
where
    E: Env,
    M: Model<E>,
    R: Recorder,
{
    config: A3cConfig,

    /// Configuration of [`Env`].
    env_config: E::Config,

    /// Configuration of the replicas.
    model_config: M::Config,

    global: Arc<GlobalModel<E, M>>,
    checkpointer: Checkpointer,
    process_manager: Arc<EnvironmentProcessManager>,

    /// Flag to stop training.
    stop: Arc<Mutex<bool>>,

    /// Thread handles, indexed by worker id.
    threads: Vec<JoinHandle<Result<WorkerStat>>>,

    phantom: PhantomData<R>,
}

impl<E, M, R> Coordinator<E, M, R>
where
    E: Env + 'static,
    M: Model<E> + Send + 'static,
    R: Recorder + Send + 'static,
    E::Config: Send + 'static,
    M::Config: Send + 'static,
{
    /// Builds the shared model and the process manager.
    ///
    /// With `config.load_model`, the shared model and the global episode
    /// counter are restored from the latest checkpoint in `config.model_dir`.
    pub fn build(
        config: &A3cConfig,
        env_config: &E::Config,
        model_config: &M::Config,
        launcher: Box<dyn Launcher>,
    ) -> Result<Self> {
        if config.leader_id >= config.n_workers {
            return Err(A3cError::InvalidLeader(config.leader_id, config.n_workers).into());
        }
        let checkpointer = Checkpointer::new(&config.model_dir, config.keep_checkpoints)?;
        let global = GlobalModel::build(model_config, config.learning_rate)?;
        if config.load_model {
            let episode = global.restore(&checkpointer)?;
            info!("Resumes training from episode {}", episode);
        }
        let process_manager =
            EnvironmentProcessManager::new(config.n_workers, config.simulator.clone(), launcher);

        Ok(Self {
            config: config.clone(),
            env_config: env_config.clone(),
            model_config: model_config.clone(),
            global: Arc::new(global),
            checkpointer,
            process_manager: Arc::new(process_manager),
            stop: Arc::new(Mutex::new(false)),
            threads: vec![],
            phantom: PhantomData,
        })
    }

    /// Spawns a thread per worker.
    ///
    /// Workers are started one after another with a random delay before each
    /// one and a fixed delay after it, so the simulators are not launched
    /// simultaneously. `recorder` is called with the id of each worker.
    pub fn run(&mut self, mut recorder: impl FnMut(usize) -> Result<R>) -> Result<()> {
        for id in 0..self.config.n_workers {
            let stagger = fastrand::u64(0..=self.config.startup_stagger_max_ms);
            thread::sleep(Duration::from_millis(stagger));

            let leader = if id == self.config.leader_id {
                self.global.leader(self.checkpointer.clone())
            } else {
                None
            };
            let mut worker = Worker::<E, M, R>::build(
                id,
                self.config.clone(),
                self.env_config.clone(),
                self.model_config.clone(),
                self.global.clone(),
                leader,
                self.process_manager.clone(),
                recorder(id)?,
                self.stop.clone(),
            );
            let handle = thread::Builder::new()
                .name(format!("worker_{}", id))
                .spawn(move || worker.run())?;
            self.threads.push(handle);
            info!("Started worker {}", id);

            thread::sleep(Duration::from_millis(self.config.startup_delay_ms));
        }
        Ok(())
    }

    /// The shared model.
    pub fn global(&self) -> &Arc<GlobalModel<E, M>> {
        &self.global
    }

    /// The process manager shared by the workers.
    pub fn process_manager(&self) -> &Arc<EnvironmentProcessManager> {
        &self.process_manager
    }

    /// Returns `true` once a stop was requested.
    pub fn should_stop(&self) -> bool {
        *self.stop.lock().unwrap()
    }

    /// Requests the workers to stop at the end of their current episode.
    pub fn stop(&self) {
        let mut stop = self.stop.lock().unwrap();
        *stop = true;
    }

    /// Waits until every worker thread has exited, then kills the simulators.
    ///
    /// Returns the outcome of each worker, indexed by worker id. A worker that
    /// failed does not stop the others: `join` blocks until they stop too.
    pub fn join(self) -> Vec<Result<WorkerStat>> {
        let results = self
            .threads
            .into_iter()
            .enumerate()
            .map(|(id, h)| match h.join() {
                Ok(result) => result,
                Err(_) => Err(A3cError::WorkerPanic(id).into()),
            })
            .collect::<Vec<_>>();

        for (id, result) in results.iter().enumerate() {
            if let Err(e) = result {
                error!("Worker {} failed: {:?}", id, e);
            }
        }
        if let Err(e) = self.process_manager.shutdown() {
            error!("Failed to stop the simulators: {:?}", e);
        }
        results
    }

    /// Stops and joins workers.
    pub fn stop_and_join(self) -> Vec<Result<WorkerStat>> {
        self.stop();
        self.join()
    }
}
