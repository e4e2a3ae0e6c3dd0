use super::{Launcher, SimulatorProcess};
use crate::config::{KillPolicy, SimulatorConfig};
use a3c_core::error::A3cError;
use anyhow::Result;
use log::{info, warn};
use std::{
    sync::{Mutex, MutexGuard},
    thread::sleep,
    time::{Duration, Instant},
};

/// Lifecycle state of a simulator slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandState {
    /// A (re)start was requested.
    Start,

    /// The simulator is being (re)started.
    Starting,

    /// The simulator is running.
    Run,

    /// The last (re)start failed. A process may still be recorded.
    Failed,
}

/// Snapshot of a slot of the process table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Port the simulator is bound to.
    pub port: u16,

    /// Id of the current process, if one was started.
    pub pid: Option<u32>,

    /// Lifecycle state.
    pub state: CommandState,
}

struct SimulatorProcessEntry {
    port: u16,
    state: CommandState,
    process: Option<Box<dyn SimulatorProcess>>,
}

impl SimulatorProcessEntry {
    fn status(&self) -> ProcessStatus {
        ProcessStatus {
            port: self.port,
            pid: self.process.as_ref().map(|p| p.id()),
            state: self.state,
        }
    }
}

/// Owns the simulator processes of all workers.
///
/// The process table is an arena indexed by worker id, each slot behind its
/// own mutex. A worker relaunching its simulator only contends with another
/// thread that is starting the same slot, and a slot's kill-then-spawn
/// sequence runs entirely under its lock, so a slot never has two live
/// processes.
pub struct EnvironmentProcessManager {
    launcher: Box<dyn Launcher>,
    config: SimulatorConfig,
    slots: Vec<Mutex<Option<SimulatorProcessEntry>>>,
}

impl EnvironmentProcessManager {
    /// Creates a manager with one empty slot per worker.
    pub fn new(n_workers: usize, config: SimulatorConfig, launcher: Box<dyn Launcher>) -> Self {
        Self {
            launcher,
            config,
            slots: (0..n_workers).map(|_| Mutex::new(None)).collect(),
        }
    }

    fn slot(&self, worker_id: usize) -> Result<MutexGuard<'_, Option<SimulatorProcessEntry>>> {
        let slot = self
            .slots
            .get(worker_id)
            .ok_or(A3cError::UnknownWorker(worker_id, self.slots.len()))?;
        Ok(slot.lock().unwrap())
    }

    /// Requests a (re)start of the simulator of `worker_id` bound to `port`,
    /// then starts every pending slot.
    ///
    /// When this returns `Ok`, the worker's simulator is running. Failures of
    /// other workers' slots are left to their owners.
    pub fn create(&self, worker_id: usize, port: u16) -> Result<()> {
        {
            let mut slot = self.slot(worker_id)?;
            match slot.as_mut() {
                Some(entry) => {
                    entry.port = port;
                    entry.state = CommandState::Start;
                }
                None => {
                    *slot = Some(SimulatorProcessEntry {
                        port,
                        state: CommandState::Start,
                        process: None,
                    });
                }
            }
        }

        for (id, e) in self.start_slots() {
            if id == worker_id {
                return Err(e);
            }
            warn!("Failed to start the simulator of worker {}: {:?}", id, e);
        }

        // The slot may have been started, and failed, by another worker
        let mut slot = self.slot(worker_id)?;
        match slot.as_mut() {
            Some(entry) if entry.state == CommandState::Run => Ok(()),
            Some(entry) => self.start_entry(entry),
            None => Err(A3cError::UnknownWorker(worker_id, self.slots.len()).into()),
        }
    }

    /// Starts the simulator of every slot in [`CommandState::Start`].
    ///
    /// Slots failing to start are set to [`CommandState::Failed`]; the first
    /// error is returned after every slot was visited.
    pub fn start_pending(&self) -> Result<()> {
        match self.start_slots().into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(()),
        }
    }

    fn start_slots(&self) -> Vec<(usize, anyhow::Error)> {
        let mut errors = vec![];
        for (id, slot) in self.slots.iter().enumerate() {
            let mut slot = slot.lock().unwrap();
            if let Some(entry) = slot.as_mut() {
                if entry.state == CommandState::Start {
                    if let Err(e) = self.start_entry(entry) {
                        errors.push((id, e));
                    }
                }
            }
        }
        errors
    }

    fn start_entry(&self, entry: &mut SimulatorProcessEntry) -> Result<()> {
        entry.state = CommandState::Starting;
        let result = self.restart(entry);
        entry.state = match result {
            Ok(()) => CommandState::Run,
            Err(_) => CommandState::Failed,
        };
        result
    }

    /// Kills the recorded process and spawns a new one.
    ///
    /// A process is recorded in the slot as long as it may be alive, so a
    /// later `create` or `shutdown` can still kill it after a failure.
    fn restart(&self, entry: &mut SimulatorProcessEntry) -> Result<()> {
        if let Some(process) = entry.process.as_mut() {
            let pid = process.id();
            self.kill(process.as_mut())?;
            entry.process = None;
            info!("Killed simulator {} on port {}", pid, entry.port);
        }

        let process = self.launcher.spawn(entry.port)?;
        info!("Spawned simulator {} on port {}", process.id(), entry.port);
        entry.process = Some(process);

        sleep(Duration::from_millis(self.config.settle_after_spawn_ms));
        self.launcher.initialize(entry.port)?;
        sleep(Duration::from_millis(self.config.settle_after_init_ms));
        Ok(())
    }

    /// Terminates a process following the [`KillPolicy`] of the manager.
    ///
    /// Returns [`A3cError::ProcessStillAlive`] if the process survives the
    /// forced kill.
    pub fn kill(&self, process: &mut dyn SimulatorProcess) -> Result<()> {
        kill_with_policy(process, &self.config.kill)
    }

    /// Returns the state of the slot of `worker_id`, `None` if nothing was created.
    pub fn status(&self, worker_id: usize) -> Result<Option<ProcessStatus>> {
        Ok(self.slot(worker_id)?.as_ref().map(|e| e.status()))
    }

    /// Returns `true` if the simulator of `worker_id` is alive.
    pub fn is_running(&self, worker_id: usize) -> Result<bool> {
        match self.slot(worker_id)?.as_mut().and_then(|e| e.process.as_mut()) {
            Some(process) => process.is_running(),
            None => Ok(false),
        }
    }

    /// Kills every simulator. Slots are kept for a later `create`.
    ///
    /// Every slot is visited; the first kill error is returned and the
    /// process that caused it stays recorded.
    pub fn shutdown(&self) -> Result<()> {
        let mut result = Ok(());
        for slot in self.slots.iter() {
            let mut slot = slot.lock().unwrap();
            if let Some(entry) = slot.as_mut() {
                if let Some(process) = entry.process.as_mut() {
                    let pid = process.id();
                    if let Err(e) = self.kill(process.as_mut()) {
                        warn!("Failed to stop simulator {} on port {}: {:?}", pid, entry.port, e);
                        entry.state = CommandState::Failed;
                        if result.is_ok() {
                            result = Err(e);
                        }
                        continue;
                    }
                    entry.process = None;
                    info!("Stopped simulator {} on port {}", pid, entry.port);
                }
                entry.state = CommandState::Start;
            }
        }
        result
    }
}

fn kill_with_policy(process: &mut dyn SimulatorProcess, policy: &KillPolicy) -> Result<()> {
    for _ in 0..policy.term_attempts {
        if !process.is_running()? {
            return Ok(());
        }
        process.terminate()?;
        sleep(policy.poll_interval());
    }

    if !process.is_running()? {
        return Ok(());
    }
    warn!(
        "Process {} ignored {} termination requests, killing it",
        process.id(),
        policy.term_attempts
    );
    process.force_kill()?;

    let deadline = Instant::now() + Duration::from_millis(policy.kill_wait_ms);
    loop {
        if !process.is_running()? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(A3cError::ProcessStillAlive(process.id()).into());
        }
        sleep(policy.poll_interval());
    }
}
