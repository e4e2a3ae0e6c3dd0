use crate::config::SimulatorConfig;
use a3c_core::error::A3cError;
use anyhow::Result;
use log::{debug, warn};
use std::process::{Child, Command, Stdio};

/// A running simulator process.
pub trait SimulatorProcess: Send {
    /// Process id.
    fn id(&self) -> u32;

    /// Returns `true` while the process has not exited.
    fn is_running(&mut self) -> Result<bool>;

    /// Sends a termination request the process may handle.
    fn terminate(&mut self) -> Result<()>;

    /// Kills the process unconditionally.
    fn force_kill(&mut self) -> Result<()>;
}

/// Starts simulator processes.
pub trait Launcher: Send + Sync {
    /// Spawns a simulator bound to `port`.
    fn spawn(&self, port: u16) -> Result<Box<dyn SimulatorProcess>>;

    /// Runs the post-start initialization of the simulator bound to `port`.
    fn initialize(&self, port: u16) -> Result<()>;
}

/// A simulator started with [`std::process::Command`].
pub struct ChildProcess {
    child: Child,
}

impl SimulatorProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn is_running(&mut self) -> Result<bool> {
        // try_wait also reaps the process once it has exited
        Ok(self.child.try_wait()?.is_none())
    }

    fn terminate(&mut self) -> Result<()> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(format!("kill -TERM {}", self.child.id()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if !status.success() {
            warn!("kill -TERM {} exited with {}", self.child.id(), status);
        }
        Ok(())
    }

    fn force_kill(&mut self) -> Result<()> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            // Already exited
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Launches the simulator binary of a [`SimulatorConfig`].
pub struct CommandLauncher {
    config: SimulatorConfig,
}

impl CommandLauncher {
    /// Creates a launcher.
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }
}

impl Launcher for CommandLauncher {
    fn spawn(&self, port: u16) -> Result<Box<dyn SimulatorProcess>> {
        let child = Command::new(&self.config.binary)
            .args(self.config.args_for_port(port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| A3cError::ProcessSpawn {
                binary: self.config.binary.clone(),
                port,
                source,
            })?;
        debug!("{} {:?}", self.config.binary, self.config.args_for_port(port));
        Ok(Box::new(ChildProcess { child }))
    }

    fn initialize(&self, _port: u16) -> Result<()> {
        let script = match &self.config.init_script {
            Some(script) => script,
            None => return Ok(()),
        };
        let status = Command::new("sh").arg(script).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(A3cError::InitScript(script.clone(), status.to_string()).into())
        }
    }
}

#[cfg(test)]
mod fake {
    use super::{Launcher, SimulatorProcess};
    use anyhow::{anyhow, Result};
    use std::{
        collections::HashSet,
        sync::{Arc, Condvar, Mutex},
    };

    #[derive(Default)]
    struct State {
        next_pid: u32,
        alive: HashSet<u32>,
        spawned: Vec<(u16, u32)>,
        terminate_ignored: bool,
        kill_ignored: bool,
        failing_ports: HashSet<u16>,
        init_fails: bool,
    }

    #[derive(Default)]
    struct Gate {
        port: Option<u16>,
        waiting: bool,
    }

    /// In-memory launcher recording spawned and live processes.
    #[derive(Clone, Default)]
    pub(crate) struct FakeLauncher {
        state: Arc<Mutex<State>>,
        gate: Arc<(Mutex<Gate>, Condvar)>,
    }

    impl FakeLauncher {
        /// Makes processes ignore termination requests.
        pub(crate) fn ignoring_terminate() -> Self {
            let launcher = Self::default();
            launcher.state.lock().unwrap().terminate_ignored = true;
            launcher
        }

        /// Makes processes ignore both termination requests and forced kills.
        pub(crate) fn unkillable(&self) {
            let mut state = self.state.lock().unwrap();
            state.terminate_ignored = true;
            state.kill_ignored = true;
        }

        /// Makes spawns on `port` fail.
        pub(crate) fn fail_spawn(&self, port: u16) {
            self.state.lock().unwrap().failing_ports.insert(port);
        }

        /// Makes initialization fail.
        pub(crate) fn fail_init(&self, fails: bool) {
            self.state.lock().unwrap().init_fails = fails;
        }

        /// Blocks spawns on `port` until [`FakeLauncher::open_gate`].
        pub(crate) fn close_gate(&self, port: u16) {
            self.gate.0.lock().unwrap().port = Some(port);
        }

        pub(crate) fn open_gate(&self) {
            let (gate, cvar) = &*self.gate;
            gate.lock().unwrap().port = None;
            cvar.notify_all();
        }

        /// Returns `true` while a spawn is blocked by the gate.
        pub(crate) fn is_waiting(&self) -> bool {
            self.gate.0.lock().unwrap().waiting
        }

        /// `(port, pid)` of every spawned process, in spawn order.
        pub(crate) fn spawned(&self) -> Vec<(u16, u32)> {
            self.state.lock().unwrap().spawned.clone()
        }

        /// Ids of processes that were spawned and not killed yet.
        pub(crate) fn alive(&self) -> HashSet<u32> {
            self.state.lock().unwrap().alive.clone()
        }

        fn wait_gate(&self, port: u16) {
            let (gate, cvar) = &*self.gate;
            let mut gate = gate.lock().unwrap();
            while gate.port == Some(port) {
                gate.waiting = true;
                gate = cvar.wait(gate).unwrap();
            }
            gate.waiting = false;
        }
    }

    struct FakeProcess {
        pid: u32,
        state: Arc<Mutex<State>>,
    }

    impl SimulatorProcess for FakeProcess {
        fn id(&self) -> u32 {
            self.pid
        }

        fn is_running(&mut self) -> Result<bool> {
            Ok(self.state.lock().unwrap().alive.contains(&self.pid))
        }

        fn terminate(&mut self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if !state.terminate_ignored {
                state.alive.remove(&self.pid);
            }
            Ok(())
        }

        fn force_kill(&mut self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if !state.kill_ignored {
                state.alive.remove(&self.pid);
            }
            Ok(())
        }
    }

    impl Launcher for FakeLauncher {
        fn spawn(&self, port: u16) -> Result<Box<dyn SimulatorProcess>> {
            self.wait_gate(port);
            let mut state = self.state.lock().unwrap();
            if state.failing_ports.contains(&port) {
                return Err(anyhow!("no simulator on port {}", port));
            }
            state.next_pid += 1;
            let pid = 1000 + state.next_pid;
            state.alive.insert(pid);
            state.spawned.push((port, pid));
            Ok(Box::new(FakeProcess {
                pid,
                state: self.state.clone(),
            }))
        }

        fn initialize(&self, port: u16) -> Result<()> {
            if self.state.lock().unwrap().init_fails {
                return Err(anyhow!("simulator on port {} did not initialize", port));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) use fake::FakeLauncher;
