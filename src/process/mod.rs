//! Game process lifecycle: launching, liveness and shutdown.

pub mod shutdown;
pub mod supervisor;
pub mod system;

use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::Child;
use std::sync::Arc;
use std::thread;

use crate::logging::log_debug;

pub use shutdown::{KillAllReport, ShutdownCoordinator, StopOutcome};
pub use supervisor::ProcessSupervisor;
pub use system::{ProcessControl, ProcessMatch, SystemProcesses};

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Lifecycle notifications delivered to the control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Started {
        path: PathBuf,
        pid: u32,
        command: String,
    },
    Output {
        path: PathBuf,
        stream: OutputStream,
        line: String,
    },
    Exited {
        path: PathBuf,
        code: Option<i32>,
    },
}

/// Where supervisor events go. Called from forwarding threads as well as
/// the control thread.
pub type EventSink = Arc<dyn Fn(SupervisorEvent) + Send + Sync>;

// ============================================================================
// Process State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Exited(Option<i32>),
}

/// A launched game: the process-group leader and its group id
#[derive(Debug)]
pub struct RunningGame {
    pub child: Child,
    pub pid: Pid,
    /// Equal to `pid`; the leader is spawned into its own group
    pub pgid: Pid,
    pub command: String,
}

impl RunningGame {
    pub fn new(child: Child, command: String) -> Self {
        let pid = Pid::from_raw(child.id() as i32);
        Self {
            child,
            pid,
            pgid: pid,
            command,
        }
    }

    /// Non-blocking liveness check. Reaps the leader once it has exited.
    pub fn poll(&mut self) -> Liveness {
        match self.child.try_wait() {
            Ok(None) => Liveness::Alive,
            Ok(Some(status)) => Liveness::Exited(status.code()),
            Err(e) => {
                log_debug(&format!("Cannot wait on pid {}: {}", self.pid, e));
                Liveness::Exited(None)
            }
        }
    }

    pub fn has_exited(&mut self) -> bool {
        matches!(self.poll(), Liveness::Exited(_))
    }

    /// Stop tracking the leader; a background thread collects its exit status.
    pub fn detach(self) {
        let RunningGame { mut child, pid, .. } = self;
        thread::spawn(move || {
            let _ = child.wait();
            log_debug(&format!("Reaped detached process {}", pid));
        });
    }
}

/// Per-game state machine: `Stopped -> Running -> Stopping -> Stopped`
#[derive(Debug, Default)]
pub enum ProcessState {
    #[default]
    Stopped,
    Running(RunningGame),
    /// The coordinator holds the handle while it works through the shutdown
    Stopping { pid: Pid },
}

impl ProcessState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, ProcessState::Stopped)
    }

    pub fn pid(&self) -> Option<Pid> {
        match self {
            ProcessState::Stopped => None,
            ProcessState::Running(game) => Some(game.pid),
            ProcessState::Stopping { pid } => Some(*pid),
        }
    }

    /// True iff a handle exists and the leader has not exited.
    pub fn is_running(&mut self) -> bool {
        match self {
            ProcessState::Running(game) => !game.has_exited(),
            _ => false,
        }
    }

    /// Track a new leader. A handle that was already tracked is returned to
    /// the caller instead of being stopped.
    pub fn start(&mut self, game: RunningGame) -> Option<RunningGame> {
        match std::mem::replace(self, ProcessState::Running(game)) {
            ProcessState::Running(previous) => Some(previous),
            _ => None,
        }
    }

    /// `Running -> Stopping`, handing the leader to the caller.
    pub fn begin_stop(&mut self) -> Option<RunningGame> {
        match std::mem::take(self) {
            ProcessState::Running(game) => {
                *self = ProcessState::Stopping { pid: game.pid };
                Some(game)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn finish_stop(&mut self) {
        *self = ProcessState::Stopped;
    }

    /// Drop the handle without signalling anything.
    pub fn release(&mut self) -> Option<RunningGame> {
        match std::mem::take(self) {
            ProcessState::Running(game) => Some(game),
            _ => None,
        }
    }
}
