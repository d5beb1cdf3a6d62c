//! Staged termination of games and stray compatibility-layer processes.

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::time::Duration;

use super::system::{ignore_gone, ProcessControl, ProcessMatch, SystemProcesses};
use crate::games::GameEntry;
use crate::logging::{log_debug, log_info, log_launch, log_warning};
use crate::runtime_wrap::LaunchTools;

/// After the group SIGTERM, before sweeping helpers
pub const GROUP_GRACE: Duration = Duration::from_secs(1);
/// After the helper SIGTERM, before SIGKILLing survivors
pub const HELPER_GRACE: Duration = Duration::from_secs(2);
/// Between SIGTERM and SIGKILL in the kill-all sweep
pub const SWEEP_GRACE: Duration = Duration::from_secs(1);

/// Compatibility-layer process names swept by `kill_all`
pub const WINE_PROCESS_NAMES: &[&str] = &[
    "wine64-preloader",
    "wine64",
    "wine-preloader",
    "wine",
    "wineserver",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was tracked for the entry
    NotRunning,
    /// The leader had already exited; only the handle was cleared
    AlreadyExited,
    /// The full escalation ran
    Terminated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillAllReport {
    pub games_stopped: usize,
    pub processes_swept: usize,
    pub launchers_killed: usize,
}

impl KillAllReport {
    pub fn found_any(&self) -> bool {
        self.games_stopped + self.processes_swept + self.launchers_killed > 0
    }
}

pub struct ShutdownCoordinator<C: ProcessControl = SystemProcesses> {
    control: C,
    runtime_launcher: String,
}

impl ShutdownCoordinator<SystemProcesses> {
    pub fn for_tools(tools: &LaunchTools) -> Self {
        Self::new(
            SystemProcesses::new(tools.wineserver.clone()),
            tools.runtime_launcher_name(),
        )
    }
}

impl<C: ProcessControl> ShutdownCoordinator<C> {
    pub fn new(control: C, runtime_launcher: impl Into<String>) -> Self {
        Self {
            control,
            runtime_launcher: runtime_launcher.into(),
        }
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    /// Stop one game. Runs to completion once started; every signal failure
    /// is swallowed.
    pub fn stop(&self, entry: &mut GameEntry) -> StopOutcome {
        let name = entry.record.name.clone();

        let Some(mut game) = entry.state.begin_stop() else {
            log_debug(&format!("{} is not running", name));
            return StopOutcome::NotRunning;
        };

        if game.has_exited() {
            entry.state.finish_stop();
            log_launch(&format!("{} exited", name));
            return StopOutcome::AlreadyExited;
        }

        log_launch(&format!("Stopping {} (process group {})", name, game.pgid));
        ignore_gone(
            self.control.signal_group(game.pgid, Signal::SIGTERM),
            "game process group",
        );
        self.control.pause(GROUP_GRACE);

        let helpers = self.control.find_matching(&ProcessMatch::RuntimeHelpers);
        if !helpers.is_empty() {
            log_debug(&format!("Sending SIGTERM to {} Wine processes", helpers.len()));
        }
        self.signal_each(&helpers, Signal::SIGTERM);
        self.control.pause(HELPER_GRACE);

        let survivors = self.control.find_matching(&ProcessMatch::RuntimeHelpers);
        if !survivors.is_empty() {
            log_warning(&format!(
                "Force killing {} remaining Wine processes",
                survivors.len()
            ));
        }
        self.signal_each(&survivors, Signal::SIGKILL);

        if !self.control.stop_wineserver(false) && !self.control.stop_wineserver(true) {
            log_warning("Could not stop wineserver");
        }

        if !game.has_exited() {
            ignore_gone(
                self.control.signal_group(game.pgid, Signal::SIGKILL),
                "game process group",
            );
            game.detach();
        }

        entry.state.finish_stop();
        log_launch(&format!("{} stopped", name));
        StopOutcome::Terminated
    }

    /// Stop every tracked game, then sweep the whole process table for
    /// compatibility-layer processes and runtime launchers.
    pub fn kill_all(&self, entries: &mut [GameEntry]) -> KillAllReport {
        let mut report = KillAllReport::default();

        for entry in entries.iter_mut() {
            if !entry.state.is_stopped() && self.stop(entry) != StopOutcome::NotRunning {
                report.games_stopped += 1;
            }
        }

        let found = self.find_wine_processes();
        report.processes_swept = found.len();
        if !found.is_empty() {
            log_info(&format!("Terminating {} Wine processes", found.len()));
            self.signal_each(&found, Signal::SIGTERM);
            self.control.pause(SWEEP_GRACE);

            let survivors: Vec<Pid> = self
                .find_wine_processes()
                .into_iter()
                .filter(|pid| found.contains(pid))
                .collect();
            self.signal_each(&survivors, Signal::SIGKILL);
        }

        let launchers = self
            .control
            .find_matching(&ProcessMatch::named(self.runtime_launcher.as_str()));
        report.launchers_killed = launchers.len();
        self.signal_each(&launchers, Signal::SIGKILL);

        if report.found_any() {
            log_launch("All games stopped");
        } else {
            log_info("No running games found");
        }
        report
    }

    fn find_wine_processes(&self) -> Vec<Pid> {
        let mut found: Vec<Pid> = WINE_PROCESS_NAMES
            .iter()
            .flat_map(|name| self.control.find_matching(&ProcessMatch::named(*name)))
            .collect();
        found.sort_by_key(|pid| pid.as_raw());
        found.dedup();
        found
    }

    fn signal_each(&self, pids: &[Pid], signal: Signal) {
        for pid in pids {
            ignore_gone(self.control.signal(*pid, signal), "process");
        }
    }
}
