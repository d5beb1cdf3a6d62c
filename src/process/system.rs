use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

use crate::logging::{log_debug, log_warning};

/// How long a `wineserver -k`/`-k9` call may take
pub const WINESERVER_TIMEOUT: Duration = Duration::from_secs(3);

/// Command-line pattern used when sweeping the process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessMatch {
    /// Compatibility-layer binaries and anything running a `.exe`
    RuntimeHelpers,
    /// Command line containing the given name
    Named(String),
}

impl ProcessMatch {
    pub fn named(name: impl Into<String>) -> Self {
        ProcessMatch::Named(name.into())
    }

    pub fn matches(&self, cmdline: &str) -> bool {
        match self {
            ProcessMatch::RuntimeHelpers => cmdline.contains("wine") || cmdline.contains(".exe"),
            ProcessMatch::Named(name) => cmdline.contains(name.as_str()),
        }
    }
}

/// OS operations the shutdown protocol is built from
pub trait ProcessControl {
    fn signal_group(&self, pgid: Pid, signal: Signal) -> nix::Result<()>;
    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()>;
    /// Pids of processes (other than this one) whose command line matches
    fn find_matching(&self, pattern: &ProcessMatch) -> Vec<Pid>;
    /// Ask the shared wineserver to exit; returns false on failure or timeout.
    fn stop_wineserver(&self, force: bool) -> bool;
    fn pause(&self, duration: Duration);
}

/// The real process table, signals and wineserver
#[derive(Debug, Clone)]
pub struct SystemProcesses {
    wineserver: PathBuf,
    own_pid: Pid,
}

impl SystemProcesses {
    pub fn new(wineserver: impl Into<PathBuf>) -> Self {
        Self {
            wineserver: wineserver.into(),
            own_pid: unistd::getpid(),
        }
    }
}

impl ProcessControl for SystemProcesses {
    fn signal_group(&self, pgid: Pid, signal: Signal) -> nix::Result<()> {
        signal::killpg(pgid, signal)
    }

    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()> {
        signal::kill(pid, signal)
    }

    fn find_matching(&self, pattern: &ProcessMatch) -> Vec<Pid> {
        scan_proc()
            .into_iter()
            .filter(|(pid, cmdline)| *pid != self.own_pid && pattern.matches(cmdline))
            .map(|(pid, _)| pid)
            .collect()
    }

    fn stop_wineserver(&self, force: bool) -> bool {
        let flag = if force { "-k9" } else { "-k" };
        let mut child = match Command::new(&self.wineserver)
            .arg(flag)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log_warning(&format!("Error stopping wineserver: {}", e));
                return false;
            }
        };

        match child.wait_timeout(WINESERVER_TIMEOUT) {
            Ok(Some(status)) => status.success(),
            Ok(None) => {
                log_warning(&format!("wineserver {} timed out", flag));
                let _ = child.kill();
                let _ = child.wait();
                false
            }
            Err(e) => {
                log_warning(&format!("Error waiting for wineserver: {}", e));
                false
            }
        }
    }

    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Every process with a readable, non-empty command line.
fn scan_proc() -> Vec<(Pid, String)> {
    let entries = match fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(e) => {
            log_warning(&format!("Cannot read /proc: {}", e));
            return Vec::new();
        }
    };

    entries
        .flatten()
        .filter_map(|entry| {
            let pid: i32 = entry.file_name().to_str()?.parse().ok()?;
            // Processes can vanish between listing and reading
            let raw = fs::read(entry.path().join("cmdline")).ok()?;
            let cmdline = cmdline_to_string(&raw);
            (!cmdline.is_empty()).then_some((Pid::from_raw(pid), cmdline))
        })
        .collect()
}

fn cmdline_to_string(raw: &[u8]) -> String {
    let joined: Vec<u8> = raw
        .iter()
        .map(|b| if *b == 0 { b' ' } else { *b })
        .collect();
    String::from_utf8_lossy(&joined).trim().to_string()
}

/// Log-and-drop for signal results; a target that is already gone is expected.
pub(crate) fn ignore_gone(result: nix::Result<()>, target: &str) {
    match result {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => log_debug(&format!("Signal to {} failed: {}", target, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_helper_pattern() {
        let helpers = ProcessMatch::RuntimeHelpers;
        assert!(helpers.matches("/usr/bin/wine64-preloader C:\\game.exe"));
        assert!(helpers.matches("Z:\\games\\Foo\\Foo.exe -dx11"));
        assert!(helpers.matches("/usr/bin/wineserver"));
        assert!(!helpers.matches("/usr/bin/bash -l"));

        let named = ProcessMatch::named("umu-run");
        assert!(named.matches("python3 /usr/bin/umu-run /games/a.exe"));
        assert!(!named.matches("/usr/bin/wine"));
    }

    #[test]
    fn test_cmdline_nul_separators() {
        assert_eq!(cmdline_to_string(b"sleep\x0030\x00"), "sleep 30");
        assert_eq!(cmdline_to_string(b""), "");
    }

    #[test]
    fn test_scan_finds_child_but_not_self() {
        let mut child = Command::new("sleep")
            .arg("7.25")
            .spawn()
            .unwrap();
        let child_pid = Pid::from_raw(child.id() as i32);

        let system = SystemProcesses::new("wineserver");
        let found = system.find_matching(&ProcessMatch::named("sleep 7.25"));
        assert!(found.contains(&child_pid));

        let own = unistd::getpid();
        let everything = system.find_matching(&ProcessMatch::named(""));
        assert!(!everything.contains(&own));

        let _ = child.kill();
        let _ = child.wait();
    }

    #[test]
    fn test_signal_to_missing_process_is_swallowed() {
        let system = SystemProcesses::new("wineserver");
        // Pid far above the default pid_max
        let result = system.signal(Pid::from_raw(i32::MAX - 1), Signal::SIGTERM);
        assert_eq!(result, Err(nix::errno::Errno::ESRCH));
        ignore_gone(result, "missing");
    }
}
