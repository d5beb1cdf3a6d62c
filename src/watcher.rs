//! Change notifications for the config document.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::error::ConfigError;
use crate::logging::{log_debug, log_warning};

/// Quiet period after the last change before a reload is requested
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Live watch on the config file. Dropping it stops notifications.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Watch the parent directory so atomic replacements of the file are seen.
    pub fn spawn<F>(path: &Path, on_changed: F) -> Result<Self, ConfigError>
    where
        F: Fn() + Send + 'static,
    {
        let file_name = path.file_name().map(|n| n.to_os_string());
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let (tx, rx) = mpsc::channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_relevant(&event, file_name.as_ref()) {
                    let _ = tx.send(());
                }
            }
            Err(e) => log_warning(&format!("Config watch error: {}", e)),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        thread::spawn(move || debounce(rx, DEBOUNCE, on_changed));

        log_debug(&format!("Watching {} for changes", path.display()));
        Ok(Self { _watcher: watcher })
    }
}

fn is_relevant(event: &Event, file_name: Option<&OsString>) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name().map(|n| n.to_os_string()).as_ref() == file_name)
}

/// Collapse bursts of change signals into one callback per burst.
/// Returns once the sending side is gone.
fn debounce<F: Fn()>(rx: Receiver<()>, quiet: Duration, on_changed: F) {
    while rx.recv().is_ok() {
        loop {
            match rx.recv_timeout(quiet) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        on_changed();
    }
}
