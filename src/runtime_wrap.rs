//! Discovery of the external commands a launch is built from.

use std::env;
use std::path::PathBuf;

pub const UMU_RUN: &str = "umu-run";
pub const GAMEMODERUN: &str = "gamemoderun";
pub const MANGOHUD: &str = "mangohud";
pub const WINESERVER: &str = "wineserver";

pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|entry| entry.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Resolve the runtime launcher.
///
/// `UMU_LAUNCHER_UMU_RUN` wins when it points at an existing file, then `PATH`,
/// then the bare name (so the spawn error names the missing command).
pub fn resolve_umu_run() -> PathBuf {
    let explicit = env::var("UMU_LAUNCHER_UMU_RUN")
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.exists());

    explicit
        .or_else(|| find_in_path(UMU_RUN))
        .unwrap_or_else(|| PathBuf::from(UMU_RUN))
}

/// Commands used to assemble a launch line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTools {
    pub perf_wrapper: PathBuf,
    pub overlay_wrapper: PathBuf,
    pub runtime_launcher: PathBuf,
    pub wineserver: PathBuf,
}

impl Default for LaunchTools {
    /// Bare command names, resolved by the OS at spawn time.
    fn default() -> Self {
        Self {
            perf_wrapper: PathBuf::from(GAMEMODERUN),
            overlay_wrapper: PathBuf::from(MANGOHUD),
            runtime_launcher: PathBuf::from(UMU_RUN),
            wineserver: PathBuf::from(WINESERVER),
        }
    }
}

impl LaunchTools {
    pub fn detect() -> Self {
        Self {
            perf_wrapper: find_in_path(GAMEMODERUN).unwrap_or_else(|| PathBuf::from(GAMEMODERUN)),
            overlay_wrapper: find_in_path(MANGOHUD).unwrap_or_else(|| PathBuf::from(MANGOHUD)),
            runtime_launcher: resolve_umu_run(),
            wineserver: find_in_path(WINESERVER).unwrap_or_else(|| PathBuf::from(WINESERVER)),
        }
    }

    /// Process name the system-wide sweep looks for
    pub fn runtime_launcher_name(&self) -> String {
        self.runtime_launcher
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| UMU_RUN.to_string())
    }
}
