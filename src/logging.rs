//! Launcher Logging System
//!
//! Timestamped console + file logging with a system information header.
//! Game output is routed through the same logger by the control loop.

use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use crate::runtime_wrap::find_in_path;

static LOGGER: OnceLock<Mutex<LauncherLogger>> = OnceLock::new();

// ============================================================================
// System Information Detection
// ============================================================================

#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub app_version: String,
    pub distro: String,
    pub kernel: String,
    pub session_type: String,
    pub tools: Vec<(&'static str, bool)>,
}

/// External commands a launch can depend on
const TRACKED_TOOLS: &[&str] = &["umu-run", "gamemoderun", "mangohud", "wineserver"];

impl SystemInfo {
    pub fn detect() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            distro: detect_distro(),
            kernel: detect_kernel(),
            session_type: std::env::var("XDG_SESSION_TYPE")
                .unwrap_or_else(|_| "Unknown".to_string()),
            tools: TRACKED_TOOLS
                .iter()
                .map(|tool| (*tool, find_in_path(tool).is_some()))
                .collect(),
        }
    }

    pub fn to_log_header(&self) -> String {
        let tools = self
            .tools
            .iter()
            .map(|(name, found)| format!("{}={}", name, if *found { "yes" } else { "missing" }))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
r#"================================================================================
Umu-Run Games Launcher Log - {}
================================================================================
Application:   umu-launcher v{}
System Info:
  Distro:      {}
  Kernel:      {}
  Session:     {}
  Tools:       {}
================================================================================
"#,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.app_version,
            self.distro,
            self.kernel,
            self.session_type,
            tools
        )
    }
}

fn detect_distro() -> String {
    if let Ok(file) = File::open("/etc/os-release") {
        let reader = BufReader::new(file);
        for line in reader.lines().map_while(Result::ok) {
            if let Some(name) = line.strip_prefix("PRETTY_NAME=") {
                return name.trim_matches('"').to_string();
            }
        }
    }
    "Unknown".to_string()
}

fn detect_kernel() -> String {
    if let Ok(output) = Command::new("uname").arg("-r").output() {
        if output.status.success() {
            return String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
    }
    "Unknown".to_string()
}

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Action, // User commands
    Launch, // Game lifecycle milestones
    Game,
    GameError,
    Warning,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Info => "[INFO]",
            LogLevel::Action => "[ACTION]",
            LogLevel::Launch => "[LAUNCH]",
            LogLevel::Game => "[GAME]",
            LogLevel::GameError => "[GAME] ERROR:",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    #[default]
    Normal,
    /// Includes debug lines
    Verbose,
}

impl Verbosity {
    fn threshold(self) -> LogLevel {
        match self {
            Verbosity::Quiet => LogLevel::Warning,
            Verbosity::Normal => LogLevel::Info,
            Verbosity::Verbose => LogLevel::Debug,
        }
    }

    fn allows(self, level: LogLevel) -> bool {
        level >= self.threshold()
    }
}

// ============================================================================
// Launcher Logger
// ============================================================================

pub struct LauncherLogger {
    log_file: Option<File>,
    verbosity: Verbosity,
}

impl LauncherLogger {
    /// Logger that only prints; used until `init_logger` runs (and in tests).
    fn console_only() -> Self {
        Self {
            log_file: None,
            verbosity: Verbosity::Normal,
        }
    }

    fn with_file(verbosity: Verbosity) -> Self {
        let log_dir = crate::paths::log_dir();
        let _ = fs::create_dir_all(&log_dir);

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path: PathBuf = log_dir.join(format!("launcher_{}.log", timestamp));

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok();

        let mut logger = Self { log_file, verbosity };

        let header = SystemInfo::detect().to_log_header();
        logger.write_raw(&header, true);

        logger
    }

    fn write_raw(&mut self, msg: &str, to_console: bool) {
        if let Some(ref mut file) = self.log_file {
            let _ = writeln!(file, "{}", msg);
            let _ = file.flush();
        }

        if to_console {
            println!("{}", msg);
        }
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        let formatted = format!("[{}] {} {}", timestamp, level.prefix(), message);
        let to_console = self.verbosity.allows(level);
        if to_console || (level != LogLevel::Debug && self.log_file.is_some()) {
            self.write_raw(&formatted, to_console);
        }
    }
}

// ============================================================================
// Global Logger Access
// ============================================================================

/// Initialize the global file-backed logger (call once at startup)
pub fn init_logger(verbosity: Verbosity) {
    if LOGGER.set(Mutex::new(LauncherLogger::with_file(verbosity))).is_err() {
        logger().lock().verbosity = verbosity;
    }
}

fn logger() -> &'static Mutex<LauncherLogger> {
    LOGGER.get_or_init(|| Mutex::new(LauncherLogger::console_only()))
}

pub fn log(level: LogLevel, message: &str) {
    logger().lock().log(level, message);
}

// ============================================================================
// Convenience Logging Functions
// ============================================================================

pub fn log_debug(message: &str) {
    log(LogLevel::Debug, message);
}

pub fn log_info(message: &str) {
    log(LogLevel::Info, message);
}

pub fn log_action(message: &str) {
    log(LogLevel::Action, message);
}

pub fn log_launch(message: &str) {
    log(LogLevel::Launch, message);
}

pub fn log_warning(message: &str) {
    log(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    log(LogLevel::Error, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_thresholds() {
        assert!(!Verbosity::Quiet.allows(LogLevel::Info));
        assert!(Verbosity::Quiet.allows(LogLevel::Error));
        assert!(Verbosity::Normal.allows(LogLevel::Game));
        assert!(!Verbosity::Normal.allows(LogLevel::Debug));
        assert!(Verbosity::Verbose.allows(LogLevel::Debug));
    }

    #[test]
    fn test_stderr_prefix_is_distinct() {
        assert_ne!(LogLevel::Game.prefix(), LogLevel::GameError.prefix());
    }

    #[test]
    fn test_header_lists_tools() {
        let info = SystemInfo {
            app_version: "0.0.0".to_string(),
            distro: "Test".to_string(),
            kernel: "6.0".to_string(),
            session_type: "wayland".to_string(),
            tools: vec![("umu-run", true), ("mangohud", false)],
        };
        let header = info.to_log_header();
        assert!(header.contains("umu-run=yes"));
        assert!(header.contains("mangohud=missing"));
    }
}
