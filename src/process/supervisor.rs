//! Launching games through the runtime launcher and watching them run.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use super::{EventSink, Liveness, OutputStream, ProcessState, RunningGame, SupervisorEvent};
use crate::config::{LaunchFlags, DEFAULT_GAMEID, DEFAULT_STORE};
use crate::error::LaunchError;
use crate::games::GameEntry;
use crate::logging::{log_debug, log_warning};
use crate::paths;
use crate::runtime_wrap::LaunchTools;

/// Values exported to the runtime launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEnvironment {
    pub gameid: String,
    pub store: String,
    pub wineprefix: PathBuf,
    pub protonpath: PathBuf,
}

impl LaunchEnvironment {
    pub fn vars(&self) -> [(&'static str, OsString); 4] {
        [
            ("GAMEID", OsString::from(&self.gameid)),
            ("STORE", OsString::from(&self.store)),
            ("WINEPREFIX", self.wineprefix.clone().into_os_string()),
            ("PROTONPATH", self.protonpath.clone().into_os_string()),
        ]
    }
}

pub struct ProcessSupervisor {
    tools: LaunchTools,
    home: PathBuf,
    sink: EventSink,
}

impl ProcessSupervisor {
    pub fn new(tools: LaunchTools, sink: EventSink) -> Self {
        Self {
            tools,
            home: paths::home_dir(),
            sink,
        }
    }

    /// Resolve blank prefix/proton paths against `home` instead of the real one.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn tools(&self) -> &LaunchTools {
        &self.tools
    }

    /// `[gamemoderun] [mangohud] umu-run [display flags] [extra args] <exe>`
    pub fn build_command(&self, exe: &Path, flags: &LaunchFlags) -> Vec<OsString> {
        let mut command = Vec::new();

        if flags.gamemode {
            command.push(self.tools.perf_wrapper.clone().into_os_string());
        }
        if flags.mangohud {
            command.push(self.tools.overlay_wrapper.clone().into_os_string());
        }
        command.push(self.tools.runtime_launcher.clone().into_os_string());

        if flags.virtual_desktop {
            command.push("--virtual-desktop".into());
            command.push(
                format!(
                    "{}x{}",
                    flags.virtual_desktop_width, flags.virtual_desktop_height
                )
                .into(),
            );
        }

        // Fullscreen wins over borderless
        if flags.fullscreen {
            command.push("--fullscreen".into());
        } else if flags.borderless {
            command.push("--borderless".into());
        }

        command.extend(flags.additional_flags.split_whitespace().map(OsString::from));
        command.push(exe.as_os_str().to_owned());
        command
    }

    pub fn build_environment(&self, flags: &LaunchFlags) -> LaunchEnvironment {
        LaunchEnvironment {
            gameid: non_blank(&flags.gameid).unwrap_or(DEFAULT_GAMEID).to_string(),
            store: non_blank(&flags.store).unwrap_or(DEFAULT_STORE).to_string(),
            wineprefix: non_blank(&flags.wineprefix)
                .map(|p| expand_home(p, &self.home))
                .unwrap_or_else(|| paths::default_wineprefix(&self.home)),
            protonpath: non_blank(&flags.protonpath)
                .map(|p| expand_home(p, &self.home))
                .unwrap_or_else(|| paths::default_protonpath(&self.home)),
        }
    }

    /// Start `entry` with the given effective flags and track it.
    ///
    /// Fails before spawning when the compatibility tool directory or the
    /// executable is missing. A handle that was already tracked for the entry
    /// is replaced; the earlier process keeps running untracked.
    pub fn launch(&self, entry: &mut GameEntry, flags: &LaunchFlags) -> Result<u32, LaunchError> {
        let exe = entry.record.path.clone();
        let environment = self.build_environment(flags);

        if !environment.protonpath.exists() {
            return Err(LaunchError::MissingProtonPath(environment.protonpath));
        }
        if !exe.is_file() {
            return Err(LaunchError::MissingExecutable(exe));
        }

        let argv = self.build_command(&exe, flags);
        let command_line = display_command(&argv);
        let Some((program, args)) = argv.split_first() else {
            return Err(LaunchError::MissingExecutable(exe));
        };

        log_debug(&format!("Launch environment: {:?}", environment));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(environment.vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(dir) = exe.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            command: command_line.clone(),
            source,
        })?;
        let pid = child.id();

        (self.sink)(SupervisorEvent::Started {
            path: exe.clone(),
            pid,
            command: command_line.clone(),
        });

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, exe.clone(), OutputStream::Stdout, self.sink.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, exe.clone(), OutputStream::Stderr, self.sink.clone());
        }

        if let Some(previous) = entry.state.start(RunningGame::new(child, command_line)) {
            log_warning(&format!(
                "{} was already running (pid {}); that process is no longer tracked",
                entry.record.name, previous.pid
            ));
            previous.detach();
        }

        Ok(pid)
    }

    /// One liveness tick. Emits `Exited` for every leader that has exited
    /// and returns their paths so the caller can run the stop path.
    pub fn poll_exits(&self, entries: &mut [GameEntry]) -> Vec<PathBuf> {
        let mut exited = Vec::new();

        for entry in entries.iter_mut() {
            if let ProcessState::Running(game) = &mut entry.state {
                if let Liveness::Exited(code) = game.poll() {
                    (self.sink)(SupervisorEvent::Exited {
                        path: entry.record.path.clone(),
                        code,
                    });
                    exited.push(entry.record.path.clone());
                }
            }
        }

        exited
    }

    pub fn is_running(entry: &mut GameEntry) -> bool {
        entry.state.is_running()
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn expand_home(value: &str, home: &Path) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None if value == "~" => home.to_path_buf(),
        None => PathBuf::from(value),
    }
}

fn display_command(argv: &[OsString]) -> String {
    argv.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Forward each line of a child pipe to `sink` until EOF.
fn forward_lines<R>(pipe: R, path: PathBuf, stream: OutputStream, sink: EventSink)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    sink(SupervisorEvent::Output {
                        path: path.clone(),
                        stream,
                        line: line.trim_end_matches(['\n', '\r']).to_string(),
                    });
                }
                Err(e) => {
                    log_debug(&format!("Output pipe closed for {}: {}", path.display(), e));
                    break;
                }
            }
        }
    });
}
