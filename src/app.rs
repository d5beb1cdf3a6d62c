//! Control loop: the one thread that owns the registry and drives launches,
//! shutdowns, config reloads and console commands.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::commands::{self, ConsoleCommand, Selector, HELP};
use crate::config::ConfigStore;
use crate::error::{LaunchError, RegistryError};
use crate::games::GameRegistry;
use crate::logging::{
    log, log_action, log_error, log_info, log_launch, log_warning, LogLevel,
};
use crate::process::{
    EventSink, OutputStream, ProcessSupervisor, ShutdownCoordinator, StopOutcome,
    SupervisorEvent,
};
use crate::runtime_wrap::LaunchTools;
use crate::watcher::ConfigWatcher;

/// Liveness polling interval
pub const TICK: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

#[derive(Debug)]
pub enum AppEvent {
    Input(String),
    InputClosed,
    Supervisor(SupervisorEvent),
    ConfigChanged,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    registry: GameRegistry,
    supervisor: ProcessSupervisor,
    coordinator: ShutdownCoordinator,
    events: Receiver<AppEvent>,
    sender: Sender<AppEvent>,
    _watcher: Option<ConfigWatcher>,
}

impl App {
    pub fn new(store: ConfigStore) -> Self {
        let (sender, events) = mpsc::channel();

        let supervisor_tx = sender.clone();
        let sink: EventSink = Arc::new(move |event| {
            let _ = supervisor_tx.send(AppEvent::Supervisor(event));
        });

        let tools = LaunchTools::detect();
        let coordinator = ShutdownCoordinator::for_tools(&tools);
        let supervisor = ProcessSupervisor::new(tools, sink);
        let registry = GameRegistry::load(store);

        log_info(&format!(
            "Loaded {} games from {}",
            registry.len(),
            registry.store().path().display()
        ));

        Self {
            registry,
            supervisor,
            coordinator,
            events,
            sender,
            _watcher: None,
        }
    }

    /// Handle for threads that feed the loop (signal handlers, input).
    pub fn sender(&self) -> Sender<AppEvent> {
        self.sender.clone()
    }

    /// Reload the registry whenever the config file changes on disk.
    pub fn watch_config(&mut self) {
        let tx = self.sender.clone();
        match self.registry.store().watch(move || {
            let _ = tx.send(AppEvent::ConfigChanged);
        }) {
            Ok(watcher) => self._watcher = Some(watcher),
            Err(e) => log_warning(&format!("Config changes will not be picked up: {}", e)),
        }
    }

    // ========================================================================
    // Modes
    // ========================================================================

    /// Line-oriented console until `quit`, end of input or Ctrl+C.
    pub fn run_interactive(&mut self) -> i32 {
        spawn_input_reader(self.sender.clone());
        println!("{}", HELP);
        self.print_list();
        prompt();

        self.run_loop(|app, event| match event {
            AppEvent::Input(line) => {
                let flow = app.handle_line(&line);
                if flow == Flow::Continue {
                    prompt();
                }
                flow
            }
            AppEvent::InputClosed | AppEvent::Interrupt => Flow::Quit,
            other => app.handle_background(other),
        });

        self.stop_all_tracked();
        0
    }

    /// Launch one registered game and stay attached until it exits.
    pub fn run_single(&mut self, path: &Path) -> i32 {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        let Some(index) = self.registry.position(&path) else {
            log_error(&LaunchError::NotRegistered(path).to_string());
            return 1;
        };
        if let Err(e) = self.launch_index(index) {
            log_error(&format!("Failed to launch game: {}", e));
            return 1;
        }

        self.run_loop(|app, event| {
            match event {
                AppEvent::Interrupt => {
                    if let Some(entry) = app.registry.get_mut(&path) {
                        app.coordinator.stop(entry);
                    }
                }
                AppEvent::Input(_) | AppEvent::InputClosed => {}
                other => {
                    app.handle_background(other);
                }
            }
            if app.registry.get(&path).is_some_and(|e| e.state.is_stopped()) {
                Flow::Quit
            } else {
                Flow::Continue
            }
        });

        0
    }

    fn run_loop<F>(&mut self, mut handle: F)
    where
        F: FnMut(&mut Self, AppEvent) -> Flow,
    {
        let mut next_tick = Instant::now() + TICK;
        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(timeout) {
                Ok(event) => {
                    if handle(self, event) == Flow::Quit {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if Instant::now() >= next_tick {
                self.tick();
                next_tick = Instant::now() + TICK;
                // A tick can finish a game the handler is waiting on
                if let Ok(event) = self.events.try_recv() {
                    if handle(self, event) == Flow::Quit {
                        break;
                    }
                }
            }
        }
    }

    // ========================================================================
    // Event Handling
    // ========================================================================

    fn tick(&mut self) {
        for path in self.supervisor.poll_exits(self.registry.entries_mut()) {
            if let Some(entry) = self.registry.get_mut(&path) {
                self.coordinator.stop(entry);
            }
        }
    }

    fn handle_background(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::Supervisor(event) => self.log_supervisor_event(event),
            AppEvent::ConfigChanged => {
                log_info("Config file changed, reloading");
                self.registry.sync_from_store();
            }
            AppEvent::Input(_) | AppEvent::InputClosed | AppEvent::Interrupt => {}
        }
        Flow::Continue
    }

    fn game_name(&self, path: &Path) -> String {
        self.registry
            .get(path)
            .map(|e| e.name().to_string())
            .unwrap_or_else(|| path.display().to_string())
    }

    fn log_supervisor_event(&self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Started { path, pid, command } => {
                log_launch(&format!("=== Starting {} (pid {}) ===", self.game_name(&path), pid));
                log_launch(&format!("Command: {}", command));
            }
            SupervisorEvent::Output { stream, line, .. } => {
                let level = match stream {
                    OutputStream::Stdout => LogLevel::Game,
                    OutputStream::Stderr => LogLevel::GameError,
                };
                log(level, &line);
            }
            SupervisorEvent::Exited { path, code } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                log_launch(&format!("{} exited ({})", self.game_name(&path), code));
            }
        }
    }

    fn stop_all_tracked(&mut self) {
        for entry in self.registry.entries_mut() {
            if !entry.state.is_stopped() {
                self.coordinator.stop(entry);
            }
        }
    }

    // ========================================================================
    // Console Commands
    // ========================================================================

    fn handle_line(&mut self, line: &str) -> Flow {
        match commands::parse(line) {
            Ok(Some(command)) => self.execute(command),
            Ok(None) => Flow::Continue,
            Err(e) => {
                println!("{}", e);
                Flow::Continue
            }
        }
    }

    fn execute(&mut self, command: ConsoleCommand) -> Flow {
        log_action(&format!("{:?}", command));

        let result: Result<(), String> = match command {
            ConsoleCommand::List => {
                self.print_list();
                Ok(())
            }
            ConsoleCommand::Help => {
                println!("{}", HELP);
                Ok(())
            }
            ConsoleCommand::Quit => return Flow::Quit,
            ConsoleCommand::Add(path) => self
                .registry
                .add(&path)
                .map(|entry| println!("Added {}", entry.name()))
                .map_err(|e| e.to_string()),
            ConsoleCommand::Remove(game) => self.resolve(&game).and_then(|path| {
                self.registry
                    .remove(&path, &self.coordinator)
                    .map(|record| println!("Removed {}", record.name))
                    .map_err(|e| e.to_string())
            }),
            ConsoleCommand::Launch(game) => self.resolve(&game).and_then(|path| {
                let index = self.registry.position(&path).unwrap_or_default();
                self.launch_index(index).map(|_| ()).map_err(|e| e.to_string())
            }),
            ConsoleCommand::Stop(game) => self.resolve(&game).map(|path| {
                if let Some(entry) = self.registry.get_mut(&path) {
                    if self.coordinator.stop(entry) == StopOutcome::NotRunning {
                        println!("{} is not running", entry.name());
                    }
                }
            }),
            ConsoleCommand::KillAll => {
                let report = self.coordinator.kill_all(self.registry.entries_mut());
                if report.found_any() {
                    println!(
                        "Stopped {} games, {} Wine processes, {} launchers",
                        report.games_stopped, report.processes_swept, report.launchers_killed
                    );
                } else {
                    println!("No running games found");
                }
                Ok(())
            }
            ConsoleCommand::Move { from, to } => {
                self.registry.reorder(from, to).map_err(|e| e.to_string())
            }
            ConsoleCommand::Rename { game, name } => self.resolve(&game).and_then(|path| {
                self.registry.rename(&path, &name).map_err(|e| e.to_string())
            }),
            ConsoleCommand::Set { game, key, value } => self.resolve(&game).and_then(|path| {
                self.registry
                    .set_game_flag(&path, &key, &value)
                    .map_err(|e| e.to_string())
            }),
            ConsoleCommand::Unset { game, key } => self.resolve(&game).and_then(|path| {
                self.registry.unset_game_flag(&path, &key).map_err(|e| e.to_string())
            }),
            ConsoleCommand::Global { key, value } => {
                if matches!(key.as_str(), "artwork_api_key" | "steamgriddb_api_key") {
                    self.registry.set_artwork_api_key(&value);
                    Ok(())
                } else {
                    self.registry
                        .set_global_flag(&key, &value)
                        .map_err(|e| e.to_string())
                }
            }
            ConsoleCommand::Icons(game) => self.resolve(&game).map(|path| self.print_icons(&path)),
            ConsoleCommand::Reload => {
                let summary = self.registry.sync_from_store();
                println!(
                    "Reloaded: {} added, {} removed, {} unavailable",
                    summary.added, summary.removed, summary.unavailable
                );
                Ok(())
            }
        };

        if let Err(message) = result {
            println!("Error: {}", message);
            log_warning(&message);
        }
        Flow::Continue
    }

    fn resolve(&self, selector: &Selector) -> Result<PathBuf, String> {
        let entry = match selector {
            Selector::Index(index) => self.registry.entries().get(*index),
            Selector::Path(path) => {
                let path = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                self.registry.get(&path)
            }
        };

        entry.map(|e| e.path().to_path_buf()).ok_or_else(|| {
            let what = match selector {
                Selector::Index(index) => format!("#{}", index + 1),
                Selector::Path(path) => path.display().to_string(),
            };
            RegistryError::NotFound(what).to_string()
        })
    }

    fn launch_index(&mut self, index: usize) -> Result<u32, LaunchError> {
        let flags = self.registry.effective_flags(&self.registry.entries()[index]);
        let entry = &mut self.registry.entries_mut()[index];
        log_action(&format!("Launching {}", entry.name()));
        self.supervisor.launch(entry, &flags)
    }

    fn print_list(&mut self) {
        if self.registry.is_empty() {
            println!("No games registered. Use 'add <path>' to add one.");
        }
        for (i, entry) in self.registry.entries_mut().iter_mut().enumerate() {
            let status = if entry.state.is_running() { "running" } else { "stopped" };
            println!(
                "{:>3}. {} [{}] {}",
                i + 1,
                entry.record.name,
                status,
                entry.record.path.display()
            );
        }
        let hidden = self.registry.unavailable().len();
        if hidden > 0 {
            println!("({} games hidden: executable not found)", hidden);
        }
    }

    #[cfg(feature = "artwork")]
    fn print_icons(&self, path: &Path) {
        use crate::artwork::{ArtworkSource, SteamGridDb};

        let client = SteamGridDb::new(self.registry.global().artwork_api_key.clone());
        let name = self.game_name(path);
        let Some(found) = client.search(&name).into_iter().next() else {
            println!("No artwork found for {}", name);
            return;
        };

        let icons = client.icons_for(found.id);
        println!("{} icons for {} (id {}):", icons.len(), found.name, found.id);
        for icon in icons {
            println!("  {}  {}", icon.name(), icon.url);
        }
    }

    #[cfg(not(feature = "artwork"))]
    fn print_icons(&self, path: &Path) {
        println!(
            "Artwork lookup for {} needs the 'artwork' feature",
            self.game_name(path)
        );
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn spawn_input_reader(tx: Sender<AppEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(AppEvent::Input(line)).is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(AppEvent::InputClosed);
    });
}
