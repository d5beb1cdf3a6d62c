//! Game Registry - the ordered list of registered games
//!
//! Entries pair a persisted [`GameRecord`] with the volatile process state of
//! the game. The registry is reconciled against the config document whenever
//! it changes on disk and persists every mutation immediately.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{ConfigStore, GameRecord, GlobalConfig, LaunchFlags};
use crate::error::RegistryError;
use crate::exe_check::{self, ExeProbe, FileCommandProbe};
use crate::logging::{log_action, log_debug, log_error, log_info, log_warning};
use crate::process::{ProcessControl, ProcessState, ShutdownCoordinator};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug)]
pub struct GameEntry {
    pub record: GameRecord,
    /// Never persisted
    pub state: ProcessState,
}

impl GameEntry {
    pub fn new(record: GameRecord) -> Self {
        Self {
            record,
            state: ProcessState::Stopped,
        }
    }

    pub fn path(&self) -> &Path {
        &self.record.path
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }
}

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub removed: usize,
    pub orphaned: usize,
    pub unavailable: usize,
}

impl ReconcileSummary {
    pub fn changed(&self) -> bool {
        self.added + self.removed > 0
    }
}

// ============================================================================
// Game Registry
// ============================================================================

pub struct GameRegistry {
    store: ConfigStore,
    global: GlobalConfig,
    entries: Vec<GameEntry>,
    /// Records whose executable was missing at load time; kept on disk
    unavailable: Vec<GameRecord>,
    probe: Box<dyn ExeProbe>,
}

impl GameRegistry {
    pub fn load(store: ConfigStore) -> Self {
        let mut registry = Self {
            store,
            global: GlobalConfig::default(),
            entries: Vec::new(),
            unavailable: Vec::new(),
            probe: Box::new(FileCommandProbe),
        };
        registry.sync_from_store();
        registry
    }

    pub fn with_probe(mut self, probe: Box<dyn ExeProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn entries(&self) -> &[GameEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [GameEntry] {
        &mut self.entries
    }

    pub fn unavailable(&self) -> &[GameRecord] {
        &self.unavailable
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|e| e.record.path == path)
    }

    pub fn get(&self, path: &Path) -> Option<&GameEntry> {
        self.entries.iter().find(|e| e.record.path == path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut GameEntry> {
        self.entries.iter_mut().find(|e| e.record.path == path)
    }

    /// Global defaults overlaid with the entry's own overrides
    pub fn effective_flags(&self, entry: &GameEntry) -> LaunchFlags {
        self.global.flags.overlay(&entry.record.flags)
    }

    /// Everything that belongs in the document, active entries first.
    pub fn records(&self) -> Vec<GameRecord> {
        self.entries
            .iter()
            .map(|e| e.record.clone())
            .chain(self.unavailable.iter().cloned())
            .collect()
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Reload the document and reconcile against it.
    pub fn sync_from_store(&mut self) -> ReconcileSummary {
        let (global, games) = self.store.load();
        self.global = global;
        self.reconcile(games)
    }

    /// Replace the entry list with `loaded`.
    ///
    /// Entries whose path survives keep their process state. Entries that
    /// disappear are dropped; a game they were running keeps running
    /// untracked. Records whose executable is missing are set aside unless
    /// their game is still running.
    pub fn reconcile(&mut self, loaded: Vec<GameRecord>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let mut previous = std::mem::take(&mut self.entries);
        let mut seen = HashSet::new();
        self.unavailable.clear();

        for record in loaded {
            if !seen.insert(record.path.clone()) {
                log_warning(&format!("Ignoring duplicate game entry: {}", record.path.display()));
                continue;
            }

            match previous.iter().position(|e| e.record.path == record.path) {
                Some(index) => {
                    let mut entry = previous.remove(index);
                    if entry.state.is_stopped() && !record.path.exists() {
                        log_debug(&format!("Game file missing: {}", record.path.display()));
                        self.unavailable.push(record);
                        summary.removed += 1;
                        summary.unavailable += 1;
                        continue;
                    }
                    entry.record = record;
                    self.entries.push(entry);
                }
                None if !record.path.exists() => {
                    log_debug(&format!("Game file missing: {}", record.path.display()));
                    self.unavailable.push(record);
                    summary.unavailable += 1;
                }
                None => {
                    self.entries.push(GameEntry::new(record));
                    summary.added += 1;
                }
            }
        }

        for mut dropped in previous {
            summary.removed += 1;
            if let Some(game) = dropped.state.release() {
                log_warning(&format!(
                    "{} was removed from the config while running; pid {} is no longer tracked",
                    dropped.record.name, game.pid
                ));
                game.detach();
                summary.orphaned += 1;
            }
        }

        if summary.changed() {
            log_info(&format!(
                "Game list updated: {} added, {} removed",
                summary.added, summary.removed
            ));
        }
        summary
    }

    // ========================================================================
    // Mutations (each persisted immediately)
    // ========================================================================

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.global, &self.records()) {
            log_error(&format!("Error saving config: {}", e));
        }
    }

    pub fn add(&mut self, path: impl AsRef<Path>) -> Result<&GameEntry, RegistryError> {
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        if self.position(&path).is_some() || self.unavailable.iter().any(|r| r.path == path) {
            return Err(RegistryError::DuplicatePath(path));
        }
        if !exe_check::is_windows_executable(self.probe.as_ref(), &path) {
            return Err(RegistryError::InvalidExecutable(path));
        }

        let record = GameRecord::discover(&path);
        log_action(&format!("Added {} ({})", record.name, path.display()));
        self.entries.push(GameEntry::new(record));
        self.persist();

        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Remove an entry, stopping its game first if it is running.
    pub fn remove<C: ProcessControl>(
        &mut self,
        path: &Path,
        coordinator: &ShutdownCoordinator<C>,
    ) -> Result<GameRecord, RegistryError> {
        let index = self.require(path)?;

        coordinator.stop(&mut self.entries[index]);
        let entry = self.entries.remove(index);
        log_action(&format!("Removed {}", entry.record.name));
        self.persist();

        Ok(entry.record)
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), RegistryError> {
        let len = self.entries.len();
        for index in [from, to] {
            if index >= len {
                return Err(RegistryError::IndexOutOfRange { index, len });
            }
        }

        if from != to {
            let entry = self.entries.remove(from);
            self.entries.insert(to, entry);
            self.persist();
        }
        Ok(())
    }

    pub fn rename(&mut self, path: &Path, name: &str) -> Result<(), RegistryError> {
        let index = self.require(path)?;
        let name = name.trim();
        self.entries[index].record.name = if name.is_empty() {
            crate::config::infer_name(path)
        } else {
            name.to_string()
        };
        self.persist();
        Ok(())
    }

    pub fn set_icon(&mut self, path: &Path, icon: Option<PathBuf>) -> Result<(), RegistryError> {
        let index = self.require(path)?;
        self.entries[index].record.icon = icon;
        self.persist();
        Ok(())
    }

    pub fn set_game_flag(&mut self, path: &Path, key: &str, value: &str) -> Result<(), RegistryError> {
        let index = self.require(path)?;
        self.entries[index].record.flags.set(key, value)?;
        self.persist();
        Ok(())
    }

    pub fn unset_game_flag(&mut self, path: &Path, key: &str) -> Result<(), RegistryError> {
        let index = self.require(path)?;
        self.entries[index].record.flags.unset(key)?;
        self.persist();
        Ok(())
    }

    pub fn set_global_flag(&mut self, key: &str, value: &str) -> Result<(), RegistryError> {
        self.global.flags.set(key, value)?;
        self.persist();
        Ok(())
    }

    pub fn set_artwork_api_key(&mut self, key: &str) {
        self.global.artwork_api_key = key.trim().to_string();
        self.persist();
    }

    fn require(&self, path: &Path) -> Result<usize, RegistryError> {
        self.position(path)
            .ok_or_else(|| RegistryError::NotFound(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exe_check::{pe_stub, ExeCategory};
    use crate::process::{ProcessMatch, ProcessSupervisor, RunningGame, SupervisorEvent};
    use crate::runtime_wrap::LaunchTools;
    use std::sync::Arc;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use std::fs;
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};
    use std::time::Duration;
    use tempfile::TempDir;

    struct HeaderOnly;

    impl ExeProbe for HeaderOnly {
        fn classify(&self, _path: &Path) -> ExeCategory {
            ExeCategory::Unknown
        }
    }

    /// Real group signals, no scans, no wineserver, no sleeps
    struct QuietControl;

    impl ProcessControl for QuietControl {
        fn signal_group(&self, pgid: Pid, sig: Signal) -> nix::Result<()> {
            signal::killpg(pgid, sig)
        }
        fn signal(&self, _pid: Pid, _sig: Signal) -> nix::Result<()> {
            Ok(())
        }
        fn find_matching(&self, _pattern: &ProcessMatch) -> Vec<Pid> {
            Vec::new()
        }
        fn stop_wineserver(&self, _force: bool) -> bool {
            true
        }
        fn pause(&self, _duration: Duration) {}
    }

    fn make_exe(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let exe = dir.join(format!("{}.exe", name));
        fs::write(&exe, pe_stub()).unwrap();
        exe
    }

    fn registry_in(dir: &TempDir) -> GameRegistry {
        GameRegistry::load(ConfigStore::new(dir.path().join("cfg/config.json")))
            .with_probe(Box::new(HeaderOnly))
    }

    fn spawn_group_leader() -> RunningGame {
        let child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .process_group(0)
            .spawn()
            .unwrap();
        RunningGame::new(child, "sleep 30".to_string())
    }

    fn is_alive(pid: Pid) -> bool {
        signal::kill(pid, None).is_ok()
    }

    #[test]
    fn test_add_infers_name_and_persists() {
        let dir = TempDir::new().unwrap();
        let exe = make_exe(dir.path(), "Foo");
        let mut registry = registry_in(&dir);

        let entry = registry.add(&exe).unwrap();
        assert_eq!(entry.name(), "Foo");
        assert!(entry.record.icon.is_none());
        assert!(entry.state.is_stopped());

        let (_, games) = registry.store().load();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].path, exe);
    }

    #[test]
    fn test_add_picks_up_icon() {
        let dir = TempDir::new().unwrap();
        let exe = make_exe(dir.path(), "Bar");
        fs::write(dir.path().join("Bar/icon.png"), b"png").unwrap();
        let mut registry = registry_in(&dir);

        let entry = registry.add(&exe).unwrap();
        assert_eq!(entry.record.icon, Some(dir.path().join("Bar/icon.png")));
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let dir = TempDir::new().unwrap();
        let exe = make_exe(dir.path(), "Foo");
        let mut registry = registry_in(&dir);

        registry.add(&exe).unwrap();
        for _ in 0..3 {
            assert!(matches!(registry.add(&exe), Err(RegistryError::DuplicatePath(_))));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_non_pe_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("readme.exe");
        fs::write(&fake, b"just text").unwrap();
        let mut registry = registry_in(&dir);

        assert!(matches!(registry.add(&fake), Err(RegistryError::InvalidExecutable(_))));
        assert!(matches!(
            registry.add(dir.path().join("missing.exe")),
            Err(RegistryError::InvalidExecutable(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reorder_persists() {
        let dir = TempDir::new().unwrap();
        let mut registry = registry_in(&dir);
        for name in ["A", "B", "C"] {
            registry.add(make_exe(dir.path(), name)).unwrap();
        }

        registry.reorder(0, 2).unwrap();
        let names: Vec<_> = registry.entries().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);

        let (_, games) = registry.store().load();
        let persisted: Vec<_> = games.iter().map(|g| g.name.clone()).collect();
        assert_eq!(persisted, names);

        assert!(matches!(
            registry.reorder(1, 3),
            Err(RegistryError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_effective_flags_overlay() {
        let dir = TempDir::new().unwrap();
        let exe = make_exe(dir.path(), "Foo");
        let mut registry = registry_in(&dir);
        registry.add(&exe).unwrap();

        registry.set_global_flag("mangohud", "false").unwrap();
        registry.set_global_flag("wineprefix", "/pfx/shared").unwrap();
        registry.set_game_flag(&exe, "mangohud", "true").unwrap();

        let flags = registry.effective_flags(registry.get(&exe).unwrap());
        assert!(flags.mangohud);
        assert_eq!(flags.wineprefix, "/pfx/shared");
        assert_eq!(flags.store, registry.global().flags.store);

        registry.unset_game_flag(&exe, "mangohud").unwrap();
        let flags = registry.effective_flags(registry.get(&exe).unwrap());
        assert!(!flags.mangohud);
    }

    #[test]
    fn test_added_game_launches_without_extras() {
        let dir = TempDir::new().unwrap();
        let exe = make_exe(dir.path(), "Foo");
        let mut registry = registry_in(&dir);
        let entry = registry.add(&exe).unwrap();
        assert_eq!(entry.name(), "Foo");
        assert_eq!(entry.record.icon, None);

        registry.set_global_flag("gamemode", "false").unwrap();
        registry.set_global_flag("mangohud", "false").unwrap();

        let tools = LaunchTools::default();
        let supervisor = ProcessSupervisor::new(tools.clone(), Arc::new(|_: SupervisorEvent| {}));
        let flags = registry.effective_flags(registry.get(&exe).unwrap());
        assert_eq!(
            supervisor.build_command(&exe, &flags),
            vec![tools.runtime_launcher.into_os_string(), exe.clone().into_os_string()]
        );
        assert_eq!(supervisor.build_environment(&flags).store, "egs");

        // The seeded overrides survive a reload
        let reloaded = registry_in(&dir);
        let flags = reloaded.effective_flags(reloaded.get(&exe).unwrap());
        assert!(!flags.virtual_desktop);
        assert!(!flags.fullscreen);
    }

    #[test]
    fn test_load_keeps_entries_with_bad_fields() {
        let dir = TempDir::new().unwrap();
        let exe = make_exe(dir.path(), "Foo");
        let store = ConfigStore::new(dir.path().join("cfg/config.json"));
        fs::create_dir_all(dir.path().join("cfg")).unwrap();
        let document = serde_json::json!({
            "games": [ { "path": exe, "name": null, "icon": null, "flags": null } ]
        });
        fs::write(store.path(), document.to_string()).unwrap();

        let registry = GameRegistry::load(store).with_probe(Box::new(HeaderOnly));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].name(), "Foo");

        let (_, games) = registry.store().load();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].path, exe);
    }

    #[test]
    fn test_remove_stops_running_game() {
        let dir = TempDir::new().unwrap();
        let exe = make_exe(dir.path(), "Foo");
        let mut registry = registry_in(&dir);
        registry.add(&exe).unwrap();

        let game = spawn_group_leader();
        let pid = game.pid;
        registry.get_mut(&exe).unwrap().state.start(game);

        let coordinator = ShutdownCoordinator::new(QuietControl, "umu-run");
        let record = registry.remove(&exe, &coordinator).unwrap();
        assert_eq!(record.path, exe);
        assert!(registry.is_empty());
        assert!(registry.store().load().1.is_empty());

        // SIGTERM to the group ends `sleep`
        let mut gone = false;
        for _ in 0..50 {
            if !is_alive(pid) {
                gone = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(gone);

        assert!(matches!(
            registry.remove(&exe, &coordinator),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_reconcile_keeps_handles_and_orphans_dropped_entries() {
        let dir = TempDir::new().unwrap();
        let kept = make_exe(dir.path(), "Kept");
        let dropped = make_exe(dir.path(), "Dropped");
        let mut registry = registry_in(&dir);
        registry.add(&kept).unwrap();
        registry.add(&dropped).unwrap();

        registry.get_mut(&kept).unwrap().state.start(spawn_group_leader());
        let orphan = spawn_group_leader();
        let orphan_pid = orphan.pid;
        registry.get_mut(&dropped).unwrap().state.start(orphan);

        let fresh = make_exe(dir.path(), "Fresh");
        let summary = registry.reconcile(vec![
            GameRecord::discover(&kept),
            GameRecord::discover(&fresh),
        ]);

        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.orphaned, 1);
        assert!(registry.get_mut(&kept).unwrap().state.is_running());
        assert!(registry.get(&dropped).is_none());
        assert!(registry.get(&fresh).unwrap().state.is_stopped());
        // orphaned, not killed
        assert!(is_alive(orphan_pid));

        let coordinator = ShutdownCoordinator::new(QuietControl, "umu-run");
        coordinator.stop(registry.get_mut(&kept).unwrap());
        let _ = signal::killpg(orphan_pid, Signal::SIGKILL);
    }

    #[test]
    fn test_missing_files_are_hidden_but_kept() {
        let dir = TempDir::new().unwrap();
        let present = make_exe(dir.path(), "Here");
        let gone = dir.path().join("Gone/Gone.exe");
        let store = ConfigStore::new(dir.path().join("cfg/config.json"));
        store
            .save(
                &GlobalConfig::default(),
                &[GameRecord::discover(&gone), GameRecord::discover(&present)],
            )
            .unwrap();

        let mut registry = GameRegistry::load(store).with_probe(Box::new(HeaderOnly));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.unavailable().len(), 1);

        // Re-adding a hidden path is still a duplicate
        assert!(matches!(registry.add(&gone), Err(RegistryError::DuplicatePath(_))));

        registry.rename(&present, "Renamed").unwrap();
        let (_, games) = registry.store().load();
        assert_eq!(games.len(), 2);
        assert!(games.iter().any(|g| g.path == gone));
        assert!(games.iter().any(|g| g.name == "Renamed"));
    }

    #[test]
    fn test_sync_picks_up_external_edits() {
        let dir = TempDir::new().unwrap();
        let a = make_exe(dir.path(), "A");
        let b = make_exe(dir.path(), "B");
        let mut registry = registry_in(&dir);
        registry.add(&a).unwrap();

        let mut global = registry.global().clone();
        global.flags.gamemode = false;
        registry
            .store()
            .save(&global, &[GameRecord::discover(&a), GameRecord::discover(&b), GameRecord::discover(&a)])
            .unwrap();

        let summary = registry.sync_from_store();
        assert_eq!(summary.added, 1);
        assert_eq!(registry.len(), 2);
        assert!(!registry.global().flags.gamemode);
    }
}
