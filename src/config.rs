use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, RegistryError};
use crate::logging::{log_debug, log_error, log_info, log_warning};
use crate::watcher::ConfigWatcher;

/// Game id handed to the runtime when no override is configured
pub const DEFAULT_GAMEID: &str = "umu-dauntless";
pub const DEFAULT_STORE: &str = "egs";

// ============================================================================
// Launch Flags
// ============================================================================

/// Global launch defaults. Every key has a value here; per-game overrides
/// only carry the keys they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchFlags {
    pub gamemode: bool,
    pub mangohud: bool,
    pub fullscreen: bool,
    pub borderless: bool,
    pub virtual_desktop: bool,
    pub virtual_desktop_width: u32,
    pub virtual_desktop_height: u32,
    pub additional_flags: String,
    pub wineprefix: String,
    pub protonpath: String,
    pub store: String,
    pub gameid: String,
    /// Keys this version does not know about, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LaunchFlags {
    fn default() -> Self {
        Self {
            gamemode: true,
            mangohud: true,
            fullscreen: true,
            borderless: true,
            virtual_desktop: true,
            virtual_desktop_width: 1920,
            virtual_desktop_height: 1080,
            additional_flags: String::new(),
            wineprefix: String::new(),
            protonpath: String::new(),
            store: DEFAULT_STORE.to_string(),
            gameid: DEFAULT_GAMEID.to_string(),
            extra: Map::new(),
        }
    }
}

impl LaunchFlags {
    /// Shallow per-key overlay of `overrides` on top of these defaults.
    pub fn overlay(&self, overrides: &FlagOverrides) -> LaunchFlags {
        if overrides.is_empty() {
            return self.clone();
        }

        let Ok(Value::Object(mut merged)) = serde_json::to_value(self) else {
            return self.clone();
        };
        merge_tolerant(&mut merged, overrides.0.clone(), "game flags");

        serde_json::from_value(Value::Object(merged)).unwrap_or_else(|e| {
            log_warning(&format!("Ignoring game flag overrides: {}", e));
            self.clone()
        })
    }

    /// Set a global default from its textual form (console `global key=value`).
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), RegistryError> {
        let value = parse_flag_value(key, raw)?;
        let mut overrides = FlagOverrides::default();
        overrides.0.insert(key.to_string(), value);
        *self = self.overlay(&overrides);
        Ok(())
    }
}

/// Per-game flag overrides: only explicitly set keys are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagOverrides(Map<String, Value>);

impl FlagOverrides {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Parse `raw` according to the type of `key` and store it as an override.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), RegistryError> {
        let value = parse_flag_value(key, raw)?;
        self.0.insert(key.to_string(), value);
        Ok(())
    }

    /// Overrides written for a newly added or upgraded game: no wrappers,
    /// no display-mode flags, no extra arguments.
    pub fn for_new_game() -> Self {
        let mut map = Map::new();
        for key in ["gamemode", "mangohud", "fullscreen", "virtual_desktop", "borderless"] {
            map.insert(key.to_string(), Value::Bool(false));
        }
        map.insert("additional_flags".to_string(), Value::String(String::new()));
        Self(map)
    }

    /// Keep loaded overrides whose type matches the flag; unknown keys pass through.
    fn from_loaded(raw: Map<String, Value>, context: &str) -> Self {
        let kept = raw
            .into_iter()
            .filter(|(key, value)| match flag_template(key) {
                Some(template) if !same_kind(&template, value) => {
                    log_warning(&format!(
                        "{}: dropping override '{}' with the wrong type ({})",
                        context, key, value
                    ));
                    false
                }
                _ => true,
            })
            .collect();
        Self(kept)
    }

    /// Drop an override so the global default applies again.
    pub fn unset(&mut self, key: &str) -> Result<(), RegistryError> {
        if flag_template(key).is_none() {
            return Err(RegistryError::UnknownFlag(key.to_string()));
        }
        self.0.remove(key);
        Ok(())
    }
}

/// Default value for a known flag key, used as its type template.
fn flag_template(key: &str) -> Option<Value> {
    match serde_json::to_value(LaunchFlags::default()) {
        Ok(Value::Object(mut map)) => map.remove(key),
        _ => None,
    }
}

fn parse_flag_value(key: &str, raw: &str) -> Result<Value, RegistryError> {
    let template = flag_template(key).ok_or_else(|| RegistryError::UnknownFlag(key.to_string()))?;
    let invalid = || RegistryError::InvalidFlagValue {
        key: key.to_string(),
        value: raw.to_string(),
    };
    let trimmed = raw.trim();

    match template {
        Value::Bool(_) => match trimmed.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        Value::Number(_) => trimmed
            .parse::<u32>()
            .map(Value::from)
            .map_err(|_| invalid()),
        _ => Ok(Value::String(trimmed.to_string())),
    }
}

fn same_kind(default: &Value, candidate: &Value) -> bool {
    match (default, candidate) {
        (Value::Bool(_), Value::Bool(_)) => true,
        (Value::String(_), Value::String(_)) => true,
        (Value::Array(_), Value::Array(_)) => true,
        (Value::Object(_), Value::Object(_)) => true,
        (Value::Number(d), Value::Number(c)) if d.is_u64() => {
            c.as_u64().is_some_and(|n| n <= u64::from(u32::MAX))
        }
        (Value::Number(_), Value::Number(_)) => true,
        _ => false,
    }
}

/// Overlay `loaded` onto `defaults` key by key.
///
/// Values whose JSON type differs from the default are dropped with a warning;
/// keys with no default are kept verbatim. Returns true if anything was dropped.
pub(crate) fn merge_tolerant(
    defaults: &mut Map<String, Value>,
    loaded: Map<String, Value>,
    context: &str,
) -> bool {
    let mut rejected = false;

    for (key, value) in loaded {
        match defaults.get_mut(&key) {
            Some(Value::Object(nested)) => {
                if let Value::Object(loaded_nested) = value {
                    rejected |= merge_tolerant(nested, loaded_nested, &key);
                } else {
                    log_warning(&format!("{}: '{}' must be an object, keeping defaults", context, key));
                    rejected = true;
                }
            }
            Some(slot) => {
                if same_kind(slot, &value) {
                    *slot = value;
                } else {
                    log_warning(&format!(
                        "{}: '{}' has the wrong type ({}), keeping default {}",
                        context, key, value, slot
                    ));
                    rejected = true;
                }
            }
            None => {
                defaults.insert(key, value);
            }
        }
    }

    rejected
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub flags: LaunchFlags,
    /// Credential for the artwork service; not used by the launch path
    pub artwork_api_key: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Persisted form of a registered game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub path: PathBuf,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<PathBuf>,
    #[serde(default)]
    pub flags: FlagOverrides,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameRecord {
    /// Build a record for a bare executable path, inferring name and icon.
    pub fn discover(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: infer_name(&path),
            icon: infer_icon(&path),
            path,
            flags: FlagOverrides::for_new_game(),
            extra: Map::new(),
        }
    }

    /// Read one stored game object. Only a missing or non-string `path`
    /// rejects the entry; any other bad field falls back on its own.
    fn from_loaded(mut raw: Map<String, Value>) -> Option<Self> {
        let path = match raw.remove("path") {
            Some(Value::String(path)) if !path.trim().is_empty() => PathBuf::from(path),
            other => {
                log_warning(&format!(
                    "Skipping game entry without a path: {}",
                    other.unwrap_or(Value::Null)
                ));
                return None;
            }
        };
        let context = path.display().to_string();
        let wrong_type = |field: &str, value: &Value| {
            log_warning(&format!(
                "{}: '{}' has the wrong type ({}), using default",
                context, field, value
            ));
        };

        let name = match raw.remove("name") {
            Some(Value::String(name)) => name,
            None | Some(Value::Null) => String::new(),
            Some(other) => {
                wrong_type("name", &other);
                String::new()
            }
        };
        let icon = match raw.remove("icon") {
            Some(Value::String(icon)) if !icon.is_empty() => Some(PathBuf::from(icon)),
            None | Some(Value::Null) | Some(Value::String(_)) => None,
            Some(other) => {
                wrong_type("icon", &other);
                None
            }
        };
        let flags = match raw.remove("flags") {
            Some(Value::Object(flags)) => FlagOverrides::from_loaded(flags, &context),
            None | Some(Value::Null) => FlagOverrides::default(),
            Some(other) => {
                wrong_type("flags", &other);
                FlagOverrides::default()
            }
        };

        Some(
            Self {
                path,
                name,
                icon,
                flags,
                extra: raw,
            }
            .normalize(),
        )
    }

    fn normalize(mut self) -> Self {
        if self.name.trim().is_empty() {
            self.name = infer_name(&self.path);
        }
        self
    }
}

/// Game name from the executable's parent directory
pub fn infer_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .or_else(|| path.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// `icon.png` next to the executable, if present
pub fn infer_icon(path: &Path) -> Option<PathBuf> {
    let icon = path.parent()?.join("icon.png");
    icon.is_file().then_some(icon)
}

/// Result of normalising a raw config document
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub global: GlobalConfig,
    pub games: Vec<GameRecord>,
    /// Legacy entries were upgraded to records
    pub migrated: bool,
    /// The normalised document differs from the one on disk
    pub needs_save: bool,
}

impl LoadedDocument {
    pub fn from_raw(raw: Map<String, Value>) -> Self {
        let as_loaded = Value::Object(raw.clone());
        let mut rest = raw;

        let raw_games = rest.remove("games");
        if let Some(legacy_key) = rest.remove("steamgriddb_api_key") {
            rest.entry("artwork_api_key").or_insert(legacy_key);
        }

        let global = Self::parse_global(rest);
        let (games, migrated) = Self::parse_games(raw_games);

        let needs_save = match to_document(&global, &games) {
            Ok(normalised) => normalised != as_loaded,
            Err(_) => true,
        };

        Self {
            global,
            games,
            migrated,
            needs_save,
        }
    }

    fn parse_global(raw: Map<String, Value>) -> GlobalConfig {
        let Ok(Value::Object(mut merged)) = serde_json::to_value(GlobalConfig::default()) else {
            return GlobalConfig::default();
        };
        merge_tolerant(&mut merged, raw, "config");

        serde_json::from_value(Value::Object(merged)).unwrap_or_else(|e| {
            log_warning(&format!("Unusable global settings, using defaults: {}", e));
            GlobalConfig::default()
        })
    }

    fn parse_games(raw: Option<Value>) -> (Vec<GameRecord>, bool) {
        let items = match raw {
            None | Some(Value::Null) => return (Vec::new(), false),
            Some(Value::Array(items)) => items,
            Some(other) => {
                log_warning(&format!("'games' must be a list, ignoring: {}", other));
                return (Vec::new(), false);
            }
        };

        let mut migrated = false;
        let mut games = Vec::with_capacity(items.len());

        for item in items {
            match item {
                // Old format: the entry is just the executable path
                Value::String(path) => {
                    log_info(&format!("Upgrading legacy game entry: {}", path));
                    games.push(GameRecord::discover(path));
                    migrated = true;
                }
                Value::Object(fields) => games.extend(GameRecord::from_loaded(fields)),
                other => log_warning(&format!("Skipping malformed game entry: {}", other)),
            }
        }

        (games, migrated)
    }
}

fn to_document(global: &GlobalConfig, games: &[GameRecord]) -> Result<Value, serde_json::Error> {
    let mut document = serde_json::to_value(global)?;
    if let Value::Object(ref mut map) = document {
        map.insert("games".to_string(), serde_json::to_value(games)?);
    }
    Ok(document)
}

// ============================================================================
// Config Store
// ============================================================================

/// Owner of the on-disk JSON document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.config/umu-launcher/config.json`
    pub fn open_default() -> Self {
        Self::new(crate::paths::default_config_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, falling back to defaults on any failure.
    ///
    /// Missing files, legacy entries and missing keys cause the normalised
    /// document to be written back.
    pub fn load(&self) -> (GlobalConfig, Vec<GameRecord>) {
        match self.try_load() {
            Ok(document) => {
                if document.needs_save {
                    if let Err(e) = self.save(&document.global, &document.games) {
                        log_error(&format!("Error saving config: {}", e));
                    }
                }
                (document.global, document.games)
            }
            Err(e) => {
                log_error(&format!("Error loading config: {}", e));
                self.recover(&e);
                (GlobalConfig::default(), Vec::new())
            }
        }
    }

    pub fn try_load(&self) -> Result<LoadedDocument, ConfigError> {
        if !self.path.exists() {
            log_info(&format!("Creating default config at {}", self.path.display()));
            return Ok(LoadedDocument {
                global: GlobalConfig::default(),
                games: Vec::new(),
                migrated: false,
                needs_save: true,
            });
        }

        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        let raw: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        let Value::Object(raw) = raw else {
            return Err(ConfigError::NotAnObject(self.path.clone()));
        };

        Ok(LoadedDocument::from_raw(raw))
    }

    /// Keep an unreadable document aside and start over with defaults.
    fn recover(&self, error: &ConfigError) {
        if !matches!(error, ConfigError::Json { .. } | ConfigError::NotAnObject(_)) {
            return;
        }

        let backup = self.path.with_extension("json.bak");
        match fs::rename(&self.path, &backup) {
            Ok(()) => log_warning(&format!("Corrupt config moved to {}", backup.display())),
            Err(e) => log_warning(&format!("Could not back up corrupt config: {}", e)),
        }

        if let Err(e) = self.save(&GlobalConfig::default(), &[]) {
            log_error(&format!("Error saving config: {}", e));
        }
    }

    /// Overwrite the document with the given state (temp file + rename).
    pub fn save(&self, global: &GlobalConfig, games: &[GameRecord]) -> Result<(), ConfigError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;

        let document = to_document(global, games).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        let mut json = serde_json::to_string_pretty(&document).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        json.push('\n');

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|source| ConfigError::Persist {
            path: self.path.clone(),
            source,
        })?;

        log_debug("Configuration saved successfully");
        Ok(())
    }

    /// Watch the document for external edits; `on_changed` fires once per
    /// burst, 500 ms after the last change.
    pub fn watch<F>(&self, on_changed: F) -> Result<ConfigWatcher, ConfigError>
    where
        F: Fn() + Send + 'static,
    {
        ConfigWatcher::spawn(&self.path, on_changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("config.json"))
    }

    fn write_raw(store: &ConfigStore, value: &Value) {
        fs::write(store.path(), serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn read_raw(store: &ConfigStore) -> Value {
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap()
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let (global, games) = store.load();
        assert_eq!(global, GlobalConfig::default());
        assert!(games.is_empty());
        assert!(store.path().exists());

        let raw = read_raw(&store);
        assert_eq!(raw["flags"]["store"], json!("egs"));
        assert_eq!(raw["games"], json!([]));
    }

    #[test]
    fn test_missing_keys_fall_back_field_by_field() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_raw(
            &store,
            &json!({
                "flags": { "mangohud": false, "gamemode": "yes", "console": true },
                "theme": "dark"
            }),
        );

        let (global, _) = store.load();
        assert!(!global.flags.mangohud);
        // wrong type keeps the default
        assert!(global.flags.gamemode);
        assert!(global.flags.fullscreen);
        assert_eq!(global.flags.virtual_desktop_width, 1920);
        assert_eq!(global.flags.extra.get("console"), Some(&json!(true)));
        assert_eq!(global.extra.get("theme"), Some(&json!("dark")));

        // unknown keys survive the write-back
        let raw = read_raw(&store);
        assert_eq!(raw["theme"], json!("dark"));
        assert_eq!(raw["flags"]["console"], json!(true));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut global = GlobalConfig::default();
        global.flags.mangohud = false;
        global.artwork_api_key = "secret".to_string();

        let mut record = GameRecord::discover("/games/Foo/Foo.exe");
        record.flags.set("fullscreen", "false").unwrap();
        record.icon = Some(PathBuf::from("/games/Foo/icon.png"));
        let games = vec![record, GameRecord::discover("/games/Bar/bar.exe")];

        store.save(&global, &games).unwrap();
        let document = store.try_load().unwrap();

        assert_eq!(document.global, global);
        assert_eq!(document.games, games);
        assert!(!document.needs_save);
    }

    #[test]
    fn test_legacy_entries_are_upgraded_idempotently() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_raw(
            &store,
            &json!({
                "games": [
                    "/games/Foo/Foo.exe",
                    { "path": "/games/Bar/bar.exe", "name": "Bar!", "icon": null, "flags": {} }
                ],
                "flags": {}
            }),
        );

        let first = store.try_load().unwrap();
        assert!(first.migrated);
        assert_eq!(first.games[0].name, "Foo");
        assert_eq!(first.games[0].path, PathBuf::from("/games/Foo/Foo.exe"));
        assert_eq!(first.games[0].flags, FlagOverrides::for_new_game());
        assert_eq!(first.games[1].name, "Bar!");

        // load() persists the migration
        let (_, games) = store.load();
        assert_eq!(games, first.games);
        assert!(read_raw(&store)["games"][0].is_object());

        let second = store.try_load().unwrap();
        assert!(!second.migrated);
        assert!(!second.needs_save);
        assert_eq!(second.games, first.games);
    }

    #[test]
    fn test_legacy_api_key_name_is_accepted() {
        let raw = json!({ "steamgriddb_api_key": "abc" });
        let Value::Object(raw) = raw else { unreachable!() };
        let document = LoadedDocument::from_raw(raw);
        assert_eq!(document.global.artwork_api_key, "abc");
        assert!(document.needs_save);
    }

    #[test]
    fn test_corrupt_file_uses_defaults_and_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{ not json").unwrap();

        let (global, games) = store.load();
        assert_eq!(global, GlobalConfig::default());
        assert!(games.is_empty());
        assert!(dir.path().join("config.json.bak").exists());
        assert!(read_raw(&store).is_object());
    }

    #[test]
    fn test_empty_name_is_inferred_from_parent_dir() {
        let raw = json!({ "games": [ { "path": "/games/Witcher/bin/game.exe" } ] });
        let Value::Object(raw) = raw else { unreachable!() };
        let document = LoadedDocument::from_raw(raw);
        assert_eq!(document.games[0].name, "bin");
        assert!(document.games[0].flags.is_empty());
    }

    #[test]
    fn test_bad_game_fields_fall_back_individually() {
        let raw = json!({
            "games": [
                { "path": "/games/Foo/Foo.exe", "name": null, "icon": 5, "flags": null },
                {
                    "path": "/games/Bar/Bar.exe",
                    "name": "Bar",
                    "flags": { "fullscreen": "yes", "mangohud": false, "virtual_desktop_width": -1 },
                    "playtime": 12
                },
                { "name": "No Path" },
                { "path": 7 }
            ]
        });
        let Value::Object(raw) = raw else { unreachable!() };
        let document = LoadedDocument::from_raw(raw);

        assert_eq!(document.games.len(), 2);
        let foo = &document.games[0];
        assert_eq!(foo.name, "Foo");
        assert_eq!(foo.icon, None);
        assert!(foo.flags.is_empty());

        let bar = &document.games[1];
        assert_eq!(bar.name, "Bar");
        assert_eq!(bar.flags.get("fullscreen"), None);
        assert_eq!(bar.flags.get("virtual_desktop_width"), None);
        assert_eq!(bar.flags.get("mangohud"), Some(&json!(false)));
        assert_eq!(bar.extra.get("playtime"), Some(&json!(12)));
        assert!(document.needs_save);
    }

    #[test]
    fn test_discovered_records_switch_extras_off() {
        let record = GameRecord::discover("/games/Foo/Foo.exe");
        let mut global = LaunchFlags::default();
        global.additional_flags = "-dx11".to_string();

        let effective = global.overlay(&record.flags);
        assert!(!effective.gamemode);
        assert!(!effective.mangohud);
        assert!(!effective.fullscreen);
        assert!(!effective.borderless);
        assert!(!effective.virtual_desktop);
        assert!(effective.additional_flags.is_empty());
        assert_eq!(effective.store, DEFAULT_STORE);
    }

    #[test]
    fn test_overlay_is_per_key() {
        let mut global = LaunchFlags::default();
        global.mangohud = false;
        global.fullscreen = true;

        let mut overrides = FlagOverrides::default();
        overrides.set("mangohud", "true").unwrap();

        let effective = global.overlay(&overrides);
        assert!(effective.mangohud);
        assert!(effective.fullscreen);
        assert_eq!(effective.store, global.store);
        assert_eq!(effective.gamemode, global.gamemode);
    }

    #[test]
    fn test_flag_parsing() {
        let mut overrides = FlagOverrides::default();
        overrides.set("virtual_desktop_width", "2560").unwrap();
        overrides.set("store", " gog ").unwrap();
        overrides.set("borderless", "off").unwrap();
        assert_eq!(overrides.get("virtual_desktop_width"), Some(&json!(2560)));
        assert_eq!(overrides.get("store"), Some(&json!("gog")));
        assert_eq!(overrides.get("borderless"), Some(&json!(false)));

        assert!(matches!(
            overrides.set("virtual_desktop_width", "wide"),
            Err(RegistryError::InvalidFlagValue { .. })
        ));
        assert!(matches!(
            overrides.set("turbo", "1"),
            Err(RegistryError::UnknownFlag(_))
        ));

        overrides.unset("store").unwrap();
        assert!(overrides.get("store").is_none());
    }

    #[test]
    fn test_global_set() {
        let mut flags = LaunchFlags::default();
        flags.set("gamemode", "false").unwrap();
        flags.set("protonpath", "/opt/proton").unwrap();
        assert!(!flags.gamemode);
        assert_eq!(flags.protonpath, "/opt/proton");
    }
}
