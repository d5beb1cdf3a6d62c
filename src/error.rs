use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Config document is not a JSON object: {0}")]
    NotAnObject(PathBuf),
    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("This game is already in your library: {0}")]
    DuplicatePath(PathBuf),
    #[error("Selected file is not a valid Windows executable: {0}")]
    InvalidExecutable(PathBuf),
    #[error("Game not found in registry: {0}")]
    NotFound(String),
    #[error("Index {index} out of range (library has {len} games)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Unknown flag: {0}")]
    UnknownFlag(String),
    #[error("Invalid value '{value}' for flag {key}")]
    InvalidFlagValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("PROTONPATH directory does not exist: {0}")]
    MissingProtonPath(PathBuf),
    #[error("Game executable does not exist: {0}")]
    MissingExecutable(PathBuf),
    #[error("Game not found in configuration: {0}")]
    NotRegistered(PathBuf),
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}
