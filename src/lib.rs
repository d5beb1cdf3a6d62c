//! umu-launcher - Windows games on Linux through umu-run
//!
//! Library crate for the launcher core: config store, game registry, process
//! supervision and shutdown. The console front-end lives in the binary.

pub mod app;
#[cfg(feature = "artwork")]
pub mod artwork;
pub mod commands;
pub mod config;
pub mod error;
pub mod exe_check;
pub mod games;
pub mod logging;
pub mod paths;
pub mod process;
pub mod runtime_wrap;
pub mod watcher;
