//! umu-launcher - Windows games on Linux through umu-run
//!
//! Interactive console by default; `--launch` starts one registered game.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use umu_launcher::app::{App, AppEvent};
use umu_launcher::config::ConfigStore;
use umu_launcher::logging::{init_logger, log_info, log_warning, Verbosity};

#[derive(Debug, Parser)]
#[command(name = "umu-launcher", version, about = "Launch Windows games through umu-run")]
struct Cli {
    /// Launch the registered game at PATH and exit when it does
    #[arg(long, value_name = "PATH")]
    launch: Option<PathBuf>,

    /// Config file to use instead of ~/.config/umu-launcher/config.json
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Include debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbosity = if cli.verbose {
        Verbosity::Verbose
    } else if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };
    init_logger(verbosity);
    log_info("umu-launcher starting up...");

    let store = cli
        .config
        .map(ConfigStore::new)
        .unwrap_or_else(ConfigStore::open_default);
    let mut app = App::new(store);

    let interrupt = app.sender();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt.send(AppEvent::Interrupt);
    }) {
        log_warning(&format!("Could not install Ctrl+C handler: {}", e));
    }

    let code = match cli.launch {
        Some(path) => app.run_single(&path),
        None => {
            app.watch_config();
            app.run_interactive()
        }
    };

    ExitCode::from(code as u8)
}
