//! Interactive console commands.

use std::path::PathBuf;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  list                      Show registered games
  add <path>                Register a Windows executable
  remove <game>             Stop (if running) and unregister a game
  launch <game>             Start a game
  stop <game>               Stop a running game
  kill-all                  Stop every game and sweep stray Wine processes
  move <from> <to>          Reorder the list (1-based positions)
  rename <game> <name>      Change a game's display name
  set <game> <key>=<value>  Override a launch flag for one game
  unset <game> <key>        Drop a per-game override
  global <key>=<value>      Change a global default (or artwork_api_key)
  icons <game>              Look up icons for a game
  reload                    Re-read the config file
  help                      Show this help
  quit                      Stop running games and exit

<game> is a list position or the executable path.";

/// Reference to a registered game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Zero-based list position
    Index(usize),
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Add(PathBuf),
    Remove(Selector),
    Launch(Selector),
    Stop(Selector),
    KillAll,
    Move { from: usize, to: usize },
    Rename { game: Selector, name: String },
    Set { game: Selector, key: String, value: String },
    Unset { game: Selector, key: String },
    Global { key: String, value: String },
    Icons(Selector),
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Positions start at 1")]
    ZeroPosition,
}

/// Parse one console line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => ConsoleCommand::List,
        "add" => ConsoleCommand::Add(expand_user(required(rest, "add <path>")?)),
        "remove" | "rm" => ConsoleCommand::Remove(selector(required(rest, "remove <game>")?)?),
        "launch" | "run" => ConsoleCommand::Launch(selector(required(rest, "launch <game>")?)?),
        "stop" => ConsoleCommand::Stop(selector(required(rest, "stop <game>")?)?),
        "kill-all" | "killall" => ConsoleCommand::KillAll,
        "move" | "mv" => {
            const USAGE: &str = "move <from> <to>";
            let mut parts = rest.split_whitespace();
            let (Some(from), Some(to), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(CommandError::Usage(USAGE));
            };
            ConsoleCommand::Move {
                from: position(from, USAGE)?,
                to: position(to, USAGE)?,
            }
        }
        "rename" => {
            const USAGE: &str = "rename <game> <name>";
            let (game, name) = split_first(rest).ok_or(CommandError::Usage(USAGE))?;
            ConsoleCommand::Rename {
                game: selector(game)?,
                name: name.to_string(),
            }
        }
        "set" => {
            const USAGE: &str = "set <game> <key>=<value>";
            let (game, assignment) = split_first(rest).ok_or(CommandError::Usage(USAGE))?;
            let (key, value) = assignment_pair(assignment).ok_or(CommandError::Usage(USAGE))?;
            ConsoleCommand::Set {
                game: selector(game)?,
                key,
                value,
            }
        }
        "unset" => {
            const USAGE: &str = "unset <game> <key>";
            let (game, key) = split_first(rest).ok_or(CommandError::Usage(USAGE))?;
            ConsoleCommand::Unset {
                game: selector(game)?,
                key: key.to_string(),
            }
        }
        "global" => {
            let (key, value) =
                assignment_pair(rest).ok_or(CommandError::Usage("global <key>=<value>"))?;
            ConsoleCommand::Global { key, value }
        }
        "icons" => ConsoleCommand::Icons(selector(required(rest, "icons <game>")?)?),
        "reload" => ConsoleCommand::Reload,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn required<'a>(rest: &'a str, usage: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest)
    }
}

fn split_first(rest: &str) -> Option<(&str, &str)> {
    let (first, tail) = rest.split_once(char::is_whitespace)?;
    let tail = tail.trim();
    (!tail.is_empty()).then_some((first, tail))
}

fn assignment_pair(text: &str) -> Option<(String, String)> {
    let (key, value) = text.split_once('=')?;
    let key = key.trim();
    (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
}

fn position(text: &str, usage: &'static str) -> Result<usize, CommandError> {
    match text.parse::<usize>() {
        Ok(0) => Err(CommandError::ZeroPosition),
        Ok(n) => Ok(n - 1),
        Err(_) => Err(CommandError::Usage(usage)),
    }
}

fn selector(text: &str) -> Result<Selector, CommandError> {
    if text.chars().all(|c| c.is_ascii_digit()) {
        return position(text, "<game> must be a position or a path").map(Selector::Index);
    }
    Ok(Selector::Path(expand_user(text)))
}

fn expand_user(text: &str) -> PathBuf {
    match text.strip_prefix("~/") {
        Some(rest) => crate::paths::home_dir().join(rest),
        None => PathBuf::from(text),
    }
}
