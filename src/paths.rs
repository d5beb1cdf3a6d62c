use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Directory name used under the per-user config and cache roots.
pub const APP_DIR: &str = "umu-launcher";

pub static DEFAULT_CONFIG_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    let mut path = dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"));
    path.push(APP_DIR);
    path
});

pub static DEFAULT_CACHE_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    let mut path = dirs::cache_dir().unwrap_or_else(|| home_dir().join(".cache"));
    path.push(APP_DIR);
    path
});

/// Computes a path inside the launcher config directory.
///
/// Returns a `&Path` referencing the config directory itself if no arguments are passed in, or a
/// `PathBuf` created by joining all of the arguments to the base config directory if at least
/// one argument is passed in.
///
/// # Examples
///
/// ```
/// use umu_launcher::launcher_path;
///
/// let dir = launcher_path!();
/// assert!(dir.ends_with("umu-launcher"));
/// assert_eq!(launcher_path!("config.json"), dir.join("config.json"));
/// ```
#[macro_export]
macro_rules! launcher_path {
    () => {
        $crate::paths::DEFAULT_CONFIG_DIR.as_path()
    };

    ( $( $path:expr ),+ $(,)? ) => {
        [
            $crate::paths::DEFAULT_CONFIG_DIR.as_path(),
            $( std::path::Path::new(&$path) ),+
        ].into_iter().collect::<std::path::PathBuf>()
    };
}

pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

/// Default config document location
pub fn default_config_file() -> PathBuf {
    launcher_path!("config.json")
}

/// Directory for per-run launcher logs
pub fn log_dir() -> PathBuf {
    DEFAULT_CACHE_DIR.join("logs")
}

/// Prefix used when a game's `wineprefix` flag is blank.
pub fn default_wineprefix(home: &Path) -> PathBuf {
    home.join(".wine")
}

/// Compatibility tool used when a game's `protonpath` flag is blank.
pub fn default_protonpath(home: &Path) -> PathBuf {
    home.join(".local/share/Steam/compatibilitytools.d/UMU-Latest")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_rooted_at_home() {
        let home = Path::new("/home/player");
        assert_eq!(default_wineprefix(home), PathBuf::from("/home/player/.wine"));
        assert_eq!(
            default_protonpath(home),
            PathBuf::from("/home/player/.local/share/Steam/compatibilitytools.d/UMU-Latest")
        );
    }

    #[test]
    fn test_launcher_path_macro() {
        assert!(launcher_path!().ends_with(APP_DIR));
        assert_eq!(
            launcher_path!("a", "b.json"),
            DEFAULT_CONFIG_DIR.join("a").join("b.json")
        );
    }
}
