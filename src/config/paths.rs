//! Where formula-clip keeps `settings.toml`.
//!
//! | Platform | Default location                                          |
//! |----------|-----------------------------------------------------------|
//! | Windows  | `%APPDATA%\formula-clip\settings.toml`                    |
//! | macOS    | `~/Library/Application Support/formula-clip/settings.toml` |
//! | Linux    | `~/.config/formula-clip/settings.toml`                    |
//!
//! `--config <file>` replaces the default; the file's parent then counts as
//! the config directory.

use std::path::{Path, PathBuf};

const APP_NAME: &str = "formula-clip";
const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Location of the settings file and the directory that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl AppPaths {
    /// The platform config directory from `dirs`, or `./formula-clip` when
    /// the platform has none.
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(base.join(APP_NAME))
    }

    /// `settings.toml` inside `config_dir`.
    pub fn in_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let settings_file = config_dir.join(SETTINGS_FILE_NAME);
        Self {
            config_dir,
            settings_file,
        }
    }

    /// Honour an explicitly chosen settings file, else the platform default.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        match explicit {
            Some(file) => Self {
                config_dir: file
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
                settings_file: file.to_path_buf(),
            },
            None => Self::new(),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
