//! Persistent application configuration model and defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] io::Error),
    #[error("config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration read from `config.toml`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    /// Binary metadata database location.
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,
    /// Directory holding `*.playlist` files.
    #[serde(default = "default_playlist_dir")]
    pub playlist_dir: PathBuf,
    /// Whether filter queries also match against filenames.
    #[serde(default)]
    pub match_filename: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            db_file: default_db_file(),
            playlist_dir: default_playlist_dir(),
            match_filename: false,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunedeck")
}

fn default_db_file() -> PathBuf {
    data_dir().join("library.db")
}

fn default_playlist_dir() -> PathBuf {
    data_dir().join("playlists")
}

/// Default config file location (`~/.config/tunedeck/config.toml` on Linux).
pub fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunedeck")
        .join("config.toml")
}

impl Config {
    /// Loads the config file at `path`, or falls back to defaults when the
    /// file does not exist. A file that exists but does not parse is an
    /// error, not a silent fallback.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
