//! Configuration for the collector.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.espree/config.toml` or `--config`
//! - Serial line, screen geometry and menu navigation settings
//!
//! # Configuration File
//!
//! Every section is optional; missing keys take their defaults:
//!
//! ```toml
//! # Reported as the `name` tag (default: host name)
//! name = "scanner-3"
//!
//! [serial]
//! port = "COM1"
//! baud_rate = 9600
//! timeout_ms = 2000
//!
//! [screen]
//! rows = 24
//! cols = 120
//!
//! [menu]
//! key_delay_ms = 2000
//! keys = ["esc", "enter", "r", "enter"]
//! response_bytes = 4000
//!
//! [log]
//! level = "info"
//! file = ""
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::term::emulator::{KEY_ENTER, KEY_ESCAPE};
use crate::core::term::GridSize;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Machine name reported with every reading
    pub name: String,
    pub serial: SerialConfig,
    pub screen: ScreenConfig,
    pub menu: MenuConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            serial: SerialConfig::default(),
            screen: ScreenConfig::default(),
            menu: MenuConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout; a timeout ends the response window
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            baud_rate: 9600,
            timeout_ms: 2000,
        }
    }
}

/// Screen geometry of the panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub rows: usize,
    pub cols: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        let size = GridSize::default();
        Self {
            rows: size.rows,
            cols: size.cols,
        }
    }
}

impl ScreenConfig {
    pub fn grid_size(&self) -> GridSize {
        GridSize::new(self.rows.max(1), self.cols.max(1))
    }
}

/// Keystroke script that brings the data page up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Fixed pause after every keystroke
    pub key_delay_ms: u64,
    pub keys: Vec<MenuKey>,
    /// Size of the response window decoded after the last key
    pub response_bytes: usize,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            key_delay_ms: 2000,
            keys: vec![
                MenuKey::Escape,
                MenuKey::Enter,
                MenuKey::Char(b'r'),
                MenuKey::Enter,
            ],
            response_bytes: 4000,
        }
    }
}

impl MenuConfig {
    pub fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }
}

/// One keystroke: `"esc"`, `"enter"` or a single character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MenuKey {
    Escape,
    Enter,
    Char(u8),
}

impl MenuKey {
    pub fn byte(self) -> u8 {
        match self {
            MenuKey::Escape => KEY_ESCAPE,
            MenuKey::Enter => KEY_ENTER,
            MenuKey::Char(b) => b,
        }
    }
}

impl TryFrom<String> for MenuKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "esc" | "escape" => return Ok(MenuKey::Escape),
            "enter" | "return" => return Ok(MenuKey::Enter),
            _ => {}
        }
        match value.as_bytes() {
            [b] if b.is_ascii() && !b.is_ascii_control() => Ok(MenuKey::Char(*b)),
            _ => Err(format!(
                "invalid menu key {:?}: expected \"esc\", \"enter\" or one ASCII character",
                value
            )),
        }
    }
}

impl From<MenuKey> for String {
    fn from(key: MenuKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for MenuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuKey::Escape => f.write_str("esc"),
            MenuKey::Enter => f.write_str("enter"),
            MenuKey::Char(b) => write!(f, "{}", *b as char),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Log file; empty logs to stderr
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: String::new(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the per-user file when `path` is `None`.
    /// A missing per-user file yields the defaults; a missing explicit path
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::get_config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".espree").join("config.toml"))
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) {
        "COM1"
    } else {
        "/dev/ttyS0"
    }
}

fn default_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "espree".to_string())
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_panel() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.screen.grid_size(), GridSize::new(24, 120));
        assert_eq!(config.menu.response_bytes, 4000);
        assert_eq!(
            config.menu.keys.iter().map(|k| k.byte()).collect::<Vec<_>>(),
            vec![27, 13, b'r', 13]
        );
        assert!(!config.name.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name = \"scanner-3\"\n[serial]\nport = \"COM4\"\n[menu]\nkeys = [\"ESC\", \"enter\", \"s\"]"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.name, "scanner-3");
        assert_eq!(config.serial.port, "COM4");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(
            config.menu.keys,
            vec![MenuKey::Escape, MenuKey::Enter, MenuKey::Char(b's')]
        );
        assert_eq!(config.menu.key_delay_ms, 2000);
        assert_eq!(config.screen, ScreenConfig::default());
    }

    #[test]
    fn test_bad_key_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[menu]\nkeys = [\"ctrl-c\"]").unwrap();

        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("keys = ["));
        assert_eq!(toml::from_str::<Config>(&text).unwrap(), config);
    }
}
