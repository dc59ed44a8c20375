//! Persisted settings and ignore rules.
//!
//! Settings are stored in a TOML file. Every key is optional:
//!
//! ```toml
//! [watch]
//! directory = "/home/me/Downloads"
//! debounce_ms = 2000
//!
//! [ignore]
//! incomplete_suffixes = [".tmp", ".crdownload", ".part"]
//! filenames = ["desktop.ini"]
//! patterns = ["*.torrent"]
//! regex = []
//! ```
//!
//! The `[ignore]` table is compiled into [`IgnoreRules`], which the sorting
//! engine consults before scheduling a move.

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the per-directory settings file.
pub const LOCAL_CONFIG_FILE: &str = ".dirsort.toml";

/// Default wait before a new file is moved.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Errors that can occur during configuration loading and saving.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Settings could not be rendered as TOML.
    #[error("Could not serialize configuration: {0}")]
    Serialize(String),
    /// IO error while reading or writing configuration.
    #[error("IO error on configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// No directory was given and none is persisted.
    #[error("No watch directory configured; run interactively with --save first")]
    MissingWatchDirectory,
}

/// Top-level settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub ignore: IgnoreSettings,
}

/// The `[watch]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Directory to sort. Chosen and persisted by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Milliseconds to wait after a file appears before moving it.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            directory: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// The `[ignore]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoreSettings {
    /// Name suffixes marking downloads still in progress (case-insensitive).
    #[serde(default = "default_incomplete_suffixes")]
    pub incomplete_suffixes: Vec<String>,

    /// Exact file names that are never moved.
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the file name.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

fn default_incomplete_suffixes() -> Vec<String> {
    [".tmp", ".crdownload", ".part"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for IgnoreSettings {
    fn default() -> Self {
        Self {
            incomplete_suffixes: default_incomplete_suffixes(),
            filenames: Vec::new(),
            patterns: Vec::new(),
            regex: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.dirsort.toml` in the current directory
    /// 3. Look for `~/.config/dirsort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read, or if any discovered file fails to parse.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::locate(config_path) {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Resolves the file [`Settings::load`] would read, if any.
    pub fn locate(config_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = config_path {
            return Some(path.to_path_buf());
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        Self::home_config_path().filter(|path| path.exists())
    }

    /// `~/.config/dirsort/config.toml`, when `HOME` is set.
    pub fn home_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("dirsort")
                .join("config.toml")
        })
    }

    /// Load settings from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::Io` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Writes the settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The persisted watch directory.
    pub fn watch_directory(&self) -> Result<&Path, ConfigError> {
        self.watch
            .directory
            .as_deref()
            .ok_or(ConfigError::MissingWatchDirectory)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch.debounce_ms)
    }

    /// Compile the `[ignore]` table.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn ignore_rules(&self) -> Result<IgnoreRules, ConfigError> {
        IgnoreRules::new(&self.ignore)
    }
}

/// Why a created file was left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Name ends with an incomplete-download marker.
    Incomplete,
    /// Matched a configured filename, glob or regex.
    Excluded,
}

/// Compiled ignore rules.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    incomplete_suffixes: Vec<String>,
    filenames: HashSet<String>,
    patterns: Vec<Pattern>,
    regexes: Vec<Regex>,
}

impl IgnoreRules {
    fn new(settings: &IgnoreSettings) -> Result<Self, ConfigError> {
        let patterns = settings
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let regexes = settings
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            incomplete_suffixes: settings
                .incomplete_suffixes
                .iter()
                .filter(|suffix| !suffix.is_empty())
                .map(|suffix| suffix.to_lowercase())
                .collect(),
            filenames: settings.filenames.iter().cloned().collect(),
            patterns,
            regexes,
        })
    }

    /// True if the file name ends with an incomplete-download marker.
    pub fn is_incomplete(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.incomplete_suffixes
            .iter()
            .any(|suffix| lower.ends_with(suffix.as_str()))
    }

    /// Checks a created file against every rule.
    ///
    /// Incomplete-download markers are checked first, then exact names,
    /// globs and regexes. Returns `None` when the file should be sorted.
    pub fn check(&self, file_path: &Path) -> Option<IgnoreReason> {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.is_incomplete(&file_name) {
            return Some(IgnoreReason::Incomplete);
        }

        if self.filenames.contains(file_name.as_ref())
            || self.patterns.iter().any(|p| p.matches(&file_name))
            || self.regexes.iter().any(|r| r.is_match(&file_name))
        {
            return Some(IgnoreReason::Excluded);
        }

        None
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            incomplete_suffixes: default_incomplete_suffixes(),
            filenames: HashSet::new(),
            patterns: Vec::new(),
            regexes: Vec::new(),
        }
    }
}
