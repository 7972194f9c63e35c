//! Configuration management for inscomplete
//!
//! This module handles loading, parsing, and managing configuration from:
//! - Configuration files (TOML format)
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::completion::{CompleteOptions, SourceSpec};
use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion behaviour
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Display configuration
    #[serde(default)]
    pub display: DisplayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Options that drive the completion engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Ordered source list, e.g. ".,w,b,kwords.txt^5"
    #[serde(default = "default_complete")]
    pub complete: String,

    /// Comma separated completion options, e.g. "menu,menuone,noinsert"
    #[serde(default = "default_completeopt")]
    pub completeopt: String,

    /// Ignore case when matching
    #[serde(default)]
    pub ignorecase: bool,

    /// Override `ignorecase` when the typed text has upper case
    #[serde(default)]
    pub smartcase: bool,

    /// Adjust the case of the match to the typed text
    #[serde(default)]
    pub infercase: bool,

    /// Word list files for dictionary completion
    #[serde(default)]
    pub dictionary: Vec<String>,

    /// Synonym files for thesaurus completion
    #[serde(default)]
    pub thesaurus: Vec<String>,

    /// Callback used for user defined completion
    #[serde(default)]
    pub completefunc: Option<String>,

    /// Callback used for omni completion
    #[serde(default)]
    pub omnifunc: Option<String>,

    /// Lines or words scanned between checks for typed keys
    #[serde(default = "default_poll_frequency")]
    pub poll_frequency: u32,

    /// Insert two spaces after a sentence end when joining lines
    #[serde(default)]
    pub joinspaces: bool,
}

/// Display and output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Maximum popup menu height, 0 means as many as fit
    #[serde(default)]
    pub pumheight: usize,

    /// Enable colored output
    #[serde(default = "default_colors")]
    pub colors: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_complete() -> String {
    ".,w,b".to_string()
}

fn default_completeopt() -> String {
    "menu,preview".to_string()
}

fn default_poll_frequency() -> u32 {
    50
}

fn default_colors() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            complete: default_complete(),
            completeopt: default_completeopt(),
            ignorecase: false,
            smartcase: false,
            infercase: false,
            dictionary: Vec::new(),
            thesaurus: Vec::new(),
            completefunc: None,
            omnifunc: None,
            poll_frequency: default_poll_frequency(),
            joinspaces: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            pumheight: 0,
            colors: default_colors(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()).into());
        }
        let text = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&text).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicitly given file must exist; a missing default file simply
    /// yields the defaults.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".inscomplete")
            .join("config.toml")
    }

    /// Save configuration to a file
    ///
    /// # Arguments
    /// * `path` - Path where to save the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        CompleteOptions::parse(&self.completion.completeopt)?;
        SourceSpec::parse_list(&self.completion.complete)?;
        if self.completion.poll_frequency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_frequency".into(),
                value: "0".into(),
            }
            .into());
        }
        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.completion.complete, ".,w,b");
        assert_eq!(config.completion.poll_frequency, 50);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [completion]
            completeopt = "menuone,noinsert"
            ignorecase = true
            "#,
        )
        .unwrap();
        assert_eq!(config.completion.completeopt, "menuone,noinsert");
        assert!(config.completion.ignorecase);
        assert_eq!(config.completion.complete, ".,w,b");
        assert!(config.display.colors);
    }

    #[test]
    fn test_validate_rejects_unknown_option() {
        let mut config = Config::default();
        config.completion.completeopt = "menu,sparkles".into();
        assert!(matches!(
            config.validate(),
            Err(CompletionError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.completion.dictionary = vec!["/usr/share/dict/words".into()];
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.completion.dictionary, config.completion.dictionary);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_from_file(Some(Path::new("/nonexistent/inscomplete.toml")));
        assert!(matches!(
            err,
            Err(CompletionError::Config(ConfigError::FileNotFound(_)))
        ));
    }
}
