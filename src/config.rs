//! Configuration Module
//!
//! Cache and logger configuration, plus the single ambient environment signal.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Environment variable selecting development or production defaults.
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

// == Environment ==
/// Deployment environment, used to pick logger verbosity and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Reads the environment from `APP_ENV`.
    ///
    /// Anything other than `production`/`prod` (case-insensitive), including
    /// an unset variable, means development.
    pub fn from_env() -> Self {
        env::var(ENVIRONMENT_VAR)
            .ok()
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// Maps a raw environment name to an `Environment`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

// == Cache Config ==
/// Tunable parameters of the cache engine. Times are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Byte budget across all entries
    pub max_size: usize,
    /// Entry count budget
    pub max_entries: usize,
    /// TTL applied when `set` gets none
    pub default_ttl: u64,
    /// Period of the background expiry sweep
    pub cleanup_interval: u64,
    /// Run-length encode long text payloads
    pub enable_compression: bool,
    /// Snapshot the cache to the durable store after each mutation
    pub enable_persistence: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 50 * 1024 * 1024,
            max_entries: 1000,
            default_ttl: 30 * 60 * 1000,
            cleanup_interval: 5 * 60 * 1000,
            enable_compression: true,
            enable_persistence: false,
        }
    }
}

impl CacheConfig {
    /// Merges every field set in `update` into this config.
    pub fn apply(&mut self, update: CacheConfigUpdate) {
        if let Some(v) = update.max_size {
            self.max_size = v;
        }
        if let Some(v) = update.max_entries {
            self.max_entries = v;
        }
        if let Some(v) = update.default_ttl {
            self.default_ttl = v;
        }
        if let Some(v) = update.cleanup_interval {
            self.cleanup_interval = v;
        }
        if let Some(v) = update.enable_compression {
            self.enable_compression = v;
        }
        if let Some(v) = update.enable_persistence {
            self.enable_persistence = v;
        }
    }
}

// == Cache Config Update ==
/// Partial cache configuration; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfigUpdate {
    pub max_size: Option<usize>,
    pub max_entries: Option<usize>,
    pub default_ttl: Option<u64>,
    pub cleanup_interval: Option<u64>,
    pub enable_compression: Option<bool>,
    pub enable_persistence: Option<bool>,
}

// == Logger Config ==
/// Logger behaviour and output selection.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerConfig {
    /// Minimum level emitted
    pub level: LogLevel,
    pub enable_console: bool,
    pub enable_file: bool,
    pub enable_remote: bool,
    /// Rotate the active log file past this many bytes
    pub max_file_size: u64,
    /// Rotated files kept besides the active one
    pub max_files: usize,
    pub log_directory: PathBuf,
    pub remote_endpoint: Option<String>,
    /// Attach a captured backtrace to ERROR and CRITICAL entries
    pub include_stack_trace: bool,
    /// Carry context maps into entries
    pub include_context: bool,
    /// ANSI colours on console output
    pub colorize: bool,
    /// Value of `source` on every entry
    pub source: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_console: true,
            enable_file: false,
            enable_remote: false,
            max_file_size: 10 * 1024 * 1024,
            max_files: 5,
            log_directory: PathBuf::from("logs"),
            remote_endpoint: None,
            include_stack_trace: true,
            include_context: true,
            colorize: true,
            source: None,
        }
    }
}

impl LoggerConfig {
    /// Default verbosity and output set for an environment.
    ///
    /// Development logs everything to a coloured console. Production logs
    /// INFO and above to a plain console and to rotating files.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                level: LogLevel::Debug,
                colorize: true,
                ..Self::default()
            },
            Environment::Production => Self {
                level: LogLevel::Info,
                enable_file: true,
                colorize: false,
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.max_size, 50 * 1024 * 1024);
        assert_eq!(config.default_ttl, 1_800_000);
        assert_eq!(config.cleanup_interval, 300_000);
        assert!(config.enable_compression);
        assert!(!config.enable_persistence);
    }

    #[test]
    fn test_cache_config_apply_partial() {
        let mut config = CacheConfig::default();
        config.apply(CacheConfigUpdate {
            max_entries: Some(2),
            enable_persistence: Some(true),
            ..Default::default()
        });

        assert_eq!(config.max_entries, 2);
        assert!(config.enable_persistence);
        assert_eq!(config.default_ttl, CacheConfig::default().default_ttl);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("development"), Environment::Development);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }

    #[test]
    fn test_environment_from_env_default() {
        env::remove_var(ENVIRONMENT_VAR);
        assert_eq!(Environment::from_env(), Environment::Development);
    }

    #[test]
    fn test_logger_config_for_environment() {
        let dev = LoggerConfig::for_environment(Environment::Development);
        assert_eq!(dev.level, LogLevel::Debug);
        assert!(dev.enable_console);
        assert!(!dev.enable_file);
        assert!(dev.colorize);

        let prod = LoggerConfig::for_environment(Environment::Production);
        assert_eq!(prod.level, LogLevel::Info);
        assert!(prod.enable_file);
        assert!(!prod.enable_remote);
        assert!(!prod.colorize);
    }
}
