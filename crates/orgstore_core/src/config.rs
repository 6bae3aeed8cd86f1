//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe database, logging and mail settings in one serde model.
//! - Load settings from a JSON document and apply environment overrides.
//!
//! # Invariants
//! - Every section has a usable default; an empty document is valid.
//! - Environment overrides win over document values.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "ORGSTORE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "ORGSTORE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ORGSTORE_LOG_DIR";
pub const ENV_MAIL_ENABLED: &str = "ORGSTORE_MAIL_ENABLED";

const DEFAULT_MAIL_RECIPIENT: &str = "admin@localhost";

#[derive(Debug)]
pub enum ConfigError {
    /// Configuration document is not valid JSON for [`CoreConfig`].
    Parse(serde_json::Error),
    /// Environment variable holds a value that cannot be interpreted.
    InvalidEnv { name: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid configuration document: {err}"),
            Self::InvalidEnv { name, value } => {
                write!(f, "invalid value `{value}` for environment variable {name}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidEnv { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path. `None` selects an in-memory database.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for rolling log files. `None` disables file logging.
    pub dir: Option<PathBuf>,
    /// Mirror log records to stderr in addition to files.
    pub duplicate_to_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
            duplicate_to_stderr: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// When false, create notifications are not dispatched at all.
    pub enabled: bool,
    /// Recipient reported on every notification.
    pub recipient: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipient: DEFAULT_MAIL_RECIPIENT.to_string(),
        }
    }
}

impl CoreConfig {
    /// Parses a JSON configuration document. Missing sections use defaults.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Builds the default configuration overridden by process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies environment overrides resolved through `lookup`.
    ///
    /// Blank values are ignored so an exported-but-empty variable does not
    /// wipe a document value.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(path) = read(ENV_DB_PATH) {
            self.database.path = Some(PathBuf::from(path.trim()));
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            self.log.level = level.trim().to_string();
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            self.log.dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(value) = read(ENV_MAIL_ENABLED) {
            self.mail.enabled = parse_env_bool(&value).ok_or(ConfigError::InvalidEnv {
                name: ENV_MAIL_ENABLED,
                value,
            })?;
        }

        Ok(())
    }
}

fn parse_env_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_DB_PATH, ENV_LOG_LEVEL, ENV_MAIL_ENABLED};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert!(config.database.path.is_none());
        assert!(config.mail.enabled);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{ "log": { "level": "warn" }, "mail": { "enabled": false } }"#)
                .unwrap();
        assert_eq!(config.log.level, "warn");
        assert!(config.log.dir.is_none());
        assert!(!config.mail.enabled);
        assert_eq!(config.mail.recipient, "admin@localhost");
    }

    #[test]
    fn env_overrides_document_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DB_PATH, "/tmp/orgstore.sqlite3"),
            (ENV_LOG_LEVEL, " error "),
            (ENV_MAIL_ENABLED, "off"),
        ]);
        let mut config = CoreConfig::from_json_str(r#"{ "log": { "level": "debug" } }"#).unwrap();
        config
            .apply_env_with(|name| env.get(name).map(|value| value.to_string()))
            .unwrap();

        assert_eq!(
            config.database.path,
            Some(PathBuf::from("/tmp/orgstore.sqlite3"))
        );
        assert_eq!(config.log.level, "error");
        assert!(!config.mail.enabled);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = CoreConfig::default();
        config
            .apply_env_with(|name| (name == ENV_LOG_LEVEL).then(|| "   ".to_string()))
            .unwrap();
        assert_eq!(config.log.level, CoreConfig::default().log.level);
    }

    #[test]
    fn invalid_mail_flag_is_rejected() {
        let mut config = CoreConfig::default();
        let err = config
            .apply_env_with(|name| (name == ENV_MAIL_ENABLED).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: ENV_MAIL_ENABLED,
                ..
            }
        ));
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = CoreConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
