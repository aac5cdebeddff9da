//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve DB path, listing policy, logging and session settings.
//!
//! # Invariants
//! - Unset or blank variables fall back to defaults.
//! - Malformed values are reported, never silently replaced.

use chrono::Duration;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use topicvote_core::session::DEFAULT_SESSION_TTL_SECS;
use topicvote_core::{default_log_level, init_logging, ListPolicy};

pub const ENV_DB_PATH: &str = "TOPICVOTE_DB_PATH";
pub const ENV_STRICT_EMPTY_LIST: &str = "TOPICVOTE_STRICT_EMPTY_LIST";
pub const ENV_LOG_LEVEL: &str = "TOPICVOTE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TOPICVOTE_LOG_DIR";
pub const ENV_SESSION_TTL_SECS: &str = "TOPICVOTE_SESSION_TTL_SECS";

const DEFAULT_DB_FILE_NAME: &str = "topicvote.sqlite3";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}=`{}`: {}", self.key, self.value, self.reason)
    }
}

impl Error for ConfigError {}

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub db_path: PathBuf,
    pub list_policy: ListPolicy,
    pub log_level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub session_ttl: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            list_policy: ListPolicy::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

impl ApiConfig {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, one call per variable name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(raw) = read(ENV_STRICT_EMPTY_LIST) {
            config.list_policy = if parse_flag(ENV_STRICT_EMPTY_LIST, &raw)? {
                ListPolicy::EmptyIsNotFound
            } else {
                ListPolicy::EmptyIsOk
            };
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.log_dir = read(ENV_LOG_DIR).map(PathBuf::from);
        if let Some(raw) = read(ENV_SESSION_TTL_SECS) {
            let secs = raw
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError {
                    key: ENV_SESSION_TTL_SECS,
                    value: raw.clone(),
                    reason: "expected a positive number of seconds",
                })?;
            config.session_ttl = Duration::seconds(secs);
        }
        Ok(config)
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns `Ok(false)` when logging is not configured.
    pub fn init_logging(&self) -> Result<bool, String> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| format!("log_dir is not valid UTF-8: `{}`", log_dir.display()))?;
        init_logging(&self.log_level, log_dir)?;
        Ok(true)
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key,
            value: raw.to_string(),
            reason: "expected a boolean flag",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ApiConfig, ENV_DB_PATH, ENV_LOG_DIR, ENV_SESSION_TTL_SECS, ENV_STRICT_EMPTY_LIST,
    };
    use chrono::Duration;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use topicvote_core::ListPolicy;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ApiConfig, super::ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.list_policy, ListPolicy::EmptyIsOk);
        assert_eq!(config.log_dir, None);
        assert!(!config.init_logging().unwrap());
    }

    #[test]
    fn overrides_are_trimmed_and_applied() {
        let config = config_from(&[
            (ENV_DB_PATH, "  /var/lib/topicvote/db.sqlite3 "),
            (ENV_STRICT_EMPTY_LIST, "Yes"),
            (ENV_LOG_DIR, "/var/log/topicvote"),
            (ENV_SESSION_TTL_SECS, "900"),
        ])
        .unwrap();
        assert_eq!(
            config.db_path,
            PathBuf::from("/var/lib/topicvote/db.sqlite3")
        );
        assert_eq!(config.list_policy, ListPolicy::EmptyIsNotFound);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/topicvote")));
        assert_eq!(config.session_ttl, Duration::minutes(15));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[(ENV_DB_PATH, "   "), (ENV_LOG_DIR, "")]).unwrap();
        assert_eq!(config.db_path, ApiConfig::default().db_path);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = config_from(&[(ENV_SESSION_TTL_SECS, "-5")]).unwrap_err();
        assert_eq!(err.key, ENV_SESSION_TTL_SECS);
        assert!(config_from(&[(ENV_STRICT_EMPTY_LIST, "maybe")]).is_err());
    }
}
