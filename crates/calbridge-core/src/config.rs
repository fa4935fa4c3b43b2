//! TOML-based application configuration.
//!
//! Stores the three process inputs (feed URL, Notion token, Notion
//! database id) plus the retry budget and an optional ledger path
//! override. Stored at `~/.config/calbridge/config.toml`; set
//! `CALBRIDGE_ENV=dev` to use `~/.config/calbridge-dev/` instead.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::feed::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

/// Returns `~/.config/calbridge[-dev]/` based on CALBRIDGE_ENV, creating
/// it if needed.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CALBRIDGE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("calbridge-dev")
    } else {
        base_dir.join("calbridge")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Source feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Public ICS URL of the source calendar.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

/// Target store (Notion) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Integration token with access to the database.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub database_id: String,
}

/// Ledger persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Override for the ledger file location. Defaults to
    /// `<data_dir>/ledger.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Application configuration, serialized to/from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY.as_secs()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            database_id: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            notion: NotionConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/calbridge"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing defaults on first use.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Check the three required process inputs are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.url.is_empty() {
            return Err(ConfigError::MissingKey("feed.url"));
        }
        if self.notion.token.is_empty() {
            return Err(ConfigError::MissingKey("notion.token"));
        }
        if self.notion.database_id.is_empty() {
            return Err(ConfigError::MissingKey("notion.database_id"));
        }
        Ok(())
    }

    /// Resolved ledger file location.
    pub fn ledger_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.ledger.path {
            return Ok(path.clone());
        }
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/calbridge"),
            message: e.to_string(),
        })?;
        Ok(dir.join("ledger.json"))
    }

    /// Get a config value as a string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        match current {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        match key {
            "feed.url" => self.feed.url = value.to_string(),
            "feed.max_attempts" => {
                self.feed.max_attempts =
                    value.parse().map_err(|_| invalid("expected an integer"))?
            }
            "feed.retry_delay_secs" => {
                self.feed.retry_delay_secs =
                    value.parse().map_err(|_| invalid("expected an integer"))?
            }
            "notion.token" => self.notion.token = value.to_string(),
            "notion.database_id" => self.notion.database_id = value.to_string(),
            "ledger.path" => self.ledger.path = Some(PathBuf::from(value)),
            _ => return Err(invalid("unknown config key")),
        }

        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.feed.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(parsed.feed.retry_delay_secs, DEFAULT_RETRY_DELAY.as_secs());
        assert!(parsed.notion.token.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str(
            "[feed]\nurl = \"https://example.com/cal.ics\"\n",
        )
        .unwrap();
        assert_eq!(parsed.feed.url, "https://example.com/cal.ics");
        assert_eq!(parsed.feed.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn validate_reports_first_missing_input() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingKey("feed.url"))
        ));

        cfg.feed.url = "https://example.com/cal.ics".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingKey("notion.token"))
        ));

        cfg.notion.token = "secret".to_string();
        cfg.notion.database_id = "db".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn get_by_dot_key() {
        let mut cfg = Config::default();
        cfg.feed.url = "https://example.com/cal.ics".to_string();

        assert_eq!(cfg.get("feed.url").as_deref(), Some("https://example.com/cal.ics"));
        assert_eq!(
            cfg.get("feed.max_attempts"),
            Some(DEFAULT_MAX_ATTEMPTS.to_string())
        );
        assert!(cfg.get("feed.nope").is_none());
        assert!(cfg.get("ledger.path").is_none());
    }

    #[test]
    fn explicit_ledger_path_wins() {
        let mut cfg = Config::default();
        cfg.ledger.path = Some(PathBuf::from("/tmp/custom-ledger.json"));
        assert_eq!(
            cfg.ledger_path().unwrap(),
            PathBuf::from("/tmp/custom-ledger.json")
        );
    }
}
