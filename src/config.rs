//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` (or the file named by `SCOREWATCH_CONFIG`) and
//! deserializes into strongly-typed structs. Every key has a default, so
//! an empty file is a valid local setup. `SCOREWATCH_MODE` overrides the
//! scheduling mode. Secrets (the bus token) are referenced by env-var
//! name and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use tracing::warn;

use crate::types::{SchedulingMode, TrackerError};

/// Env var overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "SCOREWATCH_CONFIG";
/// Env var overriding `scheduling.mode`.
pub const MODE_ENV: &str = "SCOREWATCH_MODE";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scheduling: SchedulingConfig,
    pub score_source: ScoreSourceConfig,
    pub publisher: PublisherConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulingConfig {
    pub mode: SchedulingMode,
    /// Fixed rate of the shared batch timer.
    pub batch_interval_ms: u64,
    /// Fixed interval of each per-event timer.
    pub per_event_interval_secs: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::PerEvent,
            batch_interval_ms: 5_000,
            per_event_interval_secs: 10,
        }
    }
}

impl SchedulingConfig {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn per_event_interval(&self) -> Duration {
        Duration::from_secs(self.per_event_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoreSourceConfig {
    /// Prefix the event id is appended to, e.g. `http://host/score/`.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ScoreSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/mock-api/score/".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Which downstream bus the publisher writes to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    #[default]
    Memory,
    RestProxy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PublisherConfig {
    pub topic: String,
    pub bus: BusKind,
    /// Base URL of the Kafka REST Proxy, required for `bus = "rest_proxy"`.
    pub rest_proxy_url: Option<String>,
    /// Name of the env var holding the bus bearer token.
    pub auth_token_env: Option<String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            topic: "live-score-updates".to_string(),
            bus: BusKind::Memory,
            rest_proxy_url: None,
            auth_token_env: None,
        }
    }
}

impl PublisherConfig {
    /// Resolve the optional bus token. An unset or empty variable means
    /// no auth.
    pub fn auth_token(&self) -> Option<SecretString> {
        let env_name = self.auth_token_env.as_deref()?;
        match AppConfig::resolve_secret(env_name) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "Publishing without a bus token");
                None
            }
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from `SCOREWATCH_CONFIG`, falling back to `config.toml`.
    /// A missing default file yields the built-in defaults. `SCOREWATCH_MODE`
    /// is applied on top.
    pub fn load_default() -> Result<Self> {
        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(&path)?,
            Err(_) if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => Self::default(),
        };
        config.with_mode_override(std::env::var(MODE_ENV).ok().as_deref())
    }

    /// Replace the scheduling mode when an override is given.
    pub fn with_mode_override(mut self, raw: Option<&str>) -> Result<Self> {
        if let Some(raw) = raw.filter(|r| !r.trim().is_empty()) {
            self.scheduling.mode = raw
                .trim()
                .parse::<SchedulingMode>()
                .with_context(|| format!("Invalid {MODE_ENV}"))?;
        }
        Ok(self)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler or publisher cannot run with.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.scheduling.batch_interval_ms == 0 {
            return Err(TrackerError::Config("scheduling.batch_interval_ms must be > 0".into()));
        }
        if self.scheduling.per_event_interval_secs == 0 {
            return Err(TrackerError::Config(
                "scheduling.per_event_interval_secs must be > 0".into(),
            ));
        }
        if self.score_source.timeout_secs == 0 {
            return Err(TrackerError::Config("score_source.timeout_secs must be > 0".into()));
        }
        if self.score_source.base_url.trim().is_empty() {
            return Err(TrackerError::Config("score_source.base_url is empty".into()));
        }
        if self.publisher.topic.trim().is_empty() {
            return Err(TrackerError::Config("publisher.topic is empty".into()));
        }
        if self.publisher.bus == BusKind::RestProxy
            && self.publisher.rest_proxy_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(TrackerError::Config(
                "publisher.rest_proxy_url is required when bus = \"rest_proxy\"".into(),
            ));
        }
        Ok(())
    }

    /// Read a secret from the env var named in config. Empty counts as unset.
    pub fn resolve_secret(env_name: &str) -> Result<SecretString> {
        let value = std::env::var(env_name)
            .with_context(|| format!("Secret env var {env_name} is not set"))?;
        if value.is_empty() {
            anyhow::bail!("Secret env var {env_name} is empty");
        }
        Ok(SecretString::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.scheduling.mode, SchedulingMode::PerEvent);
        assert_eq!(cfg.scheduling.per_event_interval(), Duration::from_secs(10));
        assert_eq!(cfg.scheduling.batch_interval(), Duration::from_millis(5_000));
        assert_eq!(cfg.publisher.topic, "live-score-updates");
        assert_eq!(cfg.publisher.bus, BusKind::Memory);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [scheduling]
            mode = "batch"
            batch_interval_ms = 250

            [score_source]
            base_url = "http://scores.internal/api/score/"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scheduling.mode, SchedulingMode::Batch);
        assert_eq!(cfg.scheduling.batch_interval_ms, 250);
        assert_eq!(cfg.scheduling.per_event_interval_secs, 10);
        assert_eq!(cfg.score_source.base_url, "http://scores.internal/api/score/");
        assert_eq!(cfg.score_source.timeout_secs, 5);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = AppConfig::from_toml("[scheduling]\nper_event_interval_secs = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("per_event_interval_secs"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(AppConfig::from_toml("[scheduling]\nmode = \"hourly\"\n").is_err());
    }

    #[test]
    fn test_rest_proxy_requires_url() {
        assert!(AppConfig::from_toml("[publisher]\nbus = \"rest_proxy\"\n").is_err());

        let cfg = AppConfig::from_toml(
            "[publisher]\nbus = \"rest_proxy\"\nrest_proxy_url = \"http://proxy:8082\"\n",
        )
        .unwrap();
        assert_eq!(cfg.publisher.bus, BusKind::RestProxy);
    }

    #[test]
    fn test_empty_topic_rejected() {
        assert!(AppConfig::from_toml("[publisher]\ntopic = \"\"\n").is_err());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = AppConfig::load("/tmp/scorewatch_does_not_exist_42.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_source_timeout_rejected() {
        let err = AppConfig::from_toml("[score_source]\ntimeout_secs = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("timeout_secs"));
    }

    #[test]
    fn test_mode_override() {
        let cfg = AppConfig::default().with_mode_override(Some("batch")).unwrap();
        assert_eq!(cfg.scheduling.mode, SchedulingMode::Batch);

        let cfg = cfg.with_mode_override(Some("dynamic")).unwrap();
        assert_eq!(cfg.scheduling.mode, SchedulingMode::PerEvent);

        let cfg = cfg.with_mode_override(Some(" GLOBAL ")).unwrap();
        assert_eq!(cfg.scheduling.mode, SchedulingMode::Batch);
    }

    #[test]
    fn test_mode_override_absent_or_blank_keeps_file_value() {
        let cfg = AppConfig::from_toml("[scheduling]\nmode = \"batch\"\n").unwrap();
        let cfg = cfg.with_mode_override(None).unwrap();
        assert_eq!(cfg.scheduling.mode, SchedulingMode::Batch);
        let cfg = cfg.with_mode_override(Some("  ")).unwrap();
        assert_eq!(cfg.scheduling.mode, SchedulingMode::Batch);
    }

    #[test]
    fn test_mode_override_rejects_unknown() {
        let err = AppConfig::default().with_mode_override(Some("hourly")).unwrap_err();
        assert!(format!("{err:#}").contains("hourly"));
    }

    #[test]
    fn test_auth_token_read_from_named_env() {
        use secrecy::ExposeSecret;

        std::env::set_var("SCOREWATCH_TEST_BUS_TOKEN_SET", "s3cret");
        let cfg = PublisherConfig {
            auth_token_env: Some("SCOREWATCH_TEST_BUS_TOKEN_SET".into()),
            ..PublisherConfig::default()
        };
        assert_eq!(cfg.auth_token().unwrap().expose_secret(), "s3cret");
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        std::env::set_var("SCOREWATCH_TEST_BUS_TOKEN_EMPTY", "");
        assert!(AppConfig::resolve_secret("SCOREWATCH_TEST_BUS_TOKEN_EMPTY").is_err());

        let cfg = PublisherConfig {
            auth_token_env: Some("SCOREWATCH_TEST_BUS_TOKEN_EMPTY".into()),
            ..PublisherConfig::default()
        };
        assert!(cfg.auth_token().is_none());
        assert!(PublisherConfig::default().auth_token().is_none());
    }

    #[test]
    fn test_auth_token_absent_when_env_unset() {
        let cfg = PublisherConfig {
            auth_token_env: Some("SCOREWATCH_TEST_TOKEN_NEVER_SET".into()),
            ..PublisherConfig::default()
        };
        assert!(cfg.auth_token().is_none());
    }
}
