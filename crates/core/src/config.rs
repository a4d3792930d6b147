//! Configuration types

use chrono::TimeDelta;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::{ConfigError, ConfigResult};

/// Environment variable prefix for overrides, e.g. `TICKER_HTTP__PORT=8080`
pub const ENV_PREFIX: &str = "TICKER";

/// Default config file location (extension optional)
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Supported upstream API flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Wex,
    Binance,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Wex => "wex",
            SourceKind::Binance => "binance",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One upstream quote source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    pub base_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Extra discovery attempts after the first failure. Zero abandons the
    /// source on its first failed discovery.
    #[serde(default)]
    pub discovery_retries: u32,
    #[serde(default = "default_discovery_backoff_ms")]
    pub discovery_backoff_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_discovery_backoff_ms() -> u64 {
    1_000
}

fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, kind: SourceKind, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            base_url: base_url.into(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            discovery_retries: 0,
            discovery_backoff_ms: default_discovery_backoff_ms(),
            enabled: true,
        }
    }

    pub fn wex() -> Self {
        Self::new("wex", SourceKind::Wex, "https://wex.nz/api/3/")
    }

    pub fn binance() -> Self {
        Self::new("binance", SourceKind::Binance, "https://api.binance.com")
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_discovery_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.discovery_retries = retries;
        self.discovery_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn discovery_backoff(&self) -> Duration {
        Duration::from_millis(self.discovery_backoff_ms)
    }
}

/// Sliding window settings shared by every source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub window_duration_ms: u64,
    /// Create windows for symbols the upstream reports but never listed in
    /// discovery. When disabled such samples are dropped as unknown.
    pub lazy_symbol_creation: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_duration_ms: 10 * 60 * 1_000, // 10 minutes
            lazy_symbol_creation: true,
        }
    }
}

impl WindowConfig {
    pub fn window_duration(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.window_duration_ms as i64)
    }
}

/// HTTP read API binding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl HttpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub http: HttpConfig,
    pub window: WindowConfig,
    pub sources: Vec<SourceConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            window: WindowConfig::default(),
            sources: vec![SourceConfig::wex(), SourceConfig::binance()],
        }
    }
}

impl ServiceConfig {
    /// Load from an optional config file plus `TICKER_*` environment overrides
    pub fn load(path: &str) -> ConfigResult<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let parsed: Self = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.window.window_duration_ms == 0 {
            return Err(ConfigError::Invalid("window_duration_ms must be positive".into()));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid("source name must not be empty".into()));
            }
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source name: {}",
                    source.name
                )));
            }
            if source.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source {} has no base_url",
                    source.name
                )));
            }
            if source.poll_interval_ms == 0 || source.request_timeout_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "source {} needs a positive poll interval and request timeout",
                    source.name
                )));
            }
        }

        Ok(())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.window.window_duration(), TimeDelta::minutes(10));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].poll_interval(), Duration::from_secs(2));
        assert_eq!(config.sources[1].request_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [http]
            port = 8080

            [window]
            window_duration_ms = 60000
            lazy_symbol_creation = false

            [[sources]]
            name = "binance"
            kind = "binance"
            base_url = "http://localhost:9000"
            poll_interval_ms = 500
            discovery_retries = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.host, "127.0.0.1");
        assert!(!config.window.lazy_symbol_creation);
        assert_eq!(config.sources.len(), 1);

        let source = &config.sources[0];
        assert_eq!(source.kind, SourceKind::Binance);
        assert_eq!(source.poll_interval(), Duration::from_millis(500));
        assert_eq!(source.request_timeout_ms, 5_000);
        assert_eq!(source.discovery_retries, 3);
        assert!(source.enabled);
    }

    #[test]
    fn test_rejects_duplicate_sources() {
        let mut config = ServiceConfig::default();
        config.sources.push(SourceConfig::wex());

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_window() {
        let mut config = ServiceConfig::default();
        config.window.window_duration_ms = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_sources() {
        let mut config = ServiceConfig::default();
        config.sources[0].enabled = false;

        let names: Vec<_> = config.enabled_sources().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["binance"]);
    }

    #[test]
    fn test_bundled_config_parses() {
        let config =
            ServiceConfig::from_toml_str(include_str!("../../../config/default.toml")).unwrap();

        assert_eq!(config.window.window_duration(), TimeDelta::minutes(10));
        assert_eq!(config.sources[0].kind, SourceKind::Wex);
        assert_eq!(config.sources[1].discovery_retries, 3);
    }
}
