//! # Client Configuration
//!
//! Resolution order, later wins: built-in defaults, an optional JSON file,
//! `BOARD_*` environment variables, then whatever the binary layers on top
//! from its command line via [`ConfigOverrides`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Exponential backoff for live-stream reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): base, 2×base,
    /// 4×base, … capped at `max_delay_ms`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let millis = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub backend_url: String,
    pub refresh_path: String,
    pub session_file: PathBuf,
    pub request_timeout_secs: u64,
    /// Extra attempts for transient transport failures. `0` disables the
    /// retry middleware entirely.
    pub transport_retries: u32,
    pub feed_capacity: usize,
    pub recent_limit: usize,
    pub leaderboard_interval_secs: u64,
    pub reconnect: Option<ReconnectPolicy>,
    pub catalog_ttl_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            session_file: default_session_file(),
            request_timeout_secs: 30,
            transport_retries: 0,
            feed_capacity: 20,
            recent_limit: 5,
            leaderboard_interval_secs: 30,
            reconnect: None,
            catalog_ttl_secs: 15 * 60,
            log_dir: None,
            log_level: "info".to_string(),
        }
    }
}

fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("board")
        .join("session.json")
}

/// Partial configuration; every `Some` replaces the value it is merged over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub backend_url: Option<String>,
    pub refresh_path: Option<String>,
    pub session_file: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub transport_retries: Option<u32>,
    pub feed_capacity: Option<usize>,
    pub recent_limit: Option<usize>,
    pub leaderboard_interval_secs: Option<u64>,
    pub reconnect: Option<ReconnectPolicy>,
    pub catalog_ttl_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    /// Read overrides from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the file is unreadable or not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))
    }

    /// Read overrides from `BOARD_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ClientError> {
        let reconnect = match (
            env_parse::<u64>("BOARD_RECONNECT_BASE_MS")?,
            env_parse::<u64>("BOARD_RECONNECT_MAX_MS")?,
        ) {
            (Some(base), max) => Some(ReconnectPolicy {
                base_delay_ms: base,
                max_delay_ms: max.unwrap_or(base.saturating_mul(60)),
            }),
            (None, Some(_)) => {
                return Err(ClientError::Config(
                    "BOARD_RECONNECT_MAX_MS requires BOARD_RECONNECT_BASE_MS".into(),
                ))
            }
            (None, None) => None,
        };

        Ok(Self {
            backend_url: env_string("BOARD_BACKEND_URL"),
            refresh_path: env_string("BOARD_REFRESH_PATH"),
            session_file: env_string("BOARD_SESSION_FILE").map(PathBuf::from),
            request_timeout_secs: env_parse("BOARD_REQUEST_TIMEOUT_SECS")?,
            transport_retries: env_parse("BOARD_TRANSPORT_RETRIES")?,
            leaderboard_interval_secs: env_parse("BOARD_LEADERBOARD_INTERVAL_SECS")?,
            reconnect,
            log_dir: env_string("BOARD_LOG_DIR").map(PathBuf::from),
            log_level: env_string("BOARD_LOG_LEVEL"),
            ..Self::default()
        })
    }

    /// Merge two override sets, where `other` overrides `self` for `Some` values.
    #[must_use]
    pub fn merge(self, other: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            backend_url: other.backend_url.or(self.backend_url),
            refresh_path: other.refresh_path.or(self.refresh_path),
            session_file: other.session_file.or(self.session_file),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            transport_retries: other.transport_retries.or(self.transport_retries),
            feed_capacity: other.feed_capacity.or(self.feed_capacity),
            recent_limit: other.recent_limit.or(self.recent_limit),
            leaderboard_interval_secs: other
                .leaderboard_interval_secs
                .or(self.leaderboard_interval_secs),
            reconnect: other.reconnect.or(self.reconnect),
            catalog_ttl_secs: other.catalog_ttl_secs.or(self.catalog_ttl_secs),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }
}

impl ClientConfig {
    /// Defaults, then the optional JSON file, then the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] on unreadable files, bad values, or a
    /// backend URL that does not parse.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ClientError> {
        let mut overrides = ConfigOverrides::default();
        if let Some(path) = config_file {
            if path.exists() {
                overrides = overrides.merge(ConfigOverrides::from_file(path)?);
            } else {
                tracing::info!(path = %path.display(), "Config file not found, using defaults and environment");
            }
        }
        overrides = overrides.merge(ConfigOverrides::from_env()?);
        Self::default().apply(overrides)
    }

    /// Apply overrides on top of `self` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the resulting values are invalid.
    pub fn apply(self, o: ConfigOverrides) -> Result<Self, ClientError> {
        let config = Self {
            backend_url: o.backend_url.unwrap_or(self.backend_url),
            refresh_path: o.refresh_path.unwrap_or(self.refresh_path),
            session_file: o.session_file.unwrap_or(self.session_file),
            request_timeout_secs: o.request_timeout_secs.unwrap_or(self.request_timeout_secs),
            transport_retries: o.transport_retries.unwrap_or(self.transport_retries),
            feed_capacity: o.feed_capacity.unwrap_or(self.feed_capacity),
            recent_limit: o.recent_limit.unwrap_or(self.recent_limit),
            leaderboard_interval_secs: o
                .leaderboard_interval_secs
                .unwrap_or(self.leaderboard_interval_secs),
            reconnect: o.reconnect.or(self.reconnect),
            catalog_ttl_secs: o.catalog_ttl_secs.unwrap_or(self.catalog_ttl_secs),
            log_dir: o.log_dir.or(self.log_dir),
            log_level: o.log_level.unwrap_or(self.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    /// Config pointing at `backend_url` with everything else defaulted.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the URL is not absolute.
    pub fn for_backend(backend_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::default().apply(ConfigOverrides {
            backend_url: Some(backend_url.into()),
            ..ConfigOverrides::default()
        })
    }

    fn validate(&self) -> Result<(), ClientError> {
        Url::parse(&self.backend_url)
            .map_err(|e| ClientError::Config(format!("backendUrl '{}': {e}", self.backend_url)))?;
        if self.feed_capacity == 0 {
            return Err(ClientError::Config("feedCapacity must be at least 1".into()));
        }
        if self.leaderboard_interval_secs == 0 {
            return Err(ClientError::Config(
                "leaderboardIntervalSecs must be at least 1".into(),
            ));
        }
        if let Some(policy) = &self.reconnect {
            if policy.base_delay_ms == 0 || policy.max_delay_ms < policy.base_delay_ms {
                return Err(ClientError::Config(
                    "reconnect needs 0 < baseDelayMs <= maxDelayMs".into(),
                ));
            }
        }
        Ok(())
    }

    /// Absolute URL for a backend path such as `/updates/latest`.
    ///
    /// Plain concatenation, so a backend URL with a path prefix keeps it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] if the result is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.backend_url.trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Ok(Url::parse(&joined)?)
    }

    #[must_use]
    pub fn refresh_url(&self) -> String {
        let base = self.backend_url.trim_end_matches('/');
        format!("{base}/{}", self.refresh_path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn leaderboard_interval(&self) -> Duration {
        Duration::from_secs(self.leaderboard_interval_secs)
    }

    #[must_use]
    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ClientError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("{key}='{raw}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_dashboard_constants() {
        let config = ClientConfig::default();
        assert_eq!(config.feed_capacity, 20);
        assert_eq!(config.recent_limit, 5);
        assert_eq!(config.leaderboard_interval(), Duration::from_secs(30));
        assert_eq!(config.catalog_ttl(), Duration::from_secs(900));
        assert!(config.reconnect.is_none());
        assert_eq!(config.transport_retries, 0);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("board.json");
        fs::write(
            &path,
            r#"{"backendUrl": "https://api.example.com/v2", "reconnect": {"baseDelayMs": 500, "maxDelayMs": 8000}}"#,
        )
        .unwrap();

        let overrides = ConfigOverrides::from_file(&path).unwrap();
        let config = ClientConfig::default().apply(overrides).unwrap();

        assert_eq!(config.backend_url, "https://api.example.com/v2");
        assert_eq!(
            config.reconnect,
            Some(ReconnectPolicy {
                base_delay_ms: 500,
                max_delay_ms: 8000
            })
        );
        assert_eq!(config.feed_capacity, 20);
    }

    #[test]
    fn later_overrides_win() {
        let file = ConfigOverrides {
            backend_url: Some("http://file".into()),
            recent_limit: Some(3),
            ..ConfigOverrides::default()
        };
        let cli = ConfigOverrides {
            backend_url: Some("http://cli".into()),
            ..ConfigOverrides::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.backend_url.as_deref(), Some("http://cli"));
        assert_eq!(merged.recent_limit, Some(3));
    }

    #[test]
    fn rejects_relative_backend_url() {
        let err = ClientConfig::for_backend("localhost/api").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn endpoint_keeps_path_prefix() {
        let config = ClientConfig::for_backend("https://api.example.com/v2/").unwrap();
        assert_eq!(
            config.endpoint("/updates/latest").unwrap().as_str(),
            "https://api.example.com/v2/updates/latest"
        );
        assert_eq!(config.refresh_url(), "https://api.example.com/v2/auth/refresh");
    }

    #[test]
    fn reconnect_delay_doubles_and_caps() {
        let policy = ReconnectPolicy {
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(80), Duration::from_millis(1000));
    }
}
