use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Data directory {} is not usable: {source}", path.display())]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// TOML-backed tunables. Every field has a default, so an empty or absent
/// file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub fetch: FetchConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub search_url: String,
    pub requests_per_minute: u32,
    /// Minimum gap between two requests of one worker.
    pub worker_spacing_ms: u64,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub jitter_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            search_url: "https://site.web.api.espn.com/apis/search/v2".to_string(),
            requests_per_minute: 25,
            worker_spacing_ms: 2_000,
            request_timeout_secs: 10,
            max_attempts: 5,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 60_000,
            jitter_ms: 1_000,
        }
    }
}

impl FetchConfig {
    pub fn worker_spacing(&self) -> Duration {
        Duration::from_millis(self.worker_spacing_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub chunk_size: usize,
    pub workers: usize,
    /// Random pause between chunks, drawn from `[min, max]`.
    pub chunk_pause_min_ms: u64,
    pub chunk_pause_max_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            workers: 3,
            chunk_pause_min_ms: 5_000,
            chunk_pause_max_ms: 15_000,
        }
    }
}

impl FileConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.requests_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "fetch.requests_per_minute must be at least 1".into(),
            ));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "fetch.max_attempts must be at least 1".into(),
            ));
        }
        if self.fetch.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.run.chunk_size == 0 || self.run.workers == 0 {
            return Err(ConfigError::Invalid(
                "run.chunk_size and run.workers must be at least 1".into(),
            ));
        }
        if self.run.chunk_pause_min_ms > self.run.chunk_pause_max_ms {
            return Err(ConfigError::Invalid(format!(
                "run.chunk_pause_min_ms ({}) exceeds run.chunk_pause_max_ms ({})",
                self.run.chunk_pause_min_ms, self.run.chunk_pause_max_ms
            )));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  search_url: {}", self.fetch.search_url);
        tracing::info!(
            "  budget: {} req/min, worker spacing {}ms, timeout {}s",
            self.fetch.requests_per_minute,
            self.fetch.worker_spacing_ms,
            self.fetch.request_timeout_secs
        );
        tracing::info!(
            "  retry: {} attempts, base {}ms, cap {}ms, jitter {}ms",
            self.fetch.max_attempts,
            self.fetch.backoff_base_ms,
            self.fetch.backoff_cap_ms,
            self.fetch.jitter_ms
        );
        tracing::info!(
            "  run: chunks of {}, {} workers, pause {}-{}ms",
            self.run.chunk_size,
            self.run.workers,
            self.run.chunk_pause_min_ms,
            self.run.chunk_pause_max_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.fetch.requests_per_minute, 25);
        assert_eq!(config.run.workers, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [fetch]
            requests_per_minute = 10

            [run]
            chunk_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.fetch.requests_per_minute, 10);
        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.run.chunk_size, 5);
        assert_eq!(config.run.chunk_pause_max_ms, 15_000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(FileConfig::from_toml("[fetch]\nrequests_per_hour = 3\n").is_err());
        assert!(FileConfig::from_toml("[server]\nport = 1\n").is_err());
    }

    #[test]
    fn validation_catches_inverted_pause_range() {
        let mut config = FileConfig::default();
        config.run.chunk_pause_min_ms = 20_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FileConfig::load(Some(Path::new("/nonexistent/fightledger.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
