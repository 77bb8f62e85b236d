use crate::constants::{limits, matching, retry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub matching: MatchingConfig,

    pub provider: ProviderConfig,

    pub reconcile: ReconcileConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/seasonarr.db".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

/// Fuzzy-match thresholds (0..=100) per lookup kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatchingConfig {
    pub episode_title_threshold: u8,

    pub season_title_threshold: u8,

    pub movie_title_threshold: u8,

    /// Allowed difference in years between a movie and a candidate.
    pub year_tolerance: i32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            episode_title_threshold: matching::EPISODE_TITLE_THRESHOLD,
            season_title_threshold: matching::SEASON_TITLE_THRESHOLD,
            movie_title_threshold: matching::MOVIE_TITLE_THRESHOLD,
            year_tolerance: matching::YEAR_TOLERANCE,
        }
    }
}

/// Retry policy for the search provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub max_attempts: u32,

    pub initial_backoff_ms: u64,

    pub max_backoff_ms: u64,

    pub backoff_multiplier: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            initial_backoff_ms: retry::INITIAL_BACKOFF_MS,
            max_backoff_ms: retry::MAX_BACKOFF_MS,
            backoff_multiplier: retry::BACKOFF_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Candidates considered per search result page.
    pub max_candidates_per_search: usize,

    /// Count a `pending` cache state after activation as confirmed.
    pub treat_pending_as_confirmed: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_candidates_per_search: limits::MAX_CANDIDATES_PER_SEARCH,
            treat_pending_as_confirmed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub metrics_port: Option<u16>,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "seasonarr".to_string());

        Self {
            metrics_enabled: false,
            metrics_port: None,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("seasonarr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".seasonarr").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_path.trim().is_empty() {
            anyhow::bail!("general.database_path cannot be empty");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("general.min_db_connections cannot exceed max_db_connections");
        }

        for (name, value) in [
            ("episode_title_threshold", self.matching.episode_title_threshold),
            ("season_title_threshold", self.matching.season_title_threshold),
            ("movie_title_threshold", self.matching.movie_title_threshold),
        ] {
            if value > 100 {
                anyhow::bail!("matching.{name} must be between 0 and 100 (got {value})");
            }
        }

        if self.matching.year_tolerance < 0 {
            anyhow::bail!("matching.year_tolerance cannot be negative");
        }

        if self.provider.max_attempts == 0 {
            anyhow::bail!("provider.max_attempts must be at least 1");
        }

        if self.provider.backoff_multiplier < 1.0 {
            anyhow::bail!("provider.backoff_multiplier must be >= 1.0");
        }

        if self.reconcile.max_candidates_per_search == 0 {
            anyhow::bail!("reconcile.max_candidates_per_search must be at least 1");
        }

        if self.observability.loki_enabled && self.observability.loki_url.is_empty() {
            anyhow::bail!("observability.loki_url cannot be empty when Loki is enabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.matching.episode_title_threshold, 65);
        assert_eq!(config.matching.season_title_threshold, 75);
        assert_eq!(config.matching.movie_title_threshold, 90);
        assert_eq!(config.provider.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[matching]"));
        assert!(toml_str.contains("[provider]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [matching]
            movie_title_threshold = 95
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.matching.movie_title_threshold, 95);
        assert_eq!(config.matching.episode_title_threshold, 65);
        assert_eq!(config.general.database_path, "sqlite:data/seasonarr.db");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.matching.season_title_threshold = 101;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.provider.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.provider.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.database_path = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("seasonarr-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let mut config = Config::default();
        config.reconcile.treat_pending_as_confirmed = true;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert!(loaded.reconcile.treat_pending_as_confirmed);
        assert_eq!(loaded.matching, config.matching);

        std::fs::remove_dir_all(dir).ok();
    }
}
