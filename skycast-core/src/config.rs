use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::variable::{VariableDefinition, VariableRegistry};

/// Upstream provider settings and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    /// ISO-8601 duration between observations, e.g. "P1D".
    pub sampling_interval: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.meteomatics.com".to_string(),
            username: None,
            password: None,
            timeout_secs: 60,
            sampling_interval: "P1D".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Username and password, if both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// Date range of the historical observations used for model preparation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2019, 10, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    #[default]
    Synthetic,
    ExponentialSmoothing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of most recent observations kept per model.
    pub training_window: usize,
    /// Share of the history held out to score each model.
    pub validation_fraction: f64,
    /// Maximum number of variables fetched at once; 1 fetches sequentially.
    pub fetch_concurrency: usize,
    /// Overall time budget for historical retrieval in one request.
    pub request_deadline_secs: Option<u64>,
    pub algorithm: AlgorithmKind,
    pub smoothing_alpha: f64,
    pub seed: u64,
    pub model_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            training_window: 30,
            validation_fraction: 0.2,
            fetch_concurrency: 1,
            request_deadline_secs: None,
            algorithm: AlgorithmKind::default(),
            smoothing_alpha: 0.3,
            seed: 42,
            model_dir: "./models".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [provider]
/// username = "..."
/// password = "..."
///
/// [history]
/// start = "2019-10-01"
/// end = "2025-10-01"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub history: HistoryWindow,
    pub engine: EngineConfig,

    /// Replaces the builtin variable catalog when non-empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableDefinition>,
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    /// Credentials from `MET_USER` / `MET_PASS` take precedence over the file.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(user) = std::env::var("MET_USER") {
            self.provider.username = Some(user);
        }
        if let Ok(pass) = std::env::var("MET_PASS") {
            self.provider.password = Some(pass);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.start > self.history.end {
            return Err(anyhow!(
                "History window start {} is after end {}",
                self.history.start,
                self.history.end
            ));
        }
        if self.engine.training_window == 0 {
            return Err(anyhow!("engine.training_window must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.engine.validation_fraction) {
            return Err(anyhow!("engine.validation_fraction must be in [0, 1)"));
        }
        if !(self.engine.smoothing_alpha > 0.0 && self.engine.smoothing_alpha < 1.0) {
            return Err(anyhow!("engine.smoothing_alpha must be between 0 and 1"));
        }
        Ok(())
    }

    /// Set/replace the provider credentials.
    pub fn set_credentials(&mut self, username: String, password: String) {
        self.provider.username = Some(username);
        self.provider.password = Some(password);
    }

    pub fn has_credentials(&self) -> bool {
        self.provider.credentials().is_some()
    }

    pub fn registry(&self) -> VariableRegistry {
        if self.variables.is_empty() {
            VariableRegistry::builtin()
        } else {
            VariableRegistry::new(self.variables.iter().cloned())
        }
    }

    pub fn request_deadline(&self) -> Option<Duration> {
        self.engine.request_deadline_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.provider.base_url, "https://api.meteomatics.com");
        assert_eq!(cfg.provider.sampling_interval, "P1D");
        assert_eq!(cfg.provider.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.history.start.to_string(), "2019-10-01");
        assert_eq!(cfg.history.end.to_string(), "2025-10-01");
        assert_eq!(cfg.engine.training_window, 30);
        assert!(!cfg.has_credentials());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml(
            r#"
            [provider]
            username = "user"
            password = "secret"

            [engine]
            fetch_concurrency = 4
            algorithm = "exponential_smoothing"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.provider.credentials(), Some(("user", "secret")));
        assert_eq!(cfg.provider.timeout_secs, 60);
        assert_eq!(cfg.engine.fetch_concurrency, 4);
        assert_eq!(cfg.engine.algorithm, AlgorithmKind::ExponentialSmoothing);
        assert_eq!(cfg.engine.training_window, 30);
    }

    #[test]
    fn custom_variables_replace_builtin_registry() {
        let cfg = Config::from_toml(
            r#"
            [[variables]]
            name = "pressure"
            upstream_param = "msl_pressure:hPa"
            unit = "hPa"
            description = "Mean sea level pressure"
            "#,
        )
        .expect("valid toml");

        let registry = cfg.registry();
        assert_eq!(registry.all_names().collect::<Vec<_>>(), ["pressure"]);
        assert_eq!(Config::default().registry().len(), 4);
    }

    #[test]
    fn inverted_history_window_is_rejected() {
        let mut cfg = Config::default();
        cfg.history.start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("is after end"));
    }

    #[test]
    fn set_credentials_round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.set_credentials("user".into(), "pass".into());

        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed, cfg);
    }
}
