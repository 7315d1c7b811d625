//! Configuration system for homeval.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/homeval/config.toml` and/or `.homeval/config.toml`
//! in the workspace directory.

use chrono::format::{Item, StrftimeItems};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analytics::DEFAULT_DATE_LABEL_FORMAT;
use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_KEY;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomevalConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Where the history snapshot lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Relative paths resolve against the workspace;
    /// unset means `<workspace>/.homeval/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Storage key of the history snapshot.
    pub history_key: String,
    /// Largest snapshot the store accepts, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_snapshot_bytes: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            max_snapshot_bytes: None,
        }
    }
}

impl StorageConfig {
    pub fn resolve_data_dir(&self, workspace: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => workspace.join(dir),
            None => workspace.join(".homeval").join("data"),
        }
    }
}

/// Which prediction backend to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictorBackend {
    /// Local formula with random noise.
    #[default]
    Simulated,
    /// Remote service speaking the `/predict` JSON contract.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    pub backend: PredictorBackend,
    /// Base URL of the prediction service (http backend).
    pub endpoint: String,
    /// Request timeout in seconds (http backend).
    pub timeout_secs: u64,
    /// Upper bound of the uniform noise added by the simulated backend.
    pub noise_max: f64,
    /// Artificial latency of the simulated backend, in milliseconds.
    pub latency_ms: u64,
    /// Model identifiers offered to the user.
    pub model_types: Vec<String>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            backend: PredictorBackend::Simulated,
            endpoint: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 30,
            noise_max: 50_000.0,
            latency_ms: 0,
            model_types: vec![
                "random_forest".to_string(),
                "linear_regression".to_string(),
                "gradient_boosting".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// chrono format string for price trend labels.
    pub date_label_format: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            date_label_format: DEFAULT_DATE_LABEL_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory export files are written to; unset means the workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// chrono format string for the Date column of history exports.
    pub date_format: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            date_format: crate::export::DEFAULT_EXPORT_DATE_FORMAT.to_string(),
        }
    }
}

impl ExportConfig {
    pub fn resolve_output_dir(&self, workspace: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => workspace.join(dir),
            None => workspace.to_path_buf(),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "homeval", "homeval")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Workspace-level config file path.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".homeval").join("config.toml")
}

/// Load configuration with layered sources.
///
/// Order (later wins): defaults, user config, workspace config, explicit
/// config file, `HOMEVAL_*` environment variables (`__` separates nested
/// keys, e.g. `HOMEVAL_PREDICTOR__BACKEND=http`).
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
) -> Result<HomevalConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(HomevalConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("HOMEVAL_").split("__"));

    let config: HomevalConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

impl HomevalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.history_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "storage.history_key must not be empty".into(),
            });
        }
        if !self.predictor.noise_max.is_finite() || self.predictor.noise_max < 0.0 {
            return Err(ConfigError::Invalid {
                message: "predictor.noise_max must be a non-negative number".into(),
            });
        }
        check_date_format("analytics.date_label_format", &self.analytics.date_label_format)?;
        check_date_format("export.date_format", &self.export.date_format)?;
        if self.predictor.backend == PredictorBackend::Http && self.predictor.endpoint.is_empty() {
            return Err(ConfigError::Invalid {
                message: "predictor.endpoint is required for the http backend".into(),
            });
        }
        Ok(())
    }
}

/// Reject chrono format strings that would fail when rendered.
fn check_date_format(field: &str, format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::Invalid {
            message: format!("{field} is not a valid date format: {format:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = HomevalConfig::default();
        assert_eq!(config.storage.history_key, "predictionHistory");
        assert_eq!(config.predictor.backend, PredictorBackend::Simulated);
        assert_eq!(config.predictor.timeout_secs, 30);
        assert_eq!(config.predictor.model_types.len(), 3);
        assert_eq!(config.analytics.date_label_format, "%Y-%m-%d");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_data_dir() {
        let ws = Path::new("/ws");
        let mut storage = StorageConfig::default();
        assert_eq!(
            storage.resolve_data_dir(ws),
            PathBuf::from("/ws/.homeval/data")
        );
        storage.data_dir = Some(PathBuf::from("state"));
        assert_eq!(storage.resolve_data_dir(ws), PathBuf::from("/ws/state"));
        storage.data_dir = Some(PathBuf::from("/var/lib/homeval"));
        assert_eq!(
            storage.resolve_data_dir(ws),
            PathBuf::from("/var/lib/homeval")
        );
    }

    #[test]
    fn test_load_workspace_config() {
        let dir = TempDir::new().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"
[predictor]
backend = "http"
endpoint = "http://predict.local:8080"
timeout_secs = 5

[storage]
history_key = "houses"
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.predictor.backend, PredictorBackend::Http);
        assert_eq!(config.predictor.endpoint, "http://predict.local:8080");
        assert_eq!(config.predictor.timeout_secs, 5);
        assert_eq!(config.storage.history_key, "houses");
        // Untouched sections keep their defaults.
        assert_eq!(config.analytics.date_label_format, "%Y-%m-%d");
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(None, Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_validate_rejects_empty_key() {
        let mut config = HomevalConfig::default();
        config.storage.history_key = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_exists_for_workspace_file() {
        let dir = TempDir::new().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();
        assert!(config_exists(Some(dir.path())));
    }

    #[test]
    fn test_validate_rejects_bad_date_formats() {
        let mut config = HomevalConfig::default();
        config.analytics.date_label_format = "%Q".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("analytics.date_label_format"));

        let mut config = HomevalConfig::default();
        config.export.date_format = "%Y-%".into();
        assert!(config.validate().is_err());

        let mut config = HomevalConfig::default();
        config.analytics.date_label_format = "%d/%m %H:%M".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_bad_date_format_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[analytics]\ndate_label_format = \"%Q\"\n").unwrap();
        let err = load_config(None, Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
