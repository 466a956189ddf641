//! Analyzer Configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config location when `CONFIG_PATH` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/safewatch.json";

/// Analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Directory holding the persisted classifier and scaler
    pub model_dir: PathBuf,
    /// Version string reported with every response
    pub model_version: String,
    /// Bootstrap ensemble settings
    pub forest: ForestConfig,
    /// HTTP listener settings
    pub server: ServerConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            model_version: "1.0.0".into(),
            forest: ForestConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Resolve configuration from the environment.
    ///
    /// Reads the file named by `CONFIG_PATH`, falling back to defaults when
    /// it is missing or unreadable. `PORT` and `MODEL_DIR` override the file.
    pub fn from_env() -> Self {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

        let mut config = Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Config not loaded from {} ({}), using defaults", path, e);
            Self::default()
        });

        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Ok(dir) = std::env::var("MODEL_DIR") {
            config.model_dir = PathBuf::from(dir);
        }

        config
    }
}

/// Settings for the synthetic bootstrap model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Synthetic samples generated when no model is persisted
    pub sample_count: usize,
    /// RNG seed for sampling and bootstrapping
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            sample_count: 1000,
            seed: 42,
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{"model_dir": "/var/lib/safewatch", "forest": {"n_estimators": 12}}"#)
                .unwrap();

        assert_eq!(config.model_dir, PathBuf::from("/var/lib/safewatch"));
        assert_eq!(config.forest.n_estimators, 12);
        assert_eq!(config.forest.max_depth, 10);
        assert_eq!(config.model_version, "1.0.0");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safewatch.json");

        let mut config = AnalyzerConfig::default();
        config.server.port = 9100;
        config.save(&path).unwrap();

        let loaded = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(loaded.server.bind_addr(), "0.0.0.0:9100");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();

        let err = AnalyzerConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
