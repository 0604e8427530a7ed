//! Configuration types for Tenantry.
//!
//! Configuration is loaded from YAML:
//!
//! - **tenantry.yaml**: main file, with an inline `tenancy` section or a
//!   `tenancy_file` reference, and logging settings
//! - **tenancy.yaml**: tenant column per table and global tables

pub mod tenancy;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use tenancy::{TableTenancyConfig, TenancyConfig};

/// Complete Tenantry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantryConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// Tenancy configuration (inline or from file).
    #[serde(default)]
    pub tenancy: TenancyConfig,

    /// Path to tenancy configuration file (alternative to inline).
    /// Relative paths resolve against the main config file's directory.
    #[serde(default)]
    pub tenancy_file: Option<PathBuf>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TenantryConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve the `tenancy_file` reference, if any.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(tenancy_file) = &config.tenancy_file {
            config.tenancy = TenancyConfig::load_from_path(tenancy_file, &base_dir)?;
        }

        Ok(config)
    }
}
