//! Configuration loading with environment overlays.
//!
//! Resolution order, lowest precedence first: compiled-in defaults, then
//! `fulfillment-config.yaml`, then `environments/{env}.yaml`. The overlay is
//! merged value-by-value into the base mapping, so an environment file only
//! states what it changes.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Value as YamlValue;
use tracing::{debug, info};

use crate::error::Result;

use super::error::ConfigurationError;
use super::FulfillmentConfig;

const BASE_CONFIG_FILE: &str = "fulfillment-config.yaml";

/// Loads, merges, and owns the active configuration.
#[derive(Debug)]
pub struct ConfigManager {
    config: FulfillmentConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load from the default `config/` directory with the environment
    /// auto-detected from `FULFILLMENT_ENV` / `APP_ENV`.
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load with an explicit environment. Lets tests exercise overlays
    /// without mutating process-global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        let config = Self::load_and_merge(&config_directory, environment)?;
        config.validate()?;

        debug!(
            config = %serde_json::to_string(&Self::sanitized(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string()),
            "Active configuration"
        );
        info!(
            environment = %environment,
            base_url = %config.api.base_url,
            max_concurrent_jobs = config.batch.max_concurrent_jobs,
            carriers = ?config.carriers.enabled_carriers(),
            "⚙️ Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Masked configuration dump for diagnostics. Values under keys that
    /// look credential-bearing are replaced wholesale.
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitized(&self.config)
    }

    fn detect_environment() -> String {
        env::var("FULFILLMENT_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn load_and_merge(config_directory: &Path, environment: &str) -> Result<FulfillmentConfig> {
        let base_path = config_directory.join(BASE_CONFIG_FILE);
        if !base_path.exists() {
            debug!(
                path = %base_path.display(),
                "No configuration file found, using compiled-in defaults"
            );
            return Ok(FulfillmentConfig::default());
        }

        let mut yaml = Self::read_yaml(&base_path)?;

        let overlay_path = config_directory
            .join("environments")
            .join(format!("{environment}.yaml"));
        if overlay_path.exists() {
            debug!(path = %overlay_path.display(), "Applying environment overlay");
            let overlay = Self::read_yaml(&overlay_path)?;
            Self::merge_yaml(&mut yaml, overlay);
        }

        let config = serde_yaml::from_value(yaml).map_err(|e| {
            ConfigurationError::invalid_yaml(base_path.display().to_string(), e)
        })?;
        Ok(config)
    }

    fn read_yaml(path: &Path) -> Result<YamlValue> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read(path.display().to_string(), e))?;
        let value = serde_yaml::from_str(&content)
            .map_err(|e| ConfigurationError::invalid_yaml(path.display().to_string(), e))?;
        Ok(value)
    }

    /// Recursively merge an overlay into the base. Mappings merge key by
    /// key; any other value replaces the base value outright.
    fn merge_yaml(base: &mut YamlValue, overlay: YamlValue) {
        match (&mut *base, overlay) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
                for (key, value) in overlay_map {
                    match base_map.get_mut(&key) {
                        Some(existing) => Self::merge_yaml(existing, value),
                        None => {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
            (base_slot, value) => *base_slot = value,
        }
    }

    fn sanitized(config: &FulfillmentConfig) -> serde_json::Value {
        let mut value =
            serde_json::to_value(config).unwrap_or_else(|_| serde_json::json!({}));
        Self::mask_sensitive(&mut value);
        value
    }

    fn mask_sensitive(value: &mut serde_json::Value) {
        if let serde_json::Value::Object(map) = value {
            for (key, entry) in map.iter_mut() {
                let key = key.to_ascii_lowercase();
                if key.contains("password")
                    || key.contains("secret")
                    || key.ends_with("_token")
                    || key == "api_key"
                {
                    *entry = serde_json::Value::String("***".to_string());
                } else {
                    Self::mask_sensitive(entry);
                }
            }
        }
    }
}
