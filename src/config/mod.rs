//! # Configuration System
//!
//! YAML-backed configuration with environment overlays. A base
//! `fulfillment-config.yaml` holds the deployment's settings; an optional
//! `environments/{env}.yaml` overlay is deep-merged on top. Every field has
//! a compiled-in default, so the crate also runs with no files at all.
//!
//! Validation happens once at load. Anything that would misbehave at
//! runtime, like a zero job limit or an enabled carrier without an endpoint,
//! is rejected before any component is built from the values.

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::carriers::Carrier;
use crate::client::{ApiClientConfig, RetryConfig, DEFAULT_LOW_WATER_SECONDS};

pub use error::ConfigurationError;
pub use loader::ConfigManager;

/// Root configuration structure mirroring `fulfillment-config.yaml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FulfillmentConfig {
    /// Storefront API client settings
    pub api: ApiConfig,

    /// Batch label generation settings
    pub batch: BatchConfig,

    /// Per-carrier endpoints and enablement
    pub carriers: CarriersConfig,

    /// Session and event plumbing settings
    pub auth: AuthConfig,
}

/// Storefront API client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry: RetrySettings,
    /// Remaining token lifetime below which a proactive refresh runs.
    pub token_low_water_seconds: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 30_000,
            retry: RetrySettings::default(),
            token_low_water_seconds: DEFAULT_LOW_WATER_SECONDS,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Materialize the client-facing configuration from the file-facing one.
    pub fn client_config(&self) -> ApiClientConfig {
        ApiClientConfig {
            base_url: self.base_url.clone(),
            timeout: self.timeout(),
            retry: RetryConfig {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                backoff_multiplier: self.retry.backoff_multiplier,
                jitter: self.retry.jitter,
            },
        }
    }

    pub fn token_low_water(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_low_water_seconds)
    }
}

/// Transient-failure retry policy, in file-friendly milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Extra attempts after the first failure
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Batch label generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Upper bound on concurrently processing jobs. Must be positive.
    pub max_concurrent_jobs: usize,
    /// Order status staged by default when loading eligible orders.
    pub default_status_filter: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            default_status_filter: "Processing".to_string(),
        }
    }
}

/// One carrier's endpoint wiring.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CarrierEndpointConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for CarrierEndpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
        }
    }
}

/// Per-carrier configuration block.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CarriersConfig {
    pub ups: CarrierEndpointConfig,
    pub fedex: CarrierEndpointConfig,
    pub usps: CarrierEndpointConfig,
    pub dhl: CarrierEndpointConfig,
}

impl Default for CarriersConfig {
    fn default() -> Self {
        let endpoint = |path: &str| CarrierEndpointConfig {
            enabled: true,
            endpoint: path.to_string(),
        };
        Self {
            ups: endpoint("/api/carriers/ups/labels"),
            fedex: endpoint("/api/carriers/fedex/labels"),
            usps: endpoint("/api/carriers/usps/labels"),
            dhl: endpoint("/api/carriers/dhl/labels"),
        }
    }
}

impl CarriersConfig {
    pub fn endpoint_for(&self, carrier: Carrier) -> &CarrierEndpointConfig {
        match carrier {
            Carrier::Ups => &self.ups,
            Carrier::Fedex => &self.fedex,
            Carrier::Usps => &self.usps,
            Carrier::Dhl => &self.dhl,
        }
    }

    pub fn enabled_carriers(&self) -> Vec<Carrier> {
        Carrier::ALL
            .into_iter()
            .filter(|carrier| self.endpoint_for(*carrier).enabled)
            .collect()
    }
}

/// Session and event plumbing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Endpoint the token refresher posts to.
    pub refresh_endpoint: String,
    /// Broadcast channel capacity for lifecycle and session events.
    pub events_capacity: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_endpoint: "/api/auth/refresh".to_string(),
            events_capacity: 256,
        }
    }
}

impl FulfillmentConfig {
    /// Validate loaded values for internal consistency. Called by the loader
    /// before the configuration is handed to anyone.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "api.base_url",
                "must not be empty",
            ));
        }
        if self.api.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "api.timeout_ms",
                "must be positive",
            ));
        }
        if self.api.retry.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "api.retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        if self.api.retry.max_delay_ms < self.api.retry.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "api.retry.max_delay_ms",
                "must be at least base_delay_ms",
            ));
        }
        if self.api.token_low_water_seconds <= 0 {
            return Err(ConfigurationError::invalid_value(
                "api.token_low_water_seconds",
                "must be positive",
            ));
        }

        if self.batch.max_concurrent_jobs == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.max_concurrent_jobs",
                "must be greater than zero",
            ));
        }
        if self.batch.default_status_filter.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "batch.default_status_filter",
                "must not be empty",
            ));
        }

        for carrier in Carrier::ALL {
            let endpoint = self.carriers.endpoint_for(carrier);
            if endpoint.enabled && endpoint.endpoint.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "carriers",
                    format!("{carrier} is enabled but has no endpoint"),
                ));
            }
        }

        if self.auth.refresh_endpoint.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "auth.refresh_endpoint",
                "must not be empty",
            ));
        }
        if self.auth.events_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "auth.events_capacity",
                "must be positive",
            ));
        }

        Ok(())
    }
}
