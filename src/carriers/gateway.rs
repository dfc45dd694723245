//! # Gateway Router
//!
//! One uniform entry point over the per-carrier backends. Every structural
//! problem with a request (a service level the carrier does not offer, an
//! incomplete address, an unratable package) is rejected here, before any
//! network I/O. The gateway performs no retries and no partial-failure
//! handling: transport resilience belongs to the API client, per-job
//! isolation to the orchestrator. Backend errors propagate unchanged.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::carriers::services;
use crate::carriers::types::{Carrier, LabelRequest, LabelResponse};
use crate::client::{ApiClient, ApiError};
use crate::error::{FulfillmentError, Result};

/// A single carrier's label purchasing implementation.
///
/// Backends are only invoked with requests the gateway has already validated
/// for their carrier; they own the dialect translation and nothing else.
#[async_trait]
pub trait CarrierBackend: Send + Sync {
    async fn purchase_label(&self, request: &LabelRequest) -> Result<LabelResponse>;
}

/// Routes validated label requests to the backend registered for the carrier
pub struct CarrierGateway {
    backends: HashMap<Carrier, Arc<dyn CarrierBackend>>,
}

impl CarrierGateway {
    /// Build a gateway over an explicit backend registry. The compiled-in
    /// service catalog is validated here so a broken table fails loudly at
    /// startup instead of surfacing per-request.
    pub fn new(backends: HashMap<Carrier, Arc<dyn CarrierBackend>>) -> Result<Self> {
        services::validate_catalog()?;

        let mut carriers: Vec<&Carrier> = backends.keys().collect();
        carriers.sort_by_key(|c| c.as_str());
        info!(carriers = ?carriers, "🚛 Carrier gateway initialized");

        Ok(Self { backends })
    }

    /// Build the production registry from configuration: one HTTP backend
    /// per enabled carrier, all sharing the resilient API client.
    pub fn from_config(
        config: &crate::config::CarriersConfig,
        client: Arc<ApiClient>,
    ) -> Result<Self> {
        let mut backends: HashMap<Carrier, Arc<dyn CarrierBackend>> = HashMap::new();

        for carrier in Carrier::ALL {
            let endpoint = config.endpoint_for(carrier);
            if !endpoint.enabled {
                debug!(carrier = %carrier, "Carrier disabled by configuration, skipping backend");
                continue;
            }
            let backend: Arc<dyn CarrierBackend> = match carrier {
                Carrier::Ups => Arc::new(crate::carriers::ups::UpsBackend::new(
                    client.clone(),
                    endpoint.endpoint.clone(),
                )),
                Carrier::Fedex => Arc::new(crate::carriers::fedex::FedexBackend::new(
                    client.clone(),
                    endpoint.endpoint.clone(),
                )),
                Carrier::Usps => Arc::new(crate::carriers::usps::UspsBackend::new(
                    client.clone(),
                    endpoint.endpoint.clone(),
                )),
                Carrier::Dhl => Arc::new(crate::carriers::dhl::DhlBackend::new(
                    client.clone(),
                    endpoint.endpoint.clone(),
                )),
            };
            backends.insert(carrier, backend);
        }

        Self::new(backends)
    }

    pub fn registered_carriers(&self) -> Vec<Carrier> {
        let mut carriers: Vec<Carrier> = self.backends.keys().copied().collect();
        carriers.sort_by_key(|c| c.as_str());
        carriers
    }

    /// Validate and route a label purchase. Validation failures never reach
    /// the network; backend errors come back unchanged.
    pub async fn generate_label(&self, request: &LabelRequest) -> Result<LabelResponse> {
        self.validate(request)?;

        let backend = self.backends.get(&request.carrier).ok_or_else(|| {
            FulfillmentError::Validation(format!(
                "carrier {} is not enabled in this deployment",
                request.carrier
            ))
        })?;

        debug!(
            order_id = %request.order_id,
            carrier = %request.carrier,
            service_level = %request.service_level,
            packages = request.packages.len(),
            "Dispatching label purchase"
        );

        backend.purchase_label(request).await
    }

    /// Structural checks, all before any network I/O
    fn validate(&self, request: &LabelRequest) -> Result<()> {
        services::validate_service_level(request.carrier, &request.service_level)?;

        let missing = request.ship_to.missing_required_fields();
        if !missing.is_empty() {
            return Err(FulfillmentError::Validation(format!(
                "ship-to address is missing required fields: {}",
                missing.join(", ")
            )));
        }

        let missing = request.ship_from.missing_required_fields();
        if !missing.is_empty() {
            return Err(FulfillmentError::Validation(format!(
                "ship-from address is missing required fields: {}",
                missing.join(", ")
            )));
        }

        if request.packages.is_empty() {
            return Err(FulfillmentError::Validation(
                "label request carries no packages".to_string(),
            ));
        }
        if let Some(index) = request.packages.iter().position(|p| !p.is_valid()) {
            return Err(FulfillmentError::Validation(format!(
                "package {index} has a non-positive dimension or weight"
            )));
        }

        Ok(())
    }
}

/// Map a client-level error into the per-job taxonomy for `carrier`.
/// Rejections and undecodable bodies are the carrier's answer; everything
/// transport-shaped stays transient.
pub(crate) fn map_api_error(carrier: Carrier, err: ApiError) -> FulfillmentError {
    match err {
        ApiError::AuthExpired => FulfillmentError::AuthExpired,
        ApiError::Rejected { status, message } => FulfillmentError::Carrier {
            carrier,
            message: format!("{status}: {message}"),
        },
        ApiError::Decode(message) => FulfillmentError::Carrier {
            carrier,
            message: format!("undecodable label response: {message}"),
        },
        other => FulfillmentError::TransientNetwork(other.to_string()),
    }
}
