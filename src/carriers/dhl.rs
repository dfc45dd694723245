//! DHL Express label backend.
//!
//! DHL is metric-only (centimeters and kilograms) and identifies products by
//! single-letter codes. The label document arrives in a documents array, not
//! as a top-level URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::carriers::gateway::{map_api_error, CarrierBackend};
use crate::carriers::types::{Carrier, LabelRequest, LabelResponse};
use crate::client::ApiClient;
use crate::error::{FulfillmentError, Result};
use crate::models::{Address, DimensionUnit, PackageDimensions, SignatureOption, WeightUnit};

const CM_PER_INCH: f64 = 2.54;
const KG_PER_LB: f64 = 0.453_592_37;

pub struct DhlBackend {
    client: Arc<ApiClient>,
    endpoint: String,
}

impl DhlBackend {
    pub fn new(client: Arc<ApiClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DhlShipmentRequest {
    product_code: &'static str,
    planned_shipping_date: String,
    shipper: DhlParty,
    receiver: DhlParty,
    packages: Vec<DhlPackage>,
    customer_references: Vec<String>,
    signature_service: bool,
}

#[derive(Debug, Serialize)]
struct DhlParty {
    full_name: String,
    company_name: Option<String>,
    address_line1: String,
    address_line2: Option<String>,
    city_name: String,
    province_code: String,
    postal_code: String,
    country_code: String,
    phone: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct DhlPackage {
    /// Kilograms
    weight: f64,
    dimensions: DhlDimensions,
}

#[derive(Debug, Serialize)]
struct DhlDimensions {
    /// Centimeters
    length: f64,
    /// Centimeters
    width: f64,
    /// Centimeters
    height: f64,
}

#[derive(Debug, Deserialize)]
struct DhlShipmentResponse {
    shipment_tracking_number: String,
    documents: Vec<DhlDocument>,
    shipment_charges: Option<DhlCharge>,
}

#[derive(Debug, Deserialize)]
struct DhlDocument {
    type_code: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct DhlCharge {
    price: f64,
}

fn product_code(service_level: &str) -> Result<&'static str> {
    match service_level {
        "DHL Express Worldwide" => Ok("P"),
        "DHL Express 12:00" => Ok("T"),
        "DHL Express Envelope" => Ok("X"),
        other => Err(FulfillmentError::Validation(format!(
            "no DHL product code for {other:?}"
        ))),
    }
}

fn to_centimeters(value: f64, unit: DimensionUnit) -> f64 {
    match unit {
        DimensionUnit::Cm => value,
        DimensionUnit::In => value * CM_PER_INCH,
    }
}

fn to_kilograms(value: f64, unit: WeightUnit) -> f64 {
    match unit {
        WeightUnit::Kg => value,
        WeightUnit::Lb => value * KG_PER_LB,
    }
}

fn map_party(address: &Address) -> DhlParty {
    DhlParty {
        full_name: address.name.clone(),
        company_name: address.company.clone(),
        address_line1: address.street1.clone(),
        address_line2: address.street2.clone(),
        city_name: address.city.clone(),
        province_code: address.state.clone(),
        postal_code: address.postal_code.clone(),
        country_code: address.country.clone(),
        phone: address.phone.clone(),
        email: address.email.clone(),
    }
}

fn map_package(package: &PackageDimensions) -> DhlPackage {
    DhlPackage {
        weight: to_kilograms(package.weight, package.weight_unit),
        dimensions: DhlDimensions {
            length: to_centimeters(package.length, package.dimension_unit),
            width: to_centimeters(package.width, package.dimension_unit),
            height: to_centimeters(package.height, package.dimension_unit),
        },
    }
}

fn build_payload(request: &LabelRequest) -> Result<DhlShipmentRequest> {
    Ok(DhlShipmentRequest {
        product_code: product_code(&request.service_level)?,
        planned_shipping_date: request.shipping_date.format("%Y-%m-%d").to_string(),
        shipper: map_party(&request.ship_from),
        receiver: map_party(&request.ship_to),
        packages: request.packages.iter().map(map_package).collect(),
        customer_references: vec![request.order_number.clone()],
        signature_service: !matches!(request.signature, SignatureOption::NotRequired),
    })
}

impl DhlShipmentResponse {
    fn into_label_response(self) -> Result<LabelResponse> {
        let label_url = self
            .documents
            .into_iter()
            .find(|doc| doc.type_code == "label")
            .map(|doc| doc.url)
            .ok_or_else(|| FulfillmentError::Carrier {
                carrier: Carrier::Dhl,
                message: "response carried no label document".to_string(),
            })?;

        let tracking_url = format!(
            "https://www.dhl.com/us-en/home/tracking.html?tracking-id={}",
            self.shipment_tracking_number
        );

        Ok(LabelResponse {
            tracking_number: self.shipment_tracking_number,
            tracking_url,
            label_url,
            cost: self.shipment_charges.map(|charge| charge.price),
        })
    }
}

#[async_trait]
impl CarrierBackend for DhlBackend {
    async fn purchase_label(&self, request: &LabelRequest) -> Result<LabelResponse> {
        let payload = build_payload(request)?;
        let body = serde_json::to_value(&payload)
            .map_err(|e| FulfillmentError::Validation(format!("unserializable DHL request: {e}")))?;

        let response: DhlShipmentResponse = self
            .client
            .post_json(&self.endpoint, body)
            .await
            .map_err(|e| map_api_error(Carrier::Dhl, e))?;

        response.into_label_response()
    }
}
