//! UPS label backend.
//!
//! UPS identifies services by two-digit codes and accepts measurements in
//! the unit system they were captured in, so packages pass through
//! conversion-free with a unit marker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::carriers::gateway::{map_api_error, CarrierBackend};
use crate::carriers::types::{Carrier, LabelRequest, LabelResponse};
use crate::client::ApiClient;
use crate::error::{FulfillmentError, Result};
use crate::models::{Address, DimensionUnit, PackageDimensions, PackageType, SignatureOption, WeightUnit};

pub struct UpsBackend {
    client: Arc<ApiClient>,
    endpoint: String,
}

impl UpsBackend {
    pub fn new(client: Arc<ApiClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct UpsShipmentRequest {
    service_code: &'static str,
    shipper: UpsAddress,
    ship_to: UpsAddress,
    packages: Vec<UpsPackage>,
    reference_number: String,
    delivery_confirmation: Option<&'static str>,
    label_format: &'static str,
    ship_date: String,
}

#[derive(Debug, Serialize)]
struct UpsAddress {
    name: String,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state_province: String,
    postal_code: String,
    country_code: String,
}

#[derive(Debug, Serialize)]
struct UpsPackage {
    packaging_type: &'static str,
    dimensions: UpsDimensions,
    weight: UpsWeight,
}

#[derive(Debug, Serialize)]
struct UpsDimensions {
    length: f64,
    width: f64,
    height: f64,
    unit: &'static str,
}

#[derive(Debug, Serialize)]
struct UpsWeight {
    value: f64,
    unit: &'static str,
}

#[derive(Debug, Deserialize)]
struct UpsShipmentResponse {
    shipment_identification_number: String,
    label_url: String,
    negotiated_rate: Option<f64>,
}

fn service_code(service_level: &str) -> Result<&'static str> {
    match service_level {
        "UPS Ground" => Ok("03"),
        "UPS 3 Day Select" => Ok("12"),
        "UPS 2nd Day Air" => Ok("02"),
        "UPS Next Day Air Saver" => Ok("13"),
        "UPS Next Day Air" => Ok("01"),
        other => Err(FulfillmentError::Validation(format!(
            "no UPS service code for {other:?}"
        ))),
    }
}

fn packaging_type(package_type: PackageType) -> &'static str {
    match package_type {
        PackageType::Parcel | PackageType::Box => "02",
        PackageType::Envelope => "01",
        PackageType::Tube => "03",
    }
}

fn delivery_confirmation(signature: SignatureOption) -> Option<&'static str> {
    match signature {
        SignatureOption::NotRequired => None,
        SignatureOption::Required => Some("SIGNATURE_REQUIRED"),
        SignatureOption::Adult => Some("ADULT_SIGNATURE_REQUIRED"),
    }
}

fn map_address(address: &Address) -> UpsAddress {
    UpsAddress {
        name: address.name.clone(),
        address_line1: address.street1.clone(),
        address_line2: address.street2.clone(),
        city: address.city.clone(),
        state_province: address.state.clone(),
        postal_code: address.postal_code.clone(),
        country_code: address.country.clone(),
    }
}

fn map_package(package: &PackageDimensions, package_type: PackageType) -> UpsPackage {
    UpsPackage {
        packaging_type: packaging_type(package_type),
        dimensions: UpsDimensions {
            length: package.length,
            width: package.width,
            height: package.height,
            unit: match package.dimension_unit {
                DimensionUnit::In => "IN",
                DimensionUnit::Cm => "CM",
            },
        },
        weight: UpsWeight {
            value: package.weight,
            unit: match package.weight_unit {
                WeightUnit::Lb => "LBS",
                WeightUnit::Kg => "KGS",
            },
        },
    }
}

fn build_payload(request: &LabelRequest) -> Result<UpsShipmentRequest> {
    Ok(UpsShipmentRequest {
        service_code: service_code(&request.service_level)?,
        shipper: map_address(&request.ship_from),
        ship_to: map_address(&request.ship_to),
        packages: request
            .packages
            .iter()
            .map(|p| map_package(p, request.package_type))
            .collect(),
        reference_number: request.order_number.clone(),
        delivery_confirmation: delivery_confirmation(request.signature),
        label_format: "PDF",
        ship_date: request.shipping_date.format("%Y-%m-%d").to_string(),
    })
}

impl UpsShipmentResponse {
    fn into_label_response(self) -> LabelResponse {
        let tracking_url = format!(
            "https://www.ups.com/track?tracknum={}",
            self.shipment_identification_number
        );
        LabelResponse {
            tracking_number: self.shipment_identification_number,
            tracking_url,
            label_url: self.label_url,
            cost: self.negotiated_rate,
        }
    }
}

#[async_trait]
impl CarrierBackend for UpsBackend {
    async fn purchase_label(&self, request: &LabelRequest) -> Result<LabelResponse> {
        let payload = build_payload(request)?;
        let body = serde_json::to_value(&payload)
            .map_err(|e| FulfillmentError::Validation(format!("unserializable UPS request: {e}")))?;

        let response: UpsShipmentResponse = self
            .client
            .post_json(&self.endpoint, body)
            .await
            .map_err(|e| map_api_error(Carrier::Ups, e))?;

        Ok(response.into_label_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_codes_cover_catalog() {
        for level in crate::carriers::services::allowed_service_levels(Carrier::Ups) {
            assert!(service_code(level).is_ok(), "missing code for {level}");
        }
        assert!(service_code("FedEx Ground").is_err());
    }

    #[test]
    fn test_response_normalization_builds_tracking_url() {
        let response = UpsShipmentResponse {
            shipment_identification_number: "1Z999AA10123456784".to_string(),
            label_url: "https://labels.example.com/1Z.pdf".to_string(),
            negotiated_rate: Some(14.20),
        };

        let label = response.into_label_response();
        assert_eq!(label.tracking_number, "1Z999AA10123456784");
        assert!(label.tracking_url.contains("tracknum=1Z999AA10123456784"));
        assert_eq!(label.cost, Some(14.20));
    }

    #[test]
    fn test_package_units_pass_through_tagged() {
        let mut package = PackageDimensions::new(30.0, 20.0, 10.0, 4.0);
        package.dimension_unit = DimensionUnit::Cm;
        package.weight_unit = WeightUnit::Kg;

        let mapped = map_package(&package, PackageType::Parcel);
        assert_eq!(mapped.dimensions.unit, "CM");
        assert_eq!(mapped.weight.unit, "KGS");
        assert!((mapped.weight.value - 4.0).abs() < f64::EPSILON);
    }
}
