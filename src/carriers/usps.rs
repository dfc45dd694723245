//! USPS label backend.
//!
//! USPS rates exclusively in inches and pounds, so metric packages are
//! converted on the way out. Signature handling rides on numeric extra
//! service codes rather than a dedicated field.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::carriers::gateway::{map_api_error, CarrierBackend};
use crate::carriers::types::{Carrier, LabelRequest, LabelResponse};
use crate::client::ApiClient;
use crate::error::{FulfillmentError, Result};
use crate::models::{Address, DimensionUnit, PackageDimensions, PackageType, SignatureOption, WeightUnit};

const CM_PER_INCH: f64 = 2.54;
const LB_PER_KG: f64 = 2.204_622_6;

/// Signature Confirmation extra service
const EXTRA_SERVICE_SIGNATURE: u16 = 921;
/// Adult Signature Required extra service
const EXTRA_SERVICE_ADULT_SIGNATURE: u16 = 922;

pub struct UspsBackend {
    client: Arc<ApiClient>,
    endpoint: String,
}

impl UspsBackend {
    pub fn new(client: Arc<ApiClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct UspsLabelRequest {
    mail_class: &'static str,
    from_address: UspsAddress,
    to_address: UspsAddress,
    packages: Vec<UspsPackage>,
    processing_category: &'static str,
    extra_services: Vec<u16>,
    mailing_date: String,
    customer_reference: String,
}

#[derive(Debug, Serialize)]
struct UspsAddress {
    name: String,
    firm: Option<String>,
    street_address: String,
    secondary_address: Option<String>,
    city: String,
    state: String,
    zip_code: String,
}

#[derive(Debug, Serialize)]
struct UspsPackage {
    /// Inches
    length: f64,
    /// Inches
    width: f64,
    /// Inches
    height: f64,
    /// Pounds
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct UspsLabelResult {
    tracking: UspsTracking,
    label: UspsLabel,
    postage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UspsTracking {
    number: String,
}

#[derive(Debug, Deserialize)]
struct UspsLabel {
    url: String,
}

fn mail_class(service_level: &str) -> Result<&'static str> {
    match service_level {
        "USPS Ground Advantage" => Ok("GROUND_ADVANTAGE"),
        "USPS Priority Mail" => Ok("PRIORITY_MAIL"),
        "USPS Priority Mail Express" => Ok("PRIORITY_MAIL_EXPRESS"),
        "USPS Media Mail" => Ok("MEDIA_MAIL"),
        other => Err(FulfillmentError::Validation(format!(
            "no USPS mail class for {other:?}"
        ))),
    }
}

fn processing_category(package_type: PackageType) -> &'static str {
    match package_type {
        PackageType::Envelope => "FLATS",
        PackageType::Tube => "NON_MACHINABLE",
        PackageType::Parcel | PackageType::Box => "MACHINABLE",
    }
}

fn extra_services(signature: SignatureOption) -> Vec<u16> {
    match signature {
        SignatureOption::NotRequired => Vec::new(),
        SignatureOption::Required => vec![EXTRA_SERVICE_SIGNATURE],
        SignatureOption::Adult => vec![EXTRA_SERVICE_ADULT_SIGNATURE],
    }
}

fn to_inches(value: f64, unit: DimensionUnit) -> f64 {
    match unit {
        DimensionUnit::In => value,
        DimensionUnit::Cm => value / CM_PER_INCH,
    }
}

fn to_pounds(value: f64, unit: WeightUnit) -> f64 {
    match unit {
        WeightUnit::Lb => value,
        WeightUnit::Kg => value * LB_PER_KG,
    }
}

fn map_address(address: &Address) -> UspsAddress {
    UspsAddress {
        name: address.name.clone(),
        firm: address.company.clone(),
        street_address: address.street1.clone(),
        secondary_address: address.street2.clone(),
        city: address.city.clone(),
        state: address.state.clone(),
        zip_code: address.postal_code.clone(),
    }
}

fn map_package(package: &PackageDimensions) -> UspsPackage {
    UspsPackage {
        length: to_inches(package.length, package.dimension_unit),
        width: to_inches(package.width, package.dimension_unit),
        height: to_inches(package.height, package.dimension_unit),
        weight: to_pounds(package.weight, package.weight_unit),
    }
}

fn build_payload(request: &LabelRequest) -> Result<UspsLabelRequest> {
    Ok(UspsLabelRequest {
        mail_class: mail_class(&request.service_level)?,
        from_address: map_address(&request.ship_from),
        to_address: map_address(&request.ship_to),
        packages: request.packages.iter().map(map_package).collect(),
        processing_category: processing_category(request.package_type),
        extra_services: extra_services(request.signature),
        mailing_date: request.shipping_date.format("%Y-%m-%d").to_string(),
        customer_reference: request.order_number.clone(),
    })
}

impl UspsLabelResult {
    fn into_label_response(self) -> LabelResponse {
        let tracking_url = format!(
            "https://tools.usps.com/go/TrackConfirmAction?tLabels={}",
            self.tracking.number
        );
        LabelResponse {
            tracking_number: self.tracking.number,
            tracking_url,
            label_url: self.label.url,
            cost: self.postage,
        }
    }
}

#[async_trait]
impl CarrierBackend for UspsBackend {
    async fn purchase_label(&self, request: &LabelRequest) -> Result<LabelResponse> {
        let payload = build_payload(request)?;
        let body = serde_json::to_value(&payload).map_err(|e| {
            FulfillmentError::Validation(format!("unserializable USPS request: {e}"))
        })?;

        let response: UspsLabelResult = self
            .client
            .post_json(&self.endpoint, body)
            .await
            .map_err(|e| map_api_error(Carrier::Usps, e))?;

        Ok(response.into_label_response())
    }
}
