//! FedEx label backend.
//!
//! FedEx speaks camelCase JSON with SCREAMING_SNAKE service enums and rates
//! whole-number dimensions, so lengths are ceiled before submission.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::carriers::gateway::{map_api_error, CarrierBackend};
use crate::carriers::types::{Carrier, LabelRequest, LabelResponse};
use crate::client::ApiClient;
use crate::error::{FulfillmentError, Result};
use crate::models::{Address, DimensionUnit, PackageDimensions, SignatureOption, WeightUnit};

pub struct FedexBackend {
    client: Arc<ApiClient>,
    endpoint: String,
}

impl FedexBackend {
    pub fn new(client: Arc<ApiClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FedexShipRequest {
    service_type: &'static str,
    shipper: FedexParty,
    recipient: FedexParty,
    requested_package_line_items: Vec<FedexPackageLineItem>,
    signature_option_type: &'static str,
    label_specification: FedexLabelSpecification,
    ship_datestamp: String,
    customer_reference: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FedexParty {
    contact: FedexContact,
    address: FedexAddress,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FedexContact {
    person_name: String,
    phone_number: Option<String>,
    email_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FedexAddress {
    street_lines: Vec<String>,
    city: String,
    state_or_province_code: String,
    postal_code: String,
    country_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FedexPackageLineItem {
    weight: FedexWeight,
    dimensions: FedexDimensions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FedexWeight {
    units: &'static str,
    value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FedexDimensions {
    length: u32,
    width: u32,
    height: u32,
    units: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FedexLabelSpecification {
    image_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FedexShipResponse {
    tracking_number: String,
    label_url: String,
    total_charge: Option<f64>,
}

fn service_type(service_level: &str) -> Result<&'static str> {
    match service_level {
        "FedEx Ground" => Ok("FEDEX_GROUND"),
        "FedEx Express Saver" => Ok("FEDEX_EXPRESS_SAVER"),
        "FedEx 2Day" => Ok("FEDEX_2_DAY"),
        "FedEx Standard Overnight" => Ok("STANDARD_OVERNIGHT"),
        "FedEx Priority Overnight" => Ok("PRIORITY_OVERNIGHT"),
        other => Err(FulfillmentError::Validation(format!(
            "no FedEx service type for {other:?}"
        ))),
    }
}

fn signature_option(signature: SignatureOption) -> &'static str {
    match signature {
        SignatureOption::NotRequired => "SERVICE_DEFAULT",
        SignatureOption::Required => "DIRECT",
        SignatureOption::Adult => "ADULT",
    }
}

fn map_party(address: &Address) -> FedexParty {
    let mut street_lines = vec![address.street1.clone()];
    if let Some(street2) = &address.street2 {
        street_lines.push(street2.clone());
    }
    FedexParty {
        contact: FedexContact {
            person_name: address.name.clone(),
            phone_number: address.phone.clone(),
            email_address: address.email.clone(),
        },
        address: FedexAddress {
            street_lines,
            city: address.city.clone(),
            state_or_province_code: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country_code: address.country.clone(),
        },
    }
}

fn map_line_item(package: &PackageDimensions) -> FedexPackageLineItem {
    FedexPackageLineItem {
        weight: FedexWeight {
            units: match package.weight_unit {
                WeightUnit::Lb => "LB",
                WeightUnit::Kg => "KG",
            },
            value: package.weight,
        },
        // FedEx rates whole-number dimensions; round up so nothing ships in
        // a smaller declared box than it needs.
        dimensions: FedexDimensions {
            length: package.length.ceil() as u32,
            width: package.width.ceil() as u32,
            height: package.height.ceil() as u32,
            units: match package.dimension_unit {
                DimensionUnit::In => "IN",
                DimensionUnit::Cm => "CM",
            },
        },
    }
}

fn build_payload(request: &LabelRequest) -> Result<FedexShipRequest> {
    Ok(FedexShipRequest {
        service_type: service_type(&request.service_level)?,
        shipper: map_party(&request.ship_from),
        recipient: map_party(&request.ship_to),
        requested_package_line_items: request.packages.iter().map(map_line_item).collect(),
        signature_option_type: signature_option(request.signature),
        label_specification: FedexLabelSpecification { image_type: "PDF" },
        ship_datestamp: request.shipping_date.format("%Y-%m-%d").to_string(),
        customer_reference: request.order_number.clone(),
    })
}

impl FedexShipResponse {
    fn into_label_response(self) -> LabelResponse {
        let tracking_url = format!(
            "https://www.fedex.com/fedextrack/?trknbr={}",
            self.tracking_number
        );
        LabelResponse {
            tracking_number: self.tracking_number,
            tracking_url,
            label_url: self.label_url,
            cost: self.total_charge,
        }
    }
}

#[async_trait]
impl CarrierBackend for FedexBackend {
    async fn purchase_label(&self, request: &LabelRequest) -> Result<LabelResponse> {
        let payload = build_payload(request)?;
        let body = serde_json::to_value(&payload).map_err(|e| {
            FulfillmentError::Validation(format!("unserializable FedEx request: {e}"))
        })?;

        let response: FedexShipResponse = self
            .client
            .post_json(&self.endpoint, body)
            .await
            .map_err(|e| map_api_error(Carrier::Fedex, e))?;

        Ok(response.into_label_response())
    }
}
