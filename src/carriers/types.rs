//! Carrier vocabulary and the uniform label request/response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::{Address, PackageDimensions, PackageType, SignatureOption};

/// The fixed set of carriers the fulfillment system ships with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    Ups,
    Fedex,
    Usps,
    Dhl,
}

impl Carrier {
    pub const ALL: [Carrier; 4] = [Carrier::Ups, Carrier::Fedex, Carrier::Usps, Carrier::Dhl];

    /// Brand-cased display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Carrier::Ups => "UPS",
            Carrier::Fedex => "FedEx",
            Carrier::Usps => "USPS",
            Carrier::Dhl => "DHL",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Carrier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ups" => Ok(Carrier::Ups),
            "fedex" => Ok(Carrier::Fedex),
            "usps" => Ok(Carrier::Usps),
            "dhl" => Ok(Carrier::Dhl),
            _ => Err(format!("Unknown carrier: {s}")),
        }
    }
}

/// Carrier-neutral label purchase request.
///
/// Backends translate this into their carrier's dialect; no carrier-specific
/// field ever appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub carrier: Carrier,
    pub service_level: String,
    pub ship_from: Address,
    pub ship_to: Address,
    pub packages: Vec<PackageDimensions>,
    pub package_type: PackageType,
    pub signature: SignatureOption,
    pub shipping_date: DateTime<Utc>,
}

/// Uniform label purchase result, whatever the backend dialect was
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelResponse {
    pub tracking_number: String,
    /// Public tracking page for the customer
    pub tracking_url: String,
    /// Printable label document
    pub label_url: String,
    /// Quoted cost, when the carrier returns one
    pub cost: Option<f64>,
}
