//! Package value types shared by orders, shipments, and label requests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Linear dimension unit for package measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DimensionUnit {
    #[default]
    In,
    Cm,
}

/// Weight unit for package measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    #[default]
    Lb,
    Kg,
}

/// Physical packaging category sent to the carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    #[default]
    Parcel,
    Envelope,
    Tube,
    Box,
}

/// Delivery signature requirement for a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignatureOption {
    Required,
    #[default]
    NotRequired,
    Adult,
}

impl fmt::Display for SignatureOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::NotRequired => write!(f, "not_required"),
            Self::Adult => write!(f, "adult"),
        }
    }
}

/// One physical package's measurements.
///
/// A shipment carries one set per package; multi-package shipments send
/// several sets in a single label request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub dimension_unit: DimensionUnit,
    pub weight: f64,
    pub weight_unit: WeightUnit,
}

impl PackageDimensions {
    pub fn new(length: f64, width: f64, height: f64, weight: f64) -> Self {
        Self {
            length,
            width,
            height,
            dimension_unit: DimensionUnit::default(),
            weight,
            weight_unit: WeightUnit::default(),
        }
    }

    /// All measurements must be strictly positive for a carrier to rate them.
    pub fn is_valid(&self) -> bool {
        self.length > 0.0 && self.width > 0.0 && self.height > 0.0 && self.weight > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_validity() {
        assert!(PackageDimensions::new(12.0, 8.0, 4.0, 2.5).is_valid());
        assert!(!PackageDimensions::new(0.0, 8.0, 4.0, 2.5).is_valid());
        assert!(!PackageDimensions::new(12.0, 8.0, 4.0, -1.0).is_valid());
    }

    #[test]
    fn test_signature_option_serde() {
        let json = serde_json::to_string(&SignatureOption::NotRequired).unwrap();
        assert_eq!(json, "\"not_required\"");
        let parsed: SignatureOption = serde_json::from_str("\"adult\"").unwrap();
        assert_eq!(parsed, SignatureOption::Adult);
    }
}
