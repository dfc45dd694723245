//! Static carrier → allowed-service-level table.
//!
//! Service levels are an exact-match vocabulary: a level string is valid for
//! exactly the carrier that offers it, so selecting UPS with a FedEx level
//! fails before any network call is made.

use crate::carriers::types::Carrier;
use crate::error::{FulfillmentError, Result};

/// Service levels each carrier offers, as they appear on shipments and in
/// the back office UI
pub fn allowed_service_levels(carrier: Carrier) -> &'static [&'static str] {
    match carrier {
        Carrier::Ups => &[
            "UPS Ground",
            "UPS 3 Day Select",
            "UPS 2nd Day Air",
            "UPS Next Day Air Saver",
            "UPS Next Day Air",
        ],
        Carrier::Fedex => &[
            "FedEx Ground",
            "FedEx Express Saver",
            "FedEx 2Day",
            "FedEx Standard Overnight",
            "FedEx Priority Overnight",
        ],
        Carrier::Usps => &[
            "USPS Ground Advantage",
            "USPS Priority Mail",
            "USPS Priority Mail Express",
            "USPS Media Mail",
        ],
        Carrier::Dhl => &[
            "DHL Express Worldwide",
            "DHL Express 12:00",
            "DHL Express Envelope",
        ],
    }
}

pub fn is_allowed_service_level(carrier: Carrier, service_level: &str) -> bool {
    allowed_service_levels(carrier).contains(&service_level)
}

/// Exact-match service level check, failing with the allowed vocabulary in
/// the message so operators can correct the selection
pub fn validate_service_level(carrier: Carrier, service_level: &str) -> Result<()> {
    if is_allowed_service_level(carrier, service_level) {
        return Ok(());
    }
    Err(FulfillmentError::Validation(format!(
        "service level {service_level:?} is not offered by {carrier}; allowed: {}",
        allowed_service_levels(carrier).join(", ")
    )))
}

/// Sanity checks over the compiled-in table, run once at gateway
/// construction: every carrier offers at least one level, no blank entries,
/// and no level string is shared between carriers.
pub fn validate_catalog() -> Result<()> {
    let mut seen: Vec<&'static str> = Vec::new();
    for carrier in Carrier::ALL {
        let levels = allowed_service_levels(carrier);
        if levels.is_empty() {
            return Err(FulfillmentError::Configuration(format!(
                "service catalog offers no levels for {carrier}"
            )));
        }
        for level in levels {
            if level.trim().is_empty() {
                return Err(FulfillmentError::Configuration(format!(
                    "service catalog has a blank level for {carrier}"
                )));
            }
            if seen.contains(level) {
                return Err(FulfillmentError::Configuration(format!(
                    "service level {level:?} is listed for more than one carrier"
                )));
            }
            seen.push(level);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_carrier_and_level_accepted() {
        assert!(validate_service_level(Carrier::Ups, "UPS Ground").is_ok());
        assert!(validate_service_level(Carrier::Fedex, "FedEx Ground").is_ok());
        assert!(validate_service_level(Carrier::Usps, "USPS Priority Mail").is_ok());
        assert!(validate_service_level(Carrier::Dhl, "DHL Express Worldwide").is_ok());
    }

    #[test]
    fn test_cross_carrier_level_rejected() {
        let err = validate_service_level(Carrier::Ups, "FedEx Ground").unwrap_err();
        match err {
            FulfillmentError::Validation(message) => {
                assert!(message.contains("FedEx Ground"));
                assert!(message.contains("UPS Ground"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_level_matching_is_exact() {
        assert!(validate_service_level(Carrier::Ups, "ups ground").is_err());
        assert!(validate_service_level(Carrier::Ups, "UPS Ground ").is_err());
    }

    #[test]
    fn test_compiled_catalog_passes_validation() {
        assert!(validate_catalog().is_ok());
    }
}
