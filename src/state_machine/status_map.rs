//! Carrier status-code → shipment-state mapping table.
//!
//! Status is *derived*: the most recent ingested tracking event's raw status
//! code is looked up here and the result, if any, is proposed as the next
//! shipment state. The table is explicit and validated at load time so a feed
//! change surfaces as a loud gap (unknown code, status unchanged, warning
//! logged) instead of a silent mis-classification.

use std::collections::HashMap;

use super::errors::{StateMachineError, StateMachineResult};
use super::states::ShipmentState;

/// Fixed lookup table from normalized carrier status codes to shipment states.
#[derive(Debug, Clone)]
pub struct CarrierStatusMap {
    codes: HashMap<&'static str, ShipmentState>,
}

impl CarrierStatusMap {
    /// The built-in table covering the codes the storefront's tracking feed
    /// normalizes carrier webhooks into.
    pub fn builtin() -> Self {
        let codes = HashMap::from([
            // Pre-movement acknowledgements
            ("label_created", ShipmentState::Created),
            ("pre_transit", ShipmentState::Created),
            ("shipment_info_received", ShipmentState::Created),
            // Movement
            ("picked_up", ShipmentState::InTransit),
            ("in_transit", ShipmentState::InTransit),
            ("departed_facility", ShipmentState::InTransit),
            ("arrived_at_facility", ShipmentState::InTransit),
            ("out_for_delivery", ShipmentState::InTransit),
            // Completion
            ("delivered", ShipmentState::Delivered),
            // Problems (recoverable)
            ("exception", ShipmentState::Exception),
            ("delay", ShipmentState::Exception),
            ("weather_delay", ShipmentState::Exception),
            ("address_issue", ShipmentState::Exception),
            ("delivery_attempted", ShipmentState::Exception),
            // Returns
            ("return_to_sender", ShipmentState::Returned),
            ("returned_to_sender", ShipmentState::Returned),
        ]);
        Self { codes }
    }

    /// Look up the state a status code maps to. Unknown codes return `None`;
    /// callers keep the current status and log the gap.
    pub fn lookup(&self, carrier_status: &str) -> Option<ShipmentState> {
        self.codes
            .get(carrier_status.trim().to_lowercase().as_str())
            .copied()
    }

    /// Load-time validation: the table must be non-empty, keys must be
    /// normalized (lowercase, trimmed, non-blank), nothing may map to
    /// `Pending` (no carrier event can un-ship a shipment), and every
    /// event-derivable state must be reachable.
    pub fn validate(&self) -> StateMachineResult<()> {
        if self.codes.is_empty() {
            return Err(StateMachineError::InvalidStatusMap(
                "status map is empty".to_string(),
            ));
        }

        for (code, state) in &self.codes {
            if code.trim().is_empty() {
                return Err(StateMachineError::InvalidStatusMap(
                    "blank status code".to_string(),
                ));
            }
            if *code != code.trim().to_lowercase() {
                return Err(StateMachineError::InvalidStatusMap(format!(
                    "status code '{code}' is not normalized"
                )));
            }
            if *state == ShipmentState::Pending {
                return Err(StateMachineError::InvalidStatusMap(format!(
                    "status code '{code}' maps to pending"
                )));
            }
        }

        for required in [
            ShipmentState::InTransit,
            ShipmentState::Delivered,
            ShipmentState::Exception,
            ShipmentState::Returned,
        ] {
            if !self.codes.values().any(|state| *state == required) {
                return Err(StateMachineError::InvalidStatusMap(format!(
                    "no status code maps to {required}"
                )));
            }
        }

        Ok(())
    }
}

impl Default for CarrierStatusMap {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_map_is_valid() {
        CarrierStatusMap::builtin().validate().unwrap();
    }

    #[test]
    fn test_lookup_normalizes_input() {
        let map = CarrierStatusMap::builtin();
        assert_eq!(map.lookup("DELIVERED"), Some(ShipmentState::Delivered));
        assert_eq!(map.lookup("  in_transit "), Some(ShipmentState::InTransit));
        assert_eq!(map.lookup("carrier_specific_mystery_code"), None);
    }

    #[test]
    fn test_validation_rejects_pending_mapping() {
        let map = CarrierStatusMap {
            codes: HashMap::from([
                ("unshipped", ShipmentState::Pending),
                ("in_transit", ShipmentState::InTransit),
                ("delivered", ShipmentState::Delivered),
                ("exception", ShipmentState::Exception),
                ("returned", ShipmentState::Returned),
            ]),
        };
        assert!(matches!(
            map.validate(),
            Err(StateMachineError::InvalidStatusMap(_))
        ));
    }

    #[test]
    fn test_validation_requires_full_coverage() {
        let map = CarrierStatusMap {
            codes: HashMap::from([("delivered", ShipmentState::Delivered)]),
        };
        let err = map.validate().unwrap_err();
        assert!(err.to_string().contains("no status code maps to"));
    }
}
