//! Guard conditions checked before shipment mutations.
//!
//! Guards look at the entity only; they perform no I/O. The state machine
//! composes them per operation.

use crate::models::Shipment;

use super::errors::{StateMachineError, StateMachineResult};

/// A precondition a shipment must satisfy before an operation may proceed.
pub trait StateGuard {
    fn check(&self, shipment: &Shipment) -> StateMachineResult<()>;
}

/// Damage can be reported at most once per shipment.
pub struct DamageNotAlreadyReportedGuard;

impl StateGuard for DamageNotAlreadyReportedGuard {
    fn check(&self, shipment: &Shipment) -> StateMachineResult<()> {
        if shipment.damage_reported {
            return Err(StateMachineError::DamageAlreadyReported);
        }
        Ok(())
    }
}

/// Damage reports require that something actually shipped.
pub struct ShipmentHasShippedGuard;

impl StateGuard for ShipmentHasShippedGuard {
    fn check(&self, shipment: &Shipment) -> StateMachineResult<()> {
        if !shipment.status.has_shipped() {
            return Err(StateMachineError::DamageBeforeShipment);
        }
        Ok(())
    }
}

/// Tracking events only make sense once a label (and with it a tracking
/// number) exists.
pub struct HasLabelGuard;

impl StateGuard for HasLabelGuard {
    fn check(&self, shipment: &Shipment) -> StateMachineResult<()> {
        if !shipment.has_label() {
            return Err(StateMachineError::MissingLabel);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carriers::{Carrier, LabelResponse};
    use crate::models::NewShipment;
    use chrono::Utc;
    use uuid::Uuid;

    fn pending_shipment() -> Shipment {
        Shipment::from_new(NewShipment::for_order(
            Uuid::new_v4(),
            "SO-2001",
            Carrier::Usps,
            "USPS Priority Mail",
        ))
    }

    fn labeled_shipment() -> Shipment {
        let mut shipment = pending_shipment();
        shipment.attach_label(
            &LabelResponse {
                tracking_number: "9400100000000000000000".to_string(),
                tracking_url: "https://tools.usps.com/go/TrackConfirmAction?tLabels=9400100000000000000000".to_string(),
                label_url: "https://labels.example.com/usps.pdf".to_string(),
                cost: Some(8.15),
            },
            Utc::now(),
        );
        shipment
    }

    #[test]
    fn test_damage_guard_rejects_second_report() {
        let mut shipment = labeled_shipment();
        assert!(DamageNotAlreadyReportedGuard.check(&shipment).is_ok());

        shipment.damage_reported = true;
        assert_eq!(
            DamageNotAlreadyReportedGuard.check(&shipment),
            Err(StateMachineError::DamageAlreadyReported)
        );
    }

    #[test]
    fn test_damage_guard_rejects_pending_shipment() {
        let shipment = pending_shipment();
        assert_eq!(
            ShipmentHasShippedGuard.check(&shipment),
            Err(StateMachineError::DamageBeforeShipment)
        );
    }

    #[test]
    fn test_label_guard() {
        assert_eq!(
            HasLabelGuard.check(&pending_shipment()),
            Err(StateMachineError::MissingLabel)
        );
        assert!(HasLabelGuard.check(&labeled_shipment()).is_ok());
    }
}
