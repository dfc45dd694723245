use tracing::{debug, warn};

use crate::models::{Shipment, TrackingEvent};

use super::errors::{StateMachineError, StateMachineResult};
use super::events::ShipmentEvent;
use super::guards::{
    DamageNotAlreadyReportedGuard, HasLabelGuard, ShipmentHasShippedGuard, StateGuard,
};
use super::states::ShipmentState;
use super::status_map::CarrierStatusMap;

/// State machine governing shipment status transitions.
///
/// Construction validates the carrier status-code table, so a broken table
/// fails the process at startup rather than mis-classifying shipments later.
#[derive(Debug, Clone)]
pub struct ShipmentStateMachine {
    status_map: CarrierStatusMap,
}

impl ShipmentStateMachine {
    pub fn new(status_map: CarrierStatusMap) -> StateMachineResult<Self> {
        status_map.validate()?;
        Ok(Self { status_map })
    }

    /// Machine with the built-in status-code table.
    pub fn with_builtin_map() -> Self {
        // The builtin table is covered by its own validation test; a failure
        // here is a programming error, not a runtime condition.
        Self::new(CarrierStatusMap::builtin()).expect("builtin carrier status map must validate")
    }

    /// Determine the target state for an event against the current state.
    ///
    /// `Ok(None)` means the event is legal but changes nothing: an unknown
    /// status code, a stale code arriving after the status already advanced,
    /// or any event on a terminal shipment. Tracking history is still
    /// appended by the caller in all of those cases.
    pub fn determine_target_state(
        &self,
        current: ShipmentState,
        event: &ShipmentEvent,
    ) -> StateMachineResult<Option<ShipmentState>> {
        match event {
            ShipmentEvent::LabelGenerated => {
                if current == ShipmentState::Pending {
                    Ok(Some(ShipmentState::Created))
                } else {
                    Err(StateMachineError::InvalidTransition {
                        from: current.to_string(),
                        to: ShipmentState::Created.to_string(),
                    })
                }
            }
            ShipmentEvent::Tracking(tracking) => Ok(self.target_for_tracking(current, tracking)),
        }
    }

    fn target_for_tracking(
        &self,
        current: ShipmentState,
        event: &TrackingEvent,
    ) -> Option<ShipmentState> {
        if current.is_terminal() {
            debug!(
                current_state = %current,
                carrier_status = %event.carrier_status,
                "Tracking event on terminal shipment; status frozen"
            );
            return None;
        }

        let Some(target) = self.status_map.lookup(&event.carrier_status) else {
            warn!(
                carrier_status = %event.carrier_status,
                "Unknown carrier status code; shipment status unchanged"
            );
            return None;
        };

        if target == current {
            return None;
        }

        if current.can_transition_to(target) {
            Some(target)
        } else {
            // Stale or out-of-order code (e.g. a late label_created scan
            // after pickup). Status never reverts.
            debug!(
                current_state = %current,
                derived_state = %target,
                carrier_status = %event.carrier_status,
                "Derived state would move status backward; ignored"
            );
            None
        }
    }

    /// Guard checks for a damage report. Does not mutate the shipment.
    pub fn check_damage_report(&self, shipment: &Shipment) -> StateMachineResult<()> {
        ShipmentHasShippedGuard.check(shipment)?;
        DamageNotAlreadyReportedGuard.check(shipment)?;
        Ok(())
    }

    /// Guard checks for tracking-event ingestion.
    pub fn check_event_ingestion(&self, shipment: &Shipment) -> StateMachineResult<()> {
        HasLabelGuard.check(shipment)
    }
}

impl Default for ShipmentStateMachine {
    fn default() -> Self {
        Self::with_builtin_map()
    }
}
