use serde::{Deserialize, Serialize};

use crate::models::TrackingEvent;

/// Events that can trigger shipment state transitions.
///
/// Damage reports and note appends are deliberately absent: they are
/// side-channel mutations that never change status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ShipmentEvent {
    /// A label was generated for the shipment (`PENDING → CREATED`)
    LabelGenerated,
    /// A carrier tracking event was ingested; the target state is derived
    /// from the event's status code through the carrier status map
    Tracking(TrackingEvent),
}

impl ShipmentEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LabelGenerated => "label_generated",
            Self::Tracking(_) => "tracking",
        }
    }

    /// Extract the carrier status code if this is a tracking event
    pub fn carrier_status(&self) -> Option<&str> {
        match self {
            Self::Tracking(event) => Some(event.carrier_status.as_str()),
            Self::LabelGenerated => None,
        }
    }
}
