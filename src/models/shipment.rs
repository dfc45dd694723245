//! # Shipment Model
//!
//! One `Shipment` is one physical package's lifecycle record for an order.
//! An order may accumulate several shipments over time (split fulfillment,
//! returns) but a shipment belongs to exactly one order.
//!
//! ## Invariants
//!
//! - Tracking number and label URL are set together or not at all; there is
//!   no way to set one without the other ([`Shipment::attach_label`]).
//! - `status` only advances through the transitions owned by the state
//!   machine; nothing in this module mutates it directly except label
//!   attachment, which is the `PENDING → CREATED` edge.
//! - Tracking events are append-only and kept ordered by `event_date`.
//! - `damage_reported` goes `false → true` at most once; repeat reports are
//!   rejected upstream by the state machine guards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::carriers::{Carrier, LabelResponse};
use crate::state_machine::ShipmentState;

use super::package::{PackageDimensions, PackageType, SignatureOption};

/// Immutable append-only carrier tracking event owned by its shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub event_date: DateTime<Utc>,
    pub location: Option<String>,
    pub description: String,
    /// Raw status code string as emitted by the carrier feed.
    pub carrier_status: String,
}

impl TrackingEvent {
    pub fn new(
        event_date: DateTime<Utc>,
        location: Option<String>,
        description: impl Into<String>,
        carrier_status: impl Into<String>,
    ) -> Self {
        Self {
            event_date,
            location,
            description: description.into(),
            carrier_status: carrier_status.into(),
        }
    }
}

/// Operator note appended to a shipment. Notes never affect status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentNote {
    pub note_id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ShipmentNote {
    pub fn new(author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            note_id: Uuid::new_v4(),
            author: author.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// A shipment record with its event and note sub-records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub carrier: Carrier,
    pub service_level: String,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub label_url: Option<String>,
    pub shipping_date: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub status: ShipmentState,
    pub cost: Option<f64>,
    pub packages: Vec<PackageDimensions>,
    pub package_type: PackageType,
    pub signature: SignatureOption,
    pub events: Vec<TrackingEvent>,
    pub notes: Vec<ShipmentNote>,
    pub is_return: bool,
    /// Original shipment this one returns, when `is_return` is set.
    pub return_of: Option<Uuid>,
    pub return_reason: Option<String>,
    pub return_authorization: Option<String>,
    pub damage_reported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New shipment for creation (without generated fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShipment {
    pub order_id: Uuid,
    pub order_number: String,
    pub carrier: Carrier,
    pub service_level: String,
    pub packages: Vec<PackageDimensions>,
    pub package_type: PackageType,
    pub signature: SignatureOption,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub is_return: bool,
    pub return_of: Option<Uuid>,
    pub return_reason: Option<String>,
    pub return_authorization: Option<String>,
}

impl NewShipment {
    /// Outbound shipment for an order with default packaging options.
    pub fn for_order(
        order_id: Uuid,
        order_number: impl Into<String>,
        carrier: Carrier,
        service_level: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            order_number: order_number.into(),
            carrier,
            service_level: service_level.into(),
            packages: Vec::new(),
            package_type: PackageType::default(),
            signature: SignatureOption::default(),
            estimated_delivery: None,
            is_return: false,
            return_of: None,
            return_reason: None,
            return_authorization: None,
        }
    }
}

impl Shipment {
    /// Materialize a new shipment record in its initial state. Generated
    /// fields (id, timestamps) are owned here so every creation path agrees.
    pub fn from_new(new: NewShipment) -> Self {
        let now = Utc::now();
        Self {
            shipment_id: Uuid::new_v4(),
            order_id: new.order_id,
            order_number: new.order_number,
            carrier: new.carrier,
            service_level: new.service_level,
            tracking_number: None,
            tracking_url: None,
            label_url: None,
            shipping_date: None,
            estimated_delivery: new.estimated_delivery,
            actual_delivery: None,
            status: ShipmentState::Pending,
            cost: None,
            packages: new.packages,
            package_type: new.package_type,
            signature: new.signature,
            events: Vec::new(),
            notes: Vec::new(),
            is_return: new.is_return,
            return_of: new.return_of,
            return_reason: new.return_reason,
            return_authorization: new.return_authorization,
            damage_reported: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a label has been generated. Tracking number and label URL are
    /// set together, so checking one field checks both.
    pub fn has_label(&self) -> bool {
        self.tracking_number.is_some() && self.label_url.is_some()
    }

    /// Attach a generated label: tracking number, tracking URL, label URL and
    /// quoted cost land in one mutation, and the status advances
    /// `PENDING → CREATED`. This is the only label-field setter.
    pub fn attach_label(&mut self, label: &LabelResponse, shipping_date: DateTime<Utc>) {
        self.tracking_number = Some(label.tracking_number.clone());
        self.tracking_url = Some(label.tracking_url.clone());
        self.label_url = Some(label.label_url.clone());
        self.cost = label.cost;
        self.shipping_date = Some(shipping_date);
        self.status = ShipmentState::Created;
        self.touch();
    }

    /// Most recent tracking event by `event_date`, if any.
    pub fn latest_event(&self) -> Option<&TrackingEvent> {
        // Events are kept ordered on append; the last one is the newest.
        self.events.last()
    }

    /// Insert an event preserving `event_date` ordering. Carrier feeds
    /// deliver out of order; the ordering invariant lives here, not in the
    /// feed handler.
    pub fn push_event_ordered(&mut self, event: TrackingEvent) {
        let position = self
            .events
            .partition_point(|existing| existing.event_date <= event.event_date);
        self.events.insert(position, event);
        self.touch();
    }

    pub fn push_note(&mut self, note: ShipmentNote) {
        self.notes.push(note);
        self.touch();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
