//! # Shipment Store
//!
//! Persistence boundary for shipment records. The storefront owns its real
//! database; this crate talks to it through the [`ShipmentStore`] trait and
//! ships an in-memory implementation used by tests, fixtures, and the demo
//! wiring. The write-ahead [`LabelIntentLedger`] lives here too: it bridges
//! the non-transactional gap between "carrier charged us for a label" and
//! "shipment row exists".

pub mod intent;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewShipment, Shipment, ShipmentNote, TrackingEvent};
use crate::state_machine::ShipmentState;

pub use intent::{InMemoryIntentLedger, IntentState, LabelIntent, LabelIntentLedger};
pub use memory::InMemoryShipmentStore;

/// Date-range filters for shipment listings.
#[derive(Debug, Clone, Default)]
pub struct ShipmentFilters {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl ShipmentFilters {
    pub fn matches(&self, shipment: &Shipment) -> bool {
        if let Some(from) = self.date_from {
            if shipment.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if shipment.created_at > to {
                return false;
            }
        }
        true
    }
}

/// Persistence operations for shipments and their sub-records.
///
/// `append_event` atomically appends the tracking event *and* applies the
/// derived status advance when one is given, so concurrent ingests can never
/// interleave an append with a stale whole-record write.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    async fn create(&self, new: NewShipment) -> Result<Shipment>;

    async fn get_by_id(&self, shipment_id: Uuid) -> Result<Option<Shipment>>;

    /// Whole-record update. Implementations must reject status regressions:
    /// the stored status may only stay or advance along legal transitions.
    async fn update(&self, shipment: Shipment) -> Result<Shipment>;

    async fn append_event(
        &self,
        shipment_id: Uuid,
        event: TrackingEvent,
        advance_to: Option<ShipmentState>,
    ) -> Result<Shipment>;

    async fn append_note(&self, shipment_id: Uuid, note: ShipmentNote) -> Result<Shipment>;

    /// All shipments (outbound and return) recorded for an order.
    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Shipment>>;

    async fn list_by_filters(&self, filters: &ShipmentFilters) -> Result<Vec<Shipment>>;
}
