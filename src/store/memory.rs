//! In-memory shipment store.
//!
//! Backing store for tests and the demo wiring; also the reference
//! implementation of the trait's invariants (status monotonicity on update,
//! atomic append-and-advance). DashMap gives per-shipment locking, which is
//! all the concurrency control the batch path needs: jobs touch distinct
//! orders, and event ingestion serializes per shipment entry.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{FulfillmentError, Result};
use crate::models::{NewShipment, Shipment, ShipmentNote, TrackingEvent};
use crate::state_machine::{ShipmentState, StateMachineError};

use super::{ShipmentFilters, ShipmentStore};

#[derive(Debug, Default)]
pub struct InMemoryShipmentStore {
    shipments: DashMap<Uuid, Shipment>,
    order_index: DashMap<Uuid, Vec<Uuid>>,
}

impl InMemoryShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(shipment_id: Uuid) -> FulfillmentError {
        FulfillmentError::store(format!("shipment {shipment_id} not found"))
    }
}

#[async_trait]
impl ShipmentStore for InMemoryShipmentStore {
    async fn create(&self, new: NewShipment) -> Result<Shipment> {
        let shipment = Shipment::from_new(new);

        self.order_index
            .entry(shipment.order_id)
            .or_default()
            .push(shipment.shipment_id);
        self.shipments
            .insert(shipment.shipment_id, shipment.clone());

        Ok(shipment)
    }

    async fn get_by_id(&self, shipment_id: Uuid) -> Result<Option<Shipment>> {
        Ok(self.shipments.get(&shipment_id).map(|entry| entry.clone()))
    }

    async fn update(&self, mut shipment: Shipment) -> Result<Shipment> {
        let mut entry = self
            .shipments
            .get_mut(&shipment.shipment_id)
            .ok_or_else(|| Self::not_found(shipment.shipment_id))?;

        let stored_status = entry.status;
        let status_ok = stored_status == shipment.status
            || stored_status.can_transition_to(shipment.status);
        if !status_ok {
            return Err(StateMachineError::InvalidTransition {
                from: stored_status.to_string(),
                to: shipment.status.to_string(),
            }
            .into());
        }

        shipment.updated_at = Utc::now();
        *entry = shipment.clone();
        Ok(shipment)
    }

    async fn append_event(
        &self,
        shipment_id: Uuid,
        event: TrackingEvent,
        advance_to: Option<ShipmentState>,
    ) -> Result<Shipment> {
        let mut entry = self
            .shipments
            .get_mut(&shipment_id)
            .ok_or_else(|| Self::not_found(shipment_id))?;

        if let Some(target) = advance_to {
            if entry.status != target && !entry.status.can_transition_to(target) {
                return Err(StateMachineError::InvalidTransition {
                    from: entry.status.to_string(),
                    to: target.to_string(),
                }
                .into());
            }
        }

        entry.push_event_ordered(event);
        if let Some(target) = advance_to {
            entry.status = target;
            if target == ShipmentState::Delivered && entry.actual_delivery.is_none() {
                entry.actual_delivery = entry.latest_event().map(|e| e.event_date);
            }
        }

        Ok(entry.clone())
    }

    async fn append_note(&self, shipment_id: Uuid, note: ShipmentNote) -> Result<Shipment> {
        let mut entry = self
            .shipments
            .get_mut(&shipment_id)
            .ok_or_else(|| Self::not_found(shipment_id))?;

        entry.push_note(note);
        Ok(entry.clone())
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Shipment>> {
        let ids = match self.order_index.get(&order_id) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };

        let mut shipments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(shipment) = self.shipments.get(&id) {
                shipments.push(shipment.clone());
            }
        }
        Ok(shipments)
    }

    async fn list_by_filters(&self, filters: &ShipmentFilters) -> Result<Vec<Shipment>> {
        let mut matches: Vec<Shipment> = self
            .shipments
            .iter()
            .filter(|entry| filters.matches(entry.value()))
            .map(|entry| entry.clone())
            .collect();

        matches.sort_by_key(|shipment| shipment.created_at);
        Ok(matches)
    }
}
