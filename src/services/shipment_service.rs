//! # Shipment Service
//!
//! Single-shipment operations: manual creation, label attachment, tracking
//! ingestion, damage reports, notes, and returns. Every status mutation is
//! routed through the [`ShipmentStateMachine`] so no caller can move a
//! shipment along an edge the lifecycle graph does not have.
//!
//! The batch path buys and attaches labels in bulk through the orchestrator;
//! this service covers the one-at-a-time flows that operators drive by hand.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::carriers::LabelResponse;
use crate::error::{FulfillmentError, Result};
use crate::events::{names, EventPublisher};
use crate::logging::log_shipment_operation;
use crate::models::{NewShipment, Shipment, ShipmentNote, TrackingEvent};
use crate::state_machine::{ShipmentEvent, ShipmentStateMachine};
use crate::store::{ShipmentFilters, ShipmentStore};

#[derive(Clone)]
pub struct ShipmentService {
    store: Arc<dyn ShipmentStore>,
    state_machine: Arc<ShipmentStateMachine>,
    publisher: EventPublisher,
}

impl ShipmentService {
    pub fn new(
        store: Arc<dyn ShipmentStore>,
        state_machine: Arc<ShipmentStateMachine>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            store,
            state_machine,
            publisher,
        }
    }

    /// Create a shipment record by hand, outside the batch path. Starts
    /// `PENDING` with no label.
    pub async fn create_manual_shipment(&self, new: NewShipment) -> Result<Shipment> {
        let shipment = self.store.create(new).await?;

        log_shipment_operation(
            "created",
            Some(shipment.shipment_id),
            Some(shipment.order_id),
            &shipment.status.to_string(),
            None,
        );
        let _ = self
            .publisher
            .publish(
                names::SHIPMENT_CREATED,
                json!({
                    "shipment_id": shipment.shipment_id,
                    "order_id": shipment.order_id,
                    "order_number": shipment.order_number,
                }),
            )
            .await;

        Ok(shipment)
    }

    pub async fn get_shipment(&self, shipment_id: Uuid) -> Result<Shipment> {
        self.store
            .get_by_id(shipment_id)
            .await?
            .ok_or_else(|| FulfillmentError::store(format!("shipment {shipment_id} not found")))
    }

    pub async fn list_shipments(&self, filters: &ShipmentFilters) -> Result<Vec<Shipment>> {
        self.store.list_by_filters(filters).await
    }

    /// Attach an already-purchased label to a pending shipment. This is the
    /// only legal path out of `PENDING`; the state machine rejects it for
    /// every other status, so a shipment can never be re-labeled.
    pub async fn attach_label(&self, shipment_id: Uuid, label: &LabelResponse) -> Result<Shipment> {
        let mut shipment = self.get_shipment(shipment_id).await?;

        self.state_machine
            .determine_target_state(shipment.status, &ShipmentEvent::LabelGenerated)?;

        shipment.attach_label(label, Utc::now());
        let updated = self.store.update(shipment).await?;

        log_shipment_operation(
            "label_attached",
            Some(updated.shipment_id),
            Some(updated.order_id),
            &updated.status.to_string(),
            updated.tracking_number.as_deref(),
        );

        Ok(updated)
    }

    /// Ingest one carrier tracking event.
    ///
    /// History is always appended; the status only moves when the event's
    /// carrier code derives a legal forward transition. Unknown codes, stale
    /// codes, and events on terminal shipments keep the status frozen.
    pub async fn ingest_tracking_event(
        &self,
        shipment_id: Uuid,
        event: TrackingEvent,
    ) -> Result<Shipment> {
        let shipment = self.get_shipment(shipment_id).await?;
        self.state_machine.check_event_ingestion(&shipment)?;

        let previous = shipment.status;
        let advance_to = self
            .state_machine
            .determine_target_state(previous, &ShipmentEvent::Tracking(event.clone()))?;

        let updated = self.store.append_event(shipment_id, event, advance_to).await?;

        if let Some(next) = advance_to {
            log_shipment_operation(
                "status_advanced",
                Some(shipment_id),
                Some(updated.order_id),
                &next.to_string(),
                Some(&previous.to_string()),
            );
            let _ = self
                .publisher
                .publish(
                    names::SHIPMENT_STATUS_CHANGED,
                    json!({
                        "shipment_id": shipment_id,
                        "order_id": updated.order_id,
                        "from": previous.to_string(),
                        "to": next.to_string(),
                    }),
                )
                .await;
        } else {
            debug!(
                shipment_id = %shipment_id,
                status = %previous,
                "Tracking event recorded without a status change"
            );
        }

        Ok(updated)
    }

    pub async fn add_note(&self, shipment_id: Uuid, note: ShipmentNote) -> Result<Shipment> {
        let note_id = note.note_id;
        let author = note.author.clone();
        let updated = self.store.append_note(shipment_id, note).await?;

        let _ = self
            .publisher
            .publish(
                names::SHIPMENT_NOTE_ADDED,
                json!({
                    "shipment_id": shipment_id,
                    "note_id": note_id,
                    "author": author,
                }),
            )
            .await;

        Ok(updated)
    }

    /// Record damage on a shipped package. Exactly once per shipment: a
    /// repeat report is an error, not a merge. The report never changes the
    /// shipment status; it sets the flag and appends a note.
    pub async fn report_damage(
        &self,
        shipment_id: Uuid,
        reported_by: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Shipment> {
        let mut shipment = self.get_shipment(shipment_id).await?;
        self.state_machine.check_damage_report(&shipment)?;

        let description = description.into();
        shipment.damage_reported = true;
        shipment.push_note(ShipmentNote::new(reported_by, &description));
        let updated = self.store.update(shipment).await?;

        log_shipment_operation(
            "damage_reported",
            Some(shipment_id),
            Some(updated.order_id),
            &updated.status.to_string(),
            Some(&description),
        );
        let _ = self
            .publisher
            .publish(
                names::SHIPMENT_DAMAGE_REPORTED,
                json!({
                    "shipment_id": shipment_id,
                    "order_id": updated.order_id,
                    "description": description,
                }),
            )
            .await;

        Ok(updated)
    }

    /// Create a return shipment for a shipped original. The return is a new
    /// `PENDING` record pointing back at the original; the original keeps its
    /// own status and history untouched.
    pub async fn create_return(
        &self,
        original_id: Uuid,
        reason: impl Into<String>,
        authorization: Option<String>,
    ) -> Result<Shipment> {
        let original = self.get_shipment(original_id).await?;

        if original.is_return {
            return Err(FulfillmentError::validation(
                "cannot create a return for a return shipment",
            ));
        }
        if !original.status.has_shipped() {
            return Err(FulfillmentError::validation(
                "cannot create a return before the original shipment has shipped",
            ));
        }

        let new = NewShipment {
            order_id: original.order_id,
            order_number: original.order_number.clone(),
            carrier: original.carrier,
            service_level: original.service_level.clone(),
            packages: original.packages.clone(),
            package_type: original.package_type,
            signature: original.signature,
            estimated_delivery: None,
            is_return: true,
            return_of: Some(original.shipment_id),
            return_reason: Some(reason.into()),
            return_authorization: authorization,
        };
        let shipment = self.store.create(new).await?;

        log_shipment_operation(
            "return_created",
            Some(shipment.shipment_id),
            Some(shipment.order_id),
            &shipment.status.to_string(),
            shipment.return_reason.as_deref(),
        );
        let _ = self
            .publisher
            .publish(
                names::SHIPMENT_RETURN_CREATED,
                json!({
                    "shipment_id": shipment.shipment_id,
                    "return_of": original.shipment_id,
                    "order_id": shipment.order_id,
                    "order_number": shipment.order_number,
                }),
            )
            .await;

        Ok(shipment)
    }
}
