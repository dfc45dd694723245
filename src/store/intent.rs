//! Write-ahead label intents.
//!
//! There is no distributed transaction across "buy label from carrier" and
//! "persist shipment record". A label purchase is billable and effectively
//! irreversible, so the orchestrator records an intent *before* the carrier
//! call and completes it only after the shipment row is safely stored. An
//! intent still open after a crash names exactly the purchases that may need
//! reconciliation against the carrier account.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::carriers::Carrier;
use crate::error::{FulfillmentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    /// Carrier call may have happened; shipment row not yet confirmed.
    Open,
    /// Shipment row persisted; nothing to reconcile.
    Completed,
}

/// One order's label-purchase intent within a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelIntent {
    pub intent_id: Uuid,
    pub order_id: Uuid,
    pub carrier: Carrier,
    pub state: IntentState,
    pub created_at: DateTime<Utc>,
    /// Tracking number, once the carrier returned one. An open intent with a
    /// tracking number is the "label purchased, record missing" case.
    pub tracking_number: Option<String>,
}

/// Durable record of in-flight label purchases.
#[async_trait]
pub trait LabelIntentLedger: Send + Sync {
    /// Record an intent before the carrier call.
    async fn record(&self, order_id: Uuid, carrier: Carrier) -> Result<LabelIntent>;

    /// Attach the tracking number the carrier returned, while the shipment
    /// row is still unconfirmed.
    async fn attach_tracking(&self, intent_id: Uuid, tracking_number: &str) -> Result<()>;

    /// Mark the intent completed once the shipment row is persisted.
    async fn complete(&self, intent_id: Uuid) -> Result<()>;

    /// Intents never completed, oldest first: the reconciliation work list.
    async fn open_intents(&self) -> Result<Vec<LabelIntent>>;
}

/// In-memory ledger. Covers crashes *within* a process (a panicking batch
/// task leaves its intent open and visible to the rest of the process);
/// durable cross-restart reconciliation needs a host-provided implementation
/// over real storage.
#[derive(Debug, Default)]
pub struct InMemoryIntentLedger {
    intents: DashMap<Uuid, LabelIntent>,
}

impl InMemoryIntentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(intent_id: Uuid) -> FulfillmentError {
        FulfillmentError::store(format!("label intent {intent_id} not found"))
    }
}

#[async_trait]
impl LabelIntentLedger for InMemoryIntentLedger {
    async fn record(&self, order_id: Uuid, carrier: Carrier) -> Result<LabelIntent> {
        let intent = LabelIntent {
            intent_id: Uuid::new_v4(),
            order_id,
            carrier,
            state: IntentState::Open,
            created_at: Utc::now(),
            tracking_number: None,
        };
        self.intents.insert(intent.intent_id, intent.clone());
        Ok(intent)
    }

    async fn attach_tracking(&self, intent_id: Uuid, tracking_number: &str) -> Result<()> {
        let mut entry = self
            .intents
            .get_mut(&intent_id)
            .ok_or_else(|| Self::not_found(intent_id))?;
        entry.tracking_number = Some(tracking_number.to_string());
        Ok(())
    }

    async fn complete(&self, intent_id: Uuid) -> Result<()> {
        let mut entry = self
            .intents
            .get_mut(&intent_id)
            .ok_or_else(|| Self::not_found(intent_id))?;
        entry.state = IntentState::Completed;
        Ok(())
    }

    async fn open_intents(&self) -> Result<Vec<LabelIntent>> {
        let mut open: Vec<LabelIntent> = self
            .intents
            .iter()
            .filter(|entry| entry.state == IntentState::Open)
            .map(|entry| entry.clone())
            .collect();
        open.sort_by_key(|intent| intent.created_at);
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completed_intents_leave_the_work_list() {
        let ledger = InMemoryIntentLedger::new();
        let order_id = Uuid::new_v4();

        let intent = ledger.record(order_id, Carrier::Dhl).await.unwrap();
        assert_eq!(ledger.open_intents().await.unwrap().len(), 1);

        ledger.complete(intent.intent_id).await.unwrap();
        assert!(ledger.open_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_intent_carries_tracking_number_for_reconciliation() {
        let ledger = InMemoryIntentLedger::new();
        let intent = ledger.record(Uuid::new_v4(), Carrier::Ups).await.unwrap();

        ledger
            .attach_tracking(intent.intent_id, "1Z999AA10123456784")
            .await
            .unwrap();

        let open = ledger.open_intents().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(
            open[0].tracking_number.as_deref(),
            Some("1Z999AA10123456784")
        );
    }

    #[tokio::test]
    async fn test_unknown_intent_is_store_error() {
        let ledger = InMemoryIntentLedger::new();
        assert!(ledger.complete(Uuid::new_v4()).await.is_err());
    }
}
