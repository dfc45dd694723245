//! Crate-wide error taxonomy.
//!
//! Every failure the fulfillment core can surface falls into one of the
//! variants below. The split matters operationally: `AuthExpired` is fatal to
//! the whole session, `TransientNetwork` is retried by the API client,
//! `Validation` and `Carrier` are surfaced per batch job, and
//! `LabelPersistenceGap` marks the one failure mode that must never be
//! silently discarded (a label was purchased but no shipment record exists).

use uuid::Uuid;

use crate::carriers::Carrier;
use crate::state_machine::StateMachineError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FulfillmentError {
    /// Token refresh is exhausted. Fatal to the session, not just one job;
    /// the holder must force a full re-authentication.
    #[error("session expired: token refresh exhausted")]
    AuthExpired,

    /// Request was malformed before any network call (bad service level,
    /// missing address field). Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The carrier backend rejected the request. Surfaced per-job, never
    /// retried by the gateway.
    #[error("{carrier} rejected the request: {message}")]
    Carrier { carrier: Carrier, message: String },

    /// Timeout / 5xx / connection failure. Retried with bounded backoff by
    /// the API client before it reaches the caller.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The order already has a shipment record. Eligibility filtering keeps
    /// this from the batch path; if it surfaces anyway, nothing was mutated.
    #[error("order {order_id} already has a shipment")]
    DuplicateShipment { order_id: Uuid },

    /// A label was purchased but persisting the shipment failed. The label
    /// intent stays open so the purchase can be reconciled after restart.
    #[error("label purchased for order {order_id} (tracking {tracking_number}) but shipment record was not persisted")]
    LabelPersistenceGap {
        order_id: Uuid,
        tracking_number: String,
    },

    /// Illegal shipment status transition or status derivation failure.
    #[error(transparent)]
    StateTransition(#[from] StateMachineError),

    /// Shipment store failure (lookup, create, update, append).
    #[error("store error: {0}")]
    Store(String),

    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Lifecycle event publishing failure.
    #[error("event error: {0}")]
    Event(String),
}

impl FulfillmentError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Whether this error ends the whole session rather than one operation.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }
}

pub type Result<T> = std::result::Result<T, FulfillmentError>;
