//! State machine error types.

/// Errors raised by shipment status transitions and their guard checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// The requested transition is not an edge in the lifecycle graph.
    #[error("invalid shipment transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Damage was already reported for this shipment; the flag is
    /// idempotent-rejecting, not idempotent-absorbing.
    #[error("damage already reported for this shipment")]
    DamageAlreadyReported,

    /// Damage cannot be reported before anything shipped.
    #[error("cannot report damage on a pending shipment: nothing has shipped")]
    DamageBeforeShipment,

    /// Tracking events require a label (and with it a tracking number).
    #[error("shipment has no label yet; tracking events cannot apply")]
    MissingLabel,

    /// The carrier status-code table failed its load-time validation.
    #[error("invalid carrier status map: {0}")]
    InvalidStatusMap(String),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
