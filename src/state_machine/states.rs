use serde::{Deserialize, Serialize};
use std::fmt;

/// Shipment lifecycle states.
///
/// `PENDING → CREATED → IN_TRANSIT → {DELIVERED | EXCEPTION | RETURNED}`.
/// `Exception` is recoverable; `Delivered` and `Returned` are terminal for
/// the shipment (a return is a new shipment, never a status rewrite).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentState {
    /// Record exists, no label generated yet
    Pending,
    /// Label generated; carrier has not confirmed pickup
    Created,
    /// Carrier confirmed pickup or movement
    InTransit,
    /// Carrier reported delivery
    Delivered,
    /// Carrier reported a problem; recoverable
    Exception,
    /// Carrier returned the package to sender
    Returned,
}

impl ShipmentState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Returned)
    }

    /// Check if this shipment has physically shipped (label confirmed by a
    /// carrier movement of any kind, including problems)
    pub fn has_shipped(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether a direct transition from `self` to `next` is a legal forward
    /// advance. Equal states are a no-op handled by callers, not an edge.
    pub fn can_transition_to(&self, next: ShipmentState) -> bool {
        use ShipmentState::{Created, Delivered, Exception, InTransit, Pending, Returned};
        match (self, next) {
            (Pending, Created) => true,
            // Carrier feeds can coalesce scans, so the first event after the
            // label may already be delivery or a problem report.
            (Created, InTransit | Exception | Delivered | Returned) => true,
            (InTransit, Exception | Delivered | Returned) => true,
            (Exception, InTransit | Delivered | Returned) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ShipmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Created => write!(f, "created"),
            Self::InTransit => write!(f, "in_transit"),
            Self::Delivered => write!(f, "delivered"),
            Self::Exception => write!(f, "exception"),
            Self::Returned => write!(f, "returned"),
        }
    }
}

impl std::str::FromStr for ShipmentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "created" => Ok(Self::Created),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "exception" => Ok(Self::Exception),
            "returned" => Ok(Self::Returned),
            _ => Err(format!("Invalid shipment state: {s}")),
        }
    }
}

/// Default state for new shipments
impl Default for ShipmentState {
    fn default() -> Self {
        Self::Pending
    }
}
