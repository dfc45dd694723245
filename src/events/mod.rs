//! # Event System
//!
//! Broadcast channel for shipment lifecycle events and session-level signals.
//! Subscribers (back-office UI feeds, audit sinks, the session handler that
//! reacts to token exhaustion) attach independently; publishing never blocks
//! on slow consumers and tolerates having no consumers at all.

pub mod publisher;

pub use publisher::{EventPublisher, PublishError, PublishedEvent};

/// Well-known event names published by this crate.
pub mod names {
    pub const SHIPMENT_CREATED: &str = "shipment.created";
    pub const SHIPMENT_STATUS_CHANGED: &str = "shipment.status_changed";
    pub const SHIPMENT_NOTE_ADDED: &str = "shipment.note_added";
    pub const SHIPMENT_DAMAGE_REPORTED: &str = "shipment.damage_reported";
    pub const SHIPMENT_RETURN_CREATED: &str = "shipment.return_created";
    pub const BATCH_STARTED: &str = "batch.started";
    pub const BATCH_COMPLETED: &str = "batch.completed";
    /// Token refresh exhausted; the session must re-authenticate.
    pub const SESSION_EXPIRED: &str = "session.expired";
}
