#![allow(clippy::doc_markdown)] // Allow technical terms like YAML, FedEx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fulfillment Core
//!
//! Shipping and fulfillment engine: carrier label purchasing, shipment
//! lifecycle tracking, and concurrent batch processing against a
//! session-authenticated commerce API.
//!
//! ## Overview
//!
//! The crate is built around three cooperating layers:
//!
//! - a resilient API client that owns session-token refresh (proactive
//!   before expiry, reactive on rejection) and bounded retry with backoff
//!   for transient failures,
//! - a carrier gateway that validates carrier/service-level pairs before
//!   any network traffic and dispatches label purchases to per-carrier
//!   backends (UPS, FedEx, USPS, DHL),
//! - a batch orchestrator that fans label purchases out across a bounded
//!   pool of concurrent jobs, isolates per-job failures, and reports an
//!   exact succeeded/failed aggregate.
//!
//! Shipment records advance through an explicit state machine
//! (`PENDING → CREATED → IN_TRANSIT → DELIVERED / EXCEPTION / RETURNED`)
//! driven by validated carrier status codes, so malformed tracking feeds
//! can never corrupt a shipment's status.
//!
//! ## Module Organization
//!
//! - [`client`] - Authenticated HTTP client with token lifecycle and retry
//! - [`carriers`] - Carrier gateway, service catalog, and label backends
//! - [`models`] - Orders, shipments, packages, and tracking history
//! - [`state_machine`] - Shipment status transitions and guards
//! - [`store`] - Shipment persistence and the label-intent ledger
//! - [`orchestration`] - Concurrent batch label processing
//! - [`services`] - Shipment lifecycle operations (notes, damage, returns)
//! - [`order_source`] - Order retrieval behind the commerce API
//! - [`events`] - Broadcast event publishing
//! - [`config`] - Layered YAML configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fulfillment_core::carriers::Carrier;
//! use fulfillment_core::events::EventPublisher;
//! use fulfillment_core::models::NewShipment;
//! use fulfillment_core::services::ShipmentService;
//! use fulfillment_core::state_machine::ShipmentStateMachine;
//! use fulfillment_core::store::InMemoryShipmentStore;
//!
//! # async fn example() -> fulfillment_core::Result<()> {
//! let service = ShipmentService::new(
//!     Arc::new(InMemoryShipmentStore::new()),
//!     Arc::new(ShipmentStateMachine::with_builtin_map()),
//!     EventPublisher::new(64),
//! );
//!
//! let order_id = uuid::Uuid::new_v4();
//! let shipment = service
//!     .create_manual_shipment(NewShipment::for_order(
//!         order_id,
//!         "SO-1001",
//!         Carrier::Ups,
//!         "UPS Ground",
//!     ))
//!     .await?;
//!
//! println!("shipment {} is {}", shipment.shipment_id, shipment.status);
//! # Ok(())
//! # }
//! ```

pub mod carriers;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod order_source;
pub mod services;
pub mod state_machine;
pub mod store;

pub use config::{ConfigManager, FulfillmentConfig};
pub use error::{FulfillmentError, Result};
pub use orchestration::{BatchJob, BatchOrchestrator, BatchOutcome};
pub use services::ShipmentService;

/// Re-exported for hosts that glue this crate into application-level error
/// handling without declaring the dependency themselves.
pub use anyhow;
