//! Application services coordinating the store, state machine, and events.

pub mod shipment_service;

pub use shipment_service::ShipmentService;
