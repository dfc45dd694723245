// State machine module for shipment lifecycle management
//
// Shipment status is never assigned freely: it is either derived from carrier
// tracking events through an explicit status-code table, or advanced by label
// generation. This module owns both paths plus the guard checks for the
// side-channel mutations (damage reports, note appends) that must not touch
// status at all.

pub mod errors;
pub mod events;
pub mod guards;
pub mod shipment_state_machine;
pub mod states;
pub mod status_map;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::ShipmentEvent;
pub use guards::{DamageNotAlreadyReportedGuard, HasLabelGuard, ShipmentHasShippedGuard, StateGuard};
pub use shipment_state_machine::ShipmentStateMachine;
pub use states::ShipmentState;
pub use status_map::CarrierStatusMap;
