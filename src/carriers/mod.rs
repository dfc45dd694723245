//! # Carrier Gateway
//!
//! Uniform label purchasing over heterogeneous carrier backends. Each backend
//! speaks its carrier's request/response dialect; the gateway validates every
//! request before any network I/O and normalizes every answer into one
//! [`LabelResponse`] shape, so nothing above this module knows which carrier
//! was involved beyond the enum value.

pub mod dhl;
pub mod fedex;
pub mod gateway;
pub mod services;
pub mod types;
pub mod ups;
pub mod usps;

pub use dhl::DhlBackend;
pub use fedex::FedexBackend;
pub use gateway::{CarrierBackend, CarrierGateway};
pub use services::{allowed_service_levels, validate_service_level};
pub use types::{Carrier, LabelRequest, LabelResponse};
pub use ups::UpsBackend;
pub use usps::UspsBackend;
