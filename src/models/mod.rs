//! # Data Models
//!
//! Domain entities for shipment lifecycle management: the [`Shipment`] record
//! with its append-only tracking events and notes, the normalized [`Order`]
//! consumed from the storefront's Order Source, and the package/address value
//! types shared by both.

pub mod order;
pub mod package;
pub mod shipment;

pub use order::{Address, Order, OrderItem};
pub use package::{DimensionUnit, PackageDimensions, PackageType, SignatureOption, WeightUnit};
pub use shipment::{NewShipment, Shipment, ShipmentNote, TrackingEvent};
