//! Proptest strategies for shipment lifecycle properties.

use chrono::{Duration, Utc};
use proptest::prelude::*;

use fulfillment_core::models::TrackingEvent;
use fulfillment_core::state_machine::ShipmentState;

/// Every carrier status code the built-in table knows.
pub const KNOWN_STATUS_CODES: &[&str] = &[
    "label_created",
    "pre_transit",
    "shipment_info_received",
    "picked_up",
    "in_transit",
    "departed_facility",
    "arrived_at_facility",
    "out_for_delivery",
    "delivered",
    "exception",
    "delay",
    "weather_delay",
    "address_issue",
    "delivery_attempted",
    "return_to_sender",
    "returned_to_sender",
];

pub fn shipment_state_strategy() -> impl Strategy<Value = ShipmentState> {
    prop::sample::select(vec![
        ShipmentState::Pending,
        ShipmentState::Created,
        ShipmentState::InTransit,
        ShipmentState::Delivered,
        ShipmentState::Exception,
        ShipmentState::Returned,
    ])
}

pub fn terminal_state_strategy() -> impl Strategy<Value = ShipmentState> {
    prop::sample::select(vec![ShipmentState::Delivered, ShipmentState::Returned])
}

pub fn known_status_code_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(KNOWN_STATUS_CODES)
        .prop_map(|code| code.to_string())
}

/// Mix of codes the table knows and codes it has never seen.
pub fn carrier_status_code_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => known_status_code_strategy(),
        1 => "[a-z][a-z_]{0,24}",
    ]
}

/// A tracking event with an arbitrary status code, timestamped within the
/// last few days.
pub fn tracking_event_strategy() -> impl Strategy<Value = TrackingEvent> {
    (carrier_status_code_strategy(), 0i64..=96, prop::option::of("[A-Za-z ]{3,20}")).prop_map(
        |(code, hours_ago, location)| {
            TrackingEvent::new(
                Utc::now() - Duration::hours(hours_ago),
                location,
                "carrier scan",
                code,
            )
        },
    )
}

/// Event-date offsets (in minutes) for order-independence properties.
pub fn event_offsets_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..10_000, 1..12)
}
