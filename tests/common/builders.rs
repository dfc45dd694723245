//! Shared fixture builders for integration tests.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use fulfillment_core::models::{Address, Order, OrderItem, PackageDimensions};

pub fn warehouse_address() -> Address {
    Address {
        name: "Fulfillment Center West".to_string(),
        company: Some("Acme Home Goods".to_string()),
        street1: "4500 Distribution Way".to_string(),
        street2: None,
        city: "Reno".to_string(),
        state: "NV".to_string(),
        postal_code: "89506".to_string(),
        country: "US".to_string(),
        phone: Some("+1-775-555-0100".to_string()),
        email: None,
    }
}

pub fn customer_address() -> Address {
    Address {
        name: "Dana Customer".to_string(),
        company: None,
        street1: "100 Main St".to_string(),
        street2: Some("Apt 4".to_string()),
        city: "Portland".to_string(),
        state: "OR".to_string(),
        postal_code: "97201".to_string(),
        country: "US".to_string(),
        phone: None,
        email: Some("dana@example.com".to_string()),
    }
}

/// An order in `Processing` with one measured line item, ready for a label.
pub fn order(order_number: &str) -> Order {
    order_with_status(order_number, "Processing")
}

pub fn order_with_status(order_number: &str, status: &str) -> Order {
    Order {
        order_id: Uuid::new_v4(),
        order_number: order_number.to_string(),
        status: status.to_string(),
        customer_name: "Dana Customer".to_string(),
        customer_email: "dana@example.com".to_string(),
        shipping_address: customer_address(),
        items: vec![OrderItem {
            product: "Ceramic Mug Set".to_string(),
            sku: "MUG-4PK".to_string(),
            quantity: 1,
            dimensions: Some(PackageDimensions::new(10.0, 8.0, 6.0, 3.2)),
        }],
        placed_at: Utc::now(),
    }
}

#[derive(Serialize)]
struct BearerClaims {
    sub: String,
    exp: i64,
}

/// Mint a compact JWT whose `exp` claim is `expires_at`, signed with a
/// throwaway secret. The client never verifies signatures, so any secret
/// works.
pub fn mint_jwt(expires_at: DateTime<Utc>) -> String {
    let claims = BearerClaims {
        sub: "integration-tests".to_string(),
        exp: expires_at.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .expect("JWT encoding cannot fail for valid claims")
}
