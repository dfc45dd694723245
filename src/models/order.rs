//! Order and address types consumed from the storefront's Order Source.
//!
//! Orders are owned by the storefront; this crate only reads them to decide
//! shipment eligibility and to build label requests, so the types here carry
//! exactly the fields the shipping path needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::package::PackageDimensions;

/// Normalized postal address block used for both ship-from and ship-to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub company: Option<String>,
    pub street1: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Address {
    /// Fields a carrier will not accept a label request without.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.street1.trim().is_empty() {
            missing.push("street1");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.state.trim().is_empty() {
            missing.push("state");
        }
        if self.postal_code.trim().is_empty() {
            missing.push("postal_code");
        }
        if self.country.trim().is_empty() {
            missing.push("country");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required_fields().is_empty()
    }
}

/// One line item on an order. Dimensions are optional because not every
/// catalog product has shipping measurements recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: String,
    pub sku: String,
    pub quantity: u32,
    pub dimensions: Option<PackageDimensions>,
}

/// An order as returned by the Order Source, reduced to shipping concerns.
///
/// `status` stays a raw string: order workflow states belong to the
/// storefront and the batch system only matches them against its filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
    pub placed_at: DateTime<Utc>,
}

impl Order {
    /// Combined weight of all line items that have recorded dimensions.
    pub fn total_item_weight(&self) -> f64 {
        self.items
            .iter()
            .filter_map(|item| {
                item.dimensions
                    .as_ref()
                    .map(|d| d.weight * f64::from(item.quantity))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::package::PackageDimensions;

    fn valid_address() -> Address {
        Address {
            name: "Dana Customer".to_string(),
            company: None,
            street1: "100 Main St".to_string(),
            street2: None,
            city: "Portland".to_string(),
            state: "OR".to_string(),
            postal_code: "97201".to_string(),
            country: "US".to_string(),
            phone: None,
            email: Some("dana@example.com".to_string()),
        }
    }

    #[test]
    fn test_address_required_fields() {
        assert!(valid_address().is_complete());

        let mut incomplete = valid_address();
        incomplete.postal_code = "  ".to_string();
        assert_eq!(incomplete.missing_required_fields(), vec!["postal_code"]);
    }

    #[test]
    fn test_total_item_weight_skips_unmeasured_items() {
        let order = Order {
            order_id: Uuid::new_v4(),
            order_number: "SO-1001".to_string(),
            status: "Processing".to_string(),
            customer_name: "Dana Customer".to_string(),
            customer_email: "dana@example.com".to_string(),
            shipping_address: valid_address(),
            items: vec![
                OrderItem {
                    product: "Area Rug".to_string(),
                    sku: "RUG-8x10".to_string(),
                    quantity: 2,
                    dimensions: Some(PackageDimensions::new(96.0, 10.0, 10.0, 18.0)),
                },
                OrderItem {
                    product: "Swatch".to_string(),
                    sku: "SW-01".to_string(),
                    quantity: 5,
                    dimensions: None,
                },
            ],
            placed_at: Utc::now(),
        };

        assert!((order.total_item_weight() - 36.0).abs() < f64::EPSILON);
    }
}
