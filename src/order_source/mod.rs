//! # Order Source
//!
//! Read-only access to storefront orders. Orders are owned by the storefront;
//! the fulfillment side only queries them to decide what is eligible for a
//! shipment, so this seam is a single filtered fetch. Production goes through
//! the storefront's order search API via the resilient client; tests and
//! fixtures use the in-memory source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::Order;

/// Filter for order queries. Status matching is exact: order workflow states
/// are the storefront's vocabulary and arrive here verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFilters {
    pub status: String,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl OrderFilters {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            date_from: None,
            date_to: None,
        }
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        if order.status != self.status {
            return false;
        }
        if let Some(from) = self.date_from {
            if order.placed_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if order.placed_at > to {
                return false;
            }
        }
        true
    }
}

impl Default for OrderFilters {
    fn default() -> Self {
        Self::with_status("Processing")
    }
}

/// Supplies orders for shipment work
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn get_orders(&self, filters: &OrderFilters) -> Result<Vec<Order>>;
}

/// Production source backed by the storefront's order search endpoint
pub struct HttpOrderSource {
    client: Arc<ApiClient>,
    endpoint: String,
}

impl HttpOrderSource {
    pub fn new(client: Arc<ApiClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl OrderSource for HttpOrderSource {
    async fn get_orders(&self, filters: &OrderFilters) -> Result<Vec<Order>> {
        let body = json!({
            "status": filters.status,
            "placed_after": filters.date_from.map(|d| d.to_rfc3339()),
            "placed_before": filters.date_to.map(|d| d.to_rfc3339()),
        });

        let orders: Vec<Order> = self.client.post_json(&self.endpoint, body).await?;
        debug!(
            status = %filters.status,
            count = orders.len(),
            "Fetched orders from storefront"
        );
        Ok(orders)
    }
}

/// In-memory source for tests, fixtures, and offline runs
#[derive(Default)]
pub struct InMemoryOrderSource {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: RwLock::new(orders),
        }
    }

    pub fn push(&self, order: Order) {
        self.orders.write().push(order);
    }
}

#[async_trait]
impl OrderSource for InMemoryOrderSource {
    async fn get_orders(&self, filters: &OrderFilters) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .read()
            .iter()
            .filter(|order| filters.matches(order))
            .cloned()
            .collect())
    }
}
