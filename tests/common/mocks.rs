//! Scripted doubles for the seams integration tests exercise: the HTTP
//! transport, the carrier backend, and the label sink.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use fulfillment_core::carriers::{CarrierBackend, LabelRequest, LabelResponse};
use fulfillment_core::client::{
    HttpTransport, TransportError, TransportRequest, TransportResponse,
};
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::orchestration::{LabelDelivery, LabelSink};

/// Transport that answers by URL fragment instead of a single FIFO queue, so
/// concurrent callers hitting different endpoints (API traffic vs. the token
/// refresh endpoint) stay deterministic.
///
/// Lookup order per request: a queued one-shot stub for a matching fragment,
/// then a standing stub, then a default `200 {"ok": true}`.
type WireResult = std::result::Result<TransportResponse, TransportError>;

#[derive(Default)]
pub struct RoutingTransport {
    queued: Mutex<Vec<(String, VecDeque<WireResult>)>>,
    standing: Mutex<Vec<(String, TransportResponse)>>,
    seen: Mutex<Vec<TransportRequest>>,
}

impl RoutingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a one-shot response for URLs containing `fragment`.
    pub fn stub(&self, fragment: &str, response: WireResult) {
        let mut queued = self.queued.lock();
        if let Some((_, queue)) = queued.iter_mut().find(|(needle, _)| needle == fragment) {
            queue.push_back(response);
        } else {
            queued.push((fragment.to_string(), VecDeque::from([response])));
        }
    }

    /// Answer every request for URLs containing `fragment` with `response`
    /// once the one-shot queue for it is drained.
    pub fn stub_standing(&self, fragment: &str, response: TransportResponse) {
        self.standing.lock().push((fragment.to_string(), response));
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().clone()
    }

    /// Requests whose URL contains `fragment`, in arrival order.
    pub fn requests_to(&self, fragment: &str) -> Vec<TransportRequest> {
        self.seen
            .lock()
            .iter()
            .filter(|request| request.url.contains(fragment))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpTransport for RoutingTransport {
    async fn execute(&self, request: TransportRequest) -> WireResult {
        self.seen.lock().push(request.clone());

        if let Some((_, queue)) = self
            .queued
            .lock()
            .iter_mut()
            .find(|(needle, queue)| request.url.contains(needle) && !queue.is_empty())
        {
            // The queue is non-empty per the find above.
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }

        if let Some((_, response)) = self
            .standing
            .lock()
            .iter()
            .find(|(needle, _)| request.url.contains(needle))
        {
            return Ok(response.clone());
        }

        Ok(TransportResponse::json(200, serde_json::json!({"ok": true})))
    }
}

/// Carrier backend that issues sequential tracking numbers and fails on
/// command for specific order numbers.
pub struct MockCarrierBackend {
    calls: AtomicUsize,
    failing_orders: Mutex<HashSet<String>>,
}

impl MockCarrierBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failing_orders: Mutex::new(HashSet::new()),
        })
    }

    /// Make every purchase for `order_number` fail until cleared.
    pub fn fail_for(&self, order_number: &str) {
        self.failing_orders.lock().insert(order_number.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_orders.lock().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CarrierBackend for MockCarrierBackend {
    async fn purchase_label(&self, request: &LabelRequest) -> Result<LabelResponse> {
        let seq = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.failing_orders.lock().contains(&request.order_number) {
            return Err(FulfillmentError::Carrier {
                carrier: request.carrier,
                message: "rate service rejected the shipment".to_string(),
            });
        }

        Ok(LabelResponse {
            tracking_number: format!("MOCK-{seq:04}"),
            tracking_url: format!("https://track.example.com/MOCK-{seq:04}"),
            label_url: format!("https://labels.example.com/MOCK-{seq:04}.pdf"),
            cost: Some(11.45),
        })
    }
}

/// Label sink that records every delivery it receives.
#[derive(Default)]
pub struct CollectingSink {
    deliveries: Mutex<Vec<(Uuid, Vec<LabelDelivery>)>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self) -> Vec<(Uuid, Vec<LabelDelivery>)> {
        self.deliveries.lock().clone()
    }

    /// Every delivered label across all batches.
    pub fn labels(&self) -> Vec<LabelDelivery> {
        self.deliveries
            .lock()
            .iter()
            .flat_map(|(_, labels)| labels.clone())
            .collect()
    }
}

#[async_trait]
impl LabelSink for CollectingSink {
    async fn deliver(&self, batch_id: Uuid, labels: &[LabelDelivery]) -> Result<()> {
        self.deliveries.lock().push((batch_id, labels.to_vec()));
        Ok(())
    }
}
