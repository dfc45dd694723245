//! # Batch Label Orchestrator
//!
//! Runs a set of selected [`BatchJob`]s to completion with bounded
//! concurrency. Each job is isolated: it buys one label, persists one
//! shipment, and settles as succeeded or failed without touching its
//! siblings. The run always produces a [`BatchOutcome`]; a failed job is
//! reported, never retried.
//!
//! Every job follows the same pipeline:
//!
//! 1. re-check that the order still has no shipment
//! 2. record a [`LabelIntent`](crate::store::LabelIntent) write-ahead
//! 3. purchase the label through the carrier gateway
//! 4. persist the shipment record
//! 5. close the intent and announce the shipment
//!
//! If step 4 fails after step 3 succeeded, the intent is left open with the
//! tracking number attached. That open intent is the durable marker for
//! "label bought, record missing" and feeds reconciliation after a restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::carriers::{CarrierGateway, LabelRequest, LabelResponse};
use crate::config::BatchConfig;
use crate::error::{FulfillmentError, Result};
use crate::events::{names, EventPublisher};
use crate::logging::{log_batch_operation, log_shipment_operation};
use crate::models::{Address, NewShipment, Shipment};
use crate::order_source::{OrderFilters, OrderSource};
use crate::store::{LabelIntentLedger, ShipmentStore};

use super::label_sink::{LabelDelivery, LabelSink};
use super::types::{BatchJob, BatchOutcome, BatchProgress, JobState, ProgressSnapshot};

/// Shared control surface for one batch run: live progress counters and a
/// cancellation flag.
///
/// Cancellation is cooperative and only stops jobs that have not started.
/// A job that is already talking to a carrier runs to completion; half a
/// label purchase is worse than a whole one.
#[derive(Debug, Clone, Default)]
pub struct BatchHandle {
    cancelled: Arc<AtomicBool>,
    progress: Arc<BatchProgress>,
}

impl BatchHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop all jobs that have not yet started. In-flight jobs finish.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }
}

/// Drives batch label generation end to end: eligibility, fan-out, and
/// aggregation.
///
/// Cloning is cheap; every task in a run gets its own clone over the same
/// shared dependencies.
#[derive(Clone)]
pub struct BatchOrchestrator {
    orders: Arc<dyn OrderSource>,
    gateway: Arc<CarrierGateway>,
    store: Arc<dyn ShipmentStore>,
    intents: Arc<dyn LabelIntentLedger>,
    sink: Arc<dyn LabelSink>,
    publisher: EventPublisher,
    jobs_semaphore: Arc<Semaphore>,
    config: BatchConfig,
    origin: Address,
}

impl BatchOrchestrator {
    /// Build an orchestrator. `origin` is the warehouse ship-from address
    /// stamped on every label request; `config.max_concurrent_jobs` sizes
    /// the permit pool and is validated positive at configuration load.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BatchConfig,
        origin: Address,
        orders: Arc<dyn OrderSource>,
        gateway: Arc<CarrierGateway>,
        store: Arc<dyn ShipmentStore>,
        intents: Arc<dyn LabelIntentLedger>,
        sink: Arc<dyn LabelSink>,
        publisher: EventPublisher,
    ) -> Self {
        info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            status_filter = %config.default_status_filter,
            "🚚 Batch orchestrator initialized"
        );

        Self {
            orders,
            gateway,
            store,
            intents,
            sink,
            publisher,
            jobs_semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            config,
            origin,
        }
    }

    /// Filters matching this deployment's default order status.
    pub fn default_filters(&self) -> OrderFilters {
        OrderFilters::with_status(&self.config.default_status_filter)
    }

    /// Fetch orders and stage a job for each one that has no shipment yet.
    ///
    /// Both conditions must hold: the order matches the status filter AND no
    /// shipment record exists for it. Orders that already shipped are dropped
    /// here, which is what makes re-running a batch after a partial failure
    /// safe: prior successes simply stop being eligible.
    pub async fn load_eligible_orders(&self, filters: &OrderFilters) -> Result<Vec<BatchJob>> {
        let orders = self.orders.get_orders(filters).await?;
        let fetched = orders.len();

        let mut jobs = Vec::with_capacity(orders.len());
        for order in orders {
            let existing = self.store.find_by_order(order.order_id).await?;
            if existing.is_empty() {
                jobs.push(BatchJob::from_order(order));
            }
        }

        debug!(
            fetched = fetched,
            eligible = jobs.len(),
            status = %filters.status,
            "Eligibility pass complete"
        );
        Ok(jobs)
    }

    /// Run the selected jobs to completion and aggregate the outcome.
    pub async fn process_selected(&self, jobs: Vec<BatchJob>) -> BatchOutcome {
        let handle = BatchHandle::new();
        self.process_selected_with_handle(jobs, &handle).await
    }

    /// Like [`process_selected`](Self::process_selected), but observable and
    /// cancellable through a caller-held [`BatchHandle`].
    pub async fn process_selected_with_handle(
        &self,
        jobs: Vec<BatchJob>,
        handle: &BatchHandle,
    ) -> BatchOutcome {
        let batch_id = Uuid::new_v4();
        let selected: Vec<BatchJob> = jobs.into_iter().filter(BatchJob::is_selected).collect();
        let total = selected.len();

        handle.progress.set_total(total);
        log_batch_operation("started", total, 0, 0, None);
        let _ = self
            .publisher
            .publish(
                names::BATCH_STARTED,
                json!({ "batch_id": batch_id, "selected": total }),
            )
            .await;

        let mut tasks = Vec::with_capacity(total);
        for job in selected {
            let orchestrator = self.clone();
            let run_handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                orchestrator.run_job(batch_id, job, run_handle).await
            }));
        }

        let mut outcome = BatchOutcome {
            succeeded: Vec::new(),
            failed: Vec::new(),
            not_started: Vec::new(),
        };
        for settled in join_all(tasks).await {
            let mut job = match settled {
                Ok(job) => job,
                Err(join_error) => {
                    error!(
                        batch_id = %batch_id,
                        error = %join_error,
                        "Batch job task panicked; its job is missing from the aggregate"
                    );
                    continue;
                }
            };

            if matches!(job.state(), JobState::Succeeded(_)) {
                outcome.succeeded.push(job);
            } else if matches!(job.state(), JobState::Failed(_)) {
                outcome.failed.push(job);
            } else if matches!(job.state(), JobState::Processing) {
                warn!(job_id = %job.job_id, "Job settled without a terminal state, tallying as failed");
                job.fail(FulfillmentError::store("job finished without a terminal state"));
                handle.progress.mark_failed();
                outcome.failed.push(job);
            } else {
                outcome.not_started.push(job);
            }
        }

        self.deliver_labels(batch_id, &outcome).await;

        let snapshot = handle.progress();
        let details = if snapshot.skipped > 0 {
            Some(format!("{} jobs cancelled before start", snapshot.skipped))
        } else {
            None
        };
        log_batch_operation(
            "completed",
            total,
            outcome.succeeded_count(),
            outcome.failed_count(),
            details.as_deref(),
        );
        let _ = self
            .publisher
            .publish(
                names::BATCH_COMPLETED,
                json!({
                    "batch_id": batch_id,
                    "selected": total,
                    "succeeded": outcome.succeeded_count(),
                    "failed": outcome.failed_count(),
                    "skipped": snapshot.skipped,
                }),
            )
            .await;

        outcome
    }

    /// Run one job under the concurrency limit and return it in a settled
    /// state. The cancellation flag is checked again after the permit is
    /// granted: a job that queued behind the limit must not start once the
    /// run is cancelled.
    async fn run_job(&self, batch_id: Uuid, mut job: BatchJob, handle: BatchHandle) -> BatchJob {
        if handle.is_cancelled() {
            handle.progress.mark_skipped();
            debug!(job_id = %job.job_id, "Job cancelled before start");
            return job;
        }

        let _permit = match self.jobs_semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                // The semaphore lives as long as the orchestrator and is
                // never closed; a closed semaphore is a wiring bug.
                job.fail(FulfillmentError::store("batch semaphore closed"));
                handle.progress.mark_failed();
                return job;
            }
        };

        if handle.is_cancelled() {
            handle.progress.mark_skipped();
            debug!(job_id = %job.job_id, "Job cancelled while queued");
            return job;
        }

        job.mark_processing();
        handle.progress.mark_started();

        match self.purchase_and_persist(batch_id, &job).await {
            Ok(label) => {
                handle.progress.mark_succeeded();
                job.complete(label);
            }
            Err(error) => {
                warn!(
                    job_id = %job.job_id,
                    order_id = %job.order.order_id,
                    error = %error,
                    "Batch job failed"
                );
                handle.progress.mark_failed();
                job.fail(error);
            }
        }

        job
    }

    /// The per-job pipeline: duplicate re-check, write-ahead intent, carrier
    /// purchase, persistence, intent close.
    async fn purchase_and_persist(&self, batch_id: Uuid, job: &BatchJob) -> Result<LabelResponse> {
        let order_id = job.order.order_id;

        // Eligibility can go stale between load and run; re-check before
        // spending money with a carrier.
        let existing = self.store.find_by_order(order_id).await?;
        if !existing.is_empty() {
            return Err(FulfillmentError::DuplicateShipment { order_id });
        }

        let request = self.label_request(job);
        let intent = self.intents.record(order_id, job.carrier()).await?;

        let label = match self.gateway.generate_label(&request).await {
            Ok(label) => label,
            Err(carrier_error) => {
                // No label was bought, so the intent must not read as a gap.
                if let Err(ledger_error) = self.intents.complete(intent.intent_id).await {
                    warn!(
                        intent_id = %intent.intent_id,
                        error = %ledger_error,
                        "Failed to close intent after carrier rejection"
                    );
                }
                return Err(carrier_error);
            }
        };

        if let Err(ledger_error) = self
            .intents
            .attach_tracking(intent.intent_id, &label.tracking_number)
            .await
        {
            warn!(
                intent_id = %intent.intent_id,
                error = %ledger_error,
                "Failed to attach tracking number to intent"
            );
        }

        match self.persist_shipment(job, &label).await {
            Ok(shipment) => {
                if let Err(ledger_error) = self.intents.complete(intent.intent_id).await {
                    warn!(
                        intent_id = %intent.intent_id,
                        error = %ledger_error,
                        "Shipment persisted but intent could not be closed"
                    );
                }

                log_shipment_operation(
                    "label_purchased",
                    Some(shipment.shipment_id),
                    Some(order_id),
                    &shipment.status.to_string(),
                    Some(&label.tracking_number),
                );
                let _ = self
                    .publisher
                    .publish(
                        names::SHIPMENT_CREATED,
                        json!({
                            "shipment_id": shipment.shipment_id,
                            "order_id": order_id,
                            "order_number": shipment.order_number,
                            "tracking_number": label.tracking_number,
                            "batch_id": batch_id,
                        }),
                    )
                    .await;

                Ok(label)
            }
            Err(store_error) => {
                // The label exists at the carrier but not in our records.
                // Leave the intent open; reconciliation picks it up from
                // there. This must never be folded into a generic failure.
                error!(
                    order_id = %order_id,
                    tracking_number = %label.tracking_number,
                    error = %store_error,
                    "Label purchased but shipment record failed, intent left open"
                );
                Err(FulfillmentError::LabelPersistenceGap {
                    order_id,
                    tracking_number: label.tracking_number,
                })
            }
        }
    }

    fn label_request(&self, job: &BatchJob) -> LabelRequest {
        LabelRequest {
            order_id: job.order.order_id,
            order_number: job.order.order_number.clone(),
            carrier: job.carrier(),
            service_level: job.service_level().to_string(),
            ship_from: self.origin.clone(),
            ship_to: job.order.shipping_address.clone(),
            packages: job.packages().to_vec(),
            package_type: job.package_type(),
            signature: job.signature(),
            shipping_date: Utc::now(),
        }
    }

    async fn persist_shipment(&self, job: &BatchJob, label: &LabelResponse) -> Result<Shipment> {
        let new = NewShipment {
            order_id: job.order.order_id,
            order_number: job.order.order_number.clone(),
            carrier: job.carrier(),
            service_level: job.service_level().to_string(),
            packages: job.packages().to_vec(),
            package_type: job.package_type(),
            signature: job.signature(),
            estimated_delivery: None,
            is_return: false,
            return_of: None,
            return_reason: None,
            return_authorization: None,
        };

        let mut shipment = self.store.create(new).await?;
        shipment.attach_label(label, Utc::now());
        self.store.update(shipment).await
    }

    /// Hand every successful label to the sink in one call. Sink failures
    /// are logged and dropped: the labels are already bought and persisted,
    /// and post-processing can be re-driven from the shipment records.
    async fn deliver_labels(&self, batch_id: Uuid, outcome: &BatchOutcome) {
        let deliveries: Vec<LabelDelivery> = outcome
            .succeeded
            .iter()
            .filter_map(|job| {
                job.label().map(|label| LabelDelivery {
                    order_id: job.order.order_id,
                    order_number: job.order.order_number.clone(),
                    tracking_number: label.tracking_number.clone(),
                    label_url: label.label_url.clone(),
                })
            })
            .collect();

        if deliveries.is_empty() {
            return;
        }

        if let Err(sink_error) = self.sink.deliver(batch_id, &deliveries).await {
            warn!(
                batch_id = %batch_id,
                label_count = deliveries.len(),
                error = %sink_error,
                "Label sink rejected delivery, labels remain purchased and persisted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carriers::{Carrier, CarrierBackend};
    use crate::models::{Order, OrderItem, PackageDimensions, PackageType, SignatureOption};
    use crate::order_source::InMemoryOrderSource;
    use crate::store::{InMemoryIntentLedger, InMemoryShipmentStore, ShipmentFilters};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct StubBackend {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Option<Duration>,
        gate: Option<Arc<Semaphore>>,
        entered: Notify,
        fail_orders: Mutex<HashSet<String>>,
    }

    impl StubBackend {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay: None,
                gate: None,
                entered: Notify::new(),
                fail_orders: Mutex::new(HashSet::new()),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::ok()
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::ok()
            }
        }

        fn fail_for(&self, order_number: &str) {
            self.fail_orders.lock().insert(order_number.to_string());
        }
    }

    #[async_trait]
    impl CarrierBackend for StubBackend {
        async fn purchase_label(&self, request: &LabelRequest) -> Result<LabelResponse> {
            self.entered.notify_one();
            let seq = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_orders.lock().contains(&request.order_number) {
                return Err(FulfillmentError::Carrier {
                    carrier: request.carrier,
                    message: "rate service unavailable".to_string(),
                });
            }

            Ok(LabelResponse {
                tracking_number: format!("STUB-{seq}"),
                tracking_url: format!("https://track.example.com/STUB-{seq}"),
                label_url: format!("https://labels.example.com/STUB-{seq}.pdf"),
                cost: Some(7.25),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        deliveries: Mutex<Vec<(Uuid, Vec<LabelDelivery>)>>,
    }

    #[async_trait]
    impl LabelSink for RecordingSink {
        async fn deliver(&self, batch_id: Uuid, labels: &[LabelDelivery]) -> Result<()> {
            self.deliveries.lock().push((batch_id, labels.to_vec()));
            Ok(())
        }
    }

    /// Store whose writes of the label outcome always fail, for exercising
    /// the purchased-but-not-persisted path.
    struct BrokenUpdateStore {
        inner: InMemoryShipmentStore,
    }

    #[async_trait]
    impl ShipmentStore for BrokenUpdateStore {
        async fn create(&self, new: NewShipment) -> Result<Shipment> {
            self.inner.create(new).await
        }

        async fn get_by_id(&self, shipment_id: Uuid) -> Result<Option<Shipment>> {
            self.inner.get_by_id(shipment_id).await
        }

        async fn update(&self, _shipment: Shipment) -> Result<Shipment> {
            Err(FulfillmentError::store("write failed: connection reset"))
        }

        async fn append_event(
            &self,
            shipment_id: Uuid,
            event: crate::models::TrackingEvent,
            advance_to: Option<crate::state_machine::ShipmentState>,
        ) -> Result<Shipment> {
            self.inner.append_event(shipment_id, event, advance_to).await
        }

        async fn append_note(
            &self,
            shipment_id: Uuid,
            note: crate::models::ShipmentNote,
        ) -> Result<Shipment> {
            self.inner.append_note(shipment_id, note).await
        }

        async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Shipment>> {
            self.inner.find_by_order(order_id).await
        }

        async fn list_by_filters(&self, filters: &ShipmentFilters) -> Result<Vec<Shipment>> {
            self.inner.list_by_filters(filters).await
        }
    }

    fn address() -> Address {
        Address {
            name: "Mia Ruiz".to_string(),
            company: None,
            street1: "42 Harbor Way".to_string(),
            street2: None,
            city: "Oakland".to_string(),
            state: "CA".to_string(),
            postal_code: "94607".to_string(),
            country: "US".to_string(),
            phone: Some("510-555-0138".to_string()),
            email: None,
        }
    }

    fn order(number: &str) -> Order {
        Order {
            order_id: Uuid::new_v4(),
            order_number: number.to_string(),
            status: "Processing".to_string(),
            customer_name: "Mia Ruiz".to_string(),
            customer_email: "mia@example.com".to_string(),
            shipping_address: address(),
            items: vec![OrderItem {
                product: "Field notebook 3-pack".to_string(),
                sku: "FN-3PK".to_string(),
                quantity: 1,
                dimensions: Some(PackageDimensions::new(8.0, 5.0, 2.0, 0.8)),
            }],
            placed_at: Utc::now(),
        }
    }

    fn new_shipment_for(order: &Order) -> NewShipment {
        NewShipment {
            order_id: order.order_id,
            order_number: order.order_number.clone(),
            carrier: Carrier::Ups,
            service_level: "UPS Ground".to_string(),
            packages: vec![PackageDimensions::new(8.0, 5.0, 2.0, 0.8)],
            package_type: PackageType::default(),
            signature: SignatureOption::default(),
            estimated_delivery: None,
            is_return: false,
            return_of: None,
            return_reason: None,
            return_authorization: None,
        }
    }

    fn selected_job(number: &str) -> BatchJob {
        let mut job = BatchJob::from_order(order(number));
        job.select();
        job
    }

    struct Harness {
        orchestrator: BatchOrchestrator,
        source: Arc<InMemoryOrderSource>,
        backend: Arc<StubBackend>,
        store: Arc<InMemoryShipmentStore>,
        intents: Arc<InMemoryIntentLedger>,
        sink: Arc<RecordingSink>,
    }

    fn orchestrator_over(
        max_concurrent: usize,
        backend: Arc<StubBackend>,
        store: Arc<dyn ShipmentStore>,
        intents: Arc<InMemoryIntentLedger>,
        source: Arc<InMemoryOrderSource>,
        sink: Arc<RecordingSink>,
    ) -> BatchOrchestrator {
        let mut backends: HashMap<Carrier, Arc<dyn CarrierBackend>> = HashMap::new();
        backends.insert(Carrier::Ups, backend);
        let gateway = Arc::new(CarrierGateway::new(backends).unwrap());

        BatchOrchestrator::new(
            BatchConfig {
                max_concurrent_jobs: max_concurrent,
                default_status_filter: "Processing".to_string(),
            },
            address(),
            source,
            gateway,
            store,
            intents,
            sink,
            EventPublisher::default(),
        )
    }

    fn harness(max_concurrent: usize, backend: StubBackend) -> Harness {
        let source = Arc::new(InMemoryOrderSource::new());
        let backend = Arc::new(backend);
        let store = Arc::new(InMemoryShipmentStore::new());
        let intents = Arc::new(InMemoryIntentLedger::new());
        let sink = Arc::new(RecordingSink::default());

        let orchestrator = orchestrator_over(
            max_concurrent,
            backend.clone(),
            store.clone(),
            intents.clone(),
            source.clone(),
            sink.clone(),
        );

        Harness {
            orchestrator,
            source,
            backend,
            store,
            intents,
            sink,
        }
    }

    #[tokio::test]
    async fn test_eligibility_excludes_orders_with_existing_shipments() {
        let h = harness(4, StubBackend::ok());
        let order_a = order("SO-1");
        let order_b = order("SO-2");
        h.source.push(order_a.clone());
        h.source.push(order_b.clone());
        h.store.create(new_shipment_for(&order_b)).await.unwrap();

        let jobs = h
            .orchestrator
            .load_eligible_orders(&h.orchestrator.default_filters())
            .await
            .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].order.order_id, order_a.order_id);
    }

    #[tokio::test]
    async fn test_rerun_after_batch_excludes_prior_successes() {
        let h = harness(4, StubBackend::ok());
        h.source.push(order("SO-1"));
        h.source.push(order("SO-2"));

        let filters = h.orchestrator.default_filters();
        let mut jobs = h.orchestrator.load_eligible_orders(&filters).await.unwrap();
        assert_eq!(jobs.len(), 2);
        for job in &mut jobs {
            job.select();
        }
        let outcome = h.orchestrator.process_selected(jobs).await;
        assert_eq!(outcome.succeeded_count(), 2);

        // Both orders now have shipments, so the next pass stages nothing.
        let rerun = h.orchestrator.load_eligible_orders(&filters).await.unwrap();
        assert!(rerun.is_empty());
    }

    #[tokio::test]
    async fn test_only_selected_jobs_run() {
        let h = harness(4, StubBackend::ok());
        let selected = selected_job("SO-1");
        let unselected = BatchJob::from_order(order("SO-2"));

        let outcome = h.orchestrator.process_selected(vec![selected, unselected]).await;

        assert_eq!(outcome.succeeded_count(), 1);
        assert_eq!(outcome.failed_count(), 0);
        assert!(outcome.not_started.is_empty());
        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_batch() {
        let backend = StubBackend::ok();
        backend.fail_for("SO-3");
        let h = harness(4, backend);
        let jobs: Vec<BatchJob> = ["SO-1", "SO-2", "SO-3", "SO-4"]
            .iter()
            .map(|number| selected_job(number))
            .collect();
        let failed_order_id = jobs[2].order.order_id;

        let handle = BatchHandle::new();
        let outcome = h
            .orchestrator
            .process_selected_with_handle(jobs, &handle)
            .await;

        assert_eq!(outcome.succeeded_count(), 3);
        assert_eq!(outcome.failed_count(), 1);
        assert_eq!(outcome.failed[0].order.order_number, "SO-3");
        assert!(matches!(
            outcome.failed[0].error(),
            Some(FulfillmentError::Carrier { .. })
        ));

        // The failed order got no shipment record and no open intent.
        let orphans = h.store.find_by_order(failed_order_id).await.unwrap();
        assert!(orphans.is_empty());
        assert!(h.intents.open_intents().await.unwrap().is_empty());

        // The sink saw exactly the successful labels.
        let deliveries = h.sink.deliveries.lock();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].1.len(), 3);

        let snapshot = handle.progress();
        assert_eq!(snapshot.succeeded, 3);
        assert_eq!(snapshot.failed, 1);
        assert!(snapshot.is_complete());
    }

    #[tokio::test]
    async fn test_stale_eligibility_is_rechecked_before_purchase() {
        let h = harness(2, StubBackend::ok());
        let order = order("SO-9");
        let mut job = BatchJob::from_order(order.clone());
        job.select();

        // A shipment appears between staging and processing.
        h.store.create(new_shipment_for(&order)).await.unwrap();

        let outcome = h.orchestrator.process_selected(vec![job]).await;

        assert_eq!(outcome.failed_count(), 1);
        assert!(matches!(
            outcome.failed[0].error(),
            Some(FulfillmentError::DuplicateShipment { .. })
        ));
        // Money was never spent and no intent was recorded.
        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 0);
        assert!(h.intents.open_intents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_intent_open_with_tracking() {
        let source = Arc::new(InMemoryOrderSource::new());
        let backend = Arc::new(StubBackend::ok());
        let store = Arc::new(BrokenUpdateStore {
            inner: InMemoryShipmentStore::new(),
        });
        let intents = Arc::new(InMemoryIntentLedger::new());
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = orchestrator_over(
            2,
            backend.clone(),
            store,
            intents.clone(),
            source,
            sink.clone(),
        );

        let outcome = orchestrator.process_selected(vec![selected_job("SO-7")]).await;

        assert_eq!(outcome.failed_count(), 1);
        match outcome.failed[0].error() {
            Some(FulfillmentError::LabelPersistenceGap {
                tracking_number, ..
            }) => assert_eq!(tracking_number.as_str(), "STUB-1"),
            other => panic!("expected persistence gap, got {other:?}"),
        }

        // The open intent carries the purchased tracking number for
        // reconciliation.
        let open = intents.open_intents().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].tracking_number.as_deref(), Some("STUB-1"));

        // Nothing reached the sink.
        assert!(sink.deliveries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_skips_jobs_that_never_started() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(1, StubBackend::gated(gate.clone()));
        let jobs: Vec<BatchJob> = ["SO-1", "SO-2", "SO-3"]
            .iter()
            .map(|number| selected_job(number))
            .collect();

        let handle = BatchHandle::new();
        let orchestrator = h.orchestrator.clone();
        let run_handle = handle.clone();
        let run = tokio::spawn(async move {
            orchestrator
                .process_selected_with_handle(jobs, &run_handle)
                .await
        });

        // Wait until the first job is inside the carrier call, then cancel
        // and let it finish.
        h.backend.entered.notified().await;
        handle.cancel();
        gate.add_permits(3);

        let outcome = run.await.unwrap();

        assert_eq!(outcome.succeeded_count(), 1);
        assert_eq!(outcome.failed_count(), 0);
        assert_eq!(outcome.not_started.len(), 2);

        let snapshot = handle.progress();
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.skipped, 2);
        assert!(snapshot.is_complete());
    }

    #[tokio::test]
    async fn test_concurrency_stays_within_the_permit_pool() {
        let h = harness(2, StubBackend::slow(Duration::from_millis(20)));
        let jobs: Vec<BatchJob> = (1..=6).map(|n| selected_job(&format!("SO-{n}"))).collect();

        let outcome = h.orchestrator.process_selected(jobs).await;

        assert_eq!(outcome.succeeded_count(), 6);
        assert!(h.backend.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_selection_completes_immediately() {
        let h = harness(4, StubBackend::ok());
        let outcome = h.orchestrator.process_selected(Vec::new()).await;

        assert_eq!(outcome.succeeded_count(), 0);
        assert_eq!(outcome.failed_count(), 0);
        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 0);
    }
}
