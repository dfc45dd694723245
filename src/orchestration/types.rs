//! Batch job, progress, and outcome types.

use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::carriers::{Carrier, LabelResponse};
use crate::error::FulfillmentError;
use crate::models::{Order, PackageDimensions, PackageType, SignatureOption};

/// Execution state of one batch job. Exactly one state at a time;
/// `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone)]
pub enum JobState {
    NotStarted,
    Processing,
    Succeeded(LabelResponse),
    Failed(FulfillmentError),
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::NotStarted => "not_started",
            JobState::Processing => "processing",
            JobState::Succeeded(_) => "succeeded",
            JobState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded(_) | JobState::Failed(_))
    }
}

/// One order staged for label purchase, carrying the operator's packaging
/// choices.
///
/// Selection fields change only through the typed setters; execution state
/// changes only inside the orchestrator. A failed job is never retried in
/// place: the operator re-selects it in a later run, which builds a fresh
/// job re-checked by eligibility.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub job_id: Uuid,
    pub order: Order,
    carrier: Carrier,
    service_level: String,
    packages: Vec<PackageDimensions>,
    package_type: PackageType,
    signature: SignatureOption,
    selected: bool,
    state: JobState,
}

impl BatchJob {
    /// Stage an order with default packaging: ground service on the house
    /// carrier, dimensions pulled from the order's measured items.
    pub fn from_order(order: Order) -> Self {
        let packages: Vec<PackageDimensions> = order
            .items
            .iter()
            .filter_map(|item| item.dimensions.clone())
            .collect();

        Self {
            job_id: Uuid::new_v4(),
            order,
            carrier: Carrier::Ups,
            service_level: "UPS Ground".to_string(),
            packages,
            package_type: PackageType::default(),
            signature: SignatureOption::default(),
            selected: false,
            state: JobState::NotStarted,
        }
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    pub fn service_level(&self) -> &str {
        &self.service_level
    }

    pub fn packages(&self) -> &[PackageDimensions] {
        &self.packages
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    pub fn signature(&self) -> SignatureOption {
        self.signature
    }

    pub fn set_carrier(&mut self, carrier: Carrier) {
        self.carrier = carrier;
    }

    pub fn set_service_level(&mut self, service_level: impl Into<String>) {
        self.service_level = service_level.into();
    }

    pub fn set_dimensions(&mut self, packages: Vec<PackageDimensions>) {
        self.packages = packages;
    }

    pub fn set_package_type(&mut self, package_type: PackageType) {
        self.package_type = package_type;
    }

    pub fn set_signature(&mut self, signature: SignatureOption) {
        self.signature = signature;
    }

    pub fn select(&mut self) {
        self.selected = true;
    }

    pub fn deselect(&mut self) {
        self.selected = false;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Label URL of a succeeded job
    pub fn label(&self) -> Option<&LabelResponse> {
        match &self.state {
            JobState::Succeeded(label) => Some(label),
            _ => None,
        }
    }

    /// Stored error of a failed job
    pub fn error(&self) -> Option<&FulfillmentError> {
        match &self.state {
            JobState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub(crate) fn mark_processing(&mut self) {
        self.state = JobState::Processing;
    }

    pub(crate) fn complete(&mut self, label: LabelResponse) {
        self.state = JobState::Succeeded(label);
    }

    pub(crate) fn fail(&mut self, error: FulfillmentError) {
        self.state = JobState::Failed(error);
    }
}

/// Live counters for a batch run, updated as jobs move through their states.
/// Readable at any time from any task; the aggregates in [`BatchOutcome`]
/// are the authoritative end-of-run numbers.
#[derive(Debug, Default)]
pub struct BatchProgress {
    total: AtomicUsize,
    started: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

/// Point-in-time view of a run's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Cancelled before starting; excluded from both aggregates
    pub skipped: usize,
}

impl ProgressSnapshot {
    pub fn in_flight(&self) -> usize {
        self.started.saturating_sub(self.succeeded + self.failed)
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded + self.failed + self.skipped >= self.total
    }
}

impl BatchProgress {
    pub(crate) fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn mark_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn mark_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn mark_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn mark_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::SeqCst),
            started: self.started.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
        }
    }
}

/// End-of-run aggregate: every selected job lands in exactly one bucket.
/// Jobs cancelled before starting sit in `not_started` and count toward
/// neither aggregate.
#[derive(Debug)]
pub struct BatchOutcome {
    pub succeeded: Vec<BatchJob>,
    pub failed: Vec<BatchJob>,
    pub not_started: Vec<BatchJob>,
}

impl BatchOutcome {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
