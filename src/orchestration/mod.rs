//! # Batch Label Orchestration
//!
//! Turns a set of selected orders into shipments with purchased labels,
//! concurrently but bounded, with every job isolated from its siblings. The
//! orchestrator owns eligibility (an order with any existing shipment is
//! never offered again), the per-job purchase/persist pipeline with its
//! write-ahead label intent, and the aggregate accounting the back office
//! shows while a run is in flight.

pub mod batch_orchestrator;
pub mod label_sink;
pub mod types;

pub use batch_orchestrator::{BatchHandle, BatchOrchestrator};
pub use label_sink::{LabelDelivery, LabelSink, LoggingLabelSink};
pub use types::{BatchJob, BatchOutcome, BatchProgress, JobState, ProgressSnapshot};
