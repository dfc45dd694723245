//! Post-processing hook for purchased labels.
//!
//! After a batch run finishes, the orchestrator hands every successful
//! label to a [`LabelSink`] in one call. Deployments plug in printing,
//! PDF merging, or document archival here; the default sink just logs.
//! Sink failures never un-succeed jobs; the labels are already bought
//! and persisted by the time the sink sees them.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// One purchased label, reduced to what post-processing needs.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDelivery {
    pub order_id: Uuid,
    pub order_number: String,
    pub tracking_number: String,
    pub label_url: String,
}

/// Receives every successful label of a batch run after all jobs settle.
#[async_trait]
pub trait LabelSink: Send + Sync {
    async fn deliver(&self, batch_id: Uuid, labels: &[LabelDelivery]) -> Result<()>;
}

/// Default sink: logs the delivery and drops it.
#[derive(Debug, Default)]
pub struct LoggingLabelSink;

#[async_trait]
impl LabelSink for LoggingLabelSink {
    async fn deliver(&self, batch_id: Uuid, labels: &[LabelDelivery]) -> Result<()> {
        info!(
            batch_id = %batch_id,
            label_count = labels.len(),
            "🏷️ Labels ready for post-processing"
        );
        Ok(())
    }
}
