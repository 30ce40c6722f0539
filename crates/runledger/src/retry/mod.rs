//! Retry orchestration.
//!
//! [`RetryOrchestrator`] applies retries to a local
//! [`RunLedger`](crate::ledger::RunLedger); the HTTP client forwards them to
//! a remote backend. Both implement [`RetryBackend`], which [`RetryActions`] drives.

mod actions;
mod orchestrator;
mod types;

use async_trait::async_trait;

pub use actions::RetryActions;
pub use orchestrator::{RetryOrchestrator, RetryPartition};
pub use types::{
    BulkRetryResponse, FailedDispatch, NonRetryableSegment, SegmentRetryResponse,
    SegmentRetryStatus,
};

/// Where retries are applied.
#[async_trait]
pub trait RetryBackend: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn retry_segment(&self, segment_id: i64) -> Result<SegmentRetryResponse, Self::Error>;

    async fn segment_retry_status(&self, segment_id: i64)
        -> Result<SegmentRetryStatus, Self::Error>;

    async fn retry_failed_segments_for_document(
        &self,
        document_id: i64,
    ) -> Result<BulkRetryResponse, Self::Error>;
}
