//! Single-segment and bulk-document retry against the ledger.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn};

use crate::cache::CacheInvalidation;
use crate::eligibility::RetryPolicy;
use crate::error::{LedgerError, Result};
use crate::ledger::{RunLedger, SegmentRecord};

use super::types::{
    BulkRetryResponse, FailedDispatch, NonRetryableSegment, SegmentRetryResponse,
    SegmentRetryStatus,
};
use super::RetryBackend;

/// Failed segments split by eligibility at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryPartition {
    pub retryable: Vec<SegmentRecord>,
    pub non_retryable: Vec<NonRetryableSegment>,
}

impl RetryPartition {
    /// Splits `failed` into retryable and non-retryable segments. Every
    /// input segment lands in exactly one side.
    pub fn split(policy: &RetryPolicy, failed: Vec<SegmentRecord>, now: DateTime<Utc>) -> Self {
        let mut partition = Self::default();
        for record in failed {
            let eligibility = policy.evaluate_segment(&record.segment, now);
            if eligibility.can_retry {
                partition.retryable.push(record);
            } else {
                partition.non_retryable.push(NonRetryableSegment {
                    segment_id: record.segment.id,
                    reason: eligibility.reason,
                });
            }
        }
        partition
    }

    pub fn len(&self) -> usize {
        self.retryable.len() + self.non_retryable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Applies retries to the ledger. Eligibility is always re-evaluated here;
/// nothing a caller read earlier is trusted.
#[derive(Clone)]
pub struct RetryOrchestrator {
    ledger: RunLedger,
    policy: RetryPolicy,
    invalidation: Option<Arc<dyn CacheInvalidation>>,
}

impl RetryOrchestrator {
    pub fn new(ledger: RunLedger, policy: RetryPolicy) -> Self {
        Self {
            ledger,
            policy,
            invalidation: None,
        }
    }

    /// Cached views to drop after each successful retry.
    pub fn with_invalidation(mut self, invalidation: Arc<dyn CacheInvalidation>) -> Self {
        self.invalidation = Some(invalidation);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    /// Moves one FAILED segment back to RUNNING.
    ///
    /// Fails with [`LedgerError::NotRetryable`] when the segment is not
    /// FAILED or its window has elapsed.
    pub fn retry_segment(&self, segment_id: i64) -> Result<SegmentRetryResponse> {
        let _span = info_span!("retry_segment", segment_id).entered();

        let record = self.ledger.retry_segment(segment_id, &self.policy)?;
        self.invalidate(&record);
        info!(
            run_id = record.extraction_run_id,
            document_id = record.document_id,
            "Segment queued for retry"
        );

        Ok(SegmentRetryResponse {
            message: format!("Segment {} queued for retry", segment_id),
            segment_id,
            document_id: record.document_id,
            extraction_run_id: record.extraction_run_id,
        })
    }

    /// Eligibility of a segment right now.
    pub fn retry_status(&self, segment_id: i64) -> Result<SegmentRetryStatus> {
        let record = self.ledger.get_segment(segment_id)?;
        let eligibility = self
            .policy
            .evaluate_segment(&record.segment, self.ledger.now());
        Ok(SegmentRetryStatus::new(&record.segment, eligibility))
    }

    /// Retries every eligible FAILED segment of a document.
    ///
    /// Segments are handled independently: one that cannot be retried does
    /// not stop the others. A segment that was eligible at partition time but
    /// whose retry failed stays in the retryable count and is reported in
    /// `failed_dispatches`.
    pub fn retry_failed_segments_for_document(&self, document_id: i64) -> Result<BulkRetryResponse> {
        let _span = info_span!("retry_document", document_id).entered();

        let partition = self.partition_document(document_id)?;
        let response = self.dispatch(document_id, partition);
        info!("{}", response.message);
        Ok(response)
    }

    fn partition_document(&self, document_id: i64) -> Result<RetryPartition> {
        let failed = self.ledger.failed_segments_for_document(document_id)?;
        let partition = RetryPartition::split(&self.policy, failed, self.ledger.now());
        debug!(
            retryable = partition.retryable.len(),
            non_retryable = partition.non_retryable.len(),
            "Partitioned failed segments"
        );
        Ok(partition)
    }

    /// Retries each segment of `partition.retryable` on its own.
    fn dispatch(&self, document_id: i64, partition: RetryPartition) -> BulkRetryResponse {
        let failed_segments_count = partition.len() as u32;
        let mut retryable_segment_ids = Vec::with_capacity(partition.retryable.len());
        let mut failed_dispatches = Vec::new();
        for record in &partition.retryable {
            let segment_id = record.segment.id;
            retryable_segment_ids.push(segment_id);
            match self.ledger.retry_segment(segment_id, &self.policy) {
                Ok(updated) => self.invalidate(&updated),
                Err(e) => {
                    warn!(segment_id, error = %e, "Retry dispatch failed");
                    failed_dispatches.push(FailedDispatch {
                        segment_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut response = BulkRetryResponse {
            message: String::new(),
            document_id,
            failed_segments_count,
            retryable_segments_count: partition.retryable.len() as u32,
            non_retryable_segments_count: partition.non_retryable.len() as u32,
            retryable_segment_ids,
            non_retryable_reasons: partition.non_retryable,
            failed_dispatches,
        };
        response.message = response.summary();
        response
    }

    fn invalidate(&self, record: &SegmentRecord) {
        if let Some(invalidation) = &self.invalidation {
            invalidation.invalidate_run(record.extraction_run_id);
            invalidation.invalidate_document(record.document_id);
        }
    }
}

#[async_trait]
impl RetryBackend for RetryOrchestrator {
    type Error = LedgerError;

    async fn retry_segment(&self, segment_id: i64) -> Result<SegmentRetryResponse> {
        RetryOrchestrator::retry_segment(self, segment_id)
    }

    async fn segment_retry_status(&self, segment_id: i64) -> Result<SegmentRetryStatus> {
        self.retry_status(segment_id)
    }

    async fn retry_failed_segments_for_document(
        &self,
        document_id: i64,
    ) -> Result<BulkRetryResponse> {
        RetryOrchestrator::retry_failed_segments_for_document(self, document_id)
    }
}
