//! Retry mutation handles for the presentation layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::cache::{CacheInvalidation, ViewCache};
use crate::eligibility::{RetryPolicy, RetryView};

use super::types::{BulkRetryResponse, SegmentRetryResponse};
use super::RetryBackend;

/// Single and bulk retry over a [`RetryBackend`].
///
/// Cached views are dropped only after the backend accepted the retry. A
/// failed call changes nothing locally and hands the error back.
pub struct RetryActions<B> {
    backend: B,
    cache: Arc<ViewCache>,
    policy: RetryPolicy,
}

impl<B: RetryBackend> RetryActions<B> {
    pub fn new(backend: B, cache: Arc<ViewCache>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            cache,
            policy,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn retry_segment(&self, segment_id: i64) -> Result<SegmentRetryResponse, B::Error> {
        match self.backend.retry_segment(segment_id).await {
            Ok(response) => {
                self.cache.invalidate_run(response.extraction_run_id);
                self.cache.invalidate_document(response.document_id);
                info!(segment_id, run_id = response.extraction_run_id, "{}", response.message);
                Ok(response)
            }
            Err(e) => {
                warn!(segment_id, error = %e, "Segment retry failed");
                Err(e)
            }
        }
    }

    pub async fn retry_document(&self, document_id: i64) -> Result<BulkRetryResponse, B::Error> {
        match self
            .backend
            .retry_failed_segments_for_document(document_id)
            .await
        {
            Ok(response) => {
                // The response does not name the runs it touched.
                self.cache.invalidate_all_runs();
                self.cache.invalidate_document(document_id);
                info!(document_id, "{}", response.summary());
                Ok(response)
            }
            Err(e) => {
                warn!(document_id, error = %e, "Bulk retry failed");
                Err(e)
            }
        }
    }

    /// Fetches a segment's retry status and renders it at `now`.
    pub async fn retry_view(
        &self,
        segment_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RetryView, B::Error> {
        let status = self.backend.segment_retry_status(segment_id).await?;
        Ok(status.view_at(&self.policy, now))
    }
}
