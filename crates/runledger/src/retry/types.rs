//! Request/response payloads of the retry endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eligibility::{RetryEligibility, RetryPolicy, RetryView};
use crate::model::ExtractionSegment;
use crate::status::SegmentStatus;

/// Result of an accepted single-segment retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRetryResponse {
    pub message: String,
    pub segment_id: i64,
    pub document_id: i64,
    pub extraction_run_id: i64,
}

/// Retry eligibility of one segment as reported by `retry-status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRetryStatus {
    pub segment_id: i64,
    pub status: SegmentStatus,
    pub can_retry: bool,
    pub reason: String,
    pub last_updated: DateTime<Utc>,
    pub hours_since_failure: f64,
    pub hours_remaining_for_retry: f64,
    pub retry_deadline: DateTime<Utc>,
}

impl SegmentRetryStatus {
    pub fn new(segment: &ExtractionSegment, eligibility: RetryEligibility) -> Self {
        Self {
            segment_id: segment.id,
            status: segment.status,
            can_retry: eligibility.can_retry,
            reason: eligibility.reason,
            last_updated: segment.updated_at,
            hours_since_failure: eligibility.hours_since_failure,
            hours_remaining_for_retry: eligibility.hours_remaining_for_retry,
            retry_deadline: eligibility.retry_deadline,
        }
    }

    /// Re-evaluates the reported status at `now` so a displayed time
    /// remaining is never the one computed at fetch time.
    pub fn view_at(&self, policy: &RetryPolicy, now: DateTime<Utc>) -> RetryView {
        RetryView::new(
            self.segment_id,
            &policy.evaluate(self.status, self.last_updated, now),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonRetryableSegment {
    pub segment_id: i64,
    pub reason: String,
}

/// An eligible segment whose retry could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDispatch {
    pub segment_id: i64,
    pub error: String,
}

/// Outcome of a bulk retry over a document's failed segments.
///
/// `retryable_segments_count + non_retryable_segments_count ==
/// failed_segments_count` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRetryResponse {
    pub message: String,
    pub document_id: i64,
    pub failed_segments_count: u32,
    pub retryable_segments_count: u32,
    pub non_retryable_segments_count: u32,
    #[serde(default)]
    pub retryable_segment_ids: Vec<i64>,
    #[serde(default)]
    pub non_retryable_reasons: Vec<NonRetryableSegment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_dispatches: Vec<FailedDispatch>,
}

impl BulkRetryResponse {
    /// "Retried 3 of 5 failed segments; 2 not retryable".
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Retried {} of {} failed segments",
            self.retryable_segments_count
                .saturating_sub(self.failed_dispatches.len() as u32),
            self.failed_segments_count
        );
        if self.non_retryable_segments_count > 0 {
            summary.push_str(&format!(
                "; {} not retryable",
                self.non_retryable_segments_count
            ));
        }
        if !self.failed_dispatches.is_empty() {
            summary.push_str(&format!("; {} could not be dispatched", self.failed_dispatches.len()));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_response_without_optional_lists() {
        let json = r#"{
            "message": "nothing to retry",
            "document_id": 4,
            "failed_segments_count": 0,
            "retryable_segments_count": 0,
            "non_retryable_segments_count": 0
        }"#;
        let parsed: BulkRetryResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.retryable_segment_ids.is_empty());
        assert!(parsed.non_retryable_reasons.is_empty());

        let out = serde_json::to_value(&parsed).unwrap();
        assert!(out.get("failed_dispatches").is_none());
    }

    #[test]
    fn test_bulk_summary() {
        let response = BulkRetryResponse {
            message: String::new(),
            document_id: 1,
            failed_segments_count: 5,
            retryable_segments_count: 3,
            non_retryable_segments_count: 2,
            retryable_segment_ids: vec![1, 2, 3],
            non_retryable_reasons: vec![],
            failed_dispatches: vec![],
        };
        assert_eq!(
            response.summary(),
            "Retried 3 of 5 failed segments; 2 not retryable"
        );
    }

    #[test]
    fn test_view_is_recomputed_at_render_time() {
        use chrono::{Duration, TimeZone};

        let failed_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let policy = RetryPolicy::default();
        let status = SegmentRetryStatus {
            segment_id: 9,
            status: SegmentStatus::Failed,
            can_retry: true,
            reason: "Eligible for retry".to_string(),
            last_updated: failed_at,
            hours_since_failure: 1.0,
            hours_remaining_for_retry: 47.0,
            retry_deadline: failed_at + Duration::hours(48),
        };

        let view = status.view_at(&policy, failed_at + Duration::hours(40));
        assert_eq!(view.time_remaining_label.as_deref(), Some("8.0h"));
        assert!(view.deadline_warning);

        let view = status.view_at(&policy, failed_at + Duration::hours(48));
        assert!(!view.can_retry);
        assert!(view.time_remaining_label.is_none());
    }

    #[test]
    fn test_retry_status_rejects_unknown_status() {
        let json = r#"{
            "segment_id": 1, "status": "EXPLODED", "can_retry": false,
            "reason": "?", "last_updated": "2026-01-01T00:00:00Z",
            "hours_since_failure": 0, "hours_remaining_for_retry": 0,
            "retry_deadline": "2026-01-03T00:00:00Z"
        }"#;
        assert!(serde_json::from_str::<SegmentRetryStatus>(json).is_err());
    }
}
