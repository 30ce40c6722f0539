//! Time-windowed retry eligibility.
//!
//! Only FAILED segments may be retried, and only while fewer than
//! `window` hours have passed since the failure (the segment's
//! `updated_at`). Everything here is a pure function of its inputs; the
//! caller passes "now" explicitly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ExtractionSegment;
use crate::status::SegmentStatus;

/// Default retry window in hours.
pub const DEFAULT_RETRY_WINDOW_HOURS: u32 = 48;

/// Remaining hours under which a deadline warning is shown.
pub const DEADLINE_WARNING_HOURS: f64 = 12.0;

pub const REASON_ELIGIBLE: &str = "Eligible for retry";
pub const REASON_NOT_FAILED: &str = "Segment is not in a failed state";

/// Outcome of an eligibility check. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryEligibility {
    pub can_retry: bool,
    pub reason: String,
    pub hours_since_failure: f64,
    pub hours_remaining_for_retry: f64,
    pub retry_deadline: DateTime<Utc>,
}

/// The retry window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    window_hours: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_RETRY_WINDOW_HOURS,
        }
    }
}

impl RetryPolicy {
    pub fn new(window_hours: u32) -> Self {
        Self { window_hours }
    }

    pub fn window_hours(&self) -> u32 {
        self.window_hours
    }

    pub fn window(&self) -> Duration {
        Duration::hours(i64::from(self.window_hours))
    }

    /// Reason given once the window has elapsed.
    pub fn expired_reason(&self) -> String {
        format!(
            "Retry window expired (>{}h since failure)",
            self.window_hours
        )
    }

    /// Evaluates eligibility for a segment in `status` whose last transition
    /// happened at `failed_at`.
    pub fn evaluate(
        &self,
        status: SegmentStatus,
        failed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RetryEligibility {
        let window = f64::from(self.window_hours);
        let elapsed_ms = (now - failed_at).num_milliseconds().max(0);
        let hours_since_failure = elapsed_ms as f64 / 3_600_000.0;
        let hours_remaining_for_retry = (window - hours_since_failure).max(0.0);
        let retry_deadline = failed_at + self.window();

        let (can_retry, reason) = if status != SegmentStatus::Failed {
            (false, REASON_NOT_FAILED.to_string())
        } else if hours_since_failure < window {
            (true, REASON_ELIGIBLE.to_string())
        } else {
            (false, self.expired_reason())
        };

        RetryEligibility {
            can_retry,
            reason,
            hours_since_failure,
            hours_remaining_for_retry,
            retry_deadline,
        }
    }

    pub fn evaluate_segment(
        &self,
        segment: &ExtractionSegment,
        now: DateTime<Utc>,
    ) -> RetryEligibility {
        self.evaluate(segment.status, segment.updated_at, now)
    }
}

/// What the presentation layer needs to render a retry affordance.
///
/// Built at render time from a fresh eligibility so "time remaining" is
/// never frozen at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryView {
    pub segment_id: i64,
    pub can_retry: bool,
    pub reason: String,
    /// e.g. `"3.5h"`; absent when retry is not possible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_label: Option<String>,
    /// Fewer than [`DEADLINE_WARNING_HOURS`] remain.
    pub deadline_warning: bool,
}

impl RetryView {
    pub fn new(segment_id: i64, eligibility: &RetryEligibility) -> Self {
        let (time_remaining_label, deadline_warning) = if eligibility.can_retry {
            (
                Some(format!("{:.1}h", eligibility.hours_remaining_for_retry)),
                eligibility.hours_remaining_for_retry < DEADLINE_WARNING_HOURS,
            )
        } else {
            (None, false)
        };

        Self {
            segment_id,
            can_retry: eligibility.can_retry,
            reason: eligibility.reason.clone(),
            time_remaining_label,
            deadline_warning,
        }
    }
}
