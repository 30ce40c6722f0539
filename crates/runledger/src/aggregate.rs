//! Read-side projections over runs and segments. Nothing here mutates state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Document, DocumentDetail, ExtractionRun};
use crate::status::{RunStatus, SegmentStatus};

/// Picks the most recently created run: latest `created_at`, then highest id.
pub fn latest_run(runs: &[ExtractionRun]) -> Option<&ExtractionRun> {
    runs.iter().max_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// Document fields echoed from its latest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentRunSummary {
    pub latest_run_status: Option<RunStatus>,
    pub latest_run_error_message: Option<String>,
}

impl DocumentRunSummary {
    pub fn from_runs(runs: &[ExtractionRun]) -> Self {
        match latest_run(runs) {
            Some(run) => Self {
                latest_run_status: Some(run.status),
                latest_run_error_message: run.error_message.clone(),
            },
            None => Self::default(),
        }
    }

    pub fn into_detail(self, document: Document) -> DocumentDetail {
        DocumentDetail {
            document,
            latest_run_status: self.latest_run_status,
            latest_run_error_message: self.latest_run_error_message,
        }
    }
}

/// Segment counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentCounts {
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SegmentCounts {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = SegmentStatus>,
    {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                SegmentStatus::Pending => counts.pending += 1,
                SegmentStatus::Running => counts.running += 1,
                SegmentStatus::Done => counts.done += 1,
                SegmentStatus::Failed => counts.failed += 1,
                SegmentStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    pub fn get(&self, status: SegmentStatus) -> usize {
        match status {
            SegmentStatus::Pending => self.pending,
            SegmentStatus::Running => self.running,
            SegmentStatus::Done => self.done,
            SegmentStatus::Failed => self.failed,
            SegmentStatus::Skipped => self.skipped,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.done + self.failed + self.skipped
    }
}

/// Display summary for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub total_segments: usize,
    pub counts: SegmentCounts,
    /// Drives the warning indicator next to the run.
    pub has_failed_segments: bool,
    pub duration: String,
}

impl RunSummary {
    pub fn of(run: &ExtractionRun) -> Self {
        let counts = SegmentCounts::tally(run.segments.iter().map(|s| s.status));
        Self {
            run_id: run.id,
            status: run.status,
            total_segments: counts.total(),
            counts,
            has_failed_segments: counts.failed > 0,
            duration: duration_label(run.started_at, run.finished_at),
        }
    }
}

/// Whether any run in the slice is PENDING or RUNNING.
pub fn has_non_terminal_runs(runs: &[ExtractionRun]) -> bool {
    runs.iter().any(|run| run.status.is_non_terminal())
}

/// Elapsed run time for display, rounded to whole seconds.
pub fn duration_label(
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
) -> String {
    let Some(started) = started_at else {
        return "\u{2014}".to_string();
    };
    let Some(finished) = finished_at else {
        return "Running...".to_string();
    };
    let millis = (finished - started).num_milliseconds().max(0);
    let seconds = (millis + 500) / 1000;
    if seconds < 60 {
        format!("{}s", seconds)
    } else {
        format!("{}m {}s", seconds / 60, seconds % 60)
    }
}
