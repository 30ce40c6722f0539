//! View state for an auto-refreshing run list.
//!
//! Holds no timers. [`LiveRefresh`](super::LiveRefresh) drives it, and tests
//! can drive it directly with fixed timestamps.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::has_non_terminal_runs;
use crate::model::{ExtractionRun, Page};
use crate::query::RunsQuery;

/// Whether a response was applied to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The response was for a query the view no longer shows.
    Stale,
}

/// What an observer of a live run list sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshSnapshot {
    pub query: RunsQuery,
    pub runs: Vec<ExtractionRun>,
    pub total: u64,
    /// Absent whenever no PENDING or RUNNING run is in view.
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Message of the last failed fetch; the runs are the last good ones.
    pub last_error: Option<String>,
    pub polling: bool,
}

#[derive(Debug, Clone)]
pub struct LiveRefreshController {
    query: RunsQuery,
    runs: Vec<ExtractionRun>,
    total: u64,
    last_refreshed: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl LiveRefreshController {
    pub fn new(query: RunsQuery) -> Self {
        Self {
            query,
            runs: Vec::new(),
            total: 0,
            last_refreshed: None,
            last_error: None,
        }
    }

    pub fn query(&self) -> &RunsQuery {
        &self.query
    }

    /// Switches to another filter or page. Returns false if `query` is
    /// already shown.
    pub fn on_view_changed(&mut self, query: RunsQuery) -> bool {
        if query == self.query {
            return false;
        }
        self.query = query;
        self.runs.clear();
        self.total = 0;
        self.last_refreshed = None;
        self.last_error = None;
        true
    }

    /// Applies a successful fetch issued for `requested`.
    pub fn apply_response(
        &mut self,
        requested: &RunsQuery,
        page: Page<ExtractionRun>,
        now: DateTime<Utc>,
    ) -> ApplyOutcome {
        if requested != &self.query {
            return ApplyOutcome::Stale;
        }
        self.runs = page.items;
        self.total = page.total;
        self.last_error = None;
        self.last_refreshed = if has_non_terminal_runs(&self.runs) {
            Some(now)
        } else {
            None
        };
        ApplyOutcome::Applied
    }

    /// Records a failed fetch issued for `requested`. The last good runs
    /// stay in view.
    pub fn apply_error(&mut self, requested: &RunsQuery, message: String) -> ApplyOutcome {
        if requested != &self.query {
            return ApplyOutcome::Stale;
        }
        self.last_error = Some(message);
        ApplyOutcome::Applied
    }

    /// Poll while any run in view is PENDING or RUNNING.
    pub fn should_poll(&self) -> bool {
        has_non_terminal_runs(&self.runs)
    }

    /// The label tick needs both a timestamp and something still running.
    pub fn should_tick(&self) -> bool {
        self.last_refreshed.is_some() && self.should_poll()
    }

    pub fn runs(&self) -> &[ExtractionRun] {
        &self.runs
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// "just now", "1 second ago" or "N seconds ago".
    pub fn refreshed_label(&self, now: DateTime<Utc>) -> Option<String> {
        self.last_refreshed.map(|at| seconds_ago_label(at, now))
    }

    pub fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            query: self.query.clone(),
            runs: self.runs.clone(),
            total: self.total,
            last_refreshed: self.last_refreshed,
            last_error: self.last_error.clone(),
            polling: self.should_poll(),
        }
    }
}

pub fn seconds_ago_label(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match (now - at).num_seconds() {
        s if s < 1 => "just now".to_string(),
        1 => "1 second ago".to_string(),
        s => format!("{} seconds ago", s),
    }
}
