//! Live refresh over a ledger-backed run source.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use tokio::time::sleep;

use common::LedgerHarness;
use runledger::refresh::RefreshTimers;
use runledger::{
    CachedRunSource, ExtractionRun, LedgerError, LiveRefresh, Page, RetryActions, RetryPolicy,
    RunLedger, RunSource, RunStatus, RunsQuery, ViewCache,
};

/// Counts fetches on the way to the ledger.
struct CountingLedger {
    ledger: RunLedger,
    fetches: AtomicUsize,
}

impl CountingLedger {
    fn new(ledger: RunLedger) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunSource for CountingLedger {
    type Error = LedgerError;

    async fn list_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>, LedgerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.ledger.list_runs(query)
    }

    async fn get_run(&self, run_id: i64) -> Result<ExtractionRun, LedgerError> {
        self.ledger.get_run(run_id)
    }
}

fn spawn(h: &LedgerHarness, source: impl RunSource + 'static) -> LiveRefresh {
    LiveRefresh::spawn(
        source,
        RunsQuery::default(),
        RefreshTimers::default(),
        Arc::new(h.clock.clone()),
    )
}

#[tokio::test(start_paused = true)]
async fn test_completed_view_is_not_polled() {
    let h = LedgerHarness::new();
    let doc = h.document("roster.pdf");
    let run = h.run(doc.id, 3);
    for segment in &run.segments {
        h.complete(segment.id);
    }

    let source = CountingLedger::new(h.ledger.clone());
    let live = spawn(&h, source.clone());

    sleep(StdDuration::from_millis(50)).await;
    let snapshot = live.current();
    assert_eq!(snapshot.runs.len(), 1);
    assert_eq!(snapshot.runs[0].status, RunStatus::Completed);
    assert!(snapshot.runs[0].finished_at.is_some());
    assert!(!snapshot.polling);
    assert!(snapshot.last_refreshed.is_none());

    sleep(StdDuration::from_secs(120)).await;
    assert_eq!(source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_polling_stops_once_run_settles() {
    let h = LedgerHarness::new();
    let doc = h.document("roster.pdf");
    let run = h.run(doc.id, 1);
    h.ledger.start_segment(run.segments[0].id).unwrap();

    let source = CountingLedger::new(h.ledger.clone());
    let live = spawn(&h, source.clone());
    let label = live.refreshed_label();

    sleep(StdDuration::from_millis(50)).await;
    assert!(live.current().polling);
    assert_eq!(label.borrow().as_deref(), Some("just now"));

    h.clock.advance(Duration::seconds(3));
    sleep(StdDuration::from_secs(3)).await;
    assert_eq!(label.borrow().as_deref(), Some("3 seconds ago"));

    h.ledger.complete_segment(run.segments[0].id).unwrap();
    h.complete(run.segments[1].id);

    sleep(StdDuration::from_secs(8)).await;
    assert_eq!(source.fetches(), 2);
    let snapshot = live.current();
    assert_eq!(snapshot.runs[0].status, RunStatus::Completed);
    assert!(!snapshot.polling);
    assert!(label.borrow().is_none());

    sleep(StdDuration::from_secs(60)).await;
    assert_eq!(source.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_refreshes_settled_view() {
    let h = LedgerHarness::new();
    let doc = h.document("roster.pdf");
    let run = h.run(doc.id, 1);
    h.complete(run.segments[0].id);
    let segment = run.segments[1].id;
    h.fail_at(segment, Duration::zero(), "timeout");

    let cache = Arc::new(ViewCache::with_limits(StdDuration::from_secs(300), 64));
    let source = CachedRunSource::new(h.ledger.clone(), cache.clone());
    let live = spawn(&h, source);

    sleep(StdDuration::from_millis(50)).await;
    assert_eq!(live.current().runs[0].status, RunStatus::Partial);
    assert!(!live.current().polling);
    assert!(cache.run_list(&RunsQuery::default()).is_some());

    h.at(Duration::hours(1));
    let actions = RetryActions::new(h.orchestrator(), cache.clone(), RetryPolicy::default());
    actions.retry_segment(segment).await.unwrap();
    assert!(cache.run_list(&RunsQuery::default()).is_none());

    sleep(StdDuration::from_millis(50)).await;
    let snapshot = live.current();
    assert_eq!(snapshot.runs[0].status, RunStatus::Running);
    assert!(snapshot.polling);
    let cached = cache.run_list(&RunsQuery::default()).unwrap();
    assert_eq!(cached.items[0].status, RunStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_switching_filter_shows_new_view() {
    let h = LedgerHarness::new();
    let doc = h.document("roster.pdf");
    let done = h.run(doc.id, 1);
    for segment in &done.segments {
        h.complete(segment.id);
    }
    h.at(Duration::minutes(1));
    let pending = h.run(doc.id, 1);

    let live = spawn(&h, h.ledger.clone());
    sleep(StdDuration::from_millis(50)).await;
    assert_eq!(live.current().runs.len(), 2);
    assert!(live.current().polling);

    let completed_only = RunsQuery::default().with_status(RunStatus::Completed);
    live.set_query(completed_only.clone());
    sleep(StdDuration::from_millis(50)).await;

    let snapshot = live.current();
    assert_eq!(snapshot.query, completed_only);
    assert_eq!(snapshot.runs.len(), 1);
    assert_eq!(snapshot.runs[0].id, done.id);
    assert_ne!(snapshot.runs[0].id, pending.id);
    assert!(!snapshot.polling);
}
