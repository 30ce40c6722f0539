//! Timer-driven refresh of one run list view.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info_span, warn, Instrument};

use super::controller::{ApplyOutcome, LiveRefreshController, RefreshSnapshot};
use super::source::RunSource;
use crate::clock::Clock;
use crate::config::RefreshConfig;
use crate::query::RunsQuery;

/// Poll and label-tick periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTimers {
    pub poll_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for RefreshTimers {
    fn default() -> Self {
        Self::from(&RefreshConfig::default())
    }
}

impl From<&RefreshConfig> for RefreshTimers {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            tick_interval: config.tick_interval(),
        }
    }
}

/// A live run list bound to one view.
///
/// Fetches once on spawn, then polls only while the view holds a PENDING or
/// RUNNING run. Fetches never overlap; changing the query cancels an
/// in-flight fetch. A source that reports invalidations (see
/// [`RunSource::invalidations`]) triggers a fetch on each one, settled view
/// or not. Dropping the handle stops every timer.
pub struct LiveRefresh {
    query_tx: watch::Sender<RunsQuery>,
    snapshot_rx: watch::Receiver<RefreshSnapshot>,
    label_rx: watch::Receiver<Option<String>>,
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

impl LiveRefresh {
    pub fn spawn<S>(
        source: S,
        query: RunsQuery,
        timers: RefreshTimers,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: RunSource + 'static,
    {
        let controller = LiveRefreshController::new(query.clone());
        let (query_tx, query_rx) = watch::channel(query);
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let (label_tx, label_rx) = watch::channel(None);
        let refresh = Arc::new(Notify::new());
        let invalidations = source.invalidations();

        let worker = Worker {
            source,
            controller,
            timers,
            clock,
            query_rx,
            snapshot_tx,
            label_tx,
            refresh: refresh.clone(),
            invalidations,
        };
        let task = tokio::spawn(worker.run().instrument(info_span!("live_refresh")));

        Self {
            query_tx,
            snapshot_rx,
            label_rx,
            refresh,
            task,
        }
    }

    /// Shows another filter or page. Any fetch for the old query is dropped.
    pub fn set_query(&self, query: RunsQuery) {
        self.query_tx.send_if_modified(|current| {
            if *current == query {
                false
            } else {
                *current = query;
                true
            }
        });
    }

    /// Fetches now instead of waiting for the next poll.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub fn current(&self) -> RefreshSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshSnapshot> {
        self.snapshot_rx.clone()
    }

    /// "N seconds ago", updated by the label tick.
    pub fn refreshed_label(&self) -> watch::Receiver<Option<String>> {
        self.label_rx.clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for LiveRefresh {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Fetched {
    Done,
    /// The query changed before the response arrived.
    Superseded,
    Closed,
}

struct Worker<S> {
    source: S,
    controller: LiveRefreshController,
    timers: RefreshTimers,
    clock: Arc<dyn Clock>,
    query_rx: watch::Receiver<RunsQuery>,
    snapshot_tx: watch::Sender<RefreshSnapshot>,
    label_tx: watch::Sender<Option<String>>,
    refresh: Arc<Notify>,
    invalidations: Option<watch::Receiver<u64>>,
}

impl<S: RunSource> Worker<S> {
    async fn run(mut self) {
        loop {
            match self.fetch().await {
                Fetched::Closed => return,
                Fetched::Superseded => continue,
                Fetched::Done => {}
            }
            if !self.wait().await {
                return;
            }
        }
    }

    /// One fetch for the current query.
    async fn fetch(&mut self) -> Fetched {
        let query = self.controller.query().clone();
        tokio::select! {
            result = self.source.list_runs(&query) => {
                let now = self.clock.now();
                let outcome = match result {
                    Ok(page) => self.controller.apply_response(&query, page, now),
                    Err(e) => {
                        warn!(error = %e, "Run list refresh failed");
                        self.controller.apply_error(&query, e.to_string())
                    }
                };
                if outcome == ApplyOutcome::Applied {
                    debug!(polling = self.controller.should_poll(), "View refreshed");
                    self.publish();
                }
                Fetched::Done
            }
            changed = self.query_rx.changed() => {
                if changed.is_err() {
                    return Fetched::Closed;
                }
                debug!("Query changed during fetch; result discarded");
                self.switch_query();
                Fetched::Superseded
            }
        }
    }

    /// Waits for the next reason to fetch. Timers only run while the view
    /// holds non-terminal runs.
    async fn wait(&mut self) -> bool {
        if !self.controller.should_poll() {
            self.publish_label();
            return tokio::select! {
                changed = self.query_rx.changed() => {
                    if changed.is_ok() {
                        self.switch_query();
                    }
                    changed.is_ok()
                }
                _ = self.refresh.notified() => true,
                _ = invalidated(&mut self.invalidations) => {
                    debug!("Views invalidated; refetching");
                    true
                }
            };
        }

        let poll = sleep(self.timers.poll_interval);
        tokio::pin!(poll);
        let mut tick = interval_at(
            Instant::now() + self.timers.tick_interval,
            self.timers.tick_interval,
        );
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut poll => return true,
                _ = self.refresh.notified() => return true,
                _ = invalidated(&mut self.invalidations) => return true,
                _ = tick.tick(), if self.controller.should_tick() => self.publish_label(),
                changed = self.query_rx.changed() => {
                    if changed.is_ok() {
                        self.switch_query();
                    }
                    return changed.is_ok();
                }
            }
        }
    }

    fn switch_query(&mut self) {
        let query = self.query_rx.borrow_and_update().clone();
        if self.controller.on_view_changed(query) {
            self.publish();
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.controller.snapshot());
        self.publish_label();
    }

    fn publish_label(&self) {
        let label = self.controller.refreshed_label(self.clock.now());
        self.label_tx.send_if_modified(|current| {
            if *current == label {
                false
            } else {
                *current = label;
                true
            }
        });
    }
}

/// Resolves on the next invalidation. Never resolves without a source of
/// invalidations or once that source is gone.
async fn invalidated(invalidations: &mut Option<watch::Receiver<u64>>) {
    if let Some(rx) = invalidations.as_mut() {
        if rx.changed().await.is_ok() {
            return;
        }
        *invalidations = None;
    }
    std::future::pending::<()>().await
}
