//! Ledger harness and in-process HTTP backend.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use runledger::{
    Database, Document, ExtractionRun, ManualClock, NewDocument, RetryOrchestrator, RetryPolicy,
    RunLedger, SegmentPlan,
};

/// Start time of every harness clock.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub struct LedgerHarness {
    pub ledger: RunLedger,
    pub clock: ManualClock,
    temp_dir: Option<TempDir>,
}

impl LedgerHarness {
    /// In-memory database, clock at [`t0`].
    pub fn new() -> Self {
        let clock = ManualClock::new(t0());
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        Self {
            ledger: RunLedger::new(db, Arc::new(clock.clone())),
            clock,
            temp_dir: None,
        }
    }

    /// File-backed database inside a temp directory.
    pub fn file_backed() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = ManualClock::new(t0());
        let db = Database::open(&temp_dir.path().join("data").join("runledger.db"))
            .expect("Failed to open database");
        Self {
            ledger: RunLedger::new(db, Arc::new(clock.clone())),
            clock,
            temp_dir: Some(temp_dir),
        }
    }

    /// Reopens the file-backed database, as a restarted process would.
    pub fn reopen(&self) -> RunLedger {
        let dir = self
            .temp_dir
            .as_ref()
            .expect("reopen needs a file-backed harness");
        let db = Database::open(&dir.path().join("data").join("runledger.db"))
            .expect("Failed to reopen database");
        RunLedger::new(db, Arc::new(self.clock.clone()))
    }

    pub fn orchestrator(&self) -> RetryOrchestrator {
        RetryOrchestrator::new(self.ledger.clone(), RetryPolicy::default())
    }

    pub fn document(&self, filename: &str) -> Document {
        self.ledger
            .register_document(NewDocument {
                original_filename: filename.to_string(),
                ..Default::default()
            })
            .expect("Failed to register document")
    }

    /// A run with one single-page header and `chunks` single-page chunks.
    pub fn run(&self, document_id: i64, chunks: u32) -> ExtractionRun {
        let plan = SegmentPlan::for_pages(1 + chunks, 1, 1).expect("Invalid plan");
        self.ledger
            .create_run(document_id, &plan)
            .expect("Failed to create run")
    }

    pub fn at(&self, offset: Duration) {
        self.clock.set(t0() + offset);
    }

    /// Runs a segment and fails it at `t0 + offset`.
    pub fn fail_at(&self, segment_id: i64, offset: Duration, reason: &str) -> ExtractionRun {
        self.at(offset);
        self.ledger
            .start_segment(segment_id)
            .expect("Failed to start segment");
        self.ledger
            .fail_segment(segment_id, reason)
            .expect("Failed to fail segment")
    }

    pub fn complete(&self, segment_id: i64) -> ExtractionRun {
        self.ledger
            .start_segment(segment_id)
            .expect("Failed to start segment");
        self.ledger
            .complete_segment(segment_id)
            .expect("Failed to complete segment")
    }
}

/// Serves `router` under `/api/v1` on an ephemeral local port and returns
/// the base URL.
pub async fn spawn_backend(router: axum::Router) -> String {
    let router = axum::Router::new().nest("/api/v1", router);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}/api/v1", addr)
}
