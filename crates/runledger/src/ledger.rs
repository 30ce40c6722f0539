//! Authoritative store for documents, extraction runs and segments.
//!
//! Every status change goes through [`RunLedger`]: the segment transition is
//! checked against [`SegmentStatus::can_transition_to`], written, and the
//! enclosing run is re-derived from its segments inside the same SQLite
//! transaction. Rows are never deleted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::aggregate::DocumentRunSummary;
use crate::clock::Clock;
use crate::db::document_repo::{self, DocumentRow};
use crate::db::run_repo::{self, RunFilter, RunRow};
use crate::db::segment_repo::{self, SegmentRow};
use crate::db::{format_timestamp, metrics_repo, Database, DatabaseError};
use crate::eligibility::RetryPolicy;
use crate::error::{LedgerError, Result, ValidationError};
use crate::model::{
    Document, DocumentDetail, ExtractionRun, ExtractionSegment, MetricsSummary, NewDocument, Page,
    SegmentPlan,
};
use crate::query::{DocumentsQuery, RunsQuery};
use crate::status::{RunStatus, SegmentStatus};

/// A segment together with the ids of the run and document that own it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub segment: ExtractionSegment,
    pub extraction_run_id: i64,
    pub document_id: i64,
}

/// SQLite-backed run ledger. Cloning shares the database and clock.
#[derive(Clone)]
pub struct RunLedger {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl RunLedger {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ─── Documents ──────────────────────────────────────────────────────────

    /// Registers an uploaded document. A missing mime type is guessed from
    /// the filename.
    pub fn register_document(&self, new: NewDocument) -> Result<Document> {
        let filename = new.original_filename.trim();
        if filename.is_empty() {
            return Err(ValidationError::EmptyFilename.into());
        }

        let mime_type = new
            .mime_type
            .or_else(|| mime_guess::from_path(filename).first_raw().map(str::to_string));
        let now = format_timestamp(self.clock.now());
        let mut row = DocumentRow {
            id: 0,
            original_filename: filename.to_string(),
            upload_file_uri: new.upload_file_uri,
            mime_type,
            page_count: new.page_count,
            page_size_kb: new.page_size_kb,
            created_at: now.clone(),
            updated_at: now,
        };

        row.id = self.db.with_conn(|conn| document_repo::insert(conn, &row))?;
        log::info!("Registered document {} ({})", row.id, row.original_filename);
        Ok(row.into_model()?)
    }

    /// A document with its latest-run fields.
    pub fn get_document(&self, document_id: i64) -> Result<DocumentDetail> {
        self.db.read(|conn| load_document_detail(conn, document_id))
    }

    pub fn list_documents(&self, query: &DocumentsQuery) -> Result<Page<DocumentDetail>> {
        query.validate()?;
        let (rows, total) = self
            .db
            .with_conn(|conn| document_repo::query(conn, u64::from(query.page_size), query.offset()))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let runs = self.db.with_conn(|conn| load_runs_for_document(conn, row.id))?;
            items.push(DocumentRunSummary::from_runs(&runs).into_detail(row.into_model()?));
        }

        Ok(Page {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    // ─── Runs ───────────────────────────────────────────────────────────────

    /// Creates a PENDING run and its PENDING segments atomically.
    pub fn create_run(&self, document_id: i64, plan: &SegmentPlan) -> Result<ExtractionRun> {
        let now = self.clock.now();
        let stamp = format_timestamp(now);

        let run_id = self.db.transaction(|conn| -> Result<i64> {
            if document_repo::find_by_id(conn, document_id)?.is_none() {
                return Err(LedgerError::NotFound {
                    kind: "Document",
                    id: document_id,
                });
            }

            let run_id = run_repo::insert(
                conn,
                &RunRow {
                    id: 0,
                    document_id,
                    status: RunStatus::Pending.as_str().to_string(),
                    fatal: false,
                    created_at: stamp.clone(),
                    started_at: None,
                    finished_at: None,
                    error_message: None,
                },
            )?;

            for planned in plan.segments() {
                segment_repo::insert(
                    conn,
                    &SegmentRow {
                        id: 0,
                        extraction_run_id: run_id,
                        segment_type: planned.segment_type.as_str().to_string(),
                        page_start: planned.pages.start,
                        page_end: planned.pages.end,
                        status: SegmentStatus::Pending.as_str().to_string(),
                        created_at: stamp.clone(),
                        updated_at: stamp.clone(),
                        last_error: None,
                    },
                )?;
            }

            document_repo::touch(conn, document_id, now)?;
            Ok(run_id)
        })?;

        log::info!(
            "Created run {} for document {} with {} segments",
            run_id,
            document_id,
            plan.len()
        );
        self.get_run(run_id)
    }

    pub fn get_run(&self, run_id: i64) -> Result<ExtractionRun> {
        self.db.read(|conn| load_run(conn, run_id))
    }

    /// Runs matching `query`, newest first, each with its segments.
    pub fn list_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>> {
        query.validate()?;
        let filter = RunFilter {
            document_id: query.document_id,
            status: query.status.map(|s| s.as_str().to_string()),
            limit: Some(u64::from(query.page_size)),
            offset: Some(query.offset()),
        };

        let (items, total) = self.db.with_conn(|conn| {
            let (rows, total) = run_repo::query(conn, &filter)?;
            let mut items = Vec::with_capacity(rows.len());
            for row in rows {
                let segments = load_segments(conn, row.id)?;
                items.push(row.into_model(segments)?);
            }
            Ok((items, total))
        })?;

        Ok(Page {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    /// Fails a run before any segment executed. Its PENDING segments become
    /// SKIPPED and `message` becomes the run's error.
    pub fn fail_run(&self, run_id: i64, message: &str) -> Result<ExtractionRun> {
        let now = self.clock.now();
        let stamp = format_timestamp(now);

        self.db.transaction(|conn| -> Result<()> {
            let mut run = find_run(conn, run_id)?;
            let status = run.parsed_status()?;
            let segments = segment_repo::list_for_run(conn, run_id)?;

            for segment in &segments {
                if segment.parsed_status()? != SegmentStatus::Pending {
                    return Err(LedgerError::InvalidRunFailure {
                        run_id,
                        status,
                        reason: format!("segment {} already left PENDING", segment.id),
                    });
                }
            }

            for segment in &segments {
                segment_repo::update_status(
                    conn,
                    segment.id,
                    SegmentStatus::Skipped.as_str(),
                    &stamp,
                    segment.last_error.as_deref(),
                )?;
            }

            run.fatal = true;
            run.error_message = Some(message.to_string());
            update_run(conn, run, now)
        })?;

        log::warn!("Run {} failed before any segment executed: {}", run_id, message);
        self.get_run(run_id)
    }

    // ─── Segments ───────────────────────────────────────────────────────────

    pub fn get_segment(&self, segment_id: i64) -> Result<SegmentRecord> {
        self.db.read(|conn| load_segment_record(conn, segment_id))
    }

    /// Every segment currently FAILED across all runs of a document.
    pub fn failed_segments_for_document(&self, document_id: i64) -> Result<Vec<SegmentRecord>> {
        self.db.read(|conn| -> Result<Vec<SegmentRecord>> {
            if document_repo::find_by_id(conn, document_id)?.is_none() {
                return Err(LedgerError::NotFound {
                    kind: "Document",
                    id: document_id,
                });
            }
            let rows = segment_repo::list_for_document_with_status(
                conn,
                document_id,
                SegmentStatus::Failed.as_str(),
            )?;
            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                let extraction_run_id = row.extraction_run_id;
                records.push(SegmentRecord {
                    segment: row.into_model()?,
                    extraction_run_id,
                    document_id,
                });
            }
            Ok(records)
        })
    }

    pub fn start_segment(&self, segment_id: i64) -> Result<ExtractionRun> {
        self.transition(segment_id, SegmentStatus::Running, None)
    }

    pub fn complete_segment(&self, segment_id: i64) -> Result<ExtractionRun> {
        self.transition(segment_id, SegmentStatus::Done, None)
    }

    pub fn fail_segment(&self, segment_id: i64, reason: &str) -> Result<ExtractionRun> {
        self.transition(segment_id, SegmentStatus::Failed, Some(reason))
    }

    pub fn skip_segment(&self, segment_id: i64) -> Result<ExtractionRun> {
        self.transition(segment_id, SegmentStatus::Skipped, None)
    }

    /// Moves a FAILED segment back to RUNNING if `policy` approves it at
    /// this instant. Eligibility is evaluated inside the write transaction
    /// so a stale read can never approve a retry.
    pub(crate) fn retry_segment(
        &self,
        segment_id: i64,
        policy: &RetryPolicy,
    ) -> Result<SegmentRecord> {
        let now = self.clock.now();

        self.db.transaction(|conn| -> Result<()> {
            let row = find_segment(conn, segment_id)?;
            let segment = row.clone().into_model()?;
            let eligibility = policy.evaluate_segment(&segment, now);
            if !eligibility.can_retry {
                return Err(LedgerError::NotRetryable {
                    segment_id,
                    reason: eligibility.reason,
                });
            }
            apply_transition(conn, row, SegmentStatus::Running, None, now)
        })?;

        self.get_segment(segment_id)
    }

    fn transition(
        &self,
        segment_id: i64,
        to: SegmentStatus,
        reason: Option<&str>,
    ) -> Result<ExtractionRun> {
        let now = self.clock.now();

        let run_id = self.db.transaction(|conn| -> Result<i64> {
            let row = find_segment(conn, segment_id)?;
            let from = row.parsed_status()?;
            // FAILED -> RUNNING needs a retry approval.
            if from == SegmentStatus::Failed {
                return Err(LedgerError::InvalidSegmentTransition {
                    segment_id,
                    from,
                    to,
                });
            }
            let run_id = row.extraction_run_id;
            apply_transition(conn, row, to, reason, now)?;
            Ok(run_id)
        })?;

        self.get_run(run_id)
    }

    // ─── Metrics ────────────────────────────────────────────────────────────

    pub fn metrics(&self) -> Result<MetricsSummary> {
        Ok(self.db.with_conn(metrics_repo::summary)?)
    }
}

// ─── Transaction helpers ────────────────────────────────────────────────────

fn find_run(conn: &Connection, run_id: i64) -> Result<RunRow> {
    run_repo::find_by_id(conn, run_id)?.ok_or(LedgerError::NotFound {
        kind: "Run",
        id: run_id,
    })
}

fn find_segment(conn: &Connection, segment_id: i64) -> Result<SegmentRow> {
    segment_repo::find_by_id(conn, segment_id)?.ok_or(LedgerError::NotFound {
        kind: "Segment",
        id: segment_id,
    })
}

fn load_segments(
    conn: &Connection,
    run_id: i64,
) -> std::result::Result<Vec<ExtractionSegment>, DatabaseError> {
    segment_repo::list_for_run(conn, run_id)?
        .into_iter()
        .map(SegmentRow::into_model)
        .collect()
}

fn load_run(conn: &Connection, run_id: i64) -> Result<ExtractionRun> {
    let row = find_run(conn, run_id)?;
    let segments = load_segments(conn, run_id)?;
    Ok(row.into_model(segments)?)
}

fn load_runs_for_document(
    conn: &Connection,
    document_id: i64,
) -> std::result::Result<Vec<ExtractionRun>, DatabaseError> {
    run_repo::list_for_document(conn, document_id)?
        .into_iter()
        .map(|row| row.into_model(Vec::new()))
        .collect()
}

fn load_document_detail(conn: &Connection, document_id: i64) -> Result<DocumentDetail> {
    let row = document_repo::find_by_id(conn, document_id)?.ok_or(LedgerError::NotFound {
        kind: "Document",
        id: document_id,
    })?;
    let runs = load_runs_for_document(conn, document_id)?;
    Ok(DocumentRunSummary::from_runs(&runs).into_detail(row.into_model()?))
}

fn load_segment_record(conn: &Connection, segment_id: i64) -> Result<SegmentRecord> {
    let row = find_segment(conn, segment_id)?;
    let run = find_run(conn, row.extraction_run_id)?;
    Ok(SegmentRecord {
        extraction_run_id: row.extraction_run_id,
        document_id: run.document_id,
        segment: row.into_model()?,
    })
}

/// Writes a validated segment transition and re-derives its run.
fn apply_transition(
    conn: &Connection,
    row: SegmentRow,
    to: SegmentStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let from = row.parsed_status()?;
    if !from.can_transition_to(to) {
        return Err(LedgerError::InvalidSegmentTransition {
            segment_id: row.id,
            from,
            to,
        });
    }

    let last_error = match reason {
        Some(reason) => Some(reason),
        None => row.last_error.as_deref(),
    };
    segment_repo::update_status(conn, row.id, to.as_str(), &format_timestamp(now), last_error)?;
    log::debug!("Segment {} {} -> {}", row.id, from, to);

    let run = find_run(conn, row.extraction_run_id)?;
    update_run(conn, run, now)
}

/// Re-derives a run's status and timestamps from its segments and persists
/// the result.
fn update_run(conn: &Connection, mut run: RunRow, now: DateTime<Utc>) -> Result<()> {
    let previous = run.parsed_status()?;
    let segments = load_segments(conn, run.id)?;
    let statuses: Vec<SegmentStatus> = segments.iter().map(|s| s.status).collect();

    let executed = statuses.iter().any(|s| {
        matches!(
            s,
            SegmentStatus::Running | SegmentStatus::Done | SegmentStatus::Failed
        )
    });
    let started = run.started_at.is_some() || executed;
    let next = RunStatus::derive(&statuses, run.fatal, started);

    if (started || next == RunStatus::Running) && run.started_at.is_none() {
        run.started_at = Some(format_timestamp(now));
    }

    if next.is_terminal() {
        if run.finished_at.is_none() {
            run.finished_at = Some(format_timestamp(now));
        }
    } else {
        run.finished_at = None;
    }

    match next {
        RunStatus::Failed | RunStatus::Partial if !run.fatal => {
            if let Some(message) = latest_failure(&segments) {
                run.error_message = Some(message);
            }
        }
        RunStatus::Failed | RunStatus::Partial => {}
        RunStatus::Pending | RunStatus::Running | RunStatus::Completed => {
            run.error_message = None;
        }
    }

    run.status = next.as_str().to_string();
    run_repo::update(conn, &run)?;

    if previous != next {
        log::info!("Run {} {} -> {}", run.id, previous, next);
    }
    Ok(())
}

/// `last_error` of the most recently failed segment.
fn latest_failure(segments: &[ExtractionSegment]) -> Option<String> {
    segments
        .iter()
        .filter(|s| s.status == SegmentStatus::Failed)
        .filter(|s| s.last_error.is_some())
        .max_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)))
        .and_then(|s| s.last_error.clone())
}
