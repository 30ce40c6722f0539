//! Aggregate counts over documents, runs and segments.

use rusqlite::Connection;

use super::{parse_timestamp, DatabaseError};
use crate::model::MetricsSummary;

/// Computes the display metrics summary.
///
/// Extraction time only counts runs that have both `started_at` and
/// `finished_at`.
pub fn summary(conn: &Connection) -> Result<MetricsSummary, DatabaseError> {
    let total_documents: u64 =
        conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;

    let (total_extraction_runs, completed_runs, partial_runs, failed_runs): (u64, u64, u64, u64) =
        conn.query_row(
            "SELECT COUNT(*),
             COALESCE(SUM(CASE WHEN status = 'COMPLETED' THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN status = 'PARTIAL' THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN status = 'FAILED' THEN 1 ELSE 0 END), 0)
             FROM extraction_runs",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )?;

    let (total_segments, failed_segments): (u64, u64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'FAILED' THEN 1 ELSE 0 END), 0)
         FROM extraction_segments",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    // Timestamps are RFC 3339 text, so durations are computed here rather
    // than in SQL.
    let mut stmt = conn.prepare(
        "SELECT id, started_at, finished_at FROM extraction_runs
         WHERE started_at IS NOT NULL AND finished_at IS NOT NULL",
    )?;
    let spans = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut total_seconds = 0.0;
    for (id, started, finished) in &spans {
        let started = parse_timestamp("extraction_runs", *id, started)?;
        let finished = parse_timestamp("extraction_runs", *id, finished)?;
        total_seconds += (finished - started).num_milliseconds().max(0) as f64 / 1000.0;
    }

    let (avg_extraction_time_seconds, total_extraction_time_seconds) = if spans.is_empty() {
        (None, None)
    } else {
        (
            Some(total_seconds / spans.len() as f64),
            Some(total_seconds),
        )
    };

    Ok(MetricsSummary {
        total_documents,
        total_extraction_runs,
        completed_runs,
        partial_runs,
        failed_runs,
        total_segments,
        failed_segments,
        avg_extraction_time_seconds,
        total_extraction_time_seconds,
    })
}
