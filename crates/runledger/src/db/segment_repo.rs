//! Operations on the `extraction_segments` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_timestamp, DatabaseError};
use crate::model::ExtractionSegment;
use crate::status::{SegmentStatus, SegmentType};

/// A raw segment row from the database.
#[derive(Debug, Clone)]
pub struct SegmentRow {
    pub id: i64,
    pub extraction_run_id: i64,
    pub segment_type: String,
    pub page_start: u32,
    pub page_end: u32,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_error: Option<String>,
}

impl SegmentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            extraction_run_id: row.get("extraction_run_id")?,
            segment_type: row.get("segment_type")?,
            page_start: row.get("page_start")?,
            page_end: row.get("page_end")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            last_error: row.get("last_error")?,
        })
    }

    fn corrupt(&self, reason: String) -> DatabaseError {
        log::warn!("extraction_segments row {}: {}", self.id, reason);
        DatabaseError::CorruptRow {
            table: "extraction_segments",
            id: self.id,
            reason,
        }
    }

    pub fn parsed_status(&self) -> Result<SegmentStatus, DatabaseError> {
        self.status
            .parse()
            .map_err(|e| self.corrupt(format!("{}", e)))
    }

    pub fn into_model(self) -> Result<ExtractionSegment, DatabaseError> {
        let status = self.parsed_status()?;
        let segment_type: SegmentType = self
            .segment_type
            .parse()
            .map_err(|e| self.corrupt(format!("{}", e)))?;

        Ok(ExtractionSegment {
            id: self.id,
            segment_type,
            page_start: self.page_start,
            page_end: self.page_end,
            status,
            created_at: parse_timestamp("extraction_segments", self.id, &self.created_at)?,
            updated_at: parse_timestamp("extraction_segments", self.id, &self.updated_at)?,
            last_error: self.last_error,
        })
    }
}

/// Inserts a new segment and returns its id. `row.id` is ignored.
pub fn insert(conn: &Connection, row: &SegmentRow) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO extraction_segments (extraction_run_id, segment_type, page_start, page_end,
         status, created_at, updated_at, last_error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.extraction_run_id,
            row.segment_type,
            row.page_start,
            row.page_end,
            row.status,
            row.created_at,
            row.updated_at,
            row.last_error,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Finds a segment by its ID.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<SegmentRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM extraction_segments WHERE id = ?1",
            params![id],
            SegmentRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Segments of a run in page order.
pub fn list_for_run(conn: &Connection, run_id: i64) -> Result<Vec<SegmentRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM extraction_segments WHERE extraction_run_id = ?1
         ORDER BY page_start ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![run_id], SegmentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Segments currently in `status` across every run of a document.
pub fn list_for_document_with_status(
    conn: &Connection,
    document_id: i64,
    status: &str,
) -> Result<Vec<SegmentRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT s.* FROM extraction_segments s
         JOIN extraction_runs r ON r.id = s.extraction_run_id
         WHERE r.document_id = ?1 AND s.status = ?2
         ORDER BY s.extraction_run_id ASC, s.page_start ASC, s.id ASC",
    )?;
    let rows = stmt
        .query_map(params![document_id, status], SegmentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Updates the status, `updated_at` and `last_error` of a segment.
pub fn update_status(
    conn: &Connection,
    id: i64,
    status: &str,
    updated_at: &str,
    last_error: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE extraction_segments SET status = ?2, updated_at = ?3, last_error = ?4 WHERE id = ?1",
        params![id, status, updated_at, last_error],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{document_repo, run_repo, Database};

    const TS: &str = "2026-01-01T00:00:00.000000Z";

    fn seed_run(conn: &Connection) -> (i64, i64) {
        let doc = document_repo::insert(
            conn,
            &document_repo::DocumentRow {
                id: 0,
                original_filename: "roll.pdf".to_string(),
                upload_file_uri: None,
                mime_type: None,
                page_count: Some(6),
                page_size_kb: None,
                created_at: TS.to_string(),
                updated_at: TS.to_string(),
            },
        )
        .unwrap();
        let run = run_repo::insert(
            conn,
            &run_repo::RunRow {
                id: 0,
                document_id: doc,
                status: "PENDING".to_string(),
                fatal: false,
                created_at: TS.to_string(),
                started_at: None,
                finished_at: None,
                error_message: None,
            },
        )
        .unwrap();
        (doc, run)
    }

    fn sample(run_id: i64, segment_type: &str, start: u32, end: u32, status: &str) -> SegmentRow {
        SegmentRow {
            id: 0,
            extraction_run_id: run_id,
            segment_type: segment_type.to_string(),
            page_start: start,
            page_end: end,
            status: status.to_string(),
            created_at: TS.to_string(),
            updated_at: TS.to_string(),
            last_error: None,
        }
    }

    #[test]
    fn test_insert_list_and_convert() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (_, run) = seed_run(conn);
            insert(conn, &sample(run, "LIST_CHUNK", 3, 6, "PENDING"))?;
            insert(conn, &sample(run, "HEADER", 1, 2, "PENDING"))?;

            let rows = list_for_run(conn, run)?;
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].segment_type, "HEADER");

            let header = rows[0].clone().into_model()?;
            assert_eq!(header.segment_type, SegmentType::Header);
            assert_eq!(header.status, SegmentStatus::Pending);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_update_status_sets_error() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (_, run) = seed_run(conn);
            let id = insert(conn, &sample(run, "HEADER", 1, 1, "RUNNING"))?;
            update_status(conn, id, "FAILED", "2026-01-01T01:00:00.000000Z", Some("timeout"))?;

            let row = find_by_id(conn, id)?.unwrap();
            assert_eq!(row.parsed_status()?, SegmentStatus::Failed);
            assert_eq!(row.last_error.as_deref(), Some("timeout"));
            assert_eq!(row.updated_at, "2026-01-01T01:00:00.000000Z");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_list_for_document_with_status() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (doc, run) = seed_run(conn);
            insert(conn, &sample(run, "HEADER", 1, 1, "DONE"))?;
            insert(conn, &sample(run, "LIST_CHUNK", 2, 3, "FAILED"))?;
            insert(conn, &sample(run, "LIST_CHUNK", 4, 6, "FAILED"))?;

            let failed = list_for_document_with_status(conn, doc, "FAILED")?;
            assert_eq!(failed.len(), 2);
            assert!(failed.iter().all(|s| s.status == "FAILED"));
            assert!(list_for_document_with_status(conn, doc + 1, "FAILED")?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_unknown_segment_type_is_corrupt() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (_, run) = seed_run(conn);
            let id = insert(conn, &sample(run, "FOOTER", 1, 1, "PENDING"))?;
            let row = find_by_id(conn, id)?.unwrap();
            assert!(matches!(
                row.into_model(),
                Err(DatabaseError::CorruptRow { .. })
            ));
            Ok(())
        })
        .unwrap();
    }
}
