//! Operations on the `extraction_runs` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_optional_timestamp, parse_timestamp, DatabaseError};
use crate::model::{ExtractionRun, ExtractionSegment};
use crate::status::RunStatus;

/// A raw run row from the database.
#[derive(Debug, Clone)]
pub struct RunRow {
    pub id: i64,
    pub document_id: i64,
    pub status: String,
    /// Set when the run failed before any segment executed.
    pub fatal: bool,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub error_message: Option<String>,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            status: row.get("status")?,
            fatal: row.get("fatal")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            error_message: row.get("error_message")?,
        })
    }

    pub fn parsed_status(&self) -> Result<RunStatus, DatabaseError> {
        self.status.parse().map_err(|e| {
            log::warn!("extraction_runs row {}: {}", self.id, e);
            DatabaseError::CorruptRow {
                table: "extraction_runs",
                id: self.id,
                reason: format!("{}", e),
            }
        })
    }

    pub fn into_model(self, segments: Vec<ExtractionSegment>) -> Result<ExtractionRun, DatabaseError> {
        Ok(ExtractionRun {
            id: self.id,
            document_id: self.document_id,
            status: self.parsed_status()?,
            created_at: Some(parse_timestamp(
                "extraction_runs",
                self.id,
                &self.created_at,
            )?),
            started_at: parse_optional_timestamp(
                "extraction_runs",
                self.id,
                self.started_at.as_deref(),
            )?,
            finished_at: parse_optional_timestamp(
                "extraction_runs",
                self.id,
                self.finished_at.as_deref(),
            )?,
            error_message: self.error_message,
            segments,
        })
    }
}

/// Query filter parameters for run listing.
#[derive(Debug, Default, Clone)]
pub struct RunFilter {
    pub document_id: Option<i64>,
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new run and returns its id. `row.id` is ignored.
pub fn insert(conn: &Connection, row: &RunRow) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO extraction_runs (document_id, status, fatal, created_at, started_at,
         finished_at, error_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.document_id,
            row.status,
            row.fatal,
            row.created_at,
            row.started_at,
            row.finished_at,
            row.error_message,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites every mutable column of an existing run.
pub fn update(conn: &Connection, row: &RunRow) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE extraction_runs SET status = ?2, fatal = ?3, started_at = ?4,
         finished_at = ?5, error_message = ?6
         WHERE id = ?1",
        params![
            row.id,
            row.status,
            row.fatal,
            row.started_at,
            row.finished_at,
            row.error_message,
        ],
    )?;
    Ok(())
}

/// Finds a run by its ID.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<RunRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM extraction_runs WHERE id = ?1",
            params![id],
            RunRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// All runs of a document, oldest first.
pub fn list_for_document(conn: &Connection, document_id: i64) -> Result<Vec<RunRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM extraction_runs WHERE document_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![document_id], RunRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Queries runs with filters, newest first, returning (rows, total_count).
pub fn query(conn: &Connection, filter: &RunFilter) -> Result<(Vec<RunRow>, u64), DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(document_id) = filter.document_id {
        conditions.push(format!("document_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(document_id));
    }
    if let Some(ref status) = filter.status {
        conditions.push(format!("status = ?{}", param_values.len() + 1));
        param_values.push(Box::new(status.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM extraction_runs {}", where_clause);
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

    let limit = filter.limit.unwrap_or(100) as i64;
    let offset = filter.offset.unwrap_or(0) as i64;
    param_values.push(Box::new(limit));
    param_values.push(Box::new(offset));
    let query_sql = format!(
        "SELECT * FROM extraction_runs {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
        where_clause,
        param_values.len() - 1,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query_sql)?;
    let rows: Vec<RunRow> = stmt
        .query_map(params_ref.as_slice(), RunRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total))
}
