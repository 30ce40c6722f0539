//! Operations on the `documents` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, DatabaseError};
use crate::model::Document;

/// A raw document row from the database.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub original_filename: String,
    pub upload_file_uri: Option<String>,
    pub mime_type: Option<String>,
    pub page_count: Option<u32>,
    pub page_size_kb: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_filename: row.get("original_filename")?,
            upload_file_uri: row.get("upload_file_uri")?,
            mime_type: row.get("mime_type")?,
            page_count: row.get("page_count")?,
            page_size_kb: row.get("page_size_kb")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn into_model(self) -> Result<Document, DatabaseError> {
        Ok(Document {
            id: self.id,
            created_at: parse_timestamp("documents", self.id, &self.created_at)?,
            updated_at: parse_timestamp("documents", self.id, &self.updated_at)?,
            original_filename: self.original_filename,
            upload_file_uri: self.upload_file_uri,
            mime_type: self.mime_type,
            page_count: self.page_count,
            page_size_kb: self.page_size_kb,
        })
    }
}

/// Inserts a new document and returns its id. `row.id` is ignored.
pub fn insert(conn: &Connection, row: &DocumentRow) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO documents (original_filename, upload_file_uri, mime_type, page_count,
         page_size_kb, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.original_filename,
            row.upload_file_uri,
            row.mime_type,
            row.page_count,
            row.page_size_kb,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Finds a document by its ID.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<DocumentRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM documents WHERE id = ?1",
            params![id],
            DocumentRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Lists documents newest first, returning (rows, total_count).
pub fn query(
    conn: &Connection,
    limit: u64,
    offset: u64,
) -> Result<(Vec<DocumentRow>, u64), DatabaseError> {
    let total: u64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT * FROM documents ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt
        .query_map(params![limit as i64, offset as i64], DocumentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

/// Bumps `updated_at`.
pub fn touch(
    conn: &Connection,
    id: i64,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET updated_at = ?2 WHERE id = ?1",
        params![id, format_timestamp(at)],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn sample(name: &str, created_at: &str) -> DocumentRow {
        DocumentRow {
            id: 0,
            original_filename: name.to_string(),
            upload_file_uri: Some(format!("file:///uploads/{}", name)),
            mime_type: Some("application/pdf".to_string()),
            page_count: Some(12),
            page_size_kb: Some(340),
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = insert(conn, &sample("roll-1.pdf", "2026-01-01T00:00:00.000000Z"))?;
            let found = find_by_id(conn, id)?.expect("document exists");
            assert_eq!(found.original_filename, "roll-1.pdf");
            assert_eq!(found.page_count, Some(12));

            let model = found.into_model()?;
            assert_eq!(model.id, id);
            assert_eq!(model.mime_type.as_deref(), Some("application/pdf"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_find_nonexistent() {
        let db = Database::open_in_memory().unwrap();
        let found = db.with_conn(|conn| find_by_id(conn, 404)).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_query_newest_first_with_pagination() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            for day in 1..=5 {
                insert(
                    conn,
                    &sample(
                        &format!("d{}.pdf", day),
                        &format!("2026-01-{:02}T00:00:00.000000Z", day),
                    ),
                )?;
            }

            let (rows, total) = query(conn, 2, 0)?;
            assert_eq!(total, 5);
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].original_filename, "d5.pdf");

            let (rows, _) = query(conn, 2, 4)?;
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].original_filename, "d1.pdf");
            Ok(())
        })
        .unwrap();
    }
}
