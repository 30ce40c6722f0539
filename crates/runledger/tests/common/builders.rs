//! Builders for wire-level fixtures served by fake backends.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use runledger::{ExtractionRun, ExtractionSegment, Page, RunStatus, SegmentStatus, SegmentType};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

/// Builder for `ExtractionRun` fixtures.
pub struct RunBuilder {
    run: ExtractionRun,
}

impl RunBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            run: ExtractionRun {
                id,
                document_id: 1,
                status: RunStatus::Pending,
                created_at: Some(epoch() + Duration::minutes(id)),
                started_at: None,
                finished_at: None,
                error_message: None,
                segments: vec![],
            },
        }
    }

    pub fn document(mut self, document_id: i64) -> Self {
        self.run.document_id = document_id;
        self
    }

    pub fn status(mut self, status: RunStatus) -> Self {
        self.run.status = status;
        self
    }

    pub fn started(mut self, after: Duration) -> Self {
        self.run.started_at = Some(epoch() + after);
        self
    }

    pub fn finished(mut self, after: Duration) -> Self {
        self.run.finished_at = Some(epoch() + after);
        self
    }

    pub fn error(mut self, message: &str) -> Self {
        self.run.error_message = Some(message.to_string());
        self
    }

    /// Appends a segment covering the next page.
    pub fn segment(mut self, status: SegmentStatus) -> Self {
        let index = self.run.segments.len() as u32;
        let page = index + 1;
        self.run.segments.push(ExtractionSegment {
            id: self.run.id * 100 + i64::from(page),
            segment_type: if index == 0 {
                SegmentType::Header
            } else {
                SegmentType::ListChunk
            },
            page_start: page,
            page_end: page,
            status,
            created_at: epoch(),
            updated_at: epoch(),
            last_error: None,
        });
        self
    }

    pub fn build(self) -> ExtractionRun {
        self.run
    }
}

pub fn page_of(runs: Vec<ExtractionRun>) -> Page<ExtractionRun> {
    Page {
        total: runs.len() as u64,
        items: runs,
        page: 1,
        page_size: 20,
    }
}
