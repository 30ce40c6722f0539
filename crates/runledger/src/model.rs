//! Documents, extraction runs and their segments.
//!
//! Field names follow the extraction backend's JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::status::{RunStatus, SegmentStatus, SegmentType};

/// An uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub original_filename: String,
    #[serde(default)]
    pub upload_file_uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub page_size_kb: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A document together with fields derived from its latest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub latest_run_status: Option<RunStatus>,
    pub latest_run_error_message: Option<String>,
}

/// Input for registering a document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub original_filename: String,
    pub upload_file_uri: Option<String>,
    pub mime_type: Option<String>,
    pub page_count: Option<u32>,
    pub page_size_kb: Option<u32>,
}

/// One extraction attempt over a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub id: i64,
    pub document_id: i64,
    pub status: RunStatus,
    /// Not every backend reports it; ids are used as a tiebreak.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub segments: Vec<ExtractionSegment>,
}

impl ExtractionRun {
    pub fn segment_statuses(&self) -> Vec<SegmentStatus> {
        self.segments.iter().map(|s| s.status).collect()
    }
}

/// A page-range scoped unit of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSegment {
    pub id: i64,
    pub segment_type: SegmentType,
    pub page_start: u32,
    pub page_end: u32,
    pub status: SegmentStatus,
    pub created_at: DateTime<Utc>,
    /// Time of the last status transition; anchors the retry window.
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ExtractionSegment {
    pub fn pages(&self) -> PageRange {
        PageRange {
            start: self.page_start,
            end: self.page_end,
        }
    }
}

/// 1-indexed inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Result<Self, ValidationError> {
        if start == 0 || start > end {
            return Err(ValidationError::InvalidPageRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// A segment to be created with a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSegment {
    pub segment_type: SegmentType,
    pub pages: PageRange,
}

/// Validated segment layout for a run: one HEADER followed by contiguous
/// LIST_CHUNKs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    segments: Vec<PlannedSegment>,
}

impl SegmentPlan {
    pub fn new(segments: Vec<PlannedSegment>) -> Result<Self, ValidationError> {
        let (header, chunks) = match segments.split_first() {
            Some((first, rest)) if first.segment_type == SegmentType::Header => (first, rest),
            Some(_) => {
                return Err(ValidationError::SegmentLayout(
                    "first segment must be the header".to_string(),
                ))
            }
            None => {
                return Err(ValidationError::SegmentLayout(
                    "a run needs at least one segment".to_string(),
                ))
            }
        };

        if chunks.is_empty() {
            return Err(ValidationError::SegmentLayout(
                "a run needs at least one list chunk".to_string(),
            ));
        }

        let mut previous_end = header.pages.end;
        for chunk in chunks {
            if chunk.segment_type != SegmentType::ListChunk {
                return Err(ValidationError::SegmentLayout(
                    "header must appear exactly once".to_string(),
                ));
            }
            if previous_end.checked_add(1) != Some(chunk.pages.start) {
                return Err(ValidationError::SegmentLayout(format!(
                    "list chunk {}-{} does not directly follow page {}",
                    chunk.pages.start, chunk.pages.end, previous_end
                )));
            }
            previous_end = chunk.pages.end;
        }

        Ok(Self { segments })
    }

    /// Header over the first `header_pages` pages, then chunks of at most
    /// `chunk_pages` pages up to `page_count`.
    pub fn for_pages(
        page_count: u32,
        header_pages: u32,
        chunk_pages: u32,
    ) -> Result<Self, ValidationError> {
        if header_pages == 0 || chunk_pages == 0 || page_count <= header_pages {
            return Err(ValidationError::SegmentLayout(format!(
                "cannot split {} pages into a {}-page header and {}-page chunks",
                page_count, header_pages, chunk_pages
            )));
        }

        let mut segments = vec![PlannedSegment {
            segment_type: SegmentType::Header,
            pages: PageRange::new(1, header_pages)?,
        }];

        // page_count > header_pages, so neither addition below can wrap.
        let mut start = header_pages + 1;
        loop {
            let end = start.saturating_add(chunk_pages - 1).min(page_count);
            segments.push(PlannedSegment {
                segment_type: SegmentType::ListChunk,
                pages: PageRange::new(start, end)?,
            });
            if end == page_count {
                break;
            }
            start = end + 1;
        }

        Self::new(segments)
    }

    pub fn segments(&self) -> &[PlannedSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Aggregate counts for display. Never consulted by retry logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_documents: u64,
    pub total_extraction_runs: u64,
    pub completed_runs: u64,
    pub partial_runs: u64,
    pub failed_runs: u64,
    pub total_segments: u64,
    pub failed_segments: u64,
    pub avg_extraction_time_seconds: Option<f64>,
    pub total_extraction_time_seconds: Option<f64>,
}
