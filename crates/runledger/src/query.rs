//! List query parameters shared by the ledger, the HTTP client and the
//! view cache. A query is also the identity of a view: cached lists and
//! in-flight polls are keyed by it.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::status::RunStatus;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter and page for run listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunsQuery {
    pub document_id: Option<i64>,
    pub status: Option<RunStatus>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for RunsQuery {
    fn default() -> Self {
        Self {
            document_id: None,
            status: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RunsQuery {
    /// Builds a query from raw filter input. Empty strings mean "unset".
    pub fn from_raw(
        document_id: &str,
        status: &str,
        page: &str,
        page_size: &str,
    ) -> Result<Self, ValidationError> {
        let document_id = match document_id.trim() {
            "" => None,
            raw => Some(parse_document_id(raw)?),
        };
        let status = match status.trim() {
            "" => None,
            raw => Some(
                raw.to_ascii_uppercase()
                    .parse::<RunStatus>()
                    .map_err(|_| ValidationError::InvalidStatus(raw.to_string()))?,
            ),
        };
        let (page, page_size) = parse_paging(page, page_size)?;

        Ok(Self {
            document_id,
            status,
            page,
            page_size,
        })
    }

    pub fn for_document(document_id: i64) -> Self {
        Self {
            document_id: Some(document_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(id) = self.document_id {
            if id <= 0 {
                return Err(ValidationError::InvalidDocumentId(id.to_string()));
            }
        }
        validate_paging(self.page, self.page_size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Query-string pairs; unset filters are omitted.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(id) = self.document_id {
            pairs.push(("document_id", id.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("page_size", self.page_size.to_string()));
        pairs
    }
}

/// Page for document listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentsQuery {
    pub page: u32,
    pub page_size: u32,
}

impl Default for DocumentsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl DocumentsQuery {
    pub fn from_raw(page: &str, page_size: &str) -> Result<Self, ValidationError> {
        let (page, page_size) = parse_paging(page, page_size)?;
        Ok(Self { page, page_size })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_paging(self.page, self.page_size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ]
    }
}

/// Parses a document id typed into a filter.
pub fn parse_document_id(raw: &str) -> Result<i64, ValidationError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::InvalidDocumentId(raw.to_string())),
    }
}

fn parse_paging(page: &str, page_size: &str) -> Result<(u32, u32), ValidationError> {
    let page = match page.trim() {
        "" => 1,
        raw => raw
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidPage(raw.to_string()))?,
    };
    let page_size = match page_size.trim() {
        "" => DEFAULT_PAGE_SIZE,
        raw => raw
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidPageSize {
                value: raw.to_string(),
                max: MAX_PAGE_SIZE,
            })?,
    };
    validate_paging(page, page_size)?;
    Ok((page, page_size))
}

fn validate_paging(page: u32, page_size: u32) -> Result<(), ValidationError> {
    if page == 0 {
        return Err(ValidationError::InvalidPage(page.to_string()));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::InvalidPageSize {
            value: page_size.to_string(),
            max: MAX_PAGE_SIZE,
        });
    }
    Ok(())
}
