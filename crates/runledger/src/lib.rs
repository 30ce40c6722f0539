pub mod aggregate;
pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod eligibility;
pub mod error;
pub mod ledger;
pub mod model;
pub mod query;
pub mod refresh;
pub mod retry;
pub mod status;
pub mod telemetry;

pub use aggregate::{duration_label, DocumentRunSummary, RunSummary, SegmentCounts};
pub use api::{ApiError, ExtractionApiClient};
pub use cache::{CacheInvalidation, CachedDocumentSource, CachedRunSource, ViewCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, LedgerConfig};
pub use db::{Database, DatabaseError};
pub use eligibility::{RetryEligibility, RetryPolicy, RetryView};
pub use error::{ConfigError, LedgerError, Result, ValidationError};
pub use ledger::{RunLedger, SegmentRecord};
pub use model::{
    Document, DocumentDetail, ExtractionRun, ExtractionSegment, MetricsSummary, NewDocument,
    Page, PageRange, SegmentPlan,
};
pub use query::{DocumentsQuery, RunsQuery};
pub use refresh::{DocumentSource, LiveRefresh, LiveRefreshController, RefreshSnapshot, RunSource};
pub use retry::{
    BulkRetryResponse, RetryActions, RetryBackend, RetryOrchestrator, SegmentRetryResponse,
    SegmentRetryStatus,
};
pub use status::{RunStatus, SegmentStatus, SegmentType};
pub use telemetry::init_logging;
