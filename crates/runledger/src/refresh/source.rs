use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::api::{ApiError, ExtractionApiClient};
use crate::error::LedgerError;
use crate::ledger::RunLedger;
use crate::model::{DocumentDetail, ExtractionRun, Page};
use crate::query::{DocumentsQuery, RunsQuery};

/// Where a live view reads runs from.
#[async_trait]
pub trait RunSource: Send + Sync {
    type Error: std::fmt::Display + Send + Sync + 'static;

    async fn list_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>, Self::Error>;

    async fn get_run(&self, run_id: i64) -> Result<ExtractionRun, Self::Error>;

    /// Changes whenever views read from this source went stale, e.g. after a
    /// retry. Live views refetch on every change.
    fn invalidations(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

/// Where document listings and details are read from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    type Error: std::fmt::Display + Send + Sync + 'static;

    async fn list_documents(
        &self,
        query: &DocumentsQuery,
    ) -> Result<Page<DocumentDetail>, Self::Error>;

    async fn get_document(&self, document_id: i64) -> Result<DocumentDetail, Self::Error>;
}

#[async_trait]
impl RunSource for ExtractionApiClient {
    type Error = ApiError;

    async fn list_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>, ApiError> {
        ExtractionApiClient::list_runs(self, query).await
    }

    async fn get_run(&self, run_id: i64) -> Result<ExtractionRun, ApiError> {
        ExtractionApiClient::get_run(self, run_id).await
    }
}

#[async_trait]
impl DocumentSource for ExtractionApiClient {
    type Error = ApiError;

    async fn list_documents(
        &self,
        query: &DocumentsQuery,
    ) -> Result<Page<DocumentDetail>, ApiError> {
        ExtractionApiClient::list_documents(self, query).await
    }

    async fn get_document(&self, document_id: i64) -> Result<DocumentDetail, ApiError> {
        ExtractionApiClient::get_document(self, document_id).await
    }
}

#[async_trait]
impl RunSource for RunLedger {
    type Error = LedgerError;

    async fn list_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>, LedgerError> {
        RunLedger::list_runs(self, query)
    }

    async fn get_run(&self, run_id: i64) -> Result<ExtractionRun, LedgerError> {
        RunLedger::get_run(self, run_id)
    }
}

#[async_trait]
impl DocumentSource for RunLedger {
    type Error = LedgerError;

    async fn list_documents(
        &self,
        query: &DocumentsQuery,
    ) -> Result<Page<DocumentDetail>, LedgerError> {
        RunLedger::list_documents(self, query)
    }

    async fn get_document(&self, document_id: i64) -> Result<DocumentDetail, LedgerError> {
        RunLedger::get_document(self, document_id)
    }
}

#[async_trait]
impl<S: RunSource + ?Sized> RunSource for Arc<S> {
    type Error = S::Error;

    async fn list_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>, S::Error> {
        (**self).list_runs(query).await
    }

    async fn get_run(&self, run_id: i64) -> Result<ExtractionRun, S::Error> {
        (**self).get_run(run_id).await
    }

    fn invalidations(&self) -> Option<watch::Receiver<u64>> {
        (**self).invalidations()
    }
}
