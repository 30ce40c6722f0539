//! Read-through cache of run and document views.
//!
//! Lists are keyed by their query, details by id. Entries expire after a
//! TTL and are dropped explicitly after every successful retry. Nothing in
//! here ever edits a cached segment status. Each invalidation also bumps a
//! generation that live views watch, so an open view refetches at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use tokio::sync::watch;

use crate::config::CacheConfig;
use crate::model::{DocumentDetail, ExtractionRun, Page};
use crate::query::{DocumentsQuery, RunsQuery};
use crate::refresh::{DocumentSource, RunSource};

/// Something holding views that a retry makes stale.
pub trait CacheInvalidation: Send + Sync {
    fn invalidate_run(&self, run_id: i64);
    fn invalidate_document(&self, document_id: i64);
}

pub struct ViewCache {
    run_lists: Cache<RunsQuery, Page<ExtractionRun>>,
    runs: Cache<i64, ExtractionRun>,
    documents: Cache<i64, DocumentDetail>,
    document_lists: Cache<DocumentsQuery, Page<DocumentDetail>>,
    generation: watch::Sender<u64>,
}

impl ViewCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(Duration::from_secs(config.ttl_secs), config.max_entries)
    }

    pub fn with_limits(ttl: Duration, max_entries: u64) -> Self {
        Self {
            run_lists: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            runs: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            documents: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            document_lists: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            generation: watch::channel(0).0,
        }
    }

    /// Receives the invalidation generation; it changes after every
    /// invalidation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn bump(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    pub fn run_list(&self, query: &RunsQuery) -> Option<Page<ExtractionRun>> {
        self.run_lists.get(query)
    }

    pub fn put_run_list(&self, query: RunsQuery, page: Page<ExtractionRun>) {
        self.run_lists.insert(query, page);
    }

    pub fn run(&self, run_id: i64) -> Option<ExtractionRun> {
        self.runs.get(&run_id)
    }

    pub fn put_run(&self, run: ExtractionRun) {
        self.runs.insert(run.id, run);
    }

    pub fn document(&self, document_id: i64) -> Option<DocumentDetail> {
        self.documents.get(&document_id)
    }

    pub fn put_document(&self, document: DocumentDetail) {
        self.documents.insert(document.document.id, document);
    }

    pub fn document_list(&self, query: &DocumentsQuery) -> Option<Page<DocumentDetail>> {
        self.document_lists.get(query)
    }

    pub fn put_document_list(&self, query: DocumentsQuery, page: Page<DocumentDetail>) {
        self.document_lists.insert(query, page);
    }

    /// Drops every run view, list or detail.
    pub fn invalidate_all_runs(&self) {
        self.run_lists.invalidate_all();
        self.runs.invalidate_all();
        self.bump();
    }
}

impl CacheInvalidation for ViewCache {
    fn invalidate_run(&self, run_id: i64) {
        self.runs.invalidate(&run_id);
        // Any list may contain the run.
        self.run_lists.invalidate_all();
        self.bump();
    }

    fn invalidate_document(&self, document_id: i64) {
        self.documents.invalidate(&document_id);
        self.document_lists.invalidate_all();
        self.bump();
    }
}

/// A [`RunSource`] whose fetches populate a [`ViewCache`].
///
/// Fetching through the [`RunSource`] impl always goes upstream and stores
/// the result, so polls keep the cache fresh. [`read_runs`] and
/// [`read_run`] serve cached views when present.
///
/// [`read_runs`]: CachedRunSource::read_runs
/// [`read_run`]: CachedRunSource::read_run
pub struct CachedRunSource<S> {
    inner: S,
    cache: Arc<ViewCache>,
}

impl<S: RunSource> CachedRunSource<S> {
    pub fn new(inner: S, cache: Arc<ViewCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<ViewCache> {
        &self.cache
    }

    pub async fn read_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>, S::Error> {
        if let Some(page) = self.cache.run_list(query) {
            return Ok(page);
        }
        self.list_runs(query).await
    }

    pub async fn read_run(&self, run_id: i64) -> Result<ExtractionRun, S::Error> {
        if let Some(run) = self.cache.run(run_id) {
            return Ok(run);
        }
        self.get_run(run_id).await
    }
}

#[async_trait]
impl<S: RunSource> RunSource for CachedRunSource<S> {
    type Error = S::Error;

    async fn list_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>, S::Error> {
        let page = self.inner.list_runs(query).await?;
        self.cache.put_run_list(query.clone(), page.clone());
        Ok(page)
    }

    async fn get_run(&self, run_id: i64) -> Result<ExtractionRun, S::Error> {
        let run = self.inner.get_run(run_id).await?;
        self.cache.put_run(run.clone());
        Ok(run)
    }

    fn invalidations(&self) -> Option<watch::Receiver<u64>> {
        Some(self.cache.subscribe())
    }
}

/// Document listings and details read through a [`ViewCache`].
pub struct CachedDocumentSource<S> {
    inner: S,
    cache: Arc<ViewCache>,
}

impl<S: DocumentSource> CachedDocumentSource<S> {
    pub fn new(inner: S, cache: Arc<ViewCache>) -> Self {
        Self { inner, cache }
    }

    pub async fn read_documents(
        &self,
        query: &DocumentsQuery,
    ) -> Result<Page<DocumentDetail>, S::Error> {
        if let Some(page) = self.cache.document_list(query) {
            return Ok(page);
        }
        self.list_documents(query).await
    }

    pub async fn read_document(&self, document_id: i64) -> Result<DocumentDetail, S::Error> {
        if let Some(document) = self.cache.document(document_id) {
            return Ok(document);
        }
        self.get_document(document_id).await
    }
}

#[async_trait]
impl<S: DocumentSource> DocumentSource for CachedDocumentSource<S> {
    type Error = S::Error;

    async fn list_documents(
        &self,
        query: &DocumentsQuery,
    ) -> Result<Page<DocumentDetail>, S::Error> {
        let page = self.inner.list_documents(query).await?;
        self.cache.put_document_list(query.clone(), page.clone());
        Ok(page)
    }

    async fn get_document(&self, document_id: i64) -> Result<DocumentDetail, S::Error> {
        let document = self.inner.get_document(document_id).await?;
        self.cache.put_document(document.clone());
        Ok(document)
    }
}
