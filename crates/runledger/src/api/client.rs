//! HTTP client for the extraction backend.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::error::{error_message, ApiError};
use crate::config::ApiConfig;
use crate::model::{DocumentDetail, ExtractionRun, MetricsSummary, Page};
use crate::query::{DocumentsQuery, RunsQuery};
use crate::retry::{BulkRetryResponse, RetryBackend, SegmentRetryResponse, SegmentRetryStatus};

/// Typed access to the extraction backend's REST endpoints.
#[derive(Debug, Clone)]
pub struct ExtractionApiClient {
    http: Client,
    base_url: String,
}

impl ExtractionApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ─── Runs ───────────────────────────────────────────────────────────────

    pub async fn list_runs(&self, query: &RunsQuery) -> Result<Page<ExtractionRun>, ApiError> {
        query.validate()?;
        let request = self
            .http
            .get(self.url("/extraction-runs"))
            .query(&query.to_query_pairs());
        self.send(request).await
    }

    pub async fn get_run(&self, run_id: i64) -> Result<ExtractionRun, ApiError> {
        self.send(self.http.get(self.url(&format!("/extraction-runs/{}", run_id))))
            .await
    }

    // ─── Retry ──────────────────────────────────────────────────────────────

    /// Asks the backend to retry one segment. A 4xx answer means the
    /// backend judged it not retryable.
    pub async fn retry_segment(&self, segment_id: i64) -> Result<SegmentRetryResponse, ApiError> {
        let request = self
            .http
            .post(self.url(&format!("/segments/{}/retry", segment_id)));
        match self.send(request).await {
            Err(ApiError::Status { status, message }) if (400..500).contains(&status) => {
                Err(ApiError::NotRetryable { status, message })
            }
            other => other,
        }
    }

    pub async fn segment_retry_status(
        &self,
        segment_id: i64,
    ) -> Result<SegmentRetryStatus, ApiError> {
        self.send(
            self.http
                .get(self.url(&format!("/segments/{}/retry-status", segment_id))),
        )
        .await
    }

    pub async fn retry_failed_segments_for_document(
        &self,
        document_id: i64,
    ) -> Result<BulkRetryResponse, ApiError> {
        self.send(self.http.post(
            self.url(&format!("/documents/{}/retry-failed-segments", document_id)),
        ))
        .await
    }

    // ─── Documents & metrics ────────────────────────────────────────────────

    pub async fn list_documents(
        &self,
        query: &DocumentsQuery,
    ) -> Result<Page<DocumentDetail>, ApiError> {
        query.validate()?;
        let request = self
            .http
            .get(self.url("/documents"))
            .query(&query.to_query_pairs());
        self.send(request).await
    }

    pub async fn get_document(&self, document_id: i64) -> Result<DocumentDetail, ApiError> {
        self.send(self.http.get(self.url(&format!("/documents/{}", document_id))))
            .await
    }

    pub async fn metrics(&self) -> Result<MetricsSummary, ApiError> {
        self.send(self.http.get(self.url("/metrics"))).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(status, &body);
            debug!("{} returned {}: {}", url, status, message);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!("Unexpected response from {}: {}", url, e);
            ApiError::Decode(e)
        })
    }
}

#[async_trait]
impl RetryBackend for ExtractionApiClient {
    type Error = ApiError;

    async fn retry_segment(&self, segment_id: i64) -> Result<SegmentRetryResponse, ApiError> {
        ExtractionApiClient::retry_segment(self, segment_id).await
    }

    async fn segment_retry_status(
        &self,
        segment_id: i64,
    ) -> Result<SegmentRetryStatus, ApiError> {
        ExtractionApiClient::segment_retry_status(self, segment_id).await
    }

    async fn retry_failed_segments_for_document(
        &self,
        document_id: i64,
    ) -> Result<BulkRetryResponse, ApiError> {
        ExtractionApiClient::retry_failed_segments_for_document(self, document_id).await
    }
}
