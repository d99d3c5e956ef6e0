//! REST client for the platform directory API.
//!
//! Every call goes through [`ApiClient::call`], which applies the timeout,
//! maps HTTP status codes onto [`ApiError`] and decodes the response
//! envelope. A single `reqwest::Client` with a cookie store is shared by all
//! calls, so the session cookie set by `/admin/login` rides along on the
//! admin endpoints afterwards.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::analytics::EventSink;
use crate::config::Config;
use crate::debug::{self, cat};
use crate::envelope::{error_message, Envelope};
use crate::error::ApiError;
use crate::review::AdminApi;
use crate::submit::SubmissionApi;
use crate::types::{
    AdminCredentials, AnalyticsDashboard, AnalyticsEvent, Collection, ListMeta, Page, Platform,
    PresignedUpload, PresignedUploadRequest, Submission, SubmissionList, SubmissionPayload,
};

pub const DEFAULT_DASHBOARD_DAYS: u32 = 14;
pub const DEFAULT_DASHBOARD_TOP_LIMIT: u32 = 5;

/// Envelopes whose `meta` we never look at.
type NoMeta = Value;

/// Request parameters for `GET /platforms`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformQuery {
    pub search: Option<String>,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    pub page: u32,
    pub page_size: u32,
}

impl PlatformQuery {
    /// Repeated `category_ids` / `tag_ids` pairs, in the server's expected order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        pairs.extend(self.category_ids.iter().map(|id| ("category_ids", id.to_string())));
        pairs.extend(self.tag_ids.iter().map(|id| ("tag_ids", id.to_string())));
        pairs.push(("page", self.page.to_string()));
        pairs.push(("page_size", self.page_size.to_string()));
        pairs
    }
}

pub fn encode_query(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Map a non-2xx status onto the error taxonomy.
pub fn status_error(status: u16, body: &[u8], fallback: &str) -> ApiError {
    match status {
        401 => ApiError::Unauthorized,
        404 => ApiError::NotFound(error_message(body).unwrap_or_else(|| fallback.to_string())),
        _ => ApiError::Request {
            status,
            message: error_message(body).unwrap_or_else(|| fallback.to_string()),
        },
    }
}

/// Source of listing pages; the seam between the fetch orchestrator and HTTP.
#[async_trait]
pub trait PlatformSource: Send + Sync + 'static {
    async fn fetch_platforms(&self, query: &PlatformQuery) -> Result<Page<Platform>, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ApiError> {
        Self::new(&cfg.api_base_url, cfg.timeout_ms)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn platforms_url(&self, query: &PlatformQuery) -> String {
        format!("{}?{}", self.url("/platforms"), encode_query(&query.query_pairs()))
    }

    pub fn collections_url(&self, featured: Option<bool>, limit: Option<u32>) -> String {
        let mut pairs = Vec::new();
        if let Some(f) = featured {
            pairs.push(("featured", f.to_string()));
        }
        if let Some(l) = limit {
            pairs.push(("limit", l.to_string()));
        }
        if pairs.is_empty() {
            self.url("/collections")
        } else {
            format!("{}?{}", self.url("/collections"), encode_query(&pairs))
        }
    }

    pub fn dashboard_url(&self, days: u32, top_limit: u32) -> String {
        let pairs = [("days", days.to_string()), ("top_limit", top_limit.to_string())];
        format!("{}?{}", self.url("/analytics/dashboard"), encode_query(&pairs))
    }

    async fn send(&self, rb: RequestBuilder, label: &str) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let started = Instant::now();
        let res = rb.timeout(self.timeout).send().await.map_err(|e| {
            log::warn!("[api] {label} transport error: {e}");
            ApiError::from(e)
        })?;
        let status = res.status();
        let body = res.bytes().await?.to_vec();
        log::debug!("[api] {label} -> {status} ({}ms)", started.elapsed().as_millis());
        debug::log(cat::NET, format!("{label} -> {status} ({} bytes)", body.len()));
        Ok((status, body))
    }

    async fn call<T, M>(&self, rb: RequestBuilder, label: &str, fallback: &str) -> Result<(T, Option<M>), ApiError>
    where
        T: DeserializeOwned,
        M: DeserializeOwned,
    {
        let (status, body) = self.send(rb, label).await?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body, fallback));
        }
        Envelope::<T, M>::decode(&body, fallback)?.into_result()
    }

    pub async fn list_platforms(&self, query: &PlatformQuery) -> Result<Page<Platform>, ApiError> {
        let url = self.platforms_url(query);
        log::info!("[api] GET {url}");
        let (data, meta) = self
            .call::<Vec<Platform>, ListMeta>(self.http.get(&url), "platforms", "Failed to load the platform list.")
            .await?;
        Ok(Page { data, meta })
    }

    pub async fn platform_detail(&self, slug: &str) -> Result<Platform, ApiError> {
        let url = self.url(&format!("/platforms/{}", urlencoding::encode(slug)));
        let (data, _) = self
            .call::<Platform, NoMeta>(self.http.get(url), "platform", "Failed to load platform details.")
            .await?;
        Ok(data)
    }

    pub async fn list_collections(&self, featured: Option<bool>, limit: Option<u32>) -> Result<Vec<Collection>, ApiError> {
        let url = self.collections_url(featured, limit);
        let (data, _) = self
            .call::<Vec<Collection>, NoMeta>(self.http.get(url), "collections", "Failed to load collections.")
            .await?;
        Ok(data)
    }

    pub async fn collection_detail(&self, slug: &str) -> Result<Collection, ApiError> {
        let url = self.url(&format!("/collections/{}", urlencoding::encode(slug)));
        let (data, _) = self
            .call::<Collection, NoMeta>(self.http.get(url), "collection", "Failed to load the collection.")
            .await?;
        Ok(data)
    }

    pub async fn submit_platform(&self, payload: &SubmissionPayload) -> Result<Submission, ApiError> {
        let rb = self.http.post(self.url("/submissions")).json(payload);
        let (data, _) = self.call::<Submission, NoMeta>(rb, "submit", "Submission failed.").await?;
        log::info!("[api] submission #{} created for {}", data.id, data.platform_name);
        Ok(data)
    }

    pub async fn request_upload_url(&self, req: &PresignedUploadRequest) -> Result<PresignedUpload, ApiError> {
        let rb = self.http.post(self.url("/submissions/upload-url")).json(req);
        let (data, _) = self
            .call::<PresignedUpload, NoMeta>(rb, "upload-url", "Could not create an upload URL.")
            .await?;
        Ok(data)
    }

    /// PUT the file straight to storage; the API never sees the bytes.
    pub async fn put_upload(&self, upload_url: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), ApiError> {
        let rb = self.http.put(upload_url).header(CONTENT_TYPE, content_type).body(bytes);
        let (status, _) = self.send(rb, "upload-put").await?;
        if !status.is_success() {
            return Err(ApiError::Upload { status: status.as_u16() });
        }
        Ok(())
    }

    /// Bad credentials come back as 401 here; that is a message for the
    /// login form, not a switch to it.
    pub async fn admin_login(&self, creds: &AdminCredentials) -> Result<(), ApiError> {
        let rb = self.http.post(self.url("/admin/login")).json(creds);
        let (status, body) = self.send(rb, "admin-login").await?;
        if status.is_success() {
            log::info!("[api] admin session established for {}", creds.username);
            return Ok(());
        }
        Err(ApiError::Request {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or_else(|| "Login failed.".to_string()),
        })
    }

    pub async fn list_submissions(&self) -> Result<SubmissionList, ApiError> {
        let (data, _) = self
            .call::<SubmissionList, NoMeta>(self.http.get(self.url("/submissions")), "submissions", "Failed to load submissions.")
            .await?;
        Ok(data)
    }

    pub async fn approve_submission(&self, id: i64) -> Result<Submission, ApiError> {
        let rb = self.http.post(self.url(&format!("/submissions/{id}/approve")));
        let (data, _) = self.call::<Submission, NoMeta>(rb, "approve", "Approval failed.").await?;
        Ok(data)
    }

    pub async fn reject_submission(&self, id: i64, reason: &str) -> Result<Submission, ApiError> {
        let rb = self
            .http
            .post(self.url(&format!("/submissions/{id}/reject")))
            .json(&json!({ "reason": reason }));
        let (data, _) = self.call::<Submission, NoMeta>(rb, "reject", "Rejection failed.").await?;
        Ok(data)
    }

    pub async fn log_event(&self, event: &AnalyticsEvent) -> Result<(), ApiError> {
        let rb = self.http.post(self.url("/analytics/events")).json(event);
        let (status, body) = self.send(rb, "analytics-event").await?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body, "Failed to record event."));
        }
        Ok(())
    }

    pub async fn analytics_dashboard(&self, days: u32, top_limit: u32) -> Result<AnalyticsDashboard, ApiError> {
        let url = self.dashboard_url(days, top_limit);
        let (data, _) = self
            .call::<AnalyticsDashboard, NoMeta>(self.http.get(url), "dashboard", "Failed to load dashboard metrics.")
            .await?;
        Ok(data)
    }
}

#[async_trait]
impl PlatformSource for ApiClient {
    async fn fetch_platforms(&self, query: &PlatformQuery) -> Result<Page<Platform>, ApiError> {
        self.list_platforms(query).await
    }
}

#[async_trait]
impl EventSink for ApiClient {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), ApiError> {
        self.log_event(event).await
    }
}

#[async_trait]
impl AdminApi for ApiClient {
    async fn login(&self, creds: &AdminCredentials) -> Result<(), ApiError> {
        self.admin_login(creds).await
    }

    async fn submissions(&self) -> Result<SubmissionList, ApiError> {
        self.list_submissions().await
    }

    async fn approve(&self, id: i64) -> Result<Submission, ApiError> {
        self.approve_submission(id).await
    }

    async fn reject(&self, id: i64, reason: &str) -> Result<Submission, ApiError> {
        self.reject_submission(id, reason).await
    }

    async fn dashboard(&self, days: u32, top_limit: u32) -> Result<AnalyticsDashboard, ApiError> {
        self.analytics_dashboard(days, top_limit).await
    }
}

#[async_trait]
impl SubmissionApi for ApiClient {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<Submission, ApiError> {
        self.submit_platform(payload).await
    }

    async fn upload_url(&self, req: &PresignedUploadRequest) -> Result<PresignedUpload, ApiError> {
        self.request_upload_url(req).await
    }

    async fn put_object(&self, upload_url: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), ApiError> {
        self.put_upload(upload_url, content_type, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:8000/api/v1/", 8000).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        assert_eq!(client().url("/platforms"), "http://localhost:8000/api/v1/platforms");
    }

    #[test]
    fn repeated_filter_params() {
        let q = PlatformQuery {
            search: Some("ai chat".into()),
            category_ids: vec![1, 4],
            tag_ids: vec![9],
            page: 2,
            page_size: 12,
        };
        assert_eq!(
            client().platforms_url(&q),
            "http://localhost:8000/api/v1/platforms?search=ai%20chat&category_ids=1&category_ids=4&tag_ids=9&page=2&page_size=12"
        );
    }

    #[test]
    fn collections_url_variants() {
        let c = client();
        assert_eq!(c.collections_url(None, None), "http://localhost:8000/api/v1/collections");
        assert_eq!(
            c.collections_url(Some(true), Some(6)),
            "http://localhost:8000/api/v1/collections?featured=true&limit=6"
        );
    }

    #[test]
    fn dashboard_defaults() {
        assert_eq!(
            client().dashboard_url(DEFAULT_DASHBOARD_DAYS, DEFAULT_DASHBOARD_TOP_LIMIT),
            "http://localhost:8000/api/v1/analytics/dashboard?days=14&top_limit=5"
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_error(401, b"{}", "x"), ApiError::Unauthorized);
        assert_eq!(
            status_error(404, br#"{"detail": "Platform not found"}"#, "x"),
            ApiError::NotFound("Platform not found".into())
        );
        assert_eq!(
            status_error(422, br#"{"detail": "invalid email"}"#, "Submission failed."),
            ApiError::Request { status: 422, message: "invalid email".into() }
        );
        assert_eq!(
            status_error(500, b"", "Submission failed."),
            ApiError::Request { status: 500, message: "Submission failed.".into() }
        );
    }
}
