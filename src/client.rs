//! HTTP client for the storefront backend's order endpoints.

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthContext;
use crate::config::Config;
use crate::domain::aggregates::Order;
use crate::domain::events::{OrderAction, TransitionRequest};
use crate::domain::value_objects::OrderStatus;
use crate::{ClientError, Page, Result};

/// Filter for `GET /order`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub page: u32,
    pub size: Option<u32>,
}

impl OrderQuery {
    pub fn status(status: Option<OrderStatus>) -> Self { Self { status, ..Default::default() } }
    pub fn page(mut self, page: u32) -> Self { self.page = page; self }
    pub fn size(mut self, size: u32) -> Self { self.size = Some(size); self }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", self.page.to_string())];
        if let Some(status) = self.status { params.push(("status", status.code().to_string())); }
        if let Some(size) = self.size { params.push(("size", size.to_string())); }
        params
    }
}

/// The order endpoints the workflow depends on.
///
/// Views hold an `Arc<dyn OrderBackend>` so they can be driven by in-memory fakes.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn fetch_order(&self, id: i64) -> Result<Order>;

    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Page<Order>>;

    /// `POST /order/{id}/status/{action}`. The appended event is read back by re-fetching.
    async fn apply_action(&self, id: i64, action: OrderAction, request: &TransitionRequest) -> Result<()>;

    /// `POST /order/{id}/cancel`.
    async fn cancel_order(&self, id: i64, request: &TransitionRequest) -> Result<()>;
}

/// reqwest-backed client. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthContext,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config, auth: AuthContext) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("http client init failed: {e}")))?;
        Ok(Self { http, base_url: config.api_url.clone(), auth })
    }

    pub fn with_base_url(base_url: impl Into<String>, auth: AuthContext) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), auth }
    }

    pub fn auth(&self) -> &AuthContext { &self.auth }

    fn url(&self, path: &str) -> String { format!("{}/api/v1{}", self.base_url.trim_end_matches('/'), path) }

    /// Sends one request and classifies the outcome. Returns the raw body on 2xx.
    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&TransitionRequest>,
    ) -> Result<Vec<u8>> {
        let request_id = Uuid::new_v4();
        let mut req = self
            .http
            .request(method.clone(), self.url(path))
            .query(query)
            .header("X-Request-Id", request_id.to_string());
        if let Some(bearer) = self.auth.bearer() {
            req = req.header(header::AUTHORIZATION, bearer);
        }
        if let Some(body) = body {
            body.validate().map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
            req = req.json(body);
        }

        let span = debug_span!("request", %request_id, %method, path);
        async move {
            debug!("sending request");
            let resp = req.send().await.map_err(|e| {
                warn!(error = %e, "request failed");
                ClientError::Transport(e.to_string())
            })?;

            let status = resp.status();
            let refreshed = resp.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);
            self.auth.observe(path, status.as_u16(), refreshed.as_deref());

            let bytes = resp.bytes().await.map_err(|e| ClientError::Transport(e.to_string()))?;
            debug!(status = status.as_u16(), len = bytes.len(), "response received");
            if status.is_success() {
                return Ok(bytes.to_vec());
            }
            Err(classify(status, path, &bytes))
        }
        .instrument(span)
        .await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let body = self.execute(Method::GET, path, query, None).await?;
        decode(path, &body)
    }
}

fn classify(status: StatusCode, path: &str, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| String::from_utf8_lossy(body).chars().take(200).collect());
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::FORBIDDEN => ClientError::Forbidden(if message.is_empty() { "access denied".into() } else { message }),
        StatusCode::NOT_FOUND => ClientError::NotFound(path.to_string()),
        _ => ClientError::Rejected { status: status.as_u16(), message },
    }
}

pub(crate) fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ClientError::Malformed(format!("empty response body from {path}")));
    }
    serde_json::from_slice(body).map_err(|e| ClientError::Malformed(format!("{path}: {e}")))
}

#[async_trait]
impl OrderBackend for ApiClient {
    async fn fetch_order(&self, id: i64) -> Result<Order> { self.get_json(&format!("/order/{id}"), &[]).await }

    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Page<Order>> { self.get_json("/order", &query.params()).await }

    async fn apply_action(&self, id: i64, action: OrderAction, request: &TransitionRequest) -> Result<()> {
        let path = format!("/order/{id}/status/{}", action.as_str());
        self.execute(Method::POST, &path, &[], Some(request)).await.map(drop)
    }

    async fn cancel_order(&self, id: i64, request: &TransitionRequest) -> Result<()> {
        self.execute(Method::POST, &format!("/order/{id}/cancel"), &[], Some(request)).await.map(drop)
    }
}
