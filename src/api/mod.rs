use crate::config::ApiConfig;
use crate::error::{ClientError, Result};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

pub mod request;
pub mod response;
pub mod routes;
pub mod schemas;

pub use request::{ApiRequest, MultipartPayload, RequestBody};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct ApiMetrics {
    requests_total: Counter<u64>,
    request_duration_seconds: Histogram<f64>,
}

impl ApiMetrics {
    fn new() -> Self {
        let meter = global::meter("mission-client");
        Self {
            requests_total: meter
                .u64_counter("api_requests_total")
                .with_description("Backend requests by method and outcome")
                .build(),
            request_duration_seconds: meter
                .f64_histogram("api_request_duration_seconds")
                .with_description("Time from dispatch to a classified outcome")
                .build(),
        }
    }

    fn record(&self, method: &Method, outcome: &str, elapsed: Duration) {
        let attributes = [KeyValue::new("method", method.to_string()), KeyValue::new("outcome", outcome.to_string())];
        self.requests_total.add(1, &attributes);
        self.request_duration_seconds.record(elapsed.as_secs_f64(), &attributes);
    }
}

/// The shared request executor every account operation goes through.
///
/// It attaches the bearer token it is handed, applies a deadline, and turns every
/// outcome into either a JSON value or a [`ClientError`]. It never touches the
/// credential store.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    metrics: ApiMetrics,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient").field("base_url", &self.base_url).field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds the executor. Nothing is sent.
    ///
    /// # Errors
    /// Returns a configuration error if the base URL is unset or not an absolute http(s) URL.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ClientError::Configuration("The backend URL is not configured (set MISSION_API_URL)".into()))?;

        let parsed = Url::parse(base_url)
            .map_err(|e| ClientError::Configuration(format!("The backend URL {base_url:?} is invalid: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!("The backend URL must use http or https, got {base_url:?}")));
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ClientError::Configuration(format!("Could not build the HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout(),
            metrics: ApiMetrics::new(),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    /// Performs one request.
    ///
    /// Returns the parsed body for a 2xx JSON response and `None` for a 2xx
    /// response that is empty or not JSON.
    ///
    /// # Errors
    /// Returns the classified error for any non-2xx status or transport failure.
    pub async fn execute(&self, request: ApiRequest, token: Option<&str>) -> Result<Option<Value>> {
        self.dispatch(request, token, None).await
    }

    /// Like [`execute`](Self::execute), abandoning the request when `cancel` fires.
    ///
    /// # Errors
    /// A cancelled request fails with a timeout error.
    pub async fn execute_with_cancel(
        &self,
        request: ApiRequest,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        self.dispatch(request, token, Some(cancel)).await
    }

    /// Performs one request and decodes the body into `T`.
    ///
    /// # Errors
    /// Besides the errors of [`execute`](Self::execute), an empty body or one
    /// that does not match `T` fails with an unknown-kind error.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest, token: Option<&str>) -> Result<T> {
        let value = self
            .execute(request, token)
            .await?
            .ok_or_else(|| ClientError::unknown("The server returned an empty response"))?;
        decode(value)
    }

    async fn dispatch(
        &self,
        request: ApiRequest,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<Value>> {
        let method = request.method.clone();
        let url = self.resolve_url(&request.url);
        let request_id = Uuid::new_v4();

        let span = tracing::info_span!(
            "api_request",
            "request_id" = %request_id,
            "http.request.method" = %method,
            "url.full" = %url,
            "http.response.status_code" = tracing::field::Empty,
            "otel.kind" = "client",
        );

        let start = Instant::now();
        let exchange = self.exchange(request, url, token, request_id).instrument(span.clone());
        let result = match cancel {
            Some(cancel) => tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ClientError::Timeout("The request was cancelled".to_string())),
                result = exchange => result,
            },
            None => exchange.await,
        };

        let elapsed = start.elapsed();
        let outcome = result.as_ref().map_or_else(|e| e.kind().as_str(), |_| "ok");
        self.metrics.record(&method, outcome, elapsed);

        span.in_scope(|| match &result {
            Ok(_) => tracing::debug!(latency_ms = %elapsed.as_millis(), "request completed"),
            Err(e) => tracing::debug!(latency_ms = %elapsed.as_millis(), kind = %e.kind(), error = %e, "request failed"),
        });

        result
    }

    async fn exchange(&self, request: ApiRequest, url: String, token: Option<&str>, request_id: Uuid) -> Result<Option<Value>> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        let account_lookup = request.account_lookup;
        let builder = self.build(request, &url, token, request_id)?;

        match tokio::time::timeout(timeout, send(builder, account_lookup)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = %timeout.as_millis(), "request deadline elapsed");
                Err(ClientError::Timeout(format!(
                    "The server did not respond within {} seconds",
                    timeout.as_secs_f32()
                )))
            }
        }
    }

    fn build(&self, request: ApiRequest, url: &str, token: Option<&str>, request_id: Uuid) -> Result<reqwest::RequestBuilder> {
        let ApiRequest { method, headers: overrides, query, body, .. } = request;

        let mut headers = HeaderMap::new();
        if !matches!(body, RequestBody::Multipart(_)) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ClientError::Authentication { status: None, message: "The stored access token is malformed".into() })?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderValue::from_str(&request_id.to_string()).map_err(|e| ClientError::unknown(e.to_string()))?,
        );

        for (name, value) in overrides {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::unknown(format!("Invalid header name: {name}")))?;
            let value =
                HeaderValue::from_str(&value).map_err(|_| ClientError::unknown(format!("Invalid value for header {name}")))?;
            headers.insert(name, value);
        }

        let mut url =
            Url::parse(url).map_err(|e| ClientError::Configuration(format!("The request URL {url:?} is invalid: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(&query);
        }

        let mut builder = self.http.request(method, url).headers(headers);

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(
                serde_json::to_vec(&value).map_err(|e| ClientError::unknown(format!("Could not encode request body: {e}")))?,
            ),
            RequestBody::Multipart(payload) => builder.multipart(payload.into_form()?),
        };

        Ok(builder)
    }
}

async fn send(builder: reqwest::RequestBuilder, account_lookup: bool) -> Result<Option<Value>> {
    let response = builder.send().await.map_err(|e| response::transport_error(&e))?;
    let status = response.status();
    tracing::Span::current().record("http.response.status_code", status.as_u16());

    if status.is_success() {
        let bytes = response.bytes().await.map_err(|e| response::transport_error(&e))?;
        return Ok(response::success_body(&bytes));
    }

    let retry_after = response::retry_after(response.headers());
    // The status alone is enough to classify; an unreadable body only costs the message.
    let bytes = response.bytes().await.unwrap_or_default();
    let body = serde_json::from_slice::<Value>(&bytes).ok();
    Err(response::classify(status, body.as_ref(), retry_after, account_lookup))
}

/// Checks a response body against the expected schema.
///
/// # Errors
/// Returns an unknown-kind error when the body does not match `T`.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(error = %e, "Response did not match the expected shape");
        ClientError::unknown("The server returned an unexpected response")
    })
}
