//! # Resilient API Client
//!
//! All storefront and carrier traffic funnels through [`ApiClient::request`],
//! which layers two independent recovery strategies over the raw transport:
//!
//! 1. **Session recovery**: before each request the proactive token path
//!    runs ([`TokenManager::get_valid_token`]). If the server still rejects
//!    the session (an HTTP 401, or an HTML body where JSON was expected),
//!    the client forces one token refresh and retries the same request once.
//!    A second rejection is terminal: the session is declared expired, a
//!    `session.expired` event is published, and the caller must
//!    re-authenticate.
//! 2. **Transient fault retry**: 5xx responses and transport failures are
//!    retried with capped exponential backoff up to a configured bound.
//!
//! Non-401 4xx responses take neither path; they are returned immediately as
//! rejections, since resubmitting an invalid payload cannot succeed.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::token::TokenManager;
use crate::client::transport::{
    HttpMethod, HttpTransport, TransportError, TransportRequest, TransportResponse,
};
use crate::error::FulfillmentError;
use crate::events::{names, EventPublisher};

/// Retry policy for transient failures (5xx and transport errors)
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the initial request
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
    /// Apply up to 10% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for storefront API endpoints
    pub base_url: String,
    /// Per-request timeout applied by the transport
    pub timeout: Duration,
    /// Transient failure retry policy
    pub retry: RetryConfig,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Errors surfaced by the API client after resilience is exhausted
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The session is dead: the reactive refresh-and-retry was consumed (or
    /// the refresh itself failed) and the server still rejects the token.
    #[error("session expired and re-authentication is required")]
    AuthExpired,

    /// Non-401 4xx: the server understood and refused. Never retried.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 5xx persisted through every retry attempt
    #[error("server error {status} after {attempts} attempts: {message}")]
    Server {
        status: u16,
        attempts: u32,
        message: String,
    },

    /// Transport failure persisted through every retry attempt
    #[error("transport failed after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// 2xx response whose body was not the expected JSON shape
    #[error("response body was not the expected JSON: {0}")]
    Decode(String),
}

impl From<ApiError> for FulfillmentError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::AuthExpired => FulfillmentError::AuthExpired,
            ApiError::Rejected { status, message } => {
                FulfillmentError::Validation(format!("{status}: {message}"))
            }
            ApiError::Server { .. } | ApiError::Transport { .. } => {
                FulfillmentError::TransientNetwork(err.to_string())
            }
            ApiError::Decode(message) => FulfillmentError::Validation(message),
        }
    }
}

/// Authenticated HTTP client with session and transient-fault resilience
pub struct ApiClient {
    config: ApiClientConfig,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenManager>,
    publisher: EventPublisher,
}

impl ApiClient {
    pub fn new(
        config: ApiClientConfig,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenManager>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
            publisher,
        }
    }

    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Resolve a path against the configured base URL. Absolute URLs pass
    /// through untouched so carrier endpoints hosted elsewhere can reuse the
    /// same client.
    pub fn endpoint_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(HttpMethod::Get, path, None).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        self.request(HttpMethod::Post, path, Some(body)).await
    }

    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        self.request(HttpMethod::Put, path, Some(body)).await
    }

    /// Execute a request with full resilience and decode the JSON response
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let response = self.execute_with_resilience(method, path, body).await?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn execute_with_resilience(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse, ApiError> {
        let url = self.endpoint_url(path);
        let mut token = self.tokens.get_valid_token().await;
        let mut session_retry_used = false;
        let mut transient_attempts: u32 = 0;

        loop {
            let request = TransportRequest {
                method,
                url: url.clone(),
                bearer: token.bearer().to_string(),
                body: body.clone(),
            };

            match self.transport.execute(request).await {
                Ok(response) if Self::looks_session_expired(&response) => {
                    if session_retry_used {
                        return Err(
                            self.declare_session_expired(&url, "retried request still rejected")
                                .await,
                        );
                    }
                    session_retry_used = true;
                    debug!(
                        url = %url,
                        status = response.status,
                        html = response.is_html(),
                        "Session rejected, forcing one token refresh and retrying"
                    );
                    match self.tokens.force_refresh(&token).await {
                        Ok(fresh) => token = fresh,
                        Err(e) => {
                            return Err(self.declare_session_expired(&url, &e.to_string()).await)
                        }
                    }
                }
                Ok(response) if response.status >= 500 => {
                    transient_attempts += 1;
                    if transient_attempts > self.config.retry.max_attempts {
                        return Err(ApiError::Server {
                            status: response.status,
                            attempts: transient_attempts,
                            message: snippet(&response.body),
                        });
                    }
                    let delay = self.retry_delay(transient_attempts);
                    warn!(
                        url = %url,
                        status = response.status,
                        attempt = transient_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Server error, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) if !response.is_success() => {
                    return Err(ApiError::Rejected {
                        status: response.status,
                        message: snippet(&response.body),
                    });
                }
                Ok(response) => return Ok(response),
                Err(transport_error) => {
                    transient_attempts += 1;
                    if transient_attempts > self.config.retry.max_attempts {
                        return Err(ApiError::Transport {
                            attempts: transient_attempts,
                            source: transport_error,
                        });
                    }
                    let delay = self.retry_delay(transient_attempts);
                    warn!(
                        url = %url,
                        error = %transport_error,
                        attempt = transient_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transport failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// The two session-death signals are treated identically: a 401, or an
    /// HTML body where the API contract is JSON (the auth layer's login
    /// redirect, which arrives with a 2xx status).
    fn looks_session_expired(response: &TransportResponse) -> bool {
        response.status == 401 || response.is_html()
    }

    async fn declare_session_expired(&self, url: &str, detail: &str) -> ApiError {
        warn!(
            url = %url,
            detail = %detail,
            "Session expired, full re-authentication required"
        );
        let _ = self
            .publisher
            .publish(names::SESSION_EXPIRED, json!({ "url": url, "detail": detail }))
            .await;
        ApiError::AuthExpired
    }

    /// Calculate retry delay based on attempt number
    fn retry_delay(&self, attempt: u32) -> Duration {
        let retry = &self.config.retry;

        let delay = retry
            .base_delay
            .mul_f64(retry.backoff_multiplier.powi(attempt.saturating_sub(1) as i32));
        let delay = delay.min(retry.max_delay);

        if retry.jitter {
            let jitter = fastrand::f64() * 0.1; // 10% jitter
            delay.mul_f64(1.0 + jitter).min(retry.max_delay)
        } else {
            delay
        }
    }
}

/// Trim response bodies destined for error messages
fn snippet(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    if body.chars().count() <= MAX_CHARS {
        body.to_string()
    } else {
        body.chars().take(MAX_CHARS).collect()
    }
}
