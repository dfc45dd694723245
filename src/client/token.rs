//! # Bearer Token Lifecycle
//!
//! Storefront sessions ride on short-lived JWT bearer tokens. The expiry is
//! read from the token's `exp` claim so the client can refresh proactively
//! before the server starts rejecting requests, instead of discovering the
//! expiry mid-batch through a wave of 401s.
//!
//! [`TokenManager`] is the single writer for the shared token. Concurrent
//! callers that all notice a near-expiry token funnel through one refresh
//! guard, so a burst of parallel jobs triggers at most one refresh call.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::transport::{HttpTransport, TransportRequest};

/// Default proactive refresh threshold: refresh once fewer than five minutes
/// of token lifetime remain.
pub const DEFAULT_LOW_WATER_SECONDS: i64 = 300;

/// Errors raised while decoding or refreshing bearer tokens
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("bearer token is not a decodable JWT: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),

    #[error("token expiry claim is out of range")]
    InvalidExpiry,

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
}

/// The only claim the client reads. Signature verification is the server's
/// concern; here the expiry is used purely to schedule refreshes.
#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// A bearer token with its decoded expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    bearer: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Decode the `exp` claim out of a compact JWT. The signature is not
    /// checked; an expired token still decodes, since knowing that it is
    /// expired is the whole point.
    pub fn from_bearer(bearer: impl Into<String>) -> Result<Self, TokenError> {
        let bearer = bearer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<ExpiryClaims>(
            &bearer,
            &DecodingKey::from_secret(&[]),
            &validation,
        )?;

        let expires_at = DateTime::from_timestamp(data.claims.exp, 0)
            .ok_or(TokenError::InvalidExpiry)?;

        Ok(Self { bearer, expires_at })
    }

    /// Build a token with a known expiry, bypassing JWT decoding. Used by
    /// scripted refreshers in tests and by callers that receive the expiry
    /// out of band.
    pub fn with_expiry(bearer: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            bearer: bearer.into(),
            expires_at,
        }
    }

    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Remaining lifetime; negative once the token has expired
    pub fn remaining(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() <= Duration::zero()
    }

    /// Whether the remaining lifetime has dropped below the low-water mark
    pub fn needs_refresh(&self, low_water: Duration) -> bool {
        self.remaining() < low_water
    }
}

/// Exchanges the current token for a fresh one against the auth backend
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, current: &AccessToken) -> Result<AccessToken, TokenError>;
}

/// Single-writer guard around the shared bearer token.
///
/// Two entry points map to the two halves of the session strategy:
///
/// - [`get_valid_token`](Self::get_valid_token) is the proactive path used
///   before every request. It refreshes below the low-water mark but never
///   fails the caller: if the refresh errors, the current token is returned
///   and the server gets to be the judge of it.
/// - [`force_refresh`](Self::force_refresh) is the reactive path used after
///   the server has rejected a token. Failure here is surfaced, because the
///   caller's next step is to declare the session dead.
pub struct TokenManager {
    refresher: Arc<dyn TokenRefresher>,
    current: RwLock<AccessToken>,
    refresh_gate: tokio::sync::Mutex<()>,
    low_water: Duration,
    refreshes: AtomicU64,
}

impl TokenManager {
    pub fn new(initial: AccessToken, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self::with_low_water(
            initial,
            refresher,
            Duration::seconds(DEFAULT_LOW_WATER_SECONDS),
        )
    }

    pub fn with_low_water(
        initial: AccessToken,
        refresher: Arc<dyn TokenRefresher>,
        low_water: Duration,
    ) -> Self {
        info!(
            low_water_seconds = low_water.num_seconds(),
            expires_at = %initial.expires_at(),
            "🔐 Token manager initialized"
        );
        Self {
            refresher,
            current: RwLock::new(initial),
            refresh_gate: tokio::sync::Mutex::new(()),
            low_water,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current token without any refresh consideration
    pub fn current(&self) -> AccessToken {
        self.current.read().clone()
    }

    /// Number of successful refreshes performed since construction
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Proactive path: hand out the current token, refreshing it first when
    /// its remaining lifetime is below the low-water mark. A failed refresh
    /// is logged and the stale token returned; the request proceeds and the
    /// reactive path deals with any rejection.
    pub async fn get_valid_token(&self) -> AccessToken {
        let snapshot = self.current();
        if !snapshot.needs_refresh(self.low_water) {
            return snapshot;
        }

        match self.refresh_shared().await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(
                    error = %e,
                    expires_at = %snapshot.expires_at(),
                    "Proactive token refresh failed, proceeding with current token"
                );
                snapshot
            }
        }
    }

    /// Reactive path: the server rejected `rejected` as an expired session.
    /// If another caller already rotated the token, that newer token is
    /// returned without a second refresh; otherwise one refresh is performed.
    pub async fn force_refresh(&self, rejected: &AccessToken) -> Result<AccessToken, TokenError> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.current();
        if current.bearer() != rejected.bearer() {
            debug!("Token already rotated by a concurrent caller, reusing it");
            return Ok(current);
        }

        self.refresh_holding_gate(&current).await
    }

    /// Coalesced refresh for the proactive path: only the first caller
    /// through the gate performs the exchange, everyone queued behind it
    /// picks up the rotated token.
    async fn refresh_shared(&self) -> Result<AccessToken, TokenError> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.current();
        if !current.needs_refresh(self.low_water) {
            return Ok(current);
        }

        self.refresh_holding_gate(&current).await
    }

    /// Caller must hold `refresh_gate`
    async fn refresh_holding_gate(&self, current: &AccessToken) -> Result<AccessToken, TokenError> {
        let fresh = self.refresher.refresh(current).await?;
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        debug!(expires_at = %fresh.expires_at(), "Bearer token rotated");
        *self.current.write() = fresh.clone();
        Ok(fresh)
    }
}

/// Production refresher: posts the current bearer to the storefront's
/// refresh endpoint and decodes the replacement token from the response
pub struct HttpTokenRefresher {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, current: &AccessToken) -> Result<AccessToken, TokenError> {
        let request = TransportRequest::post(&self.endpoint, current.bearer(), json!({}));

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| TokenError::RefreshFailed(e.to_string()))?;

        if !response.is_success() || response.is_html() {
            return Err(TokenError::RefreshFailed(format!(
                "refresh endpoint answered with status {}",
                response.status
            )));
        }

        let parsed: RefreshResponse = serde_json::from_str(&response.body)
            .map_err(|e| TokenError::RefreshFailed(format!("undecodable refresh body: {e}")))?;

        AccessToken::from_bearer(parsed.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn mint_jwt(expires_at: DateTime<Utc>) -> String {
        let claims = TestClaims {
            sub: "fulfillment-tests".to_string(),
            exp: expires_at.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    struct CountingRefresher {
        calls: AtomicU64,
        lifetime: Duration,
        delay: std::time::Duration,
        fail: bool,
    }

    impl CountingRefresher {
        fn new(lifetime: Duration) -> Self {
            Self {
                calls: AtomicU64::new(0),
                lifetime,
                delay: std::time::Duration::ZERO,
                fail: false,
            }
        }

        fn slow(lifetime: Duration, delay: std::time::Duration) -> Self {
            Self {
                delay,
                ..Self::new(lifetime)
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Duration::hours(1))
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, _current: &AccessToken) -> Result<AccessToken, TokenError> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            if self.delay > std::time::Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(TokenError::RefreshFailed("auth backend unavailable".into()));
            }
            Ok(AccessToken::with_expiry(
                format!("refreshed-{call}"),
                Utc::now() + self.lifetime,
            ))
        }
    }

    #[test]
    fn test_from_bearer_decodes_expiry() {
        let expires_at = Utc::now() + Duration::minutes(42);
        let token = AccessToken::from_bearer(mint_jwt(expires_at)).unwrap();
        assert_eq!(token.expires_at().timestamp(), expires_at.timestamp());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_from_bearer_decodes_already_expired_token() {
        let expires_at = Utc::now() - Duration::minutes(5);
        let token = AccessToken::from_bearer(mint_jwt(expires_at)).unwrap();
        assert!(token.is_expired());
        assert!(token.needs_refresh(Duration::seconds(DEFAULT_LOW_WATER_SECONDS)));
    }

    #[test]
    fn test_from_bearer_rejects_garbage() {
        assert!(AccessToken::from_bearer("not-a-jwt").is_err());
    }

    #[test]
    fn test_needs_refresh_boundary() {
        let low_water = Duration::seconds(DEFAULT_LOW_WATER_SECONDS);
        let comfortable = AccessToken::with_expiry("t", Utc::now() + Duration::minutes(30));
        let close = AccessToken::with_expiry("t", Utc::now() + Duration::minutes(2));

        assert!(!comfortable.needs_refresh(low_water));
        assert!(close.needs_refresh(low_water));
    }

    #[tokio::test]
    async fn test_healthy_token_is_returned_without_refresh() {
        let refresher = Arc::new(CountingRefresher::new(Duration::hours(1)));
        let manager = TokenManager::new(
            AccessToken::with_expiry("healthy", Utc::now() + Duration::hours(1)),
            refresher.clone(),
        );

        let token = manager.get_valid_token().await;
        assert_eq!(token.bearer(), "healthy");
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_near_expiry_token_triggers_proactive_refresh() {
        let refresher = Arc::new(CountingRefresher::new(Duration::hours(1)));
        let manager = TokenManager::new(
            AccessToken::with_expiry("stale", Utc::now() + Duration::seconds(30)),
            refresher.clone(),
        );

        let token = manager.get_valid_token().await;
        assert_eq!(token.bearer(), "refreshed-1");
        assert_eq!(refresher.calls(), 1);
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_proactive_refresh_failure_returns_stale_token() {
        let refresher = Arc::new(CountingRefresher::failing());
        let manager = TokenManager::new(
            AccessToken::with_expiry("stale", Utc::now() + Duration::seconds(30)),
            refresher.clone(),
        );

        let token = manager.get_valid_token().await;
        assert_eq!(token.bearer(), "stale");
        assert_eq!(refresher.calls(), 1);
        assert_eq!(manager.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_coalesce_into_one_refresh() {
        let refresher = Arc::new(CountingRefresher::slow(
            Duration::hours(1),
            std::time::Duration::from_millis(25),
        ));
        let manager = Arc::new(TokenManager::new(
            AccessToken::with_expiry("stale", Utc::now() + Duration::seconds(30)),
            refresher.clone(),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(
                async move { manager.get_valid_token().await },
            ));
        }

        for handle in handles {
            let token = handle.await.unwrap();
            assert_eq!(token.bearer(), "refreshed-1");
        }
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_reuses_concurrent_rotation() {
        let refresher = Arc::new(CountingRefresher::new(Duration::hours(1)));
        let manager = TokenManager::new(
            AccessToken::with_expiry("rejected", Utc::now() + Duration::hours(1)),
            refresher.clone(),
        );

        let rejected = manager.current();
        let first = manager.force_refresh(&rejected).await.unwrap();
        assert_eq!(first.bearer(), "refreshed-1");

        // The second caller still holds the old rejected token; it should
        // pick up the rotation without another refresh call.
        let second = manager.force_refresh(&rejected).await.unwrap();
        assert_eq!(second.bearer(), "refreshed-1");
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_surfaces_failure() {
        let refresher = Arc::new(CountingRefresher::failing());
        let manager = TokenManager::new(
            AccessToken::with_expiry("rejected", Utc::now() + Duration::hours(1)),
            refresher.clone(),
        );

        let rejected = manager.current();
        let result = manager.force_refresh(&rejected).await;
        assert!(matches!(result, Err(TokenError::RefreshFailed(_))));
    }
}
