//! # Storefront API Client
//!
//! Authenticated HTTP access to the storefront back office and carrier
//! endpoints. The client owns two independent resilience concerns:
//!
//! - **Session lifecycle**: bearer tokens are refreshed proactively before
//!   they expire and reactively when the server rejects one mid-flight
//!   ([`TokenManager`]).
//! - **Transient faults**: server errors and connection failures are retried
//!   with bounded exponential backoff ([`ApiClient`]).
//!
//! The wire itself sits behind the [`HttpTransport`] trait so tests can
//! script responses without a network.

pub mod api_client;
pub mod token;
pub mod transport;

pub use api_client::{ApiClient, ApiClientConfig, ApiError, RetryConfig};
pub use token::{
    AccessToken, HttpTokenRefresher, TokenError, TokenManager, TokenRefresher,
    DEFAULT_LOW_WATER_SECONDS,
};
pub use transport::{
    HttpMethod, HttpTransport, ReqwestTransport, TransportError, TransportRequest,
    TransportResponse,
};
