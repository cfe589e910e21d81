pub mod client;
pub mod server;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// One outbound POST, fully built by the invocation pipeline.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub url: String,
    /// `None` for zero-argument methods.
    pub body: Option<Bytes>,
    /// Value for the `Cookie` header, if any.
    pub cookie: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: Bytes,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to obtain any response at all. These are the only errors the
/// pipeline retries.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("timed out")]
    Timeout,

    #[error("{0}")]
    Unreachable(String),

    /// The status line arrived but the body did not.
    #[error("response body lost: {0}")]
    Body(#[source] reqwest::Error),
}

impl TransportError {
    /// A response that was partly received is not retried: the server has
    /// already acted on the request.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Body(_))
    }
}

/// Sends a [`WireRequest`] and returns whatever the server answered.
///
/// Implementations must return `Ok` for every HTTP response, whatever its
/// status, and `Err` only when no response was received.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &WireRequest) -> Result<WireResponse, TransportError>;
}
