//! Scoring backend: the network collaborator behind the submission flow.
//!
//! The controller and the warmup prober only ever talk to `dyn ScoringBackend`.
//! `HttpBackend` is the real implementation; tests swap in recording fakes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod http;
#[cfg(test)]
pub mod test_utils;

pub use http::HttpBackend;

/// Failure to obtain any HTTP response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Unreachable(String),

    #[error("request timed out")]
    TimedOut,

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            TransportError::Unreachable(e.to_string())
        } else if e.is_timeout() {
            TransportError::TimedOut
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Status line and undecoded body of a settled request.
/// Classification into success or a failure kind happens in `classify`.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, if it has one.
    pub reason: Option<String>,
    pub body: Bytes,
}

/// Multipart payload for `POST /upload`.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub file_bytes: Bytes,
    pub description: String,
}

#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Base address requests are sent to, used in user-facing guidance.
    fn base_url(&self) -> &str;

    /// GET /health. Any 2xx is healthy.
    async fn health(&self) -> Result<(), TransportError>;

    /// GET /warmup. Any JSON body on success counts as ready.
    async fn warmup(&self) -> Result<serde_json::Value, TransportError>;

    /// POST /upload with `file` and `description` form fields.
    async fn upload(&self, request: &UploadRequest) -> Result<RawResponse, TransportError>;
}
