use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, warn};

use super::{RawResponse, ScoringBackend, TransportError, UploadRequest};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const RESUME_MIME: &str = "application/pdf";

/// reqwest implementation of the scoring backend.
///
/// No overall request timeout is set on the client: deadlines belong to the
/// caller (15 min for uploads, 10 min for warmup) and are enforced there.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ScoringBackend for HttpBackend {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn health(&self) -> Result<(), TransportError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Health check returned non-success status");
            return Err(TransportError::Other(format!("health check returned {status}")));
        }
        Ok(())
    }

    async fn warmup(&self) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .get(self.url("/warmup"))
            .send()
            .await?
            .error_for_status()?;
        let body = response.json::<serde_json::Value>().await?;
        debug!("Warmup probe answered: {body}");
        Ok(body)
    }

    async fn upload(&self, request: &UploadRequest) -> Result<RawResponse, TransportError> {
        let file_part = Part::bytes(request.file_bytes.to_vec())
            .file_name(request.file_name.clone())
            .mime_str(RESUME_MIME)?;
        let form = Form::new()
            .part("file", file_part)
            .text("description", request.description.clone());

        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let reason = status.canonical_reason().map(str::to_string);
        let body = response.bytes().await?;

        debug!(
            status = status.as_u16(),
            body_len = body.len(),
            "Upload request settled"
        );

        Ok(RawResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}
