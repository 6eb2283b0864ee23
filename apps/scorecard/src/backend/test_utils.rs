//! Scripted in-memory backend for controller and prober tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use super::{RawResponse, ScoringBackend, TransportError, UploadRequest};

pub const FAKE_BASE_URL: &str = "http://backend.test";

/// One scripted reply: wait `delay`, then settle with `result`.
pub struct Reply<T> {
    pub delay: Duration,
    pub result: Result<T, TransportError>,
}

impl<T> Reply<T> {
    pub fn now(result: Result<T, TransportError>) -> Self {
        Self {
            delay: Duration::ZERO,
            result,
        }
    }

    pub fn after(delay: Duration, result: Result<T, TransportError>) -> Self {
        Self { delay, result }
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> RawResponse {
    RawResponse {
        status,
        reason: None,
        body: Bytes::from(body.to_string()),
    }
}

pub fn scored(filename: &str, name: &str, score: f64) -> RawResponse {
    json_response(
        200,
        json!({ "filename": filename, "name": name, "score": score }),
    )
}

#[derive(Default)]
pub struct FakeBackend {
    uploads: Mutex<VecDeque<Reply<RawResponse>>>,
    warmups: Mutex<VecDeque<Reply<serde_json::Value>>>,
    pub upload_calls: AtomicUsize,
    pub warmup_calls: AtomicUsize,
    pub last_upload: Mutex<Option<UploadRequest>>,
}

impl FakeBackend {
    pub fn with_upload(reply: Reply<RawResponse>) -> Self {
        let backend = Self::default();
        backend.push_upload(reply);
        backend
    }

    pub fn with_warmup(reply: Reply<serde_json::Value>) -> Self {
        let backend = Self::default();
        backend.warmups.lock().unwrap().push_back(reply);
        backend
    }

    pub fn push_upload(&self, reply: Reply<RawResponse>) {
        self.uploads.lock().unwrap().push_back(reply);
    }

    pub fn uploads(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn warmups(&self) -> usize {
        self.warmup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringBackend for FakeBackend {
    fn base_url(&self) -> &str {
        FAKE_BASE_URL
    }

    async fn health(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn warmup(&self) -> Result<serde_json::Value, TransportError> {
        self.warmup_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .warmups
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::now(Ok(json!({"status": "ready"}))));
        tokio::time::sleep(reply.delay).await;
        reply.result
    }

    async fn upload(&self, request: &UploadRequest) -> Result<RawResponse, TransportError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_upload.lock().unwrap() = Some(request.clone());
        let reply = self
            .uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::now(Err(TransportError::Other("no scripted reply".into()))));
        tokio::time::sleep(reply.delay).await;
        reply.result
    }
}
