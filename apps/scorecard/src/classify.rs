//! Outcome classification: turns a settled upload into a result or a
//! user-facing `ErrorReport`.

use serde::Deserialize;
use serde_json::Value;

use crate::backend::{RawResponse, TransportError};
use crate::errors::{Detail, ErrorKind, ErrorReport};
use crate::models::score::ScoreResult;

const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// `detail` / `error` / `details` may each be a plain string or a list of
/// `{msg}` objects (FastAPI validation errors) or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Message {
    Text(String),
    Items(Vec<MessageItem>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageItem {
    Object { msg: String },
    Text(String),
}

impl MessageItem {
    fn into_text(self) -> String {
        match self {
            MessageItem::Object { msg } => msg,
            MessageItem::Text(text) => text,
        }
    }
}

impl Message {
    fn into_text(self) -> Option<String> {
        match self {
            Message::Text(text) if !text.trim().is_empty() => Some(text),
            Message::Text(_) => None,
            Message::Items(items) if items.is_empty() => None,
            Message::Items(items) => Some(
                items
                    .into_iter()
                    .map(MessageItem::into_text)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        }
    }

    fn into_detail(self) -> Option<Detail> {
        match self {
            Message::Text(text) if !text.trim().is_empty() => Some(Detail::Text(text)),
            Message::Text(_) => None,
            Message::Items(items) if items.is_empty() => None,
            Message::Items(items) => Some(Detail::Items(
                items.into_iter().map(MessageItem::into_text).collect(),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Message>,
    #[serde(default)]
    error: Option<Message>,
    #[serde(default)]
    details: Option<Message>,
}

impl ErrorBody {
    /// `detail` wins over `error`, matching the backend's FastAPI conventions.
    fn into_report(self, kind: ErrorKind) -> Option<ErrorReport> {
        let message = self
            .detail
            .and_then(Message::into_text)
            .or_else(|| self.error.and_then(Message::into_text))?;
        let detail = self.details.and_then(Message::into_detail);
        Some(ErrorReport::new(kind, message).with_detail(detail))
    }
}

/// Classifies a response that made it back from the backend.
pub fn classify_response(response: RawResponse) -> Result<ScoreResult, ErrorReport> {
    let status = response.status;

    if status == STATUS_TOO_MANY_REQUESTS {
        return Err(ErrorReport::rate_limited());
    }

    if !(200..300).contains(&status) {
        let kind = ErrorKind::ServerError(status);
        return Err(serde_json::from_slice::<ErrorBody>(&response.body)
            .ok()
            .and_then(|body| body.into_report(kind))
            .unwrap_or_else(|| ErrorReport::new(kind, fallback_message(&response))));
    }

    let value: Value = serde_json::from_slice(&response.body).map_err(|e| {
        ErrorReport::new(
            ErrorKind::Unknown,
            format!("Unexpected response from the scoring service: {e}"),
        )
    })?;

    // The backend reports some processing failures with a 200 and an `error` field.
    if value.get("error").is_some_and(|e| !e.is_null()) {
        let kind = ErrorKind::ServerError(status);
        return Err(serde_json::from_value::<ErrorBody>(value)
            .ok()
            .and_then(|body| body.into_report(kind))
            .unwrap_or_else(|| ErrorReport::new(kind, fallback_message(&response))));
    }

    serde_json::from_value::<ScoreResult>(value).map_err(|e| {
        ErrorReport::new(
            ErrorKind::Unknown,
            format!("Unexpected response from the scoring service: {e}"),
        )
    })
}

/// Classifies a request that produced no response.
pub fn classify_transport(error: TransportError, base_url: &str) -> ErrorReport {
    match error {
        TransportError::TimedOut => ErrorReport::timed_out(),
        TransportError::Unreachable(_) => ErrorReport::unreachable(base_url),
        TransportError::Other(message) => ErrorReport::new(
            ErrorKind::Unknown,
            format!("Unable to upload file. {message}"),
        ),
    }
}

fn fallback_message(response: &RawResponse) -> String {
    match response.reason.as_deref() {
        Some(reason) => format!("Server error: {} {reason}", response.status),
        None => format!("Server error: {}", response.status),
    }
}
