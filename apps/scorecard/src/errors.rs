use std::fmt;

use thiserror::Error;

pub const RATE_LIMITED_MESSAGE: &str =
    "Too many requests. Please wait a moment before trying again.";

pub const TIMED_OUT_MESSAGE: &str = "The scoring request timed out. \
    The first request after the backend starts can take 5-15 minutes while the model loads. \
    Wait until the backend reports it is ready, then submit again.";

/// Classification of a failed submission attempt.
/// Every variant terminates at the controller as a `Failed` state (or, for
/// `Validation`, a rejected submit) and is shown to the user as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local form check failed; never reaches the network.
    Validation,
    ServerError(u16),
    RateLimited,
    NetworkUnreachable,
    TimedOut,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation error"),
            ErrorKind::ServerError(status) => write!(f, "server error ({status})"),
            ErrorKind::RateLimited => write!(f, "rate limited"),
            ErrorKind::NetworkUnreachable => write!(f, "network unreachable"),
            ErrorKind::TimedOut => write!(f, "timed out"),
            ErrorKind::Unknown => write!(f, "unknown error"),
        }
    }
}

/// Extra information attached to an error body by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detail {
    Text(String),
    Items(Vec<String>),
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detail::Text(text) => f.write_str(text),
            Detail::Items(items) => f.write_str(&items.join("; ")),
        }
    }
}

/// A classified, user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<Detail>,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Option<Detail>) -> Self {
        self.detail = detail;
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn rate_limited() -> Self {
        Self::new(ErrorKind::RateLimited, RATE_LIMITED_MESSAGE)
    }

    pub fn timed_out() -> Self {
        Self::new(ErrorKind::TimedOut, TIMED_OUT_MESSAGE)
    }

    pub fn unreachable(base_url: &str) -> Self {
        Self::new(
            ErrorKind::NetworkUnreachable,
            format!(
                "Could not reach the scoring service at {base_url}. \
                 Check that the backend is running and reachable, \
                 for example by opening {base_url}/health."
            ),
        )
    }

    /// Message and detail as a single line of display text.
    pub fn display_text(&self) -> String {
        match &self.detail {
            Some(detail) => format!("Error: {}\nDetails: {detail}", self.message),
            None => format!("Error: {}", self.message),
        }
    }
}

/// Form mutation attempted while a submission is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("The form is locked while a submission is in progress")]
pub struct FormLocked;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_items_joined_into_one_string() {
        let detail = Detail::Items(vec!["field required".to_string(), "bad type".to_string()]);
        assert_eq!(detail.to_string(), "field required; bad type");
    }

    #[test]
    fn test_display_text_includes_detail_line() {
        let report = ErrorReport::new(ErrorKind::ServerError(500), "Failed to process resume")
            .with_detail(Some(Detail::Text("bad pdf".to_string())));
        assert_eq!(
            report.display_text(),
            "Error: Failed to process resume\nDetails: bad pdf"
        );
    }

    #[test]
    fn test_unreachable_mentions_health_path() {
        let report = ErrorReport::unreachable("http://localhost:8000");
        assert_eq!(report.kind, ErrorKind::NetworkUnreachable);
        assert!(report.message.contains("http://localhost:8000/health"));
    }

    #[test]
    fn test_timed_out_mentions_cold_start() {
        let report = ErrorReport::timed_out();
        assert!(report.message.contains("5-15 minutes"));
        assert!(report.message.contains("ready"));
    }
}
