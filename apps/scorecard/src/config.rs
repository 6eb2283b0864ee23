use std::time::Duration;

use anyhow::{Context, Result};

use crate::controller::DEFAULT_SUBMIT_TIMEOUT;
use crate::notify::DEFAULT_TOAST_DURATION;
use crate::warmup::DEFAULT_WARMUP_BOUND;

/// Default origin of the hosting page when none is configured.
const DEFAULT_PAGE_ORIGIN: &str = "http://localhost:3000";
/// Development frontend port and the backend port it is paired with.
const DEV_FRONTEND_PORT: u16 = 3000;
const DEV_BACKEND_PORT: u16 = 8000;

/// Client configuration loaded from environment variables (and `.env`).
/// Every setting has a default; malformed numbers are a startup error.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub page_origin: String,
    pub submit_timeout: Duration,
    pub warmup_timeout: Duration,
    pub toast_duration: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let page_origin =
            lookup("SCORECARD_PAGE_ORIGIN").unwrap_or_else(|| DEFAULT_PAGE_ORIGIN.to_string());
        let api_override = lookup("SCORECARD_API_URL");

        Ok(Config {
            api_base_url: resolve_base_url(api_override.as_deref(), &page_origin),
            page_origin,
            submit_timeout: Duration::from_secs(parse_or(
                &lookup,
                "SUBMIT_TIMEOUT_SECS",
                DEFAULT_SUBMIT_TIMEOUT.as_secs(),
            )?),
            warmup_timeout: Duration::from_secs(parse_or(
                &lookup,
                "WARMUP_TIMEOUT_SECS",
                DEFAULT_WARMUP_BOUND.as_secs(),
            )?),
            toast_duration: Duration::from_millis(parse_or(
                &lookup,
                "TOAST_DURATION_MS",
                DEFAULT_TOAST_DURATION.as_millis() as u64,
            )?),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Applies a command-line base URL on top of the environment.
    pub fn with_api_override(mut self, api_url: Option<&str>) -> Self {
        if let Some(url) = api_url {
            self.api_base_url = resolve_base_url(Some(url), &self.page_origin);
        }
        self
    }
}

fn parse_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number, got '{raw}'")),
        None => Ok(default),
    }
}

/// Picks the backend base address.
///
/// A non-empty override wins. Otherwise the backend is assumed to live on the
/// page's own origin, except that the development frontend port maps to the
/// development backend port. An empty override means "same origin".
pub fn resolve_base_url(override_url: Option<&str>, page_origin: &str) -> String {
    if let Some(url) = override_url.map(str::trim).filter(|u| !u.is_empty()) {
        return url.trim_end_matches('/').to_string();
    }

    let origin = page_origin.trim().trim_end_matches('/');
    match origin.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>() == Ok(DEV_FRONTEND_PORT) => {
            format!("{host}:{DEV_BACKEND_PORT}")
        }
        _ => origin.to_string(),
    }
}
