//! HTTP Fetcher contract (C1).
//!
//! The concrete implementation (rate limiting, retries, circuit
//! breaker, robots.txt, UA/proxy rotation) lives in `crawl-fetcher`;
//! this crate only defines the seam the orchestrator and adapters
//! program against, the same split as
//! `intelligent_crawler::traits::PageFetcher` vs. its effect impls.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("rate limited locally for host {host}")]
    RateLimitedLocal { host: String },

    #[error("circuit open for host {host}")]
    CircuitOpen { host: String },

    #[error("robots.txt disallows {url}")]
    RobotsDisallow { url: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("http {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },
}

impl FetchError {
    /// Whether the orchestrator's retry loop  should try
    /// this URL again, as opposed to counting it as a terminal failure
    /// for the current company crawl.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetch one URL, applying this host's rate limit, circuit breaker,
    /// and robots.txt policy before issuing the request.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A scripted fetcher: returns canned responses keyed by URL,
    /// recording every call it received. Mirrors the `MockAI`/
    /// `TestJobManager` trait-double convention used throughout this
    /// workspace's test suites.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        responses: HashMap<String, Result<FetchedPage, FetchError>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(mut self, url: impl Into<String>, result: Result<FetchedPage, FetchError>) -> Self {
            self.responses.insert(url.into(), result);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl HttpFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(url.to_string());
            self.responses.get(url).cloned().unwrap_or_else(|| {
                Err(FetchError::MalformedResponse {
                    url: url.to_string(),
                    message: "no scripted response".to_string(),
                })
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_transport_are_retryable() {
        assert!(FetchError::Timeout { url: "x".into() }.is_retryable());
        assert!(FetchError::Transport { url: "x".into(), message: "x".into() }.is_retryable());
    }

    #[test]
    fn server_error_status_is_retryable_client_error_is_not() {
        assert!(FetchError::HttpStatus { url: "x".into(), status: 503 }.is_retryable());
        assert!(!FetchError::HttpStatus { url: "x".into(), status: 404 }.is_retryable());
    }

    #[test]
    fn robots_disallow_and_circuit_open_are_not_retryable() {
        assert!(!FetchError::RobotsDisallow { url: "x".into() }.is_retryable());
        assert!(!FetchError::CircuitOpen { host: "x".into() }.is_retryable());
    }
}
