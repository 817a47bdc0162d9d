//! Adapter contract (C2).
//!
//! An adapter turns one company's career endpoint into zero or more
//! `PostingRaw` rows, driving the `HttpFetcher` itself — StructuredA
//! paginates, AIParsed issues one fetch then an LLM call. It never
//! touches the store or normalizer directly, matching this workspace's
//! `domains::crawler::listing_adapter` split between "extract the raw
//! shape" and "upsert the normalized one".

use async_trait::async_trait;
use thiserror::Error;

use crate::fetcher::{FetchError, HttpFetcher};
use crate::model::{Company, PostingRaw};

#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("page did not match the expected structure: {0}")]
    UnexpectedStructure(String),

    #[error("adapter dependency failed: {0}")]
    DependencyFailed(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[async_trait]
pub trait ListAdapter: Send + Sync {
    /// Lists the postings currently visible at a company's career
    /// endpoint. A page that parses but yields no postings returns
    /// `Ok(vec![])`, not an error — empty results are a signal for the
    /// empty-crawl streak, not a
    /// fetch/adapter failure. Individual malformed postings within an
    /// otherwise-good page are dropped by `normalize`, not by the
    /// adapter.
    async fn list_jobs(
        &self,
        company: &Company,
        fetcher: &dyn HttpFetcher,
    ) -> Result<Vec<PostingRaw>, AdapterError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    /// Returns a fixed set of postings regardless of company or page
    /// content, for orchestrator tests that don't care about
    /// extraction itself.
    pub struct FixedAdapter {
        postings: Vec<PostingRaw>,
    }

    impl FixedAdapter {
        pub fn new(postings: Vec<PostingRaw>) -> Self {
            Self { postings }
        }
    }

    #[async_trait]
    impl ListAdapter for FixedAdapter {
        async fn list_jobs(
            &self,
            _company: &Company,
            _fetcher: &dyn HttpFetcher,
        ) -> Result<Vec<PostingRaw>, AdapterError> {
            Ok(self.postings.clone())
        }
    }

    /// Sleeps before returning a fixed set of postings, for tests that
    /// need a company crawl to still be in flight when something else
    /// happens (e.g. a mid-run cancellation).
    pub struct SlowAdapter {
        delay: std::time::Duration,
        postings: Vec<PostingRaw>,
    }

    impl SlowAdapter {
        pub fn new(delay: std::time::Duration, postings: Vec<PostingRaw>) -> Self {
            Self { delay, postings }
        }
    }

    #[async_trait]
    impl ListAdapter for SlowAdapter {
        async fn list_jobs(
            &self,
            _company: &Company,
            _fetcher: &dyn HttpFetcher,
        ) -> Result<Vec<PostingRaw>, AdapterError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.postings.clone())
        }
    }

    /// Always fails, for testing the "adapter raises" failure path.
    pub struct FailingAdapter {
        message: String,
    }

    impl FailingAdapter {
        pub fn new(message: impl Into<String>) -> Self {
            Self { message: message.into() }
        }
    }

    #[async_trait]
    impl ListAdapter for FailingAdapter {
        async fn list_jobs(
            &self,
            _company: &Company,
            _fetcher: &dyn HttpFetcher,
        ) -> Result<Vec<PostingRaw>, AdapterError> {
            Err(AdapterError::DependencyFailed(self.message.clone()))
        }
    }
}
