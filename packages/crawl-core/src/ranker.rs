//! Ranker contract (C5).
//!
//! The orchestrator only ever sees this trait, never `LlmClient`
//! directly: prompt composition, strict JSON parsing, the
//! recommend-threshold override, and the neutral-annotation fallback
//! all live in the implementation (`crawl-ranker`). Ranker failures
//! never propagate — `rank` is infallible and always returns an
//! `AiAnnotation`, falling back to `AiAnnotation::neutral` itself when
//! the underlying LLM call fails or parses badly.

use async_trait::async_trait;

use crate::model::{AiAnnotation, Job, UserProfileSnapshot};

#[async_trait]
pub trait Ranker: Send + Sync {
    async fn rank(&self, profile: &UserProfileSnapshot, job: &Job) -> AiAnnotation;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    /// Scores every job the same way, for orchestrator tests that
    /// only care that ranking happened, not what it produced.
    pub struct FixedRanker {
        annotation: AiAnnotation,
    }

    impl FixedRanker {
        pub fn new(annotation: AiAnnotation) -> Self {
            Self { annotation }
        }

        pub fn recommended(match_score: i32) -> Self {
            Self::new(AiAnnotation {
                match_score: Some(match_score),
                recommended: true,
                summary: Some("good fit".to_string()),
                pros: vec!["matches skills".to_string()],
                cons: vec![],
                matched_keywords: vec![],
                rank: Some(1),
                recommended_on: Some(chrono::Utc::now()),
            })
        }
    }

    #[async_trait]
    impl Ranker for FixedRanker {
        async fn rank(&self, _profile: &UserProfileSnapshot, _job: &Job) -> AiAnnotation {
            self.annotation.clone()
        }
    }
}
