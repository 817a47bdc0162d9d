//! LLM-backed `Ranker` implementation. Wraps any
//! `crawl_core::llm::LlmClient`, composes a deterministic prompt,
//! enforces the call timeout, parses the model's JSON strictly, and
//! applies the `recommend_threshold` override. Never fails: any
//! timeout or parse error degrades to a neutral annotation and the
//! caller sees that via telemetry, not an error return, per the
//! `Ranker` trait's infallible contract.

mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crawl_core::llm::LlmClient;
use crawl_core::model::{AiAnnotation, Job, UserProfileSnapshot};
use crawl_core::ranker::Ranker;

#[derive(Debug, Deserialize)]
struct RankerResponse {
    score: i32,
    recommended: bool,
    summary: String,
    #[serde(default)]
    pros: Vec<String>,
    #[serde(default)]
    cons: Vec<String>,
    #[serde(default)]
    keywords_matched: Vec<String>,
}

pub struct LlmRanker {
    client: std::sync::Arc<dyn LlmClient>,
    timeout: Duration,
    recommend_threshold: i32,
}

impl LlmRanker {
    pub fn new(client: std::sync::Arc<dyn LlmClient>, timeout: Duration, recommend_threshold: i32) -> Self {
        Self { client, timeout, recommend_threshold }
    }
}

fn parse_response(raw: &str) -> Result<RankerResponse, serde_json::Error> {
    let trimmed = raw.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    serde_json::from_str(trimmed.trim())
}

#[async_trait]
impl Ranker for LlmRanker {
    async fn rank(&self, profile: &UserProfileSnapshot, job: &Job) -> AiAnnotation {
        let request_prompt = prompt::compose(profile, job);

        let completion = match tokio::time::timeout(self.timeout, self.client.complete(&request_prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(job_id = %job.id, error = %e, "ranker: llm call failed, using neutral annotation");
                return AiAnnotation::neutral("unavailable");
            }
            Err(_) => {
                warn!(job_id = %job.id, timeout_ms = self.timeout.as_millis(), "ranker: llm call timed out, using neutral annotation");
                return AiAnnotation::neutral("unavailable");
            }
        };

        let parsed = match parse_response(&completion) {
            Ok(p) => p,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "ranker: malformed llm output, using neutral annotation");
                return AiAnnotation::neutral("unavailable");
            }
        };

        let recommended = parsed.recommended && parsed.score >= self.recommend_threshold;

        let mut annotation = AiAnnotation {
            match_score: Some(parsed.score),
            recommended,
            summary: Some(parsed.summary),
            pros: parsed.pros,
            cons: parsed.cons,
            matched_keywords: parsed.keywords_matched,
            rank: None,
            recommended_on: if recommended { Some(chrono::Utc::now()) } else { None },
        };
        annotation.enforce_invariant();
        annotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawl_core::llm::test_util::ScriptedLlmClient;
    use crawl_core::llm::LlmError;
    use crawl_core::model::{JobUserStatus, PipelineStage, UserProfile};
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    fn sample_job() -> Job {
        Job {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            external_id: None,
            canonical_url: "https://x.com/1".to_string(),
            title: "Backend Engineer".to_string(),
            location: Some("Remote".to_string()),
            description: "Build APIs in Rust".to_string(),
            posted_at: None,
            discovered_at: Utc::now(),
            status: JobUserStatus::New,
            stage: PipelineStage::Discover,
            ai: AiAnnotation::neutral("unranked"),
        }
    }

    #[tokio::test]
    async fn well_formed_response_is_parsed() {
        let reply = r#"{"score": 85, "recommended": true, "summary": "great fit", "pros": ["rust"], "cons": [], "keywords_matched": ["rust"]}"#;
        let client = Arc::new(ScriptedLlmClient::new(vec![Ok(reply.to_string())]));
        let ranker = LlmRanker::new(client, Duration::from_secs(5), 60);
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());

        let annotation = ranker.rank(&profile, &sample_job()).await;
        assert_eq!(annotation.match_score, Some(85));
        assert!(annotation.recommended);
        assert_eq!(annotation.summary.as_deref(), Some("great fit"));
    }

    #[tokio::test]
    async fn score_below_threshold_overrides_recommended_to_false() {
        let reply = r#"{"score": 40, "recommended": true, "summary": "meh", "pros": [], "cons": [], "keywords_matched": []}"#;
        let client = Arc::new(ScriptedLlmClient::new(vec![Ok(reply.to_string())]));
        let ranker = LlmRanker::new(client, Duration::from_secs(5), 60);
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());

        let annotation = ranker.rank(&profile, &sample_job()).await;
        assert_eq!(annotation.match_score, Some(40));
        assert!(!annotation.recommended);
    }

    #[tokio::test]
    async fn malformed_response_falls_back_to_neutral() {
        let client = Arc::new(ScriptedLlmClient::new(vec![Ok("not json".to_string())]));
        let ranker = LlmRanker::new(client, Duration::from_secs(5), 60);
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());

        let annotation = ranker.rank(&profile, &sample_job()).await;
        assert!(annotation.match_score.is_none());
        assert!(!annotation.recommended);
        assert_eq!(annotation.summary.as_deref(), Some("unavailable"));
    }

    #[tokio::test]
    async fn llm_error_falls_back_to_neutral() {
        let client = Arc::new(ScriptedLlmClient::new(vec![Err(LlmError::Transport("boom".to_string()))]));
        let ranker = LlmRanker::new(client, Duration::from_secs(5), 60);
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());

        let annotation = ranker.rank(&profile, &sample_job()).await;
        assert!(annotation.match_score.is_none());
        assert_eq!(annotation.summary.as_deref(), Some("unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_response_times_out_to_neutral() {
        struct SlowClient;

        #[async_trait]
        impl LlmClient for SlowClient {
            async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok("{}".to_string())
            }
        }

        let ranker = LlmRanker::new(Arc::new(SlowClient), Duration::from_millis(50), 60);
        let profile: UserProfileSnapshot = Arc::new(UserProfile::default());

        let annotation = ranker.rank(&profile, &sample_job()).await;
        assert!(annotation.match_score.is_none());
        assert_eq!(annotation.summary.as_deref(), Some("unavailable"));
    }
}
