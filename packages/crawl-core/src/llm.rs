//! LLM contract shared by the AIParsed adapter (C2) and the Ranker
//! (C5) — both need "send a prompt, get structured output back", so
//! they share one trait rather than each wrapping `openai-client`
//! directly. Mirrors `kernel::traits::BaseAI`'s shape.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("llm request timed out")]
    Timeout,

    #[error("llm transport error: {0}")]
    Transport(String),

    #[error("llm returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("llm rate limited: {0}")]
    RateLimited(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `prompt` and return the raw text completion. Callers are
    /// responsible for parsing structured output out of the response —
    /// both the AIParsed adapter and the ranker expect strict JSON and
    /// handle parse failure locally rather than pushing parsing into
    /// this trait.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies with a fixed queue of canned completions, in order. The
    /// AIParsed adapter and ranker tests both drive this the same way
    /// `kernel::ai_matching`'s tests drive `MockAI`.
    #[derive(Default)]
    pub struct ScriptedLlmClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts_seen: Mutex<Vec<String>>,
    }

    impl ScriptedLlmClient {
        pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts_seen: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts_seen(&self) -> Vec<String> {
            self.prompts_seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts_seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(prompt.to_string());
            self.replies
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::MalformedOutput("no scripted reply left".into())))
        }
    }
}
