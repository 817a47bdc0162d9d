//! Adapts `openai_client::OpenAIClient` to `crawl_core::llm::LlmClient`
//! so the ranker and the AIParsed adapter depend only on the trait,
//! never on the concrete OpenAI wiring.

use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient};

use crawl_core::llm::{LlmClient, LlmError};

pub struct OpenAiLlmClient {
    client: OpenAIClient,
    model: String,
}

impl OpenAiLlmClient {
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(self.model.clone())
            .message(Message::user(prompt))
            .temperature(0.0);

        let response = self.client.chat_completion(request).await.map_err(|e| match e {
            openai_client::OpenAIError::Network(msg) => LlmError::Transport(msg),
            openai_client::OpenAIError::Api(msg) if msg.to_lowercase().contains("rate limit") => {
                LlmError::RateLimited(msg)
            }
            openai_client::OpenAIError::Api(msg) => LlmError::Transport(msg),
            openai_client::OpenAIError::Parse(msg) => LlmError::MalformedOutput(msg),
            openai_client::OpenAIError::Config(msg) => LlmError::Transport(msg),
        })?;

        Ok(response.content)
    }
}
