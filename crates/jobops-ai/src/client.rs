//! LLM client: a provider-agnostic trait (`LlmClient`) plus an HTTP
//! implementation supporting OpenAI- and Anthropic-shaped chat APIs,
//! generalized from a single-provider client into a capability interface
//! per the redesign notes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AiError;

#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub content: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<LlmCompletion, AiError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub enum LlmProvider {
    OpenAI { api_key: String, model: String, base_url: String },
    Anthropic { api_key: String, model: String },
}

#[derive(Debug)]
pub struct HttpLlmClient {
    provider: LlmProvider,
    client: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(provider: LlmProvider) -> Self {
        Self { provider, client: reqwest::Client::new() }
    }

    pub fn from_env() -> Result<Self, AiError> {
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            let base_url = std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| "https://api.openai.com".to_string());
            Ok(Self::new(LlmProvider::OpenAI { api_key, model, base_url }))
        } else if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string());
            Ok(Self::new(LlmProvider::Anthropic { api_key, model }))
        } else {
            Err(AiError::ProviderUnavailable("no OPENAI_API_KEY or ANTHROPIC_API_KEY set".into()))
        }
    }

    async fn call_openai(
        &self,
        api_key: &str,
        model: &str,
        base_url: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmCompletion, AiError> {
        #[derive(Serialize)]
        struct Request {
            model: String,
            messages: Vec<Message>,
            temperature: f32,
            response_format: ResponseFormat,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: String,
        }
        #[derive(Serialize)]
        struct Message {
            role: String,
            content: String,
        }
        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
            usage: Option<Usage>,
        }
        #[derive(Deserialize)]
        struct Usage {
            prompt_tokens: u32,
            completion_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: MessageContent,
        }
        #[derive(Deserialize)]
        struct MessageContent {
            content: String,
        }

        let request = Request {
            model: model.to_string(),
            messages: vec![
                Message { role: "system".to_string(), content: system_prompt.to_string() },
                Message { role: "user".to_string(), content: user_prompt.to_string() },
            ],
            temperature: 0.1,
            response_format: ResponseFormat { kind: "json_object".to_string() },
        };

        debug!(base_url, model, "calling OpenAI-compatible API");

        let response = self
            .client
            .post(format!("{base_url}/v1/chat/completions"))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Http(format!("OpenAI API error ({status}): {body}")));
        }

        let response: Response = response.json().await.map_err(|e| AiError::Parse(e.to_string()))?;
        let content = response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| AiError::Parse("no choices in OpenAI response".into()))?;

        info!("received OpenAI response");
        Ok(LlmCompletion {
            content,
            tokens_in: response.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
            tokens_out: response.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        })
    }

    async fn call_anthropic(&self, api_key: &str, model: &str, system_prompt: &str, user_prompt: &str) -> Result<LlmCompletion, AiError> {
        #[derive(Serialize)]
        struct Request {
            model: String,
            max_tokens: u32,
            system: String,
            messages: Vec<Message>,
        }
        #[derive(Serialize)]
        struct Message {
            role: String,
            content: String,
        }
        #[derive(Deserialize)]
        struct Response {
            content: Vec<Content>,
            usage: Option<Usage>,
        }
        #[derive(Deserialize)]
        struct Usage {
            input_tokens: u32,
            output_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Content {
            text: String,
        }

        let request = Request {
            model: model.to_string(),
            max_tokens: 4096,
            system: system_prompt.to_string(),
            messages: vec![Message { role: "user".to_string(), content: user_prompt.to_string() }],
        };

        debug!(model, "calling Anthropic API");

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Http(format!("Anthropic API error ({status}): {body}")));
        }

        let response: Response = response.json().await.map_err(|e| AiError::Parse(e.to_string()))?;
        let content = response
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| AiError::Parse("no content in Anthropic response".into()))?;

        info!("received Anthropic response");
        Ok(LlmCompletion {
            content,
            tokens_in: response.usage.as_ref().map(|u| u.input_tokens).unwrap_or(0),
            tokens_out: response.usage.as_ref().map(|u| u.output_tokens).unwrap_or(0),
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<LlmCompletion, AiError> {
        match &self.provider {
            LlmProvider::OpenAI { api_key, model, base_url } => self.call_openai(api_key, model, base_url, system_prompt, user_prompt).await,
            LlmProvider::Anthropic { api_key, model } => self.call_anthropic(api_key, model, system_prompt, user_prompt).await,
        }
    }

    fn model_name(&self) -> &str {
        match &self.provider {
            LlmProvider::OpenAI { model, .. } => model,
            LlmProvider::Anthropic { model, .. } => model,
        }
    }
}

/// Scripted client for tests; returns canned completions in order.
pub struct MockLlmClient {
    pub responses: std::sync::Mutex<Vec<Result<LlmCompletion, AiError>>>,
    pub model: String,
}

impl MockLlmClient {
    pub fn new(responses: Vec<Result<LlmCompletion, AiError>>) -> Self {
        Self { responses: std::sync::Mutex::new(responses), model: "mock-model".to_string() }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<LlmCompletion, AiError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(AiError::ProviderUnavailable("mock client exhausted".into()));
        }
        responses.remove(0)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_scripted_completions_in_order() {
        let client = MockLlmClient::new(vec![
            Ok(LlmCompletion { content: "first".into(), tokens_in: 1, tokens_out: 1 }),
            Ok(LlmCompletion { content: "second".into(), tokens_in: 2, tokens_out: 2 }),
        ]);
        let first = client.complete("sys", "user").await.unwrap();
        assert_eq!(first.content, "first");
        let second = client.complete("sys", "user").await.unwrap();
        assert_eq!(second.content, "second");
    }

    #[tokio::test]
    async fn mock_client_errors_when_exhausted() {
        let client = MockLlmClient::new(vec![]);
        assert!(client.complete("sys", "user").await.is_err());
    }

    #[test]
    fn from_env_errors_without_keys() {
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("ANTHROPIC_API_KEY");
        assert!(HttpLlmClient::from_env().is_err());
    }
}
