use async_trait::async_trait;
use atelier_config::AppConfig;
use atelier_models::ai::ChatMessage;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::errors::PortalError;

#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub response_text: String,
    pub tokens_used: i64,
}

/// Seam for the model provider behind the portal's AI assistant.
#[async_trait]
pub trait InferenceRunner: Send + Sync {
    async fn run(&self, model: &str, messages: &[ChatMessage])
        -> Result<InferenceOutput, PortalError>;
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct CompletionUsage {
    #[serde(default)]
    total_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: CompletionUsage,
}

/// OpenAI-compatible chat completions client.
pub struct ChatCompletionsClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(client: Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.http_client.clone(),
            config.inference_api_url.clone(),
            config.inference_api_key.clone(),
        )
    }
}

#[async_trait]
impl InferenceRunner for ChatCompletionsClient {
    async fn run(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<InferenceOutput, PortalError> {
        let body = json!({
            "model": model,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(PortalError::Dependency(format!(
                "Model request failed: {}",
                error_text
            )));
        }

        let completion: CompletionResponse = response.json().await?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| PortalError::Dependency("Model returned no choices".to_string()))?;

        Ok(InferenceOutput {
            response_text: reply,
            tokens_used: completion.usage.total_tokens,
        })
    }
}
