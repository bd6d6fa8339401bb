//! OpenAI-compatible chat-completions client. Works against any provider
//! exposing the `/chat/completions` shape, including local Ollama.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use docent_core::config::LlmConfig;
use docent_engine::llm::{CompletionRequest, LlmClient};

pub struct OpenAiCompatibleLlm {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiCompatibleLlm {
    pub fn new(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let messages = request
            .messages
            .iter()
            .map(|message| {
                serde_json::json!({
                    "role": message.role.as_str(),
                    "content": message.content,
                })
            })
            .collect::<Vec<_>>();

        let payload = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let mut http_request =
            self.http.post(format!("{}/chat/completions", self.base_url)).json(&payload);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key.expose_secret());
        }

        let response = http_request.send().await.context("llm request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("llm returned status {status}");
        }

        let body: ChatCompletionResponse =
            response.json().await.context("llm response decode failed")?;
        Ok(completion_text(body))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

/// First choice's content, or empty when the provider returned none. The
/// generator treats empty as its fallback trigger.
fn completion_text(body: ChatCompletionResponse) -> String {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .map(|message| message.content)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{completion_text, ChatCompletionResponse};

    #[test]
    fn first_choice_content_is_extracted() {
        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "the answer"}}]}"#,
        )
        .expect("decode");

        assert_eq!(completion_text(body), "the answer");
    }

    #[test]
    fn empty_choices_become_empty_text() {
        let body: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).expect("decode");
        assert_eq!(completion_text(body), "");

        let body: ChatCompletionResponse = serde_json::from_str("{}").expect("decode");
        assert_eq!(completion_text(body), "");
    }

    #[test]
    fn missing_message_is_tolerated() {
        let body: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"finish_reason": "stop"}]}"#).expect("decode");
        assert_eq!(completion_text(body), "");
    }
}
