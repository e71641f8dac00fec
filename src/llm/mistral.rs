//! Mistral API provider.
//!
//! Calls `POST {endpoint}/chat/completions` with bearer authentication and
//! a non-streaming request. Two transports share the same wire types:
//! - `reqwest::Client` for [`ChatClient::ainvoke`].
//! - `reqwest::blocking::Client` for [`ChatClient::invoke`], created on the
//!   first blocking call so async-only users never spawn its worker thread.
//!
//! Response `content` comes either as a plain string or, for newer models,
//! as an array of typed chunks; only `text` chunks are kept.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::client::{ChatClient, ClientFactory};
use super::{ChatResponse, Message};
use crate::config::MistralConfig;
use crate::error::MistralError;

// ── Mistral API request types ────────────────────────────

/// `/chat/completions` request body.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

// ── Mistral API response types ───────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseContent {
    Text(String),
    Chunks(Vec<ContentChunk>),
}

#[derive(Debug, Deserialize)]
struct ContentChunk {
    #[serde(rename = "type")]
    chunk_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ResponseContent {
    fn into_text(self) -> String {
        match self {
            ResponseContent::Text(text) => text,
            ResponseContent::Chunks(chunks) => chunks
                .into_iter()
                .filter(|c| c.chunk_type == "text")
                .filter_map(|c| c.text)
                .collect(),
        }
    }
}

// ── MistralClient ───────────────────────────────────────

/// Client for the Mistral chat-completion API.
pub struct MistralClient {
    client: Client,
    blocking: OnceLock<reqwest::blocking::Client>,
    config: MistralConfig,
    url: String,
}

impl MistralClient {
    /// Creates a client for `config.endpoint`.
    ///
    /// Fails only if the HTTP stack cannot be initialized.
    pub fn new(config: MistralConfig) -> Result<Self, MistralError> {
        let client = Client::builder().build()?;
        // Strip trailing slash for consistent URL construction
        let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));
        Ok(Self {
            client,
            blocking: OnceLock::new(),
            config,
            url,
        })
    }

    fn blocking_client(&self) -> Result<&reqwest::blocking::Client, MistralError> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(self.blocking.get_or_init(|| client))
    }

    fn request_body<'a>(&'a self, messages: &'a [Message]) -> ChatCompletionRequest<'a> {
        debug!(
            "Calling Mistral API ({}) with {} messages",
            self.config.model_name,
            messages.len()
        );
        ChatCompletionRequest {
            model: &self.config.model_name,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        }
    }

    async fn send(&self, messages: &[Message]) -> Result<ChatResponse, MistralError> {
        let request = self.request_body(messages);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MistralError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let resp: ChatCompletionResponse = response.json().await?;
        finish(resp)
    }

    fn send_blocking(&self, messages: &[Message]) -> Result<ChatResponse, MistralError> {
        let request = self.request_body(messages);

        let response = self
            .blocking_client()?
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MistralError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let resp: ChatCompletionResponse = response.json()?;
        finish(resp)
    }
}

/// Normalizes a decoded response into a [`ChatResponse`].
fn finish(resp: ChatCompletionResponse) -> Result<ChatResponse, MistralError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(MistralError::EmptyResponse)?;

    let content = choice
        .message
        .content
        .map(ResponseContent::into_text)
        .unwrap_or_default();
    if content.is_empty() {
        warn!("Mistral returned an empty message (finish_reason: {:?})", choice.finish_reason);
    }

    let (input_tokens, output_tokens) = resp
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    info!("LLM response: {input_tokens} in / {output_tokens} out tokens");

    Ok(ChatResponse {
        content,
        model: resp.model,
        finish_reason: choice.finish_reason,
        input_tokens,
        output_tokens,
    })
}

#[async_trait]
impl ChatClient for MistralClient {
    fn invoke(&self, messages: &[Message]) -> Result<ChatResponse> {
        Ok(self.send_blocking(messages)?)
    }

    async fn ainvoke(&self, messages: &[Message]) -> Result<ChatResponse> {
        Ok(self.send(messages).await?)
    }

    fn description(&self) -> String {
        format!("mistral ({})", self.config.model_name)
    }
}

/// Builds a [`MistralClient`] for each configuration it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct MistralClientFactory;

impl ClientFactory for MistralClientFactory {
    fn build(&self, config: &MistralConfig) -> Result<Arc<dyn ChatClient>> {
        Ok(Arc::new(MistralClient::new(config.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(config: MistralConfig) -> MistralClient {
        MistralClient::new(config).unwrap()
    }

    // ── Construction ─────────────────────────────────────

    #[test]
    fn test_description() {
        let c = client(MistralConfig::new("k").with_model("mistral-small-latest"));
        assert_eq!(c.description(), "mistral (mistral-small-latest)");
    }

    #[test]
    fn test_url_from_endpoint() {
        let c = client(MistralConfig::new("k"));
        assert_eq!(c.url, "https://api.mistral.ai/v1/chat/completions");

        // Trailing slash should be stripped
        let c = client(MistralConfig::new("k").with_endpoint("http://localhost:8080/v1/"));
        assert_eq!(c.url, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_blocking_client_is_lazy() {
        let c = client(MistralConfig::new("k"));
        assert!(c.blocking.get().is_none());
    }

    #[test]
    fn test_factory_builds_client() {
        let handle = MistralClientFactory.build(&MistralConfig::new("k")).unwrap();
        assert_eq!(handle.description(), "mistral (mistral-large-latest)");
    }

    // ── Request serialization ────────────────────────────

    #[test]
    fn test_request_serialization() {
        let c = client(MistralConfig::new("k"));
        let messages = vec![Message::human("Hello")];
        let json = serde_json::to_value(c.request_body(&messages)).unwrap();
        assert_eq!(json["model"], "mistral-large-latest");
        assert_eq!(json["temperature"], 0.1);
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_request_serialization_with_max_tokens() {
        let c = client(MistralConfig::new("k").with_max_tokens(128));
        let json = serde_json::to_value(c.request_body(&[])).unwrap();
        assert_eq!(json["max_tokens"], 128);
    }

    // ── Response parsing ─────────────────────────────────

    fn parse(json: &str) -> Result<ChatResponse, MistralError> {
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        finish(resp)
    }

    #[test]
    fn test_response_parsing_text() {
        let resp = parse(
            r#"{
                "id": "cmpl-1",
                "object": "chat.completion",
                "model": "mistral-large-latest",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Bonjour!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            }"#,
        )
        .unwrap();
        assert_eq!(resp.content, "Bonjour!");
        assert_eq!(resp.model, "mistral-large-latest");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.input_tokens, 12);
        assert_eq!(resp.output_tokens, 3);
    }

    #[test]
    fn test_response_parsing_chunks() {
        let resp = parse(
            r#"{
                "model": "magistral-medium-latest",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": [
                            {"type": "thinking", "thinking": [{"type": "text", "text": "hmm"}]},
                            {"type": "text", "text": "The answer "},
                            {"type": "text", "text": "is 42."}
                        ]
                    },
                    "finish_reason": "stop"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(resp.content, "The answer is 42.");
        assert_eq!(resp.input_tokens, 0);
    }

    #[test]
    fn test_response_parsing_null_content() {
        let resp = parse(
            r#"{
                "model": "m",
                "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "length"}]
            }"#,
        )
        .unwrap();
        assert_eq!(resp.content, "");
        assert_eq!(resp.finish_reason.as_deref(), Some("length"));
    }

    #[test]
    fn test_response_without_choices() {
        let err = parse(r#"{"model": "m", "choices": []}"#).unwrap_err();
        assert!(matches!(err, MistralError::EmptyResponse));
    }
}
