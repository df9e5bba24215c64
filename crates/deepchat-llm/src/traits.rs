use crate::error::{ChatError, Result};
use crate::streaming::StreamEvent;
use crate::types::Message;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Trait for chat-completions backends
///
/// Provides both streaming and non-streaming completions.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Non-streaming chat completion
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Streaming chat completion
    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>>;
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: ChatOptions,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// JSON body sent to `/chat/completions`
    pub fn to_payload(&self, stream: bool) -> Result<serde_json::Value> {
        serde_json::to_value(Payload {
            model: &self.model,
            messages: &self.messages,
            stream,
            options: &self.options,
        })
        .map_err(|e| ChatError::Decode(format!("Failed to encode request: {}", e)))
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(flatten)]
    options: &'a ChatOptions,
}

/// Optional sampling parameters. Unset fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
    pub raw: serde_json::Value,
}

impl ChatResponse {
    /// Decode a buffered `/chat/completions` body.
    pub fn from_body(body: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| ChatError::Decode(format!("{}: {}", e, body)))?;

        let parsed: CompletionBody = serde_json::from_value(raw.clone())
            .map_err(|e| ChatError::Decode(format!("{}: {}", e, body)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::MissingContent(format!("no choices in {}", body)))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| ChatError::MissingContent(format!("no message content in {}", body)))?;

        Ok(Self {
            content,
            usage: parsed.usage,
            finish_reason: choice.finish_reason,
            raw,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(rename = "prompt_tokens")]
    pub input_tokens: u32,
    #[serde(rename = "completion_tokens")]
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
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
    content: Option<String>,
}
