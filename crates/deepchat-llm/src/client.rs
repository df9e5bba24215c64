// HTTP client for OpenAI-compatible chat completions (DeepSeek by default)

use crate::config::ClientConfig;
use crate::credential::ApiKey;
use crate::error::{ChatError, Result};
use crate::streaming::{parse_chat_sse_stream, StreamEvent};
use crate::traits::{ChatClient, ChatRequest, ChatResponse};
use async_trait::async_trait;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Response;
use std::pin::Pin;

/// Chat-completions client (HTTP direct, no SDK)
pub struct DeepSeekClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl DeepSeekClient {
    /// Create new client against the default endpoint
    pub fn new(api_key: ApiKey) -> Result<Self> {
        Self::from_config(ClientConfig::new(api_key))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&config.api_key.to_header())
            .map_err(|_| ChatError::Credential("Invalid API key format".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: config.chat_completions_url(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: &ChatRequest, stream: bool) -> Result<Response> {
        let payload = request.to_payload(stream)?;

        tracing::debug!(
            "Sending chat request: model={}, messages={}, stream={}",
            request.model,
            request.messages.len(),
            stream
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Chat API returned {}: {}", status, body);
            return Err(ChatError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for DeepSeekClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = self.post(&request, false).await?.text().await?;
        let response = ChatResponse::from_body(&body)?;

        if let Some(usage) = &response.usage {
            tracing::debug!("Tokens used: {}", usage.total_tokens);
        }

        Ok(response)
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        let response = self.post(&request, true).await?;
        Ok(parse_chat_sse_stream(response))
    }
}
