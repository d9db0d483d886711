// HTTP client for the chat endpoints of the RagChat backend

use async_trait::async_trait;
use ragchat_types::{ChatQuery, ChatReply};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Response;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::buffer_utils::parse_sse_stream;
use crate::error::{Result, StreamError};
use crate::streaming::ChatStream;
use crate::traits::ChatTransport;

/// Streaming chat client (HTTP direct)
///
/// One call to [`StreamingChatClient::stream_chat`] issues one POST and reads the
/// response body incrementally. There is no retry at this layer: issue a fresh call.
#[derive(Debug, Clone)]
pub struct StreamingChatClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl StreamingChatClient {
    /// Create a client for the backend at `base_url` with default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    pub fn builder() -> StreamingChatClientBuilder {
        StreamingChatClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs are used as-is; paths are joined to the base URL
    pub fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Open a streaming request and return its events lazily
    ///
    /// A non-2xx status is reported here, before any body is read as SSE.
    pub async fn stream_chat<P>(&self, endpoint: &str, payload: &P) -> Result<ChatStream>
    where
        P: Serialize + ?Sized,
    {
        let url = self.resolve(endpoint);
        tracing::debug!(url = %url, "Opening chat stream");

        let response = self
            .http_client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(payload)
            .send()
            .await?;

        let response = Self::check_status(response).await?;

        Ok(ChatStream::new(parse_sse_stream(response.bytes_stream())))
    }

    /// `POST /conversations/{id}/chat/stream`
    pub async fn stream_conversation(
        &self,
        conversation_id: i64,
        query: &ChatQuery,
    ) -> Result<ChatStream> {
        self.stream_chat(&format!("/conversations/{}/chat/stream", conversation_id), query)
            .await
    }

    /// `POST /conversations/{id}/chat`, the non-streaming fallback
    pub async fn chat(&self, conversation_id: i64, query: &ChatQuery) -> Result<ChatReply> {
        let url = self.resolve(&format!("/conversations/{}/chat", conversation_id));

        let response = self.http_client.post(&url).json(query).send().await?;
        let response = Self::check_status(response).await?;

        response
            .json::<ChatReply>()
            .await
            .map_err(|e| StreamError::InvalidBody(e.to_string()))
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body);
        tracing::warn!(status = status.as_u16(), "Chat request rejected: {}", detail);

        Err(StreamError::Http {
            status: status.as_u16(),
            detail,
        })
    }
}

/// Structured `{"detail": ...}` bodies are unwrapped; anything else is returned verbatim
pub fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(obj)) => match obj.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.trim().to_string(),
        },
        _ => body.trim().to_string(),
    }
}

#[async_trait]
impl ChatTransport for StreamingChatClient {
    async fn chat(&self, conversation_id: i64, query: &ChatQuery) -> Result<ChatReply> {
        StreamingChatClient::chat(self, conversation_id, query).await
    }

    async fn chat_stream(&self, conversation_id: i64, query: &ChatQuery) -> Result<ChatStream> {
        self.stream_conversation(conversation_id, query).await
    }
}

#[derive(Default)]
pub struct StreamingChatClientBuilder {
    base_url: Option<String>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl StreamingChatClientBuilder {
    /// Backend origin, e.g. "http://localhost:8000/api"
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Connection-level timeout; chat generation itself is never bounded
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn build(self) -> Result<StreamingChatClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| StreamError::Config("Base URL is required".to_string()))?;

        // Remove trailing slash from base URL
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StreamError::Config("Base URL is required".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        let http_client = builder
            .build()
            .map_err(|e| StreamError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(StreamingChatClient {
            http_client,
            base_url,
        })
    }
}
