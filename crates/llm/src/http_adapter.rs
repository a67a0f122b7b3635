use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use snafu::ResultExt;

use super::provider::{
    BoxFuture, BuildClientSnafu, ChatCapability, ChatReply, ChatRequest, ChatResult, StatusSnafu,
    TransportSnafu,
};

pub const CHAT_ENDPOINT_PATH: &str = "/assistant/chat";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error bodies are kept for diagnostics but not in full.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().to_string(),
            auth_token: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into().trim().to_string();
        self.auth_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            CHAT_ENDPOINT_PATH
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    response: Option<Value>,
}

/// Talks to the backend support endpoint over HTTP.
///
/// The overall deadline belongs to the caller; only connecting is bounded here.
pub struct HttpChatClient {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpChatClient {
    pub fn new(config: ClientConfig) -> ChatResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-chat-client",
            })?;

        Ok(Self {
            endpoint: config.endpoint(),
            auth_token: config.auth_token,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: ChatRequest) -> ChatResult<ChatReply> {
        tracing::debug!(
            endpoint = %self.endpoint,
            context_path = %request.context_path,
            history_len = request.history.len(),
            "sending support chat request"
        );

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.context(TransportSnafu {
            stage: "send-chat-request",
        })?;
        let status = response.status();
        let body = response.text().await.context(TransportSnafu {
            stage: "read-chat-response",
        })?;

        if !status.is_success() {
            return StatusSnafu {
                stage: "chat-http-status",
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>(),
            }
            .fail();
        }

        Ok(decode_reply(&body))
    }
}

impl ChatCapability for HttpChatClient {
    fn chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ChatResult<ChatReply>> {
        Box::pin(self.send(request))
    }
}

/// Decodes a 2xx body. Anything without a usable `response` is `Empty`.
fn decode_reply(body: &str) -> ChatReply {
    let parsed = match serde_json::from_str::<ChatResponseBody>(body) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::warn!(error = %error, "chat response body is not the expected JSON");
            return ChatReply::Empty;
        }
    };

    // `false` and zero count as no answer, like a missing field.
    match parsed.response {
        Some(Value::String(text)) => ChatReply::from_text(text),
        Some(Value::Null | Value::Bool(false)) | None => ChatReply::Empty,
        Some(Value::Number(number)) if number.as_f64() == Some(0.0) => ChatReply::Empty,
        Some(other) => ChatReply::from_text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::{ChatError, HistoryEntry, HistoryRole};

    fn sample_request() -> ChatRequest {
        ChatRequest::new(
            "How do I reset my roadmap?",
            "/roadmap",
            vec![
                HistoryEntry::new(HistoryRole::Assistant, "Hi! How can I help?"),
                HistoryEntry::new(HistoryRole::User, "Where is my profile?"),
            ],
        )
    }

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        assert_eq!(
            ClientConfig::new("https://api.example.com/api/").endpoint(),
            "https://api.example.com/api/assistant/chat"
        );
        assert_eq!(
            ClientConfig::new(" http://localhost:8000/api ").endpoint(),
            "http://localhost:8000/api/assistant/chat"
        );
    }

    #[test]
    fn blank_auth_token_is_dropped() {
        let config = ClientConfig::new("http://localhost").with_auth_token("  ");
        assert_eq!(config.auth_token, None);
    }

    #[test]
    fn decode_reply_handles_missing_and_odd_payloads() {
        assert_eq!(
            decode_reply(r#"{"response":"Open Settings."}"#),
            ChatReply::Answer("Open Settings.".into())
        );
        assert_eq!(decode_reply(r#"{"response":""}"#), ChatReply::Empty);
        assert_eq!(decode_reply(r#"{"response":null}"#), ChatReply::Empty);
        assert_eq!(decode_reply("{}"), ChatReply::Empty);
        assert_eq!(decode_reply("<html>"), ChatReply::Empty);
        assert_eq!(decode_reply(r#"{"response":42}"#), ChatReply::Answer("42".into()));
        assert_eq!(decode_reply(r#"{"response":true}"#), ChatReply::Answer("true".into()));
    }

    #[test]
    fn falsy_responses_count_as_no_answer() {
        assert_eq!(decode_reply(r#"{"response":false}"#), ChatReply::Empty);
        assert_eq!(decode_reply(r#"{"response":0}"#), ChatReply::Empty);
        assert_eq!(decode_reply(r#"{"response":-0.0}"#), ChatReply::Empty);
    }

    #[tokio::test]
    async fn posts_message_context_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/assistant/chat"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_json(json!({
                "message": "How do I reset my roadmap?",
                "context_path": "/roadmap",
                "history": [
                    {"role": "assistant", "content": "Hi! How can I help?"},
                    {"role": "user", "content": "Where is my profile?"}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "Open Roadmap and press Reset."})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpChatClient::new(
            ClientConfig::new(format!("{}/api", server.uri())).with_auth_token("secret-token"),
        )
        .unwrap();
        let reply = client.chat(sample_request()).await.unwrap();

        assert_eq!(reply.answer(), Some("Open Roadmap and press Reset."));
    }

    #[tokio::test]
    async fn blank_response_is_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistant/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "   "})))
            .mount(&server)
            .await;

        let client = HttpChatClient::new(ClientConfig::new(server.uri())).unwrap();
        let reply = client.chat(sample_request()).await.unwrap();

        assert_eq!(reply, ChatReply::Empty);
    }

    #[tokio::test]
    async fn server_error_is_a_status_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistant/chat"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = HttpChatClient::new(ClientConfig::new(server.uri())).unwrap();
        let error = client.chat(sample_request()).await.unwrap_err();

        match error {
            ChatError::Status { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream down");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_a_failure_too() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistant/chat"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Not authenticated"})),
            )
            .mount(&server)
            .await;

        let client = HttpChatClient::new(ClientConfig::new(server.uri())).unwrap();
        let error = client.chat(sample_request()).await.unwrap_err();

        assert!(error.to_string().contains("401"), "{error}");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_failure() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let client = HttpChatClient::new(
            ClientConfig::new(uri).with_connect_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let error = client.chat(sample_request()).await.unwrap_err();

        assert!(
            matches!(error, ChatError::Transport { .. }),
            "expected transport error, got {error:?}"
        );
    }
}
