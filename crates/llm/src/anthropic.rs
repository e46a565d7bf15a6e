//! Anthropic Messages API adapter.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{LlmClient, LlmClientFactory, LlmError, LlmResponse, Message, ModelName, Usage};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Settings for [`AnthropicFactory`].
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Model to request.
    pub model: ModelName,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// API root, without the `/v1/messages` path.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl AnthropicConfig {
    /// Default API root.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-5";
    /// Default API key variable.
    pub const DEFAULT_API_KEY_ENV: &'static str = "ANTHROPIC_API_KEY";

    /// Creates a config for `model` with default limits and endpoint.
    pub fn new(model: ModelName) -> Self {
        Self {
            model,
            max_tokens: 1024,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            api_key_env: Self::DEFAULT_API_KEY_ENV.to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Produces [`AnthropicClient`]s sharing one HTTP connection pool.
///
/// The API key is read from [`AnthropicConfig::api_key_env`] on every
/// [`LlmClientFactory::create`], so a missing key surfaces as a node failure
/// rather than a startup failure.
pub struct AnthropicFactory {
    config: AnthropicConfig,
    http: reqwest::Client,
}

impl AnthropicFactory {
    /// Builds the factory and its HTTP client.
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration {
                message: format!("HTTP client could not be built: {e}"),
            })?;
        Ok(Self { config, http })
    }
}

impl LlmClientFactory for AnthropicFactory {
    fn create(&self) -> Result<Box<dyn LlmClient>, LlmError> {
        let api_key = std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Configuration {
                message: format!("{} is not set", self.config.api_key_env),
            })?;

        tracing::debug!(model = %self.config.model, "Created Anthropic client");
        Ok(Box::new(AnthropicClient {
            http: self.http.clone(),
            config: self.config.clone(),
            api_key,
        }))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// One authenticated Anthropic client.
pub struct AnthropicClient {
    http: reqwest::Client,
    config: AnthropicConfig,
    api_key: String,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, LlmError> {
        let request = build_request(&self.config, messages);
        let url = self.config.messages_url();
        tracing::debug!(%url, model = %self.config.model, "Sending Anthropic request");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), retry_after, &body));
        }

        let body: MessagesResponse = response.json().await.map_err(|e| LlmError::InvalidResponse {
            message: e.to_string(),
        })?;
        into_llm_response(body)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// System messages go to the top-level `system` field (joined by blank
/// lines); the rest keep their order as `user` / `assistant` turns.
fn build_request<'a>(config: &'a AnthropicConfig, messages: &'a [Message]) -> MessagesRequest<'a> {
    let mut system = Vec::new();
    let mut turns = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            Message::System(text) => system.push(text.as_str()),
            Message::Human(text) => turns.push(WireMessage {
                role: "user",
                content: text,
            }),
            Message::Ai(text) => turns.push(WireMessage {
                role: "assistant",
                content: text,
            }),
        }
    }

    MessagesRequest {
        model: config.model.as_str(),
        max_tokens: config.max_tokens,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages: turns,
    }
}

fn into_llm_response(body: MessagesResponse) -> Result<LlmResponse, LlmError> {
    let content: String = body
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect();

    if content.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let mut response = LlmResponse::new(content);
    if let Some(usage) = body.usage {
        response = response.with_usage(Usage::new(usage.input_tokens, usage.output_tokens));
    }
    Ok(response)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn status_error(status: u16, retry_after: Option<Duration>, body: &str) -> LlmError {
    if status == 429 {
        return LlmError::RateLimited { retry_after };
    }
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    LlmError::Provider { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn config() -> AnthropicConfig {
        AnthropicConfig::new(ModelName::new("claude-test").unwrap())
    }

    #[test]
    fn system_messages_are_lifted_out_of_turns() {
        let config = config();
        let messages = vec![
            Message::system("be brief"),
            Message::human("hi"),
            Message::ai("hello"),
            Message::system("no emoji"),
            Message::human("how are you?"),
        ];

        let request = build_request(&config, &messages);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "claude-test");
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["system"], "be brief\n\nno emoji");
        assert_eq!(
            json["messages"],
            serde_json::json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
                {"role": "user", "content": "how are you?"},
            ])
        );
    }

    #[test]
    fn system_field_is_omitted_without_system_messages() {
        let config = config();
        let messages = vec![Message::human("hi")];
        let json = serde_json::to_value(build_request(&config, &messages)).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn text_blocks_are_concatenated_with_usage() {
        let body: MessagesResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "world"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 2}
        }))
        .unwrap();

        let response = into_llm_response(body).unwrap();
        assert_eq!(response.content, "Hello, world");
        assert_eq!(response.usage, Some(Usage::new(10, 2)));
    }

    #[test]
    fn response_without_text_is_empty() {
        let body: MessagesResponse =
            serde_json::from_value(serde_json::json!({"content": []})).unwrap();
        assert_eq!(into_llm_response(body), Err(LlmError::EmptyResponse));
    }

    #[test]
    fn rate_limit_honours_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));

        let err = status_error(429, retry_after(&headers), "");
        assert_eq!(
            err,
            LlmError::RateLimited {
                retry_after: Some(Duration::from_secs(12))
            }
        );
    }

    #[test]
    fn provider_error_message_is_extracted() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens: too large"}}"#;
        assert_eq!(
            status_error(400, None, body),
            LlmError::Provider {
                status: 400,
                message: "max_tokens: too large".into()
            }
        );
        assert_eq!(
            status_error(502, None, "bad gateway\n"),
            LlmError::Provider {
                status: 502,
                message: "bad gateway".into()
            }
        );
    }

    #[test]
    fn messages_url_tolerates_trailing_slash() {
        let mut config = config();
        config.base_url = "http://localhost:8080/".into();
        assert_eq!(config.messages_url(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn factory_requires_api_key() {
        let mut config = config();
        config.api_key_env = "LANGNODE_TEST_KEY_THAT_IS_NEVER_SET".into();
        let factory = AnthropicFactory::new(config).unwrap();

        match factory.create() {
            Err(LlmError::Configuration { message }) => {
                assert!(message.contains("LANGNODE_TEST_KEY_THAT_IS_NEVER_SET"));
            }
            Err(other) => panic!("expected configuration error, got {other:?}"),
            Ok(_) => panic!("expected configuration error, got a client"),
        }
    }

    #[test]
    fn factory_builds_client_when_key_present() {
        let mut config = config();
        config.api_key_env = "LANGNODE_TEST_KEY_PRESENT".into();
        std::env::set_var("LANGNODE_TEST_KEY_PRESENT", "sk-test");
        let factory = AnthropicFactory::new(config).unwrap();

        assert!(factory.create().is_ok());
    }

    /// Serves one canned HTTP response on a local port and hands back the raw
    /// request it received.
    async fn serve_once(
        status_line: &'static str,
        extra_headers: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{extra_headers}\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });
        (format!("http://{addr}"), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    fn client_for(base_url: String) -> AnthropicClient {
        let mut config = config();
        config.base_url = base_url;
        AnthropicClient {
            http: reqwest::Client::new(),
            config,
            api_key: "sk-test".into(),
        }
    }

    #[tokio::test]
    async fn invoke_sends_headers_and_decodes_text() {
        let (url, server) = serve_once(
            "200 OK",
            "",
            r#"{"content":[{"type":"text","text":"o"},{"type":"text","text":"k"}],"usage":{"input_tokens":5,"output_tokens":1}}"#,
        )
        .await;

        let response = client_for(url)
            .invoke(&[Message::system("be brief"), Message::human("hi")])
            .await
            .unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(response.usage, Some(Usage::new(5, 1)));

        let request = server.await.unwrap();
        let lowered = request.to_lowercase();
        assert!(request.starts_with("POST /v1/messages "), "{request}");
        assert!(lowered.contains("x-api-key: sk-test"), "{request}");
        assert!(lowered.contains("anthropic-version: 2023-06-01"), "{request}");
        assert!(request.contains(r#""model":"claude-test""#), "{request}");
        assert!(request.contains(r#""system":"be brief""#), "{request}");
        assert!(
            request.contains(r#""messages":[{"role":"user","content":"hi"}]"#),
            "{request}"
        );
    }

    #[tokio::test]
    async fn invoke_maps_rate_limit_with_retry_after() {
        let (url, server) = serve_once("429 Too Many Requests", "retry-after: 9\r\n", "").await;

        let err = client_for(url)
            .invoke(&[Message::human("hi")])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LlmError::RateLimited {
                retry_after: Some(Duration::from_secs(9))
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn invoke_maps_error_envelope() {
        let (url, server) = serve_once(
            "400 Bad Request",
            "",
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"messages: empty"}}"#,
        )
        .await;

        let err = client_for(url).invoke(&[]).await.unwrap_err();
        assert_eq!(
            err,
            LlmError::Provider {
                status: 400,
                message: "messages: empty".into()
            }
        );
        assert_eq!(err.retry_policy(), pipeline::RetryPolicy::NonRetryable);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn invoke_rejects_undecodable_body() {
        let (url, server) = serve_once("200 OK", "", "not json").await;

        let err = client_for(url)
            .invoke(&[Message::human("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }), "{err:?}");
        server.await.unwrap();
    }
}
