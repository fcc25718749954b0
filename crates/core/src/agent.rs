//! Agent Adapter
//!
//! The generative service that actually answers prompts sits behind
//! [`AgentAdapter`]. Its reply is opaque: adapters hand back a [`RawResponse`]
//! and leave interpretation to the extractor.

use crate::response::RawResponse;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Free-form tool parameters such as `max_tokens` or `model_id`.
pub type Parameters = Map<String, Value>;

/// Standing instructions used when no description file is configured.
pub const DEFAULT_AGENT_DESCRIPTION: &str = "You are a personalized teacher. Explain concepts \
clearly and patiently, adapt to the learner's language, and format answers so they are easy \
to read.";

/// The format the adapter is asked to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Html,
    Markdown,
}

/// A collaborator that runs one prompt against a generative model or tool.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    async fn run(
        &self,
        query: String,
        output_format: OutputFormat,
        parameters: Parameters,
    ) -> Result<RawResponse>;
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("agent request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("agent returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest<'a> {
    query: &'a str,
    output_format: OutputFormat,
    parameters: &'a Parameters,
    instructions: &'a str,
}

/// An adapter that POSTs each run to an HTTP endpoint.
pub struct HttpAgent {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    instructions: String,
}

impl HttpAgent {
    /// Creates an adapter for `url`.
    ///
    /// # Arguments
    ///
    /// * `url` - Endpoint that accepts `{query, outputFormat, parameters, instructions}`.
    /// * `api_key` - Sent as a bearer token when present.
    /// * `instructions` - The agent's standing description, sent with every run.
    pub fn new(url: String, api_key: Option<String>, instructions: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            instructions,
        }
    }

    async fn post(&self, body: &RunRequest<'_>) -> Result<RawResponse, AdapterError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(AdapterError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        debug!(%status, bytes = bytes.len(), "agent replied");
        Ok(RawResponse::from_bytes(&bytes))
    }
}

#[async_trait]
impl AgentAdapter for HttpAgent {
    async fn run(
        &self,
        query: String,
        output_format: OutputFormat,
        parameters: Parameters,
    ) -> Result<RawResponse> {
        let body = RunRequest {
            query: &query,
            output_format,
            parameters: &parameters,
            instructions: &self.instructions,
        };
        Ok(self.post(&body).await?)
    }
}

/// An offline adapter that echoes the query back.
///
/// Used when no agent endpoint is configured, so the process stays usable
/// for development.
pub struct MockAgent;

#[async_trait]
impl AgentAdapter for MockAgent {
    async fn run(
        &self,
        query: String,
        _output_format: OutputFormat,
        _parameters: Parameters,
    ) -> Result<RawResponse> {
        Ok(RawResponse::DirectOutput(format!(
            "This is a response to your query: '{}'\n\nSince this is running in mock mode \
             without an agent endpoint, I can't provide a real AI response. Please set \
             AGENT_URL to connect a real agent.",
            query
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_format_serializes_lowercase() {
        assert_eq!(serde_json::to_value(OutputFormat::Text).unwrap(), json!("text"));
        assert_eq!(
            serde_json::to_value(OutputFormat::Markdown).unwrap(),
            json!("markdown")
        );
    }

    #[test]
    fn test_run_request_body_shape() {
        let mut parameters = Parameters::new();
        parameters.insert("max_tokens".to_string(), json!(8192));
        let body = RunRequest {
            query: "hello",
            output_format: OutputFormat::Text,
            parameters: &parameters,
            instructions: "be kind",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "query": "hello",
                "outputFormat": "text",
                "parameters": {"max_tokens": 8192},
                "instructions": "be kind",
            })
        );
    }

    #[tokio::test]
    async fn test_mock_agent_echoes_query() {
        let response = MockAgent
            .run("What is 2+2?".to_string(), OutputFormat::Text, Parameters::new())
            .await
            .unwrap();
        match response {
            RawResponse::DirectOutput(text) => assert!(text.contains("'What is 2+2?'")),
            other => panic!("Expected DirectOutput, got {:?}", other),
        }
    }

    /// Reads request headers and a `Content-Length` body so closing the socket
    /// does not reset the connection before the client reads the reply.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        use tokio::io::AsyncReadExt;

        let mut received = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            received.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&received);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let body_len = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// Serves one canned HTTP response on a local port and returns its URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let reply = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/run", addr)
    }

    #[tokio::test]
    async fn test_http_agent_parses_json_body() {
        let url = serve_once("HTTP/1.1 200 OK", r#"{"output":"4"}"#).await;
        let agent = HttpAgent::new(url, Some("key".to_string()), String::new());
        let response = agent
            .run("What is 2+2?".to_string(), OutputFormat::Text, Parameters::new())
            .await
            .unwrap();
        match response {
            RawResponse::Mapping(map) => assert_eq!(map["output"], "4"),
            other => panic!("Expected Mapping, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_agent_rejects_error_status() {
        let url = serve_once("HTTP/1.1 500 Internal Server Error", "boom").await;
        let agent = HttpAgent::new(url, None, String::new());
        let err = agent
            .run("hi".to_string(), OutputFormat::Text, Parameters::new())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("500"), "unexpected error: {}", message);
        assert!(message.ends_with("boom"));
    }
}
