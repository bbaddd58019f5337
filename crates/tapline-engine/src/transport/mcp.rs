//! MCP client over streamable HTTP.
//!
//! Speaks JSON-RPC 2.0: `initialize`, `notifications/initialized`, then
//! `tools/call` per invocation. The server may answer with a plain JSON body
//! or an SSE stream (`text/event-stream`); both are handled. The session id
//! the server hands out in `Mcp-Session-Id` is echoed on every request.

use super::{ToolResponse, Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

pub struct McpHttpTransport {
    http: reqwest::Client,
    endpoint: url::Url,
    session_id: Option<String>,
    next_id: u64,
    connected: bool,
}

impl McpHttpTransport {
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            session_id: None,
            next_id: 1,
            connected: false,
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );
        if let Some(id) = &self.session_id
            && let Ok(value) = HeaderValue::from_str(id)
        {
            headers.insert(SESSION_HEADER, value);
        }
        headers
    }

    async fn post(
        &mut self,
        body: &JsonRpcRequest<'_>,
    ) -> Result<reqwest::Response, TransportError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(self.headers())
            .json(body)
            .send()
            .await?;

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(id.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Send a request and wait for the matching response.
    async fn request(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<JsonRpcResponse, TransportError> {
        let id = self.next_id;
        self.next_id += 1;

        let response = self
            .post(&JsonRpcRequest {
                jsonrpc: "2.0",
                id: Some(id),
                method,
                params: Some(params),
            })
            .await?;

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response.text().await?;

        if is_stream {
            parse_sse_response(&body, id)
        } else {
            Ok(serde_json::from_str(&body)?)
        }
    }

    async fn notify(&mut self, method: &str) -> Result<(), TransportError> {
        self.post(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params: None,
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for McpHttpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.connected {
            return Ok(());
        }
        info!("Connecting to MCP server at {}", self.endpoint);
        let response = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "tapline", "version": env!("CARGO_PKG_VERSION")},
                }),
            )
            .await?;
        if let Some(err) = response.error {
            return Err(TransportError::Protocol(format!(
                "initialize rejected ({}): {}",
                err.code, err.message
            )));
        }
        self.notify("notifications/initialized").await?;
        self.connected = true;
        Ok(())
    }

    async fn invoke(&mut self, tool: &str, args: Value) -> Result<ToolResponse, TransportError> {
        if !self.connected {
            self.connect().await?;
        }
        debug!("tools/call {}", tool);
        let response = self
            .request("tools/call", json!({"name": tool, "arguments": args}))
            .await?;

        // A JSON-RPC error is still an answer from the server: the tool ran
        // (or was rejected) and said so.
        if let Some(err) = response.error {
            return Ok(ToolResponse::error(format!(
                "Error: {} (code {})",
                err.message, err.code
            )));
        }
        let result = response.result.ok_or_else(|| {
            TransportError::Protocol("response has neither result nor error".into())
        })?;
        Ok(tool_response_from_result(&result))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(id) = self.session_id.take() {
            self.http
                .delete(self.endpoint.clone())
                .header(SESSION_HEADER, id)
                .send()
                .await?;
        }
        self.connected = false;
        Ok(())
    }
}

/// Map a `tools/call` result onto a [`ToolResponse`].
pub fn tool_response_from_result(result: &Value) -> ToolResponse {
    let is_error = result.get("isError").and_then(Value::as_bool);

    let Some(blocks) = result.get("content").and_then(Value::as_array) else {
        return ToolResponse {
            is_error,
            text: result.to_string(),
            images: Vec::new(),
        };
    };

    let mut texts = Vec::new();
    let mut images = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    texts.push(text.to_string());
                }
            }
            Some("image") => {
                if let Some(data) = block.get("data").and_then(Value::as_str) {
                    images.push(data.to_string());
                }
            }
            _ => {}
        }
    }

    ToolResponse {
        is_error,
        text: texts.join("\n"),
        images,
    }
}

/// Pick the response for request `id` out of an SSE body.
fn parse_sse_response(body: &str, id: u64) -> Result<JsonRpcResponse, TransportError> {
    for event in body.split("\n\n") {
        let data: Vec<&str> = event
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect();
        if data.is_empty() {
            continue;
        }
        let Ok(message) = serde_json::from_str::<JsonRpcResponse>(&data.join("\n")) else {
            continue;
        };
        let matches = message.id.as_ref().and_then(Value::as_u64) == Some(id);
        if matches && (message.result.is_some() || message.error.is_some()) {
            return Ok(message);
        }
    }
    Err(TransportError::Protocol(format!(
        "no response for request {id} in event stream"
    )))
}
