//! Seam between the engine and the automation server.
//!
//! A [`Transport`] delivers one tool invocation and reports what came back.
//! Timeouts, retries and truncation live one layer up in
//! [`ToolClient`](crate::client::ToolClient), so implementations stay thin.

pub mod mcp;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use mcp::McpHttpTransport;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Tool call timed out after {0} ms")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Not connected")]
    NotConnected,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Protocol(err.to_string())
    }
}

/// What the server said about one tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResponse {
    /// Explicit error flag, when the server sent one.
    pub is_error: Option<bool>,
    /// Text content blocks joined by newlines.
    pub text: String,
    /// Base64 payloads of image content blocks.
    pub images: Vec<String>,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            is_error: None,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            is_error: Some(false),
            ..Self::text(text)
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(text)
        }
    }
}

/// Invokes named tools on the automation server.
#[async_trait]
pub trait Transport: Send {
    /// Establish the protocol session. Called once before the first tool.
    async fn connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Invoke `tool` with `args`. A tool that runs and reports failure is an
    /// `Ok` response with the error flag set; `Err` is reserved for failures
    /// to get an answer at all.
    async fn invoke(&mut self, tool: &str, args: Value) -> Result<ToolResponse, TransportError>;

    /// Tear down the protocol session.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect().await
    }

    async fn invoke(&mut self, tool: &str, args: Value) -> Result<ToolResponse, TransportError> {
        (**self).invoke(tool, args).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }
}
