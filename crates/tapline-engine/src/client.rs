//! Bounded, retrying tool invocation.

use crate::config::TaplineConfig;
use crate::transport::{Transport, TransportError};
use serde_json::Value;
use std::time::Duration;
use tapline_common::text::{looks_like_error, truncate};
use tracing::{debug, warn};

/// Per-call limits applied by [`ToolClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub attempts: usize,
    pub backoff_base: Duration,
    pub max_lines: usize,
    pub max_bytes: usize,
}

impl CallPolicy {
    pub fn from_config(config: &TaplineConfig) -> Self {
        Self {
            timeout: config.server.tool_timeout(),
            attempts: config.server.tool_attempts.max(1),
            backoff_base: config.server.backoff_base(),
            max_lines: config.output.max_lines,
            max_bytes: config.output.max_bytes,
        }
    }
}

/// Result of one logical tool call after retries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOutcome {
    pub ok: bool,
    /// Response text, or the last error message when no answer came back.
    pub text: String,
    pub images: Vec<String>,
    /// Transport attempts consumed.
    pub attempts: usize,
}

/// Wraps a [`Transport`] with timeouts, retries and truncation.
pub struct ToolClient<T: Transport> {
    transport: T,
    policy: CallPolicy,
}

impl<T: Transport> ToolClient<T> {
    pub fn new(transport: T, policy: CallPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Open the transport. Each attempt is bounded by the call timeout and
    /// failed attempts back off linearly, as tool calls do.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let timeout = self.policy.timeout;
            match bounded(timeout, self.transport.connect()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("connect attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.backoff_base * attempt as u32).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(TransportError::NotConnected))
    }

    /// Close the transport within one call timeout.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        bounded(self.policy.timeout, self.transport.close()).await
    }

    /// Call `tool` with the configured attempt budget.
    pub async fn call(&mut self, tool: &str, args: Value) -> CallOutcome {
        self.call_with_attempts(tool, args, self.policy.attempts).await
    }

    /// Call `tool`, retrying timeouts and transport errors up to `attempts`
    /// times with linear backoff. A response from the server, successful or
    /// not, ends the loop.
    pub async fn call_with_attempts(
        &mut self,
        tool: &str,
        args: Value,
        attempts: usize,
    ) -> CallOutcome {
        let attempts = attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let timeout = self.policy.timeout;
            let result = bounded(timeout, self.transport.invoke(tool, args.clone())).await;

            match result {
                Ok(response) => {
                    let ok = match response.is_error {
                        Some(is_error) => !is_error,
                        None => !looks_like_error(&response.text),
                    };
                    debug!("{} -> ok={} (attempt {})", tool, ok, attempt);
                    return CallOutcome {
                        ok,
                        text: truncate(
                            &response.text,
                            self.policy.max_lines,
                            self.policy.max_bytes,
                        ),
                        images: response.images,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!("{} attempt {}/{} failed: {}", tool, attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.backoff_base * attempt as u32).await;
                    }
                }
            }
        }

        CallOutcome {
            ok: false,
            text: truncate(&last_error, self.policy.max_lines, self.policy.max_bytes),
            images: Vec::new(),
            attempts,
        }
    }
}

/// Run `fut` under `timeout`, folding an elapsed deadline into
/// [`TransportError::Timeout`].
async fn bounded<F, R>(timeout: Duration, fut: F) -> Result<R, TransportError>
where
    F: Future<Output = Result<R, TransportError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| Err(TransportError::Timeout(timeout.as_millis() as u64)))
}
