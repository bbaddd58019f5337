//! One device's live automation session.
//!
//! [`DeviceSession`] bundles the tool client, the session context and the
//! trace recorder. Observation, alert handling and the action primitives are
//! implemented on it in their own modules.

use crate::client::{CallOutcome, ToolClient};
use crate::config::TaplineConfig;
use crate::context::SessionContext;
use crate::trace::TraceRecorder;
use crate::transport::Transport;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tapline_common::text::{screenshot_name, truncate};
use tracing::{debug, warn};

pub struct DeviceSession<'c, T: Transport> {
    pub(crate) client: ToolClient<T>,
    pub(crate) ctx: SessionContext,
    pub(crate) trace: TraceRecorder,
    pub(crate) config: &'c TaplineConfig,
}

impl<'c, T: Transport> DeviceSession<'c, T> {
    pub fn new(client: ToolClient<T>, ctx: SessionContext, config: &'c TaplineConfig) -> Self {
        let trace = TraceRecorder::new(ctx.output_dir(), ctx.device.clone());
        Self {
            client,
            ctx,
            trace,
            config,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.ctx
    }

    pub fn client_mut(&mut self) -> &mut ToolClient<T> {
        &mut self.client
    }

    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    pub fn config(&self) -> &'c TaplineConfig {
        self.config
    }

    pub fn into_parts(self) -> (ToolClient<T>, SessionContext) {
        (self.client, self.ctx)
    }

    /// Try each argument shape in order until one succeeds. Returns the last
    /// outcome.
    pub(crate) async fn call_shapes(&mut self, tool: &str, shapes: Vec<Value>) -> CallOutcome {
        let mut outcome = CallOutcome::default();
        for (i, args) in shapes.into_iter().enumerate() {
            if i > 0 {
                debug!("{} retrying with alternate argument shape", tool);
            }
            outcome = self.client.call(tool, args).await;
            if outcome.ok {
                break;
            }
        }
        outcome
    }

    /// Bookkeeping after an action primitive: advance the step, capture a
    /// screenshot, append a trace event, then wait out the action delay.
    pub(crate) async fn finish_primitive(
        &mut self,
        kind: &str,
        tool: &str,
        outcome: &CallOutcome,
        details: Value,
    ) {
        let step = self.ctx.next_step();
        let screenshot = self.capture(step, kind).await;

        let mut fields = json!({
            "step": step,
            "tool": tool,
            "ok": outcome.ok,
            "attempts": outcome.attempts,
            "output": truncate(&outcome.text, usize::MAX, self.config.output.trace_output_bytes),
            "screenshot": screenshot.as_ref().map(|p| p.display().to_string()),
        });
        if let (Value::Object(map), Value::Object(extra)) = (&mut fields, details) {
            map.extend(extra);
        }
        self.trace.emit(kind, fields).await;

        let delay = self.config.execution.action_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Capture a screenshot into the device directory as
    /// `<step>_<label>.png`. Returns `None` when screenshots are disabled or
    /// the capture failed.
    pub async fn capture(&mut self, step: u32, label: &str) -> Option<PathBuf> {
        if !self.config.output.screenshots {
            return None;
        }
        let dest = self.ctx.output_dir().join(screenshot_name(step, label));
        let outcome = self.client.call(&self.config.tools.screenshot, json!({})).await;
        if !outcome.ok {
            warn!("[{}] screenshot failed: {}", self.ctx.device, outcome.text);
            return None;
        }

        let written = match outcome.images.first() {
            Some(data) => write_base64(data, &dest).await,
            None => match (server_path_in(&outcome.text), inline_image(&outcome.text)) {
                (Some(src), _) => move_file(&src, &dest).await,
                (None, Some(bytes)) => tokio::fs::write(&dest, bytes).await,
                (None, None) => {
                    warn!(
                        "[{}] screenshot response carried no image: {}",
                        self.ctx.device,
                        truncate(&outcome.text, 1, 120)
                    );
                    return None;
                }
            },
        };
        match written {
            Ok(()) => Some(dest),
            Err(e) => {
                warn!(
                    "[{}] could not store screenshot {}: {}",
                    self.ctx.device,
                    dest.display(),
                    e
                );
                None
            }
        }
    }
}

async fn write_base64(data: &str, dest: &Path) -> std::io::Result<()> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(dest, bytes).await
}

const PNG_MAGIC: &[u8] = b"\x89PNG";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";

/// Image bytes from a response whose whole text is base64 image data,
/// optionally behind a `data:` URL prefix. Plain replies that happen to be
/// valid base64 are rejected by the magic-number check.
fn inline_image(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    let data = text
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map_or(text, |(_, data)| data);
    let bytes = STANDARD.decode(data).ok()?;
    (bytes.starts_with(PNG_MAGIC) || bytes.starts_with(JPEG_MAGIC)).then_some(bytes)
}

/// Rename a server-side file into place, copying when the rename crosses
/// filesystems.
async fn move_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(src, dest).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(src, dest).await?;
    Ok(())
}

/// First token of `text` naming an existing image file.
fn server_path_in(text: &str) -> Option<PathBuf> {
    text.split(|c: char| c.is_whitespace() || c == '"' || c == '\'')
        .map(|t| t.trim_end_matches(['.', ',', ';']))
        .filter(|t| t.ends_with(".png") || t.ends_with(".jpg") || t.ends_with(".jpeg"))
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_path_in() {
        let dir = tempfile::tempdir().unwrap();
        let shot = dir.path().join("shot.png");
        std::fs::write(&shot, b"png").unwrap();

        let text = format!("Screenshot saved to {}.", shot.display());
        assert_eq!(server_path_in(&text), Some(shot));
        assert_eq!(server_path_in("Screenshot saved to /nonexistent/x.png"), None);
        assert_eq!(server_path_in("no path here"), None);
    }

    #[test]
    fn test_inline_image() {
        let png = STANDARD.encode(b"\x89PNG\r\n\x1a\nbody");
        assert_eq!(inline_image(&png).as_deref(), Some(&b"\x89PNG\r\n\x1a\nbody"[..]));
        let url = format!("data:image/png;base64,{png}");
        assert!(inline_image(&url).is_some());
        // Valid base64, but not an image.
        assert_eq!(inline_image("done"), None);
        assert_eq!(inline_image("Screenshot captured"), None);
    }
}
