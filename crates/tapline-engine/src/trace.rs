//! Append-only JSONL event log, one file per device.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub const TRACE_FILE: &str = "trace.jsonl";

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Failed to write trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize trace event: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub ts: String,
    pub kind: String,
    pub device: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub struct TraceRecorder {
    path: PathBuf,
    device: String,
}

impl TraceRecorder {
    pub fn new(dir: &Path, device: impl Into<String>) -> Self {
        Self {
            path: dir.join(TRACE_FILE),
            device: device.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event. `fields` should be a JSON object; anything else is
    /// stored under `value`.
    pub async fn record(&self, kind: &str, fields: Value) -> Result<(), TraceError> {
        let fields = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other);
                map
            }
        };
        let event = TraceEvent {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            kind: kind.to_string(),
            device: self.device.clone(),
            fields,
        };

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Like [`record`](Self::record), but a failed write is only logged.
    pub async fn emit(&self, kind: &str, fields: Value) {
        if let Err(e) = self.record(kind, fields).await {
            warn!("trace event '{}' dropped: {}", kind, e);
        }
    }
}
