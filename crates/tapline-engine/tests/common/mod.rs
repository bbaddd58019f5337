#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tapline_common::AppIdentity;
use tapline_engine::config::TaplineConfig;
use tapline_engine::transport::{ToolResponse, Transport, TransportError};
use tapline_engine::{CallPolicy, DeviceSession, SessionContext, ToolClient};

pub const HANDLE: &str = "5f1d2c3b-4a59-4e6f-8a7b-9c0d1e2f3a4b";
pub const SESSION: &str = "0b7e3c1a-2d4f-4a6b-8c9d-e0f1a2b3c4d5";

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub tool: String,
    pub args: Value,
}

/// Shared view of the calls a [`MockTransport`] received.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, tool: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| c.tool == tool).count()
    }

    pub fn of(&self, tool: &str) -> Vec<Value> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tool == tool)
            .map(|c| c.args.clone())
            .collect()
    }

    fn push(&self, call: Call) -> Vec<Call> {
        let mut calls = self.0.lock().unwrap();
        calls.push(call);
        calls.clone()
    }
}

type Handler = Box<dyn FnMut(&str, &Value, &[Call]) -> Result<ToolResponse, TransportError> + Send>;

/// Scripted transport. The handler sees the tool, its arguments and every
/// call so far (the current one included).
pub struct MockTransport {
    log: CallLog,
    handler: Handler,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> (Self, CallLog)
    where
        F: FnMut(&str, &Value, &[Call]) -> Result<ToolResponse, TransportError> + Send + 'static,
    {
        let log = CallLog::default();
        let transport = Self {
            log: log.clone(),
            handler: Box::new(handler),
        };
        (transport, log)
    }

    /// A device with a quiet screen that accepts everything.
    pub fn idle() -> (Self, CallLog) {
        Self::new(|tool, _, _| Ok(default_response(tool)))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn invoke(&mut self, tool: &str, args: Value) -> Result<ToolResponse, TransportError> {
        let history = self.log.push(Call {
            tool: tool.to_string(),
            args: args.clone(),
        });
        (self.handler)(tool, &args, &history)
    }
}

pub fn default_response(tool: &str) -> ToolResponse {
    match tool {
        "appium_get_page_source" => ToolResponse::ok("<hierarchy><node text='Home'/></hierarchy>"),
        "generate_locators" => ToolResponse::ok("[]"),
        "create_session" => ToolResponse::ok(format!("Session created with ID: {SESSION}")),
        "appium_find_element" => ToolResponse::ok(format!("Element found with id {HANDLE}")),
        _ => ToolResponse::ok("done"),
    }
}

pub fn not_found() -> ToolResponse {
    ToolResponse::error("NoSuchElement: element could not be located")
}

pub fn count(history: &[Call], tool: &str) -> usize {
    history.iter().filter(|c| c.tool == tool).count()
}

/// Fast config for tests: no pacing, no screenshots, artifacts under `dir`.
pub fn test_config(dir: &Path) -> TaplineConfig {
    let mut config = TaplineConfig::default();
    config.execution.action_delay_ms = 0;
    config.server.backoff_base_ms = 0;
    config.output.screenshots = false;
    config.output.root_dir = dir.to_path_buf();
    config
}

pub fn test_app() -> AppIdentity {
    AppIdentity {
        app_package: "com.example.app".into(),
        app_activity: ".MainActivity".into(),
        app_name: "Example".into(),
        platform: "Android".into(),
    }
}

pub fn session<'c>(
    transport: MockTransport,
    config: &'c TaplineConfig,
    dir: &Path,
) -> DeviceSession<'c, MockTransport> {
    let client = ToolClient::new(transport, CallPolicy::from_config(config));
    let ctx = SessionContext::new("emulator-5554", test_app(), dir);
    DeviceSession::new(client, ctx, config)
}
