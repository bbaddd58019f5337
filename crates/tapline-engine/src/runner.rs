//! Multi-device run coordinator.
//!
//! Each device gets its own transport, session, context and directory under
//! `<root_dir>/<run_id>/`. Flows run concurrently and share nothing mutable;
//! the run finishes when every flow has.

use crate::client::{CallPolicy, ToolClient};
use crate::config::TaplineConfig;
use crate::context::SessionContext;
use crate::executor::StepExecutor;
use crate::planner::Planner;
use crate::report::{DeviceReport, RunReport};
use crate::session::DeviceSession;
use crate::transport::{Transport, TransportError};
use chrono::Utc;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tapline_common::text::{parse_session_handle, sanitize_label};
use tapline_common::{AppIdentity, Plan};
use thiserror::Error;
use tracing::{error, info, warn};

pub const PLAN_FILE: &str = "plan.json";
pub const SUMMARY_FILE: &str = "summary.txt";
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("No devices configured")]
    NoDevices,
    #[error("Failed to write run artifacts: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize run artifacts: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything a run needs besides the transports.
pub struct RunSpec<'a> {
    pub run_id: String,
    pub requirements: &'a str,
    pub plan: &'a Plan,
    pub app: &'a AppIdentity,
    pub planner: &'a dyn Planner,
    pub config: &'a TaplineConfig,
}

pub fn default_run_id() -> String {
    Utc::now().format("run-%Y%m%d-%H%M%S").to_string()
}

/// Run the plan on every configured device and write the aggregate report.
///
/// `connect` builds one transport per device. Failing to build or connect
/// it blocks that device only.
pub async fn run_all<T, F>(spec: &RunSpec<'_>, mut connect: F) -> Result<RunReport, RunError>
where
    T: Transport,
    F: FnMut(&str) -> Result<T, TransportError>,
{
    let devices = &spec.config.devices;
    if devices.is_empty() {
        return Err(RunError::NoDevices);
    }

    let started_at = Utc::now();
    let run_dir = spec.config.output.root_dir.join(&spec.run_id);
    tokio::fs::create_dir_all(&run_dir).await?;
    tokio::fs::write(run_dir.join(PLAN_FILE), serde_json::to_vec_pretty(spec.plan)?).await?;
    tokio::fs::write(run_dir.join(SUMMARY_FILE), spec.requirements).await?;
    info!(
        "Run {}: {} step(s) on {} device(s)",
        spec.run_id,
        spec.plan.len(),
        devices.len()
    );

    let flows = devices.iter().map(|device| {
        let output_dir = device_dir(&run_dir, device);
        let transport = connect(device);
        async move {
            match transport {
                Ok(transport) => run_device(transport, device, output_dir, spec).await,
                Err(e) => {
                    error!("[{}] transport setup failed: {}", device, e);
                    DeviceReport::session_failed(device.as_str(), output_dir, e.to_string())
                }
            }
        }
    });
    let reports = futures::future::join_all(flows).await;

    let report = RunReport::new(spec.run_id.clone(), run_dir.clone(), started_at, reports);
    tokio::fs::write(run_dir.join(REPORT_FILE), serde_json::to_vec_pretty(&report)?).await?;
    Ok(report)
}

/// Run the plan on one device from session creation to teardown.
pub async fn run_device<T: Transport>(
    transport: T,
    device: &str,
    output_dir: PathBuf,
    spec: &RunSpec<'_>,
) -> DeviceReport {
    let config = spec.config;

    if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
        return DeviceReport::session_failed(device, output_dir, e.to_string());
    }

    let mut client = ToolClient::new(transport, CallPolicy::from_config(config));
    if let Err(e) = client.connect().await {
        error!("[{}] could not connect: {}", device, e);
        return DeviceReport::session_failed(device, output_dir, e.to_string());
    }

    let created = client
        .call(
            &config.tools.create_session,
            session_capabilities(config, device, spec.app),
        )
        .await;
    if !created.ok {
        error!("[{}] session creation failed: {}", device, created.text);
        close_transport(&mut client, device).await;
        return DeviceReport::session_failed(device, output_dir, created.text);
    }
    let handle = parse_session_handle(&created.text);
    info!("[{}] session {}", device, handle.as_deref().unwrap_or("(unknown)"));

    let mut ctx = SessionContext::new(device, spec.app.clone(), output_dir.clone());
    ctx.session_handle = handle.clone();

    let mut session = DeviceSession::new(client, ctx, config);
    session
        .trace()
        .emit("session", json!({"ok": true, "session": handle}))
        .await;

    let (_, steps) = {
        let mut executor = StepExecutor::new(&mut session, spec.planner);
        executor.prepare().await;
        executor.run(spec.plan).await
    };

    let (mut client, _) = session.into_parts();
    end_session(&mut client, config, device, handle.as_deref()).await;
    close_transport(&mut client, device).await;

    let report = DeviceReport::from_steps(device, output_dir, handle, steps);
    info!("{}", report.status_line());
    report
}

/// Capabilities for `create_session`.
pub fn session_capabilities(config: &TaplineConfig, device: &str, app: &AppIdentity) -> Value {
    let mut caps = json!({
        "platformName": config.server.platform,
        "appium:automationName": config.server.automation_name,
        "appium:udid": device,
        "appium:deviceName": device,
        "appium:noReset": true,
    });
    if let Value::Object(map) = &mut caps {
        if !app.app_package.is_empty() {
            map.insert("appium:appPackage".into(), json!(app.app_package));
        }
        if !app.app_activity.is_empty() {
            map.insert("appium:appActivity".into(), json!(app.app_activity));
        }
    }
    json!({"platform": config.server.platform, "capabilities": caps})
}

async fn end_session<T: Transport>(
    client: &mut ToolClient<T>,
    config: &TaplineConfig,
    device: &str,
    handle: Option<&str>,
) {
    let args = match handle {
        Some(id) => json!({"sessionId": id}),
        None => json!({}),
    };
    let outcome = client.call(&config.tools.delete_session, args).await;
    if !outcome.ok {
        warn!("[{}] session teardown failed: {}", device, outcome.text);
    }
}

async fn close_transport<T: Transport>(client: &mut ToolClient<T>, device: &str) {
    if let Err(e) = client.close().await {
        warn!("[{}] transport close failed: {}", device, e);
    }
}

/// Directory a device writes into for a given run.
pub fn device_dir(run_dir: &Path, device: &str) -> PathBuf {
    run_dir.join(sanitize_label(device))
}
