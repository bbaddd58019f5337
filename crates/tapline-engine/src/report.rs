use crate::executor::{StepResult, StepState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Blocked,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "SUCCESS"),
            RunStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Outcome of one device's run.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub device: String,
    pub status: RunStatus,
    pub output_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Index of the step that blocked the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub steps: Vec<StepResult>,
}

impl DeviceReport {
    /// Report for a device whose steps ran to completion or to a block.
    pub fn from_steps(
        device: impl Into<String>,
        output_dir: PathBuf,
        session: Option<String>,
        steps: Vec<StepResult>,
    ) -> Self {
        let blocked = steps.iter().find(|s| s.state == StepState::Blocked);
        let (status, blocked_step, reason) = match blocked {
            Some(step) => (RunStatus::Blocked, Some(step.index), step.reason.clone()),
            None => (RunStatus::Success, None, None),
        };
        Self {
            device: device.into(),
            status,
            output_dir,
            session,
            blocked_step,
            reason,
            steps,
        }
    }

    /// Report for a device that never got a working session.
    pub fn session_failed(
        device: impl Into<String>,
        output_dir: PathBuf,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            status: RunStatus::Blocked,
            output_dir,
            session: None,
            blocked_step: None,
            reason: Some(reason.into()),
            steps: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// One-line summary, e.g. `emulator-5554: BLOCKED at step 2 (...)`.
    pub fn status_line(&self) -> String {
        match (self.blocked_step, &self.reason) {
            (Some(step), Some(reason)) => {
                format!("{}: {} at step {} ({})", self.device, self.status, step, reason)
            }
            (Some(step), None) => format!("{}: {} at step {}", self.device, self.status, step),
            (None, Some(reason)) => format!("{}: {} ({})", self.device, self.status, reason),
            (None, None) => format!("{}: {}", self.device, self.status),
        }
    }
}

/// Aggregate outcome of a run across devices.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub passed: bool,
    pub devices: Vec<DeviceReport>,
}

impl RunReport {
    pub fn new(
        run_id: impl Into<String>,
        run_dir: PathBuf,
        started_at: DateTime<Utc>,
        devices: Vec<DeviceReport>,
    ) -> Self {
        let passed = !devices.is_empty() && devices.iter().all(DeviceReport::passed);
        Self {
            run_id: run_id.into(),
            started_at,
            finished_at: Utc::now(),
            run_dir,
            passed,
            devices,
        }
    }
}
