pub mod actions;
pub mod alerts;
pub mod client;
pub mod config;
pub mod context;
pub mod executor;
pub mod observe;
pub mod planner;
pub mod report;
pub mod runner;
pub mod session;
pub mod trace;
pub mod transport;

pub use actions::ClickReport;
pub use client::{CallOutcome, CallPolicy, ToolClient};
pub use context::SessionContext;
pub use executor::{StepExecutor, StepResult, StepState};
pub use report::{DeviceReport, RunReport, RunStatus};
pub use session::DeviceSession;
pub use tapline_common as common;
