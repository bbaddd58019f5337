//! Plan and app-identity sources.
//!
//! The orchestrator only sees [`Planner`]. [`HttpPlanner`] asks a
//! chat-completions endpoint; [`FallbackPlanner`] answers deterministically
//! and is used when no endpoint is configured.

pub mod fallback;
pub mod http;

use async_trait::async_trait;
use tapline_common::{AppIdentity, Plan};
use thiserror::Error;
use tracing::warn;

pub use fallback::FallbackPlanner;
pub use http::HttpPlanner;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Planner request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Planner returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed planner output: {0}")]
    Malformed(String),

    #[error("Planner returned an empty plan")]
    EmptyPlan,

    #[error("Invalid planner endpoint: {0}")]
    InvalidEndpoint(String),
}

#[async_trait]
pub trait Planner: Send + Sync {
    /// Turn free-text requirements into an ordered plan.
    async fn plan(&self, requirements: &str) -> Result<Plan, PlannerError>;

    /// Identify the application the requirements are about.
    async fn identify_app(&self, requirements: &str) -> Result<AppIdentity, PlannerError>;

    /// Short on-screen label an intent refers to, if any.
    async fn infer_label(&self, intent: &str) -> Result<Option<String>, PlannerError>;
}

/// Plan from `planner`, or the single-step fallback plan on any failure.
pub async fn plan_or_fallback(planner: &dyn Planner, requirements: &str) -> Plan {
    match planner.plan(requirements).await {
        Ok(plan) if !plan.is_empty() => plan,
        Ok(_) => {
            warn!("Planner returned no steps, using fallback plan");
            Plan::fallback()
        }
        Err(e) => {
            warn!("Planner failed ({}), using fallback plan", e);
            Plan::fallback()
        }
    }
}

/// App identity from `planner`, or empty fields on failure.
pub async fn identity_or_default(planner: &dyn Planner, requirements: &str) -> AppIdentity {
    planner
        .identify_app(requirements)
        .await
        .unwrap_or_else(|e| {
            warn!("App identification failed ({}), continuing without identity", e);
            AppIdentity::default()
        })
}
