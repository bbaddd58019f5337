use super::{Planner, PlannerError};
use async_trait::async_trait;
use tapline_common::{AppIdentity, Plan};

/// Deterministic planner: the single "Launch the app" step, the configured
/// identity (empty by default) and no label inference.
#[derive(Debug, Clone, Default)]
pub struct FallbackPlanner {
    identity: AppIdentity,
}

impl FallbackPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: AppIdentity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl Planner for FallbackPlanner {
    async fn plan(&self, _requirements: &str) -> Result<Plan, PlannerError> {
        Ok(Plan::fallback())
    }

    async fn identify_app(&self, _requirements: &str) -> Result<AppIdentity, PlannerError> {
        Ok(self.identity.clone())
    }

    async fn infer_label(&self, _intent: &str) -> Result<Option<String>, PlannerError> {
        Ok(None)
    }
}
