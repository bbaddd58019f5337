//! Step orchestrator.
//!
//! Drives one plan on one device. Each step moves through
//! `Pending → Observed → ActionDecided → ActionAttempted → Verified | Blocked`;
//! the first blocked step ends the run.

use crate::actions::ClickReport;
use crate::planner::Planner;
use crate::report::RunStatus;
use crate::session::DeviceSession;
use crate::transport::Transport;
use serde::Serialize;
use serde_json::json;
use tapline_common::intent::{classify, extract_type_text, infer_target};
use tapline_common::text::verify_expected;
use tapline_common::{ActionKind, Plan, Recovery, RetryPolicy, Step, SwipeDirection};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Observed,
    ActionDecided,
    ActionAttempted,
    Verified,
    Blocked,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub index: usize,
    pub intent: String,
    pub expected: String,
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub action_ok: bool,
    pub verified: bool,
    /// Verification checks performed.
    pub checks: usize,
    pub state: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StepResult {
    fn pending(step: &Step) -> Self {
        Self {
            index: step.index,
            intent: step.intent.clone(),
            expected: step.expected.clone(),
            action: ActionKind::None,
            target: None,
            action_ok: false,
            verified: false,
            checks: 0,
            state: StepState::Pending,
            click: None,
            reason: None,
        }
    }

    fn advance(&mut self, state: StepState) {
        debug!("step {}: {:?} -> {:?}", self.index, self.state, state);
        self.state = state;
    }
}

pub struct StepExecutor<'s, 'c, T: Transport> {
    session: &'s mut DeviceSession<'c, T>,
    planner: &'s dyn Planner,
}

impl<'s, 'c, T: Transport> StepExecutor<'s, 'c, T> {
    pub fn new(session: &'s mut DeviceSession<'c, T>, planner: &'s dyn Planner) -> Self {
        Self { session, planner }
    }

    /// Bring the app up before the first step: observe, drain, launch,
    /// observe, drain.
    pub async fn prepare(&mut self) {
        self.session.observe("start").await;
        self.session.drain_alerts().await;
        if !self.session.launch_app().await {
            warn!("[{}] app launch did not succeed", self.session.ctx.device);
        }
        self.session.observe("launched").await;
        self.session.drain_alerts().await;
    }

    /// Run every step in order, stopping at the first blocked one.
    pub async fn run(&mut self, plan: &Plan) -> (RunStatus, Vec<StepResult>) {
        let mut results = Vec::with_capacity(plan.len());
        for step in plan.steps() {
            let result = self.run_step(step).await;
            let blocked = result.state == StepState::Blocked;
            results.push(result);
            if blocked {
                let remaining = plan.len() - results.len();
                if remaining > 0 {
                    info!(
                        "[{}] halting, {} step(s) not run",
                        self.session.ctx.device, remaining
                    );
                }
                return (RunStatus::Blocked, results);
            }
        }
        (RunStatus::Success, results)
    }

    pub async fn run_step(&mut self, step: &Step) -> StepResult {
        let mut result = StepResult::pending(step);
        info!(
            "[{}] step {}: {}",
            self.session.ctx.device, step.index, step.intent
        );

        self.session.observe(&format!("step{}_before", step.index)).await;
        self.session.drain_alerts().await;
        result.advance(StepState::Observed);

        result.action = classify(&step.intent);
        if matches!(result.action, ActionKind::Click | ActionKind::Scroll) {
            result.target = self.resolve_target(&step.intent).await;
        }
        result.advance(StepState::ActionDecided);

        let (ok, failure) = self.attempt(&step.intent, &mut result).await;
        result.action_ok = ok;
        result.advance(StepState::ActionAttempted);

        self.session.observe(&format!("step{}_after", step.index)).await;
        self.session.drain_alerts().await;

        if !ok {
            result.reason = failure;
            result.advance(StepState::Blocked);
        } else {
            let (verified, checks) = self.verify(&step.expected).await;
            result.verified = verified;
            result.checks = checks;
            if verified {
                result.advance(StepState::Verified);
            } else {
                result.reason = Some(format!(
                    "expected '{}' not found after '{}'{}",
                    step.expected,
                    step.intent,
                    result
                        .target
                        .as_ref()
                        .map(|t| format!(" (target '{t}')"))
                        .unwrap_or_default()
                ));
                result.advance(StepState::Blocked);
            }
        }

        self.session
            .trace
            .emit(
                "step",
                json!({
                    "index": result.index,
                    "intent": result.intent,
                    "action": result.action,
                    "target": result.target,
                    "action_ok": result.action_ok,
                    "verified": result.verified,
                    "state": result.state,
                    "reason": result.reason,
                }),
            )
            .await;
        result
    }

    /// Heuristic target first; the planner is only asked when it finds
    /// nothing.
    async fn resolve_target(&self, intent: &str) -> Option<String> {
        if let Some(target) = infer_target(intent) {
            return Some(target);
        }
        match self.planner.infer_label(intent).await {
            Ok(label) => label,
            Err(e) => {
                warn!("label inference failed for '{}': {}", intent, e);
                None
            }
        }
    }

    /// Perform the decided action. Returns success and, on failure, why.
    async fn attempt(&mut self, intent: &str, result: &mut StepResult) -> (bool, Option<String>) {
        match result.action {
            ActionKind::None => (true, None),
            ActionKind::Type => {
                let Some(text) = extract_type_text(intent) else {
                    return (false, Some(format!("no text to type in '{intent}'")));
                };
                if self.session.type_text(&text).await {
                    (true, None)
                } else {
                    let reason = format!("could not type '{text}': no focused element accepted it");
                    (false, Some(reason))
                }
            }
            ActionKind::Scroll => {
                let ok = match result.target.as_deref() {
                    Some(target) => self.session.scroll_to(target).await,
                    None => self.session.swipe(SwipeDirection::Up).await,
                };
                if ok {
                    (true, None)
                } else {
                    (false, Some(format!("scroll failed for '{intent}'")))
                }
            }
            ActionKind::Click => {
                let Some(target) = result.target.clone() else {
                    return (false, Some(format!("no click target in '{intent}'")));
                };
                let report = self.session.click_target(&target).await;
                let ok = report.ok;
                let attempts = report.attempts;
                result.click = Some(report);
                if ok {
                    (true, None)
                } else {
                    (false, Some(format!("could not click '{target}' after {attempts} attempts")))
                }
            }
        }
    }

    /// Check `expected` against the hierarchy, nudging and re-observing
    /// between failed checks. Returns the verdict and the number of checks.
    async fn verify(&mut self, expected: &str) -> (bool, usize) {
        if expected.trim().is_empty() {
            return (true, 0);
        }
        let retries = self.session.config.execution.verify_retries.max(1);
        let policy = RetryPolicy::recover_between(retries, Recovery::Nudge);

        let mut checks = 0;
        for recovery in policy.schedule() {
            if let Some(recovery) = recovery {
                self.session.recover(recovery, None).await;
            }
            checks += 1;
            if verify_expected(self.session.ctx.hierarchy(), expected) {
                return (true, checks);
            }
            debug!("'{}' not on screen (check {}/{})", expected, checks, retries);
        }
        (false, checks)
    }
}
