use super::{Planner, PlannerError};
use crate::config::PlannerConfig;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tapline_common::plan::{parse_identity, parse_plan};
use tapline_common::{AppIdentity, Plan};
use tracing::debug;

const PLAN_PROMPT: &str = r#"You write functional UI test plans for mobile apps.
Given the requirements, reply with a JSON array of 3 to 8 steps:
[{"step": 1, "intent": "Tap \"Login\"", "expected": "Welcome"}]
"intent" is one short imperative action on the device. "expected" is text that
appears on screen once the action worked, or "" when nothing can be checked.
Quote on-screen labels. To enter text write: Type: <text>.
Output only JSON."#;

const IDENTITY_PROMPT: &str = r#"Identify the mobile application the requirements are about.
Reply with one JSON object:
{"appPackage": "...", "appActivity": "...", "appName": "...", "platform": "Android"}
Use "" for anything you do not know. Output only JSON."#;

const LABEL_PROMPT: &str = r#"Given one UI test step, reply with the short on-screen label of
the element it acts on (at most four words), and nothing else. Reply NONE if
there is no such element."#;

const MAX_LABEL_CHARS: usize = 40;

/// Planner backed by an OpenAI-compatible chat-completions endpoint.
pub struct HttpPlanner {
    http: reqwest::Client,
    endpoint: url::Url,
    model: String,
    api_key: Option<String>,
}

impl HttpPlanner {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PlannerError> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| PlannerError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            model: model.into(),
            api_key,
        })
    }

    /// Build from config. Returns `None` when no endpoint is configured.
    pub fn from_config(config: &PlannerConfig) -> Result<Option<Self>, PlannerError> {
        let Some(endpoint) = &config.endpoint else {
            return Ok(None);
        };
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Self::new(
            endpoint,
            config.model.clone(),
            api_key,
            Duration::from_millis(config.timeout_ms),
        )
        .map(Some)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, PlannerError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": 0.0
        });

        let mut request = self.http.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlannerError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PlannerError::Malformed("no message content in completion".into()))
    }
}

#[async_trait]
impl Planner for HttpPlanner {
    async fn plan(&self, requirements: &str) -> Result<Plan, PlannerError> {
        let content = self.complete(PLAN_PROMPT, requirements).await?;
        debug!("planner output: {}", content);
        let plan = parse_plan(&content).ok_or_else(|| PlannerError::Malformed(content.clone()))?;
        if plan.is_empty() {
            return Err(PlannerError::EmptyPlan);
        }
        Ok(plan)
    }

    async fn identify_app(&self, requirements: &str) -> Result<AppIdentity, PlannerError> {
        let content = self.complete(IDENTITY_PROMPT, requirements).await?;
        parse_identity(&content).ok_or(PlannerError::Malformed(content))
    }

    async fn infer_label(&self, intent: &str) -> Result<Option<String>, PlannerError> {
        let content = self.complete(LABEL_PROMPT, intent).await?;
        Ok(clean_label(&content))
    }
}

/// Reduce a label reply to the label itself.
fn clean_label(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let label = line
        .trim_start_matches("Label:")
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '“' | '”' | '.'))
        .trim();
    if label.is_empty() || label.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(label.chars().take(MAX_LABEL_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("\"Login\"\n"), Some("Login".to_string()));
        assert_eq!(clean_label("\n  Label: About phone."), Some("About phone".to_string()));
        assert_eq!(clean_label("NONE"), None);
        assert_eq!(clean_label("   "), None);
    }

    #[test]
    fn test_from_config_without_endpoint() {
        let config = PlannerConfig::default();
        assert!(HttpPlanner::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = HttpPlanner::new("::", "m", None, Duration::from_secs(1));
        assert!(matches!(result, Err(PlannerError::InvalidEndpoint(_))));
    }
}
