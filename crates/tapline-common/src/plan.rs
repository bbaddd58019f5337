use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Intent used by the single-step plan substituted for missing planner output.
pub const FALLBACK_INTENT: &str = "Launch the app";

/// One test intent and the marker that proves it worked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the plan.
    #[serde(rename = "step")]
    pub index: usize,
    pub intent: String,
    /// Substring expected on screen afterwards; empty means no verification.
    #[serde(default)]
    pub expected: String,
}

/// Ordered, immutable list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    /// Build a plan from `(intent, expected)` pairs, numbering from 1.
    pub fn new<I, S, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, E)>,
        S: Into<String>,
        E: Into<String>,
    {
        let steps = entries
            .into_iter()
            .enumerate()
            .map(|(i, (intent, expected))| Step {
                index: i + 1,
                intent: intent.into(),
                expected: expected.into(),
            })
            .collect();
        Self { steps }
    }

    /// The single-step plan used when no usable plan is available.
    pub fn fallback() -> Self {
        Self::new([(FALLBACK_INTENT, "")])
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Identity of the application under test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppIdentity {
    pub app_package: String,
    pub app_activity: String,
    pub app_name: String,
    pub platform: String,
}

/// Parse planner output into a plan.
///
/// Accepts a JSON array of step objects, or an object holding one under
/// `steps`/`plan`, optionally wrapped in prose or a fenced code block. Steps
/// are renumbered in document order; entries without an intent are skipped.
/// Returns `None` when nothing usable is found.
pub fn parse_plan(raw: &str) -> Option<Plan> {
    let value = extract_json(raw)?;
    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ["steps", "plan", "test_steps"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))?
            .as_slice(),
        _ => return None,
    };

    let entries: Vec<(String, String)> = items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let intent = first_str(obj, &["intent", "action", "description"])?;
            let expected = first_str(obj, &["expected", "expect", "verify"]).unwrap_or_default();
            Some((intent, expected))
        })
        .collect();

    (!entries.is_empty()).then(|| Plan::new(entries))
}

/// Parse planner output into an application identity. Missing fields stay
/// empty; output without a JSON object yields `None`.
pub fn parse_identity(raw: &str) -> Option<AppIdentity> {
    match extract_json(raw)? {
        value @ Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Find the first JSON array or object embedded in `raw`.
///
/// Tolerates leading prose and code fences; trailing text after the value
/// is ignored.
pub fn extract_json(raw: &str) -> Option<Value> {
    for (start, c) in raw.char_indices() {
        if c != '[' && c != '{' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_array() {
        let raw = r#"[{"step": 1, "intent": "Open Settings", "expected": "Settings"},
                      {"step": 2, "intent": "tap About phone", "expected": ""}]"#;
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps()[0].index, 1);
        assert_eq!(plan.steps()[1].intent, "tap About phone");
        assert_eq!(plan.steps()[1].expected, "");
    }

    #[test]
    fn test_parse_plan_fenced_object() {
        let raw = "Here is the plan:\n```json\n{\"steps\": [{\"intent\": \"tap Login\"}, {\"note\": \"skip\"}, {\"action\": \"Type: bob\", \"expected\": \"Welcome\"}]}\n```";
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps()[1].index, 2);
        assert_eq!(plan.steps()[1].intent, "Type: bob");
        assert_eq!(plan.steps()[1].expected, "Welcome");
    }

    #[test]
    fn test_parse_plan_malformed() {
        assert!(parse_plan("").is_none());
        assert!(parse_plan("I cannot help with that").is_none());
        assert!(parse_plan("[{\"intent\": ").is_none());
        assert!(parse_plan("[]").is_none());
        assert!(parse_plan("{\"steps\": \"none\"}").is_none());
    }

    #[test]
    fn test_fallback_plan() {
        let plan = Plan::fallback();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.steps()[0].index, 1);
        assert_eq!(plan.steps()[0].intent, FALLBACK_INTENT);
        assert!(plan.steps()[0].expected.is_empty());
    }

    #[test]
    fn test_plan_serializes_step_numbers() {
        let json = serde_json::to_value(Plan::new([("tap Login", "Home")])).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"step": 1, "intent": "tap Login", "expected": "Home"}])
        );
    }

    #[test]
    fn test_parse_identity() {
        let raw = r#"{"appPackage": "com.android.settings", "appActivity": ".Settings", "appName": "Settings"}"#;
        let identity = parse_identity(raw).unwrap();
        assert_eq!(identity.app_package, "com.android.settings");
        assert_eq!(identity.platform, "");
        assert!(parse_identity("[1, 2]").is_none());
        assert!(parse_identity("nothing").is_none());
    }
}
