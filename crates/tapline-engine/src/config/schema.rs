use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaplineConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tools: ToolNames,
    #[serde(default)]
    pub planner: PlannerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    #[serde(default = "default_tool_attempts")]
    pub tool_attempts: usize,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_automation_name")]
    pub automation_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            tool_timeout_ms: default_tool_timeout_ms(),
            tool_attempts: default_tool_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            platform: default_platform(),
            automation_name: default_automation_name(),
        }
    }
}

impl ServerConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/mcp".to_string()
}

fn default_tool_timeout_ms() -> u64 {
    30000
}

fn default_tool_attempts() -> usize {
    2
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_platform() -> String {
    "Android".to_string()
}

fn default_automation_name() -> String {
    "UiAutomator2".to_string()
}

/// Retry bounds and pacing of the step orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_action_delay_ms")]
    pub action_delay_ms: u64,
    #[serde(default = "default_action_retries")]
    pub action_retries: usize,
    #[serde(default = "default_verify_retries")]
    pub verify_retries: usize,
    #[serde(default = "default_scroll_tries")]
    pub scroll_tries: usize,
    #[serde(default = "default_swipe_tries")]
    pub swipe_tries: usize,
    #[serde(default = "default_alert_max")]
    pub alert_max: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            action_delay_ms: default_action_delay_ms(),
            action_retries: default_action_retries(),
            verify_retries: default_verify_retries(),
            scroll_tries: default_scroll_tries(),
            swipe_tries: default_swipe_tries(),
            alert_max: default_alert_max(),
        }
    }
}

impl ExecutionConfig {
    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }
}

fn default_action_delay_ms() -> u64 {
    800
}

fn default_action_retries() -> usize {
    2
}

fn default_verify_retries() -> usize {
    3
}

fn default_scroll_tries() -> usize {
    2
}

fn default_swipe_tries() -> usize {
    2
}

fn default_alert_max() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Line cap applied to every tool response.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Byte cap applied to every tool response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    /// Byte cap for raw output copied into trace events.
    #[serde(default = "default_trace_output_bytes")]
    pub trace_output_bytes: usize,
    #[serde(default = "default_screenshots")]
    pub screenshots: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            max_lines: default_max_lines(),
            max_bytes: default_max_bytes(),
            trace_output_bytes: default_trace_output_bytes(),
            screenshots: default_screenshots(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("runs")
}

fn default_max_lines() -> usize {
    4000
}

fn default_max_bytes() -> usize {
    200_000
}

fn default_trace_output_bytes() -> usize {
    2000
}

fn default_screenshots() -> bool {
    true
}

/// Remote tool names. Defaults match the appium MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolNames {
    pub create_session: String,
    pub delete_session: String,
    pub find_element: String,
    pub click: String,
    pub get_text: String,
    pub set_value: String,
    pub page_source: String,
    pub generate_locators: String,
    pub scroll_to_element: String,
    pub scroll: String,
    pub swipe: String,
    pub alert: String,
    pub activate_app: String,
    pub screenshot: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            create_session: "create_session".into(),
            delete_session: "delete_session".into(),
            find_element: "appium_find_element".into(),
            click: "appium_click".into(),
            get_text: "appium_get_text".into(),
            set_value: "appium_set_value".into(),
            page_source: "appium_get_page_source".into(),
            generate_locators: "generate_locators".into(),
            scroll_to_element: "appium_scroll_to_element".into(),
            scroll: "appium_scroll".into(),
            swipe: "appium_swipe".into(),
            alert: "appium_alert".into(),
            activate_app: "appium_activate_app".into(),
            screenshot: "appium_screenshot".into(),
        }
    }
}

/// Network planner settings. Without an endpoint the deterministic fallback
/// planner is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_planner_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_planner_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_planner_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_planner_timeout_ms(),
        }
    }
}

fn default_planner_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "TAPLINE_PLANNER_API_KEY".to_string()
}

fn default_planner_timeout_ms() -> u64 {
    60000
}
