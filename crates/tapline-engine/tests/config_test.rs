use std::io::Write;
use tapline_engine::config::{ConfigError, ConfigLoader, TaplineConfig};
use tempfile::NamedTempFile;

#[test]
fn test_default_values() {
    let config = TaplineConfig::default();
    assert_eq!(config.server.endpoint, "http://127.0.0.1:8080/mcp");
    assert_eq!(config.server.tool_timeout_ms, 30000);
    assert_eq!(config.server.tool_attempts, 2);
    assert_eq!(config.execution.action_retries, 2);
    assert_eq!(config.execution.verify_retries, 3);
    assert_eq!(config.execution.alert_max, 5);
    assert_eq!(config.tools.find_element, "appium_find_element");
    assert!(config.planner.endpoint.is_none());
    assert!(config.devices.is_empty());
}

#[tokio::test]
async fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
server:
  endpoint: "http://10.0.0.2:9000/mcp"
  tool_attempts: 4
devices:
  - emulator-5554
  - R58M123ABC
execution:
  action_delay_ms: 0
  scroll_tries: 1
tools:
  click: custom_click
"#
    )
    .unwrap();

    let config = ConfigLoader::load_from(file.path())
        .await
        .expect("Failed to load config from file");

    assert_eq!(config.server.endpoint, "http://10.0.0.2:9000/mcp");
    assert_eq!(config.server.tool_attempts, 4);
    // Unspecified fields keep their defaults.
    assert_eq!(config.server.tool_timeout_ms, 30000);
    assert_eq!(config.devices, vec!["emulator-5554", "R58M123ABC"]);
    assert_eq!(config.execution.action_delay_ms, 0);
    assert_eq!(config.execution.scroll_tries, 1);
    assert_eq!(config.execution.swipe_tries, 2);
    assert_eq!(config.tools.click, "custom_click");
    assert_eq!(config.tools.swipe, "appium_swipe");
}

#[tokio::test]
async fn test_load_empty_file() {
    let file = NamedTempFile::new().unwrap();
    let config = ConfigLoader::load_from(file.path()).await.unwrap();
    assert_eq!(config.output.max_lines, TaplineConfig::default().output.max_lines);
}

#[tokio::test]
async fn test_load_from_nonexistent_file() {
    let result =
        ConfigLoader::load_from(std::path::Path::new("/nonexistent/path/tapline.yaml")).await;
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[tokio::test]
async fn test_load_invalid_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "server: [unclosed").unwrap();
    let result = ConfigLoader::load_from(file.path()).await;
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[tokio::test]
async fn test_wrong_type_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "execution:\n  action_retries: many").unwrap();
    let result = ConfigLoader::load_from(file.path()).await;
    assert!(result.is_err());
}
