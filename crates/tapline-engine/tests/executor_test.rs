mod common;

use common::{HANDLE, MockTransport, count, default_response, not_found};
use serde_json::json;
use tapline_common::{ActionKind, Plan, RetryLadder};
use tapline_engine::planner::FallbackPlanner;
use tapline_engine::transport::ToolResponse;
use tapline_engine::{RunStatus, StepExecutor, StepState};

const LOGIN_ELEMENTS: &str = r#"[
    {"text": "Register", "locators": {"accessibility id": "register"}},
    {"text": "Login", "resourceId": "com.example.app:id/login",
     "locators": {"xpath": "//android.widget.Button[@text='Login']", "id": "com.example.app:id/login"}}
]"#;

const LOGIN_SCREEN: &str = "<hierarchy><node text='Login'/><node text='Register'/></hierarchy>";
const WELCOME_SCREEN: &str = "<hierarchy><node text='Welcome back'/></hierarchy>";

#[tokio::test]
async fn test_direct_id_click() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, log) = MockTransport::new(|tool, _, history| match tool {
        "appium_get_page_source" if count(history, "appium_click") > 0 => {
            Ok(ToolResponse::ok(WELCOME_SCREEN))
        }
        "appium_get_page_source" => Ok(ToolResponse::ok(LOGIN_SCREEN)),
        "generate_locators" => Ok(ToolResponse::ok(LOGIN_ELEMENTS)),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();
    let plan = Plan::new([("Tap \"Login\"", "Welcome")]);

    let (status, steps) = StepExecutor::new(&mut session, &planner).run(&plan).await;

    assert_eq!(status, RunStatus::Success);
    let step = &steps[0];
    assert_eq!(step.action, ActionKind::Click);
    assert_eq!(step.target.as_deref(), Some("Login"));
    assert_eq!(step.state, StepState::Verified);
    let click = step.click.as_ref().unwrap();
    assert_eq!(click.attempts, 1);
    assert_eq!(click.scrolls, 0);
    assert_eq!(click.swipes, 0);

    assert_eq!(
        log.of("appium_find_element")[0],
        json!({"using": "id", "value": "com.example.app:id/login"})
    );
    assert_eq!(log.of("appium_click"), vec![json!({"element": HANDLE})]);
}

#[tokio::test]
async fn test_click_recovers_after_one_scroll() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, log) = MockTransport::new(|tool, _, history| {
        let scrolled = count(history, "appium_scroll_to_element") > 0;
        match tool {
            "appium_get_page_source" => Ok(ToolResponse::ok(LOGIN_SCREEN)),
            "generate_locators" if scrolled => Ok(ToolResponse::ok(LOGIN_ELEMENTS)),
            "generate_locators" => Ok(ToolResponse::ok("[]")),
            "appium_find_element" if !scrolled => Ok(not_found()),
            _ => Ok(default_response(tool)),
        }
    });
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();
    let plan = Plan::new([("tap Login", "")]);

    let (status, steps) = StepExecutor::new(&mut session, &planner).run(&plan).await;

    assert_eq!(status, RunStatus::Success);
    let click = steps[0].click.as_ref().unwrap();
    assert!(click.ok);
    assert_eq!(click.attempts, 2);
    assert_eq!(click.scrolls, 1);
    assert_eq!(click.swipes, 0);
    assert_eq!(log.count("appium_scroll_to_element"), 1);
    let scroll = &log.of("appium_scroll_to_element")[0];
    assert_eq!(scroll["strategy"], "xpath");
    assert!(scroll["selector"].as_str().unwrap().contains("Login"));
    assert_eq!(log.of("appium_click"), vec![json!({"element": HANDLE})]);
}

#[tokio::test]
async fn test_click_attempts_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, log) = MockTransport::new(|tool, _, _| match tool {
        "generate_locators" => Ok(ToolResponse::ok(LOGIN_ELEMENTS)),
        "appium_click" => Ok(ToolResponse::error("element not interactable")),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());

    let report = session.click_target("Login").await;
    let execution = &config.execution;
    let bound = RetryLadder::click(
        execution.action_retries,
        execution.scroll_tries,
        execution.swipe_tries,
    )
    .bound();

    assert!(!report.ok);
    assert_eq!(bound, 10);
    assert_eq!(report.attempts, bound);
    assert_eq!(report.scrolls, 2 * execution.scroll_tries);
    assert_eq!(report.swipes, 2 * execution.swipe_tries);
    // Each attempt clicks once, with the primary and the alternate shape.
    assert_eq!(log.count("appium_click"), 2 * bound);
}

#[tokio::test]
async fn test_verify_exhaustion_blocks_and_halts() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, log) = MockTransport::new(|tool, _, _| match tool {
        "appium_get_page_source" => Ok(ToolResponse::ok(LOGIN_SCREEN)),
        "generate_locators" => Ok(ToolResponse::ok(LOGIN_ELEMENTS)),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();
    let plan = Plan::new([("Tap \"Login\"", "Welcome"), ("Tap \"Register\"", "")]);

    let (status, steps) = StepExecutor::new(&mut session, &planner).run(&plan).await;

    assert_eq!(status, RunStatus::Blocked);
    assert_eq!(steps.len(), 1);
    let step = &steps[0];
    assert!(step.action_ok);
    assert!(!step.verified);
    assert_eq!(step.checks, config.execution.verify_retries);
    assert_eq!(step.state, StepState::Blocked);
    let reason = step.reason.as_deref().unwrap();
    assert!(reason.contains("Welcome"));
    assert!(reason.contains("Login"));
    // A nudge between consecutive checks.
    assert_eq!(log.count("appium_swipe"), config.execution.verify_retries - 1);
    assert_eq!(log.of("appium_swipe")[0], json!({"direction": "up"}));
}

#[tokio::test]
async fn test_failed_action_skips_verification() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    config.execution.action_retries = 1;
    config.execution.scroll_tries = 0;
    config.execution.swipe_tries = 0;
    let (transport, log) = MockTransport::new(|tool, _, _| match tool {
        "appium_find_element" => Ok(not_found()),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();
    let plan = Plan::new([("tap Checkout", "Order placed")]);

    let (status, steps) = StepExecutor::new(&mut session, &planner).run(&plan).await;

    assert_eq!(status, RunStatus::Blocked);
    assert!(!steps[0].action_ok);
    assert!(!steps[0].verified);
    assert_eq!(steps[0].checks, 0);
    assert!(steps[0].reason.as_deref().unwrap().contains("Checkout"));
    assert_eq!(log.count("appium_click"), 0);
    assert_eq!(log.count("appium_swipe"), 0);
}

#[tokio::test]
async fn test_type_into_focused_element() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, log) = MockTransport::idle();
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();
    let plan = Plan::new([("Type: alice@example.com", "")]);

    let (status, steps) = StepExecutor::new(&mut session, &planner).run(&plan).await;

    assert_eq!(status, RunStatus::Success);
    assert_eq!(steps[0].action, ActionKind::Type);
    assert_eq!(
        log.of("appium_find_element")[0],
        json!({"using": "xpath", "value": "//*[@focused='true']"})
    );
    assert_eq!(
        log.of("appium_set_value"),
        vec![json!({"element": HANDLE, "text": "alice@example.com"})]
    );
    assert_eq!(log.of("appium_get_text"), vec![json!({"element": HANDLE})]);
}

#[tokio::test]
async fn test_type_without_focus_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, log) = MockTransport::new(|tool, _, _| match tool {
        "appium_find_element" => Ok(not_found()),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();
    let plan = Plan::new([("Enter \"hunter2\"", "")]);

    let (status, _) = StepExecutor::new(&mut session, &planner).run(&plan).await;

    assert_eq!(status, RunStatus::Blocked);
    assert_eq!(log.count("appium_set_value"), 0);
}

#[tokio::test]
async fn test_none_step_is_trivially_successful() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, log) = MockTransport::idle();
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();

    let (status, steps) = StepExecutor::new(&mut session, &planner)
        .run(&Plan::fallback())
        .await;

    assert_eq!(status, RunStatus::Success);
    assert_eq!(steps[0].action, ActionKind::None);
    assert_eq!(steps[0].state, StepState::Verified);
    // Observed before and after the step.
    assert_eq!(log.count("appium_get_page_source"), 2);
    assert_eq!(log.count("appium_click"), 0);
}

#[tokio::test]
async fn test_prepare_launches_app() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, log) = MockTransport::idle();
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();

    StepExecutor::new(&mut session, &planner).prepare().await;

    assert_eq!(
        log.of("appium_activate_app"),
        vec![json!({"id": "com.example.app"})]
    );
    assert_eq!(log.count("appium_get_page_source"), 2);
    // Observe, launch, observe.
    assert_eq!(session.context().step(), 3);
}

#[tokio::test]
async fn test_step_counter_orders_trace() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path());
    let (transport, _) = MockTransport::idle();
    let mut session = common::session(transport, &config, dir.path());
    let planner = FallbackPlanner::new();
    let plan = Plan::new([("tap Home", ""), ("scroll down", "")]);

    StepExecutor::new(&mut session, &planner).run(&plan).await;

    let trace = std::fs::read_to_string(session.trace().path()).unwrap();
    let steps: Vec<u64> = trace
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter_map(|e| e["step"].as_u64())
        .collect();
    assert!(!steps.is_empty());
    assert!(steps.windows(2).all(|w| w[0] < w[1]));
}
