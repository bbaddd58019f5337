mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{MockTransport, default_response};
use serde_json::{Value, json};
use tapline_engine::trace::TraceRecorder;
use tapline_engine::transport::ToolResponse;

fn read_events(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_events_appended_as_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let trace = TraceRecorder::new(dir.path(), "emulator-5554");

    trace
        .record("observe", json!({"step": 1, "reason": "start"}))
        .await
        .unwrap();
    trace.record("click", json!({"step": 2, "ok": false})).await.unwrap();
    trace.emit("note", json!("plain value")).await;

    let events = read_events(trace.path());
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["kind"], "observe");
    assert_eq!(events[0]["device"], "emulator-5554");
    assert_eq!(events[0]["reason"], "start");
    assert_eq!(events[1]["ok"], false);
    assert_eq!(events[2]["value"], "plain value");
    assert!(events.iter().all(|e| e["ts"].as_str().is_some_and(|ts| ts.ends_with('Z'))));
}

#[tokio::test]
async fn test_record_into_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let trace = TraceRecorder::new(&dir.path().join("missing"), "d");
    assert!(trace.record("observe", json!({})).await.is_err());
    // emit swallows the failure.
    trace.emit("observe", json!({})).await;
}

#[tokio::test]
async fn test_observe_writes_screenshot_and_event() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    config.output.screenshots = true;
    let png = STANDARD.encode(b"\x89PNG\r\n\x1a\nfake");
    let (transport, _) = MockTransport::new(move |tool, _, _| match tool {
        "appium_screenshot" => Ok(ToolResponse {
            is_error: Some(false),
            text: "Screenshot captured".into(),
            images: vec![png.clone()],
        }),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());

    session.observe("launch screen").await;

    let shot = dir.path().join("0001_launch_screen.png");
    assert_eq!(std::fs::read(&shot).unwrap(), b"\x89PNG\r\n\x1a\nfake");

    let events = read_events(session.trace().path());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["kind"], "observe");
    assert_eq!(events[0]["step"], 1);
    assert_eq!(events[0]["screenshot"], shot.display().to_string());
}

#[tokio::test]
async fn test_server_side_screenshot_is_moved() {
    let dir = tempfile::tempdir().unwrap();
    let server_dir = tempfile::tempdir().unwrap();
    let server_file = server_dir.path().join("screenshot_1700000000.png");
    std::fs::write(&server_file, b"png-bytes").unwrap();

    let mut config = common::test_config(dir.path());
    config.output.screenshots = true;
    let message = format!("Screenshot saved to {}", server_file.display());
    let (transport, _) = MockTransport::new(move |tool, _, _| match tool {
        "appium_screenshot" => Ok(ToolResponse::ok(message.clone())),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());

    let step = session.context_mut().next_step();
    let saved = session.capture(step, "tap Login").await.unwrap();

    assert_eq!(saved, dir.path().join("0001_tap_Login.png"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"png-bytes");
    assert!(!server_file.exists());
}

#[tokio::test]
async fn test_failed_screenshot_does_not_stop_observation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    config.output.screenshots = true;
    let (transport, _) = MockTransport::new(|tool, _, _| match tool {
        "appium_screenshot" => Ok(ToolResponse::error("Failed to take screenshot")),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());

    session.observe("start").await;

    let events = read_events(session.trace().path());
    assert_eq!(events[0]["screenshot"], Value::Null);
    assert_eq!(session.context().step(), 1);
}

#[tokio::test]
async fn test_plain_text_reply_is_not_saved_as_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    config.output.screenshots = true;
    let (transport, _) = MockTransport::new(|tool, _, _| match tool {
        "appium_screenshot" => Ok(ToolResponse::ok("done")),
        _ => Ok(default_response(tool)),
    });
    let mut session = common::session(transport, &config, dir.path());

    session.observe("start").await;

    assert!(!dir.path().join("0001_start.png").exists());
    let events = read_events(session.trace().path());
    assert_eq!(events[0]["screenshot"], Value::Null);
}
