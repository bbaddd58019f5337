//! Action primitives.
//!
//! Every primitive sends its primary argument shape first and falls back to
//! a compatibility shape on failure. Each primitive invocation ends with one
//! trace event and a screenshot.

use crate::session::DeviceSession;
use crate::transport::Transport;
use serde::Serialize;
use serde_json::{Value, json};
use tapline_common::resolver::{fallback_locators, match_target, text_contains_xpath};
use tapline_common::text::parse_element_handle;
use tapline_common::{Locator, Recovery, RetryLadder, Strategy, SwipeDirection};
use tracing::{debug, info, warn};

/// XPath of the element holding input focus.
pub const FOCUSED_XPATH: &str = "//*[@focused='true']";

/// How a click ladder went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClickReport {
    /// Click attempts made, across all rounds.
    pub attempts: usize,
    pub scrolls: usize,
    pub swipes: usize,
    pub ok: bool,
    /// Locator that was clicked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl<T: Transport> DeviceSession<'_, T> {
    /// Resolve a locator to an element handle.
    pub async fn find_element(&mut self, locator: &Locator) -> Option<String> {
        let strategy = locator.strategy.as_str();
        let mut direct = serde_json::Map::new();
        direct.insert(strategy.to_string(), Value::String(locator.value.clone()));

        let shapes = vec![
            json!({"using": strategy, "value": locator.value}),
            json!({"strategy": strategy, "selector": locator.value}),
            Value::Object(direct),
        ];

        let config = self.config;
        let tool = &config.tools.find_element;
        for args in shapes {
            let outcome = self.client.call(tool, args).await;
            if outcome.ok
                && let Some(handle) = parse_element_handle(&outcome.text)
            {
                debug!("[{}] {} -> {}", self.ctx.device, locator, handle);
                return Some(handle);
            }
        }
        None
    }

    /// Text currently shown by an element, if the server reports it.
    pub async fn read_text(&mut self, handle: &str) -> Option<String> {
        let config = self.config;
        let outcome = self
            .call_shapes(
                &config.tools.get_text,
                vec![json!({"element": handle}), json!({"elementUUID": handle})],
            )
            .await;
        outcome.ok.then_some(outcome.text)
    }

    /// Click an element handle.
    pub async fn click_element(&mut self, handle: &str, locator: &Locator) -> bool {
        let config = self.config;
        let tool = &config.tools.click;
        let outcome = self
            .call_shapes(
                tool,
                vec![json!({"element": handle}), json!({"elementUUID": handle})],
            )
            .await;
        self.finish_primitive(
            "click",
            tool,
            &outcome,
            json!({"locator": locator.to_string(), "element": handle}),
        )
        .await;
        outcome.ok
    }

    /// One click attempt against `target`: the matched element's locators in
    /// rank order, then the generated fallbacks. The first locator that
    /// resolves decides the attempt.
    async fn click_attempt(&mut self, target: &str) -> Option<Locator> {
        let mut candidates: Vec<Locator> = match_target(self.ctx.elements(), target)
            .map(|m| m.element.locators.clone())
            .unwrap_or_default();
        candidates.extend(fallback_locators(target));

        for locator in candidates {
            if let Some(handle) = self.find_element(&locator).await {
                return self.click_element(&handle, &locator).await.then_some(locator);
            }
        }
        None
    }

    /// Click `target`, walking the click ladder until an attempt succeeds.
    ///
    /// Scroll and swipe recoveries re-observe and drain dialogs before the
    /// next attempt.
    pub async fn click_target(&mut self, target: &str) -> ClickReport {
        let config = self.config;
        let execution = &config.execution;
        let ladder = RetryLadder::click(
            execution.action_retries,
            execution.scroll_tries,
            execution.swipe_tries,
        );

        let mut report = ClickReport::default();
        for attempt in ladder.attempts() {
            match attempt.recovery {
                Some(Recovery::Scroll) => report.scrolls += 1,
                Some(Recovery::Swipe(_)) => report.swipes += 1,
                _ => {}
            }
            if let Some(recovery) = attempt.recovery {
                self.recover(recovery, Some(target)).await;
            }

            report.attempts += 1;
            if let Some(locator) = self.click_attempt(target).await {
                info!("[{}] clicked '{}' via {}", self.ctx.device, target, locator);
                report.ok = true;
                report.locator = Some(locator.to_string());
                return report;
            }
            debug!(
                "[{}] click '{}' failed (round {}, stage {})",
                self.ctx.device, target, attempt.round, attempt.stage
            );
        }

        warn!(
            "[{}] could not click '{}' after {} attempts",
            self.ctx.device, target, report.attempts
        );
        report
    }

    /// Type into the focused element. Fails when nothing has focus.
    pub async fn type_text(&mut self, text: &str) -> bool {
        let config = self.config;
        let tool = &config.tools.set_value;
        let focused = Locator::new(Strategy::Xpath, FOCUSED_XPATH);

        let Some(handle) = self.find_element(&focused).await else {
            warn!("[{}] no focused element to type into", self.ctx.device);
            let outcome = crate::client::CallOutcome {
                text: "no focused element".into(),
                ..Default::default()
            };
            self.finish_primitive("type", tool, &outcome, json!({"text": text}))
                .await;
            return false;
        };

        let outcome = self
            .call_shapes(
                tool,
                vec![
                    json!({"element": handle, "text": text}),
                    json!({"elementUUID": handle, "value": text}),
                ],
            )
            .await;
        let readback = if outcome.ok {
            self.read_text(&handle).await
        } else {
            None
        };
        self.finish_primitive(
            "type",
            tool,
            &outcome,
            json!({"text": text, "element": handle, "readback": readback}),
        )
        .await;
        outcome.ok
    }

    /// Scroll until an element labelled `target` is in view.
    pub async fn scroll_to(&mut self, target: &str) -> bool {
        let config = self.config;
        let tool = &config.tools.scroll_to_element;
        let outcome = self
            .call_shapes(
                tool,
                vec![
                    json!({"strategy": "xpath", "selector": text_contains_xpath(target)}),
                    json!({"strategy": "accessibility id", "selector": target}),
                ],
            )
            .await;
        self.finish_primitive("scroll", tool, &outcome, json!({"target": target}))
            .await;
        outcome.ok
    }

    pub async fn swipe(&mut self, direction: SwipeDirection) -> bool {
        let config = self.config;
        let tools = &config.tools;
        let args = json!({"direction": direction.as_str()});

        let mut tool = &tools.swipe;
        let mut outcome = self.client.call(tool, args.clone()).await;
        if !outcome.ok {
            debug!("[{}] swipe failed, falling back to scroll", self.ctx.device);
            tool = &tools.scroll;
            outcome = self.client.call(tool, args).await;
        }
        self.finish_primitive(
            "swipe",
            tool,
            &outcome,
            json!({"direction": direction.as_str()}),
        )
        .await;
        outcome.ok
    }

    /// Bring the application under test to the foreground. Skipped when the
    /// package is unknown.
    pub async fn launch_app(&mut self) -> bool {
        let package = self.ctx.app.app_package.clone();
        if package.is_empty() {
            warn!("[{}] no app package known, skipping launch", self.ctx.device);
            self.trace
                .emit("launch", json!({"ok": false, "skipped": true}))
                .await;
            return false;
        }

        let config = self.config;
        let tool = &config.tools.activate_app;
        let outcome = self
            .call_shapes(
                tool,
                vec![json!({"id": package}), json!({"appPackage": package})],
            )
            .await;
        self.finish_primitive("launch", tool, &outcome, json!({"package": package}))
            .await;
        outcome.ok
    }

    pub async fn accept_alert(&mut self) -> bool {
        let config = self.config;
        let tool = &config.tools.alert;
        let outcome = self
            .call_shapes(tool, vec![json!({"action": "accept"}), json!({"accept": true})])
            .await;
        self.finish_primitive("alert", tool, &outcome, json!({"action": "accept"}))
            .await;
        outcome.ok
    }

    /// Perform a recovery, then re-observe and drain dialogs.
    pub async fn recover(&mut self, recovery: Recovery, target: Option<&str>) {
        let reason = match (recovery, target) {
            (Recovery::Scroll, Some(target)) => {
                self.scroll_to(target).await;
                "after_scroll"
            }
            (Recovery::Scroll, None) => {
                self.swipe(SwipeDirection::Up).await;
                "after_scroll"
            }
            (Recovery::Swipe(direction), _) => {
                self.swipe(direction).await;
                "after_swipe"
            }
            (Recovery::Nudge, _) => {
                self.swipe(SwipeDirection::Up).await;
                "after_nudge"
            }
        };
        self.observe(reason).await;
        self.drain_alerts().await;
    }
}
