use crate::session::DeviceSession;
use crate::transport::Transport;
use serde_json::json;
use tapline_common::element::parse_locator_payload;
use tracing::debug;

impl<T: Transport> DeviceSession<'_, T> {
    /// Take a fresh snapshot of the screen.
    ///
    /// Fetches the page hierarchy and the locator candidates; either may fail
    /// and is then treated as empty. The cached snapshot is always replaced,
    /// the step counter advances, and a screenshot tagged with `reason` is
    /// recorded alongside one trace event.
    pub async fn observe(&mut self, reason: &str) {
        let config = self.config;
        let tools = &config.tools;

        let source = self.client.call(&tools.page_source, json!({})).await;
        let hierarchy = if source.ok { source.text } else { String::new() };

        let candidates = self.client.call(&tools.generate_locators, json!({})).await;
        let elements = if candidates.ok {
            parse_locator_payload(&candidates.text)
        } else {
            Vec::new()
        };

        debug!(
            "[{}] observe({}): {} bytes of hierarchy, {} elements",
            self.ctx.device,
            reason,
            hierarchy.len(),
            elements.len()
        );

        let hierarchy_bytes = hierarchy.len();
        let element_count = elements.len();
        self.ctx.replace_snapshot(hierarchy, elements);

        let step = self.ctx.next_step();
        let screenshot = self.capture(step, reason).await;
        self.trace
            .emit(
                "observe",
                json!({
                    "step": step,
                    "reason": reason,
                    "hierarchy_ok": source.ok,
                    "locators_ok": candidates.ok,
                    "hierarchy_bytes": hierarchy_bytes,
                    "elements": element_count,
                    "screenshot": screenshot.map(|p| p.display().to_string()),
                }),
            )
            .await;
    }
}
