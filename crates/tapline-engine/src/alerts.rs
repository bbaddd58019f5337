use crate::session::DeviceSession;
use crate::transport::Transport;
use tapline_common::text::has_alert_keyword;
use tracing::{info, warn};

impl<T: Transport> DeviceSession<'_, T> {
    /// Dismiss transient dialogs visible in the cached hierarchy.
    ///
    /// Each round accepts the dialog and re-observes; the loop ends when the
    /// hierarchy is clear or `alert_max` accepts have been issued. Returns
    /// whether anything was accepted. A dialog that survives the bound is
    /// left in place.
    pub async fn drain_alerts(&mut self) -> bool {
        let bound = self.config.execution.alert_max;
        let mut acted = false;

        for round in 1..=bound {
            if !has_alert_keyword(self.ctx.hierarchy()) {
                return acted;
            }
            info!("[{}] dismissing dialog ({}/{})", self.ctx.device, round, bound);
            self.accept_alert().await;
            self.observe("after_alert").await;
            acted = true;
        }

        if has_alert_keyword(self.ctx.hierarchy()) {
            warn!(
                "[{}] dialog still present after {} accepts",
                self.ctx.device, bound
            );
        }
        acted
    }
}
