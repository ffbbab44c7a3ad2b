//! Alert surfaces used by the binary.
//!
//! The server queues alerts in a [`parlor_core::AlertLog`] that clients drain
//! over HTTP. The CLI has no one to hand them to, so it logs them.

use parlor_core::{Alert, AlertSink, NoAlerts, UserId};
use std::sync::Arc;

/// Writes every alert to the log at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleAlerts;

impl AlertSink for ConsoleAlerts {
    fn permitted(&self, _recipient: &UserId) -> bool {
        true
    }

    fn raise(&self, recipient: &UserId, alert: Alert) {
        tracing::info!(
            recipient = %recipient.as_str(),
            title = %alert.title,
            icon = %alert.icon,
            "Alert: {}",
            alert.body
        );
    }
}

/// The CLI alert surface, or none when `[alerts] enabled = false`.
#[must_use]
pub fn console_sink(enabled: bool) -> Arc<dyn AlertSink> {
    if enabled {
        Arc::new(ConsoleAlerts)
    } else {
        Arc::new(NoAlerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sink_denies_permission() {
        let who = UserId::new("u_1");
        assert!(console_sink(true).permitted(&who));
        assert!(!console_sink(false).permitted(&who));
    }
}
