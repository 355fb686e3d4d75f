//! Navigation side effect at the UI boundary.

use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receives full-page navigations requested by the gateway, such as the
/// redirect to the sign-in page after the session expired.
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: &str);
}

/// Navigator for non-UI contexts: logs the target and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn redirect(&self, target: &str) {
        info!(location = %target, "Re-authentication required");
    }
}

/// Navigator that forwards targets to a UI task over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn redirect(&self, target: &str) {
        if self.tx.send(target.to_string()).is_err() {
            warn!(location = %target, "Navigation receiver dropped");
        }
    }
}
