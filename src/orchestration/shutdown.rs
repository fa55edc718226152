//! Cooperative stop signal shared between the orchestrator and its controller.

use std::sync::Arc;
use tokio::sync::watch;

/// Once triggered, the orchestrator finishes the record in flight and stops
/// before the next record or the next periodic cycle. In-flight remote steps are
/// never interrupted.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Clear a previous stop request so the orchestrator can be started again
    pub fn reset(&self) {
        self.sender.send_replace(false);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal has been triggered
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in self, so the channel cannot close while we wait
        let _ = receiver.wait_for(|stopped| *stopped).await;
    }
}
