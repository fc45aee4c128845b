//! Stop coordination for accept loops.

use tokio::sync::watch;

/// Coordinator for stopping the accept loops.
///
/// Backed by a watch channel so a loop that subscribes after `trigger`
/// still observes the stop.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half handed to each accept loop.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolve once stop was triggered or the coordinator was dropped.
    pub async fn stopped(&mut self) {
        // Err means the sender is gone, which is a stop as well.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn late_subscriber_sees_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut signal = shutdown.subscribe();
        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .expect("stop should already be visible");
    }

    #[tokio::test]
    async fn dropping_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .expect("dropped coordinator counts as stop");
    }

    #[tokio::test]
    async fn untriggered_signal_stays_pending() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.stopped()).await;
        assert!(waited.is_err());
    }
}
