//! Shutdown coordination.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks subscribe, then drop their receiver once they have
/// stopped, which lets [`drain`](Self::drain) tell when they are done.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        tracing::info!(tasks = self.tx.receiver_count(), "Shutdown triggered");
        let _ = self.tx.send(());
    }

    /// Number of tasks still holding a receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait until every subscriber has gone away or `deadline` elapses.
    /// Returns true if all tasks finished in time.
    pub async fn drain(&self, deadline: Duration) -> bool {
        let until = Instant::now() + deadline;
        while self.receiver_count() > 0 {
            if Instant::now() >= until {
                tracing::warn!(remaining = self.receiver_count(), "Shutdown deadline reached with tasks still running");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_waits_for_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let task = tokio::spawn(async move {
            let _ = rx.recv().await;
        });

        shutdown.trigger();
        assert!(shutdown.drain(Duration::from_secs(2)).await);
        task.await.unwrap();
        assert_eq!(shutdown.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_deadline() {
        let shutdown = Shutdown::new();
        let _stuck = shutdown.subscribe();

        shutdown.trigger();
        assert!(!shutdown.drain(Duration::from_millis(50)).await);
    }
}
