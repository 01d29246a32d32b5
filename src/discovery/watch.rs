//! Push-side discovery driver.
//!
//! Runs a source's blocking watch in a loop and forwards every changed batch
//! to the reload queue. A failed or dropped watch is retried with exponential
//! backoff; the routing table keeps its last-known-good generation meanwhile.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::discovery::{DiscoveryError, DiscoverySource};
use crate::reload::ReloadHandle;
use crate::resilience::Backoff;

/// Long-lived task feeding discovery batches into the reload queue.
pub struct DiscoveryWatcher {
    source: Arc<dyn DiscoverySource>,
    handle: ReloadHandle,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl DiscoveryWatcher {
    pub fn new(source: Arc<dyn DiscoverySource>, handle: ReloadHandle, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            source,
            handle,
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let source = self.source.name();
        tracing::info!(source, "Discovery watch starting");

        let mut index: u64 = 0;
        let mut backoff = Backoff::new(self.base_delay_ms, self.max_delay_ms);

        loop {
            let result = tokio::select! {
                result = self.source.watch(index) => result,
                _ = shutdown.recv() => break,
            };
            // Without an index the next watch would return at once; pace it like a failure.
            let result = result.and_then(|batch| match batch.index {
                0 => Err(DiscoveryError::MissingIndex),
                _ => Ok(batch),
            });

            match result {
                Ok(batch) => {
                    let failures = backoff.reset();
                    if failures > 0 {
                        tracing::info!(source, failures, "Discovery watch re-established");
                    }

                    if batch.index < index {
                        // Catalog state was reset; start over with a non-blocking read.
                        tracing::info!(source, previous = index, index = batch.index, "Discovery index went backwards, resetting");
                        index = 0;
                        continue;
                    }
                    if batch.index == index {
                        tracing::trace!(source, index, "Discovery watch returned without changes");
                        continue;
                    }

                    tracing::debug!(source, index = batch.index, servers = batch.servers.len(), "Discovery change received");
                    if self.handle.push(batch.servers).await.is_err() {
                        tracing::warn!(source, "Reload queue closed, stopping discovery watch");
                        break;
                    }
                    index = batch.index;
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    if matches!(err, DiscoveryError::MissingIndex) {
                        index = 0;
                    }
                    match &err {
                        DiscoveryError::Malformed(_) => {
                            tracing::error!(source, error = %err, "Dropping malformed discovery payload")
                        }
                        _ => tracing::warn!(source, error = %err, delay = ?delay, "Discovery watch failed, retrying"),
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.recv() => break,
                    }
                }
            }
        }

        tracing::info!(source, "Discovery watch stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DiscoveryFuture, ServerDefinition, WatchBatch};
    use crate::reload::ReloadTrigger;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Replays scripted watch results, then blocks forever.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<WatchBatch, DiscoveryError>>>,
        seen_indexes: Mutex<Vec<u64>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<WatchBatch, DiscoveryError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen_indexes: Mutex::new(Vec::new()),
            }
        }
    }

    impl DiscoverySource for ScriptedSource {
        fn poll(&self) -> DiscoveryFuture<'_, Vec<ServerDefinition>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn watch(&self, last_index: u64) -> DiscoveryFuture<'_, WatchBatch> {
            self.seen_indexes.lock().unwrap().push(last_index);
            let next = self.script.lock().unwrap().pop_front();
            Box::pin(async move {
                match next {
                    Some(result) => result,
                    None => std::future::pending().await,
                }
            })
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn batch(index: u64, code: &str) -> Result<WatchBatch, DiscoveryError> {
        Ok(WatchBatch {
            index,
            servers: vec![ServerDefinition::new(format!("https://{code}.x.com"), code, false)],
        })
    }

    async fn next_push(rx: &mut mpsc::Receiver<ReloadTrigger>) -> Vec<ServerDefinition> {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(ReloadTrigger::Push(servers))) => servers,
            other => panic!("expected a push trigger, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pushes_changes_and_retries_after_errors() {
        let source = Arc::new(ScriptedSource::new(vec![
            batch(10, "de"),
            batch(10, "de"), // unchanged: not pushed
            Err(DiscoveryError::Request("connection reset".into())),
            Err(DiscoveryError::Malformed("truncated".into())),
            batch(12, "fr"),
        ]));
        let (handle, mut rx) = ReloadHandle::channel(8);
        let watcher = DiscoveryWatcher::new(source.clone(), handle, 1, 5);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(watcher.run(shutdown_rx));

        assert_eq!(next_push(&mut rx).await[0].country_code, "de");
        assert_eq!(next_push(&mut rx).await[0].country_code, "fr");

        let _ = shutdown_tx.send(());
        task.await.unwrap();

        // The index survives failed attempts so the next watch resumes blocking.
        assert_eq!(*source.seen_indexes.lock().unwrap(), vec![0, 10, 10, 10, 10, 12]);
    }

    #[tokio::test]
    async fn test_backwards_index_restarts_from_zero() {
        let source = Arc::new(ScriptedSource::new(vec![
            batch(10, "de"),
            batch(4, "fr"), // reset: re-read without blocking
            batch(6, "it"),
        ]));
        let (handle, mut rx) = ReloadHandle::channel(8);
        let watcher = DiscoveryWatcher::new(source.clone(), handle, 1, 5);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(watcher.run(shutdown_rx));

        assert_eq!(next_push(&mut rx).await[0].country_code, "de");
        assert_eq!(next_push(&mut rx).await[0].country_code, "it");

        let _ = shutdown_tx.send(());
        task.await.unwrap();

        assert_eq!(*source.seen_indexes.lock().unwrap(), vec![0, 10, 0, 6]);
    }

    #[tokio::test]
    async fn test_missing_index_backs_off_without_pushing() {
        let unindexed = || {
            Ok(WatchBatch {
                index: 0,
                servers: vec![ServerDefinition::new("https://de.x.com", "de", false)],
            })
        };
        let source = Arc::new(ScriptedSource::new(vec![unindexed(), unindexed(), batch(7, "fr")]));
        let (handle, mut rx) = ReloadHandle::channel(8);
        let watcher = DiscoveryWatcher::new(source.clone(), handle, 20, 40);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let started = tokio::time::Instant::now();
        let task = tokio::spawn(watcher.run(shutdown_rx));

        // Unindexed batches are never pushed; the first push is the indexed one.
        assert_eq!(next_push(&mut rx).await[0].country_code, "fr");
        assert!(started.elapsed() >= Duration::from_millis(60), "retries were not paced");

        let _ = shutdown_tx.send(());
        task.await.unwrap();

        assert_eq!(*source.seen_indexes.lock().unwrap(), vec![0, 0, 0, 7]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stops_when_queue_closes() {
        let source = Arc::new(ScriptedSource::new(vec![batch(3, "de")]));
        let (handle, rx) = ReloadHandle::channel(1);
        drop(rx);

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let watcher = DiscoveryWatcher::new(source, handle, 1, 5);
        tokio::time::timeout(Duration::from_secs(2), watcher.run(shutdown_rx))
            .await
            .expect("watcher should exit once the queue is closed");
    }
}
