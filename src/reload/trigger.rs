//! Reload triggers and the handle used to enqueue them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::discovery::ServerDefinition;

/// A request to rebuild the routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// Re-query the discovery source (operator signal, admin API).
    Refresh { origin: &'static str },
    /// A full replacement set pushed by the discovery watch.
    Push(Vec<ServerDefinition>),
}

/// The reload queue is gone (orchestrator stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reload queue closed")]
pub struct QueueClosed;

/// Cloneable sender side of the reload queue.
///
/// Every trigger source shares one FIFO queue, so triggers are applied in
/// arrival order. Refresh requests coalesce only while the queued refresh is
/// the newest trigger; once a push is queued behind it, the next refresh
/// queues behind the push.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<ReloadTrigger>,
    refresh_pending: Arc<AtomicBool>,
}

impl ReloadHandle {
    /// Create a handle and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReloadTrigger>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                refresh_pending: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// Queue a poll-and-replace cycle.
    ///
    /// Returns `Ok(false)` when an already queued refresh absorbed this one.
    pub async fn request_refresh(&self, origin: &'static str) -> Result<bool, QueueClosed> {
        if self.refresh_pending.swap(true, Ordering::AcqRel) {
            tracing::debug!(origin, "Refresh already queued");
            return Ok(false);
        }
        if self.tx.send(ReloadTrigger::Refresh { origin }).await.is_err() {
            self.refresh_pending.store(false, Ordering::Release);
            return Err(QueueClosed);
        }
        Ok(true)
    }

    /// Queue a pushed replacement set.
    pub async fn push(&self, servers: Vec<ServerDefinition>) -> Result<(), QueueClosed> {
        self.tx.send(ReloadTrigger::Push(servers)).await.map_err(|_| QueueClosed)?;
        // A refresh queued before this push must not absorb later requests.
        self.refresh_pending.store(false, Ordering::Release);
        Ok(())
    }

    /// Flag the consumer clears when it dequeues a refresh.
    pub(crate) fn pending_flag(&self) -> Arc<AtomicBool> {
        self.refresh_pending.clone()
    }
}
