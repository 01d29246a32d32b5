//! Serialized reconciliation loop for the routing table.

use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc};

use crate::discovery::{DiscoveryError, DiscoverySource, ServerDefinition};
use crate::observability::metrics;
use crate::reload::trigger::{ReloadHandle, ReloadTrigger};
use crate::routing::{ReplaceSummary, RoutingTable};

/// Outcome of the most recent reload attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    /// What caused the reload (`signal`, `admin`, `watch`, `startup`).
    pub trigger: &'static str,
    /// Seconds since the Unix epoch.
    pub finished_at: u64,
    pub summary: Option<ReplaceSummary>,
    pub error: Option<String>,
}

/// Reload history shared with the admin API.
#[derive(Debug, Default)]
pub struct ReloadStatus {
    last: ArcSwapOption<ReloadReport>,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl ReloadStatus {
    pub fn last(&self) -> Option<Arc<ReloadReport>> {
        self.last.load_full()
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn record(&self, trigger: &'static str, result: &Result<ReplaceSummary, DiscoveryError>) {
        let (summary, error) = match result {
            Ok(summary) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                (Some(*summary), None)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                (None, Some(e.to_string()))
            }
        };
        let finished_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        self.last.store(Some(Arc::new(ReloadReport {
            trigger,
            finished_at,
            summary,
            error,
        })));
    }
}

/// Sole writer of the routing table during normal operation.
///
/// Signal and push triggers arrive on one queue and are applied one at a
/// time, so rebuilds never overlap.
pub struct ReloadOrchestrator {
    table: Arc<RoutingTable>,
    source: Arc<dyn DiscoverySource>,
    rx: mpsc::Receiver<ReloadTrigger>,
    refresh_pending: Arc<AtomicBool>,
    status: Arc<ReloadStatus>,
}

impl ReloadOrchestrator {
    /// Create the orchestrator and the handle used to feed it.
    pub fn new(
        table: Arc<RoutingTable>,
        source: Arc<dyn DiscoverySource>,
        queue_capacity: usize,
    ) -> (Self, ReloadHandle) {
        let (handle, rx) = ReloadHandle::channel(queue_capacity);
        let orchestrator = Self {
            table,
            source,
            rx,
            refresh_pending: handle.pending_flag(),
            status: Arc::new(ReloadStatus::default()),
        };
        (orchestrator, handle)
    }

    pub fn status(&self) -> Arc<ReloadStatus> {
        self.status.clone()
    }

    /// Initial poll-and-replace before traffic is served.
    pub async fn bootstrap(&self) -> Result<ReplaceSummary, DiscoveryError> {
        self.refresh("startup").await
    }

    /// Consume triggers until shutdown or until every handle is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(source = self.source.name(), "Reload orchestrator started");

        loop {
            let trigger = tokio::select! {
                trigger = self.rx.recv() => match trigger {
                    Some(trigger) => trigger,
                    None => break,
                },
                _ = shutdown.recv() => break,
            };
            self.apply(trigger).await;
        }

        tracing::info!("Reload orchestrator stopped");
    }

    async fn apply(&self, trigger: ReloadTrigger) {
        match trigger {
            ReloadTrigger::Refresh { origin } => {
                // Later refresh requests queue behind this one instead of merging into it.
                self.refresh_pending.store(false, Ordering::Release);
                tracing::info!(origin, "Reloading region routes from discovery");
                let _ = self.refresh(origin).await;
            }
            ReloadTrigger::Push(servers) => {
                self.replace("watch", &servers);
            }
        }
    }

    async fn refresh(&self, trigger: &'static str) -> Result<ReplaceSummary, DiscoveryError> {
        match self.source.poll().await {
            Ok(servers) => Ok(self.replace(trigger, &servers)),
            Err(e) => {
                tracing::error!(
                    trigger,
                    source = self.source.name(),
                    error = %e,
                    generation = self.table.generation(),
                    "Discovery query failed, keeping current routes"
                );
                metrics::record_reload(trigger, false);
                let result = Err(e);
                self.status.record(trigger, &result);
                result
            }
        }
    }

    fn replace(&self, trigger: &'static str, servers: &[ServerDefinition]) -> ReplaceSummary {
        let summary = self.table.replace_all(servers);

        if summary.skipped_duplicates > 0 {
            tracing::warn!(
                trigger,
                skipped = summary.skipped_duplicates,
                "Discovery returned more than one server for some regions; kept the first"
            );
        }
        tracing::info!(
            trigger,
            generation = summary.generation,
            installed = summary.installed,
            rejected = summary.rejected,
            "Region routes replaced"
        );

        metrics::record_reload(trigger, true);
        metrics::record_table(&summary, self.table.len());
        self.status.record(trigger, &Ok(summary));
        summary
    }
}
