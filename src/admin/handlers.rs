use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::admin::AdminState;
use crate::reload::ReloadReport;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub generation: u64,
    pub routes: usize,
    pub reloads_succeeded: u64,
    pub reloads_failed: u64,
    pub last_reload: Option<ReloadReport>,
}

#[derive(Serialize)]
pub struct RoutesView {
    pub generation: u64,
    pub routes: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct ReloadAccepted {
    /// False when an already queued refresh absorbed this request.
    pub queued: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.table.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        generation: snapshot.generation(),
        routes: snapshot.len(),
        reloads_succeeded: state.status.succeeded(),
        reloads_failed: state.status.failed(),
        last_reload: state.status.last().map(|report| ReloadReport::clone(&report)),
    })
}

pub async fn get_routes(State(state): State<AdminState>) -> Json<RoutesView> {
    let snapshot = state.table.snapshot();
    Json(RoutesView {
        generation: snapshot.generation(),
        routes: snapshot.entries().into_iter().collect(),
    })
}

pub async fn post_reload(
    State(state): State<AdminState>,
) -> Result<(StatusCode, Json<ReloadAccepted>), StatusCode> {
    match state.reload.request_refresh("admin").await {
        Ok(queued) => {
            tracing::info!(queued, "Reload requested via admin API");
            Ok((StatusCode::ACCEPTED, Json(ReloadAccepted { queued })))
        }
        Err(e) => {
            tracing::error!(error = %e, "Reload requested but orchestrator is not running");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
