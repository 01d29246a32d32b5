//! Admin API.
//!
//! ```text
//! GET  /admin/status   version, table generation, reload counters
//! GET  /admin/routes   current region → target table
//! POST /admin/reload   queue a poll-and-replace cycle
//! ```
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::reload::{ReloadHandle, ReloadStatus};
use crate::routing::RoutingTable;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub table: Arc<RoutingTable>,
    pub status: Arc<ReloadStatus>,
    pub reload: ReloadHandle,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/reload", post(post_reload))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
