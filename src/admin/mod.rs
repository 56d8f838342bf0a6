//! Admin dashboard API.
//!
//! Read-mostly view of the monitor for dashboards and readiness checks. Every
//! route requires `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::health::{HealthMonitor, LatestReport};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub monitor: Arc<HealthMonitor>,
    pub latest: Arc<LatestReport>,
    pub api_key: Arc<str>,
}

#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/services", get(get_services))
        .route("/admin/services/{name}", get(get_service))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/last-report", get(get_last_report))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin router until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
