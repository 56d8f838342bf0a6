use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::error::MonitorError;
use crate::health::{AggregatedResult, HealthReport};
use crate::resilience::BreakerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub services: usize,
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = match &self {
            MonitorError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::ZeroPeriod => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        services: state.monitor.len(),
    })
}

/// Runs a full one-shot sweep.
pub async fn get_services(State(state): State<AdminState>) -> Json<HealthReport> {
    Json(state.monitor.check_all_services().await)
}

pub async fn get_service(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<AggregatedResult>, MonitorError> {
    state.monitor.check_service(&name).await.map(Json)
}

/// Breaker states without probing anything.
pub async fn get_breakers(
    State(state): State<AdminState>,
) -> Json<BTreeMap<String, BreakerSnapshot>> {
    Json(state.monitor.snapshot())
}

pub async fn get_last_report(State(state): State<AdminState>) -> Json<Option<HealthReport>> {
    Json(state.latest.latest())
}
