use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::tracker::{Position, StatsSnapshot};
use crate::web::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub observer_name: Option<String>,
    pub observer: Position,
    pub coarse_radius_km: f64,
    pub landing_radius_km: f64,
    pub check_interval_seconds: i64,
    pub retention_seconds: i64,
    pub tracked: usize,
    pub stats: StatsSnapshot,
}

#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Monitor configuration and counters", body = StatusResponse)
    ),
    tag = "status"
)]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let policy = &state.policy;
    Json(StatusResponse {
        observer_name: state.observer_name.clone(),
        observer: policy.observer,
        coarse_radius_km: policy.coarse_radius_km,
        landing_radius_km: policy.landing_radius_km,
        check_interval_seconds: policy.check_interval.num_seconds(),
        retention_seconds: policy.retention.num_seconds(),
        tracked: state.cache.len(),
        stats: state.stats.snapshot(),
    })
}
