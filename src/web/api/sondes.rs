use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::tracker::{Position, TrackedDevice};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct SondeResponse {
    pub serial: String,
    /// Current distance from the observer.
    pub distance_km: f64,
    #[serde(flatten)]
    pub device: TrackedDevice,
}

impl SondeResponse {
    fn new(serial: String, device: TrackedDevice, observer: &Position) -> Self {
        SondeResponse {
            serial,
            distance_km: device.position.distance_km(observer),
            device,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/sondes",
    responses(
        (status = 200, description = "Tracked sondes, sorted by serial", body = Vec<SondeResponse>)
    ),
    tag = "sondes"
)]
pub async fn list_sondes(State(state): State<AppState>) -> Json<Vec<SondeResponse>> {
    let observer = state.policy.observer;
    let sondes = state
        .cache
        .all()
        .into_iter()
        .map(|(serial, device)| SondeResponse::new(serial, device, &observer))
        .collect();
    Json(sondes)
}

#[utoipa::path(
    get,
    path = "/api/sondes/{serial}",
    params(
        ("serial" = String, Path, description = "Sonde serial number")
    ),
    responses(
        (status = 200, description = "Tracked sonde", body = SondeResponse),
        (status = 404, description = "Sonde not tracked", body = ErrorResponse)
    ),
    tag = "sondes"
)]
pub async fn get_sonde(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> ApiResult<Json<SondeResponse>> {
    let device = state
        .cache
        .get(&serial)
        .ok_or_else(|| ApiError::SondeNotFound(serial.clone()))?;
    Ok(Json(SondeResponse::new(
        serial,
        device,
        &state.policy.observer,
    )))
}
