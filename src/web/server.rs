use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::tracker::{DeviceCache, TrackerPolicy, TrackerStats};

use super::api::sondes as sonde_handlers;
use super::api::status as status_handlers;
use super::api_doc::ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<TrackerPolicy>,
    pub observer_name: Option<String>,
    pub cache: Arc<DeviceCache>,
    pub stats: Arc<TrackerStats>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(status_handlers::status))
        .route("/api/sondes", get(sonde_handlers::list_sondes))
        .route("/api/sondes/{serial}", get(sonde_handlers::get_sonde))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    bind_addr: String,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = router(state);

    log::info!("Starting status API on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::types::TelemetryEvent;
    use crate::tracker::{CheckReport, EvaluationOutcome, Position, TrackedDevice};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> AppState {
        let policy = Arc::new(TrackerPolicy::reference());
        let cache = Arc::new(DeviceCache::new());
        let now = Utc::now();
        for (serial, lat) in [("T2", 52.0), ("T1", 51.6)] {
            cache.upsert(
                &TelemetryEvent {
                    serial: serial.into(),
                    position: Position::new(lat, -0.0754),
                    altitude_m: Some(15000.0),
                    sonde_type: Some("RS41".into()),
                },
                now,
            );
        }
        cache
            .mark_checked(
                "T1",
                now,
                CheckReport {
                    outcome: EvaluationOutcome::CheckedNoAlert,
                    distance_km: 10.5,
                    landing: None,
                    landing_distance_km: None,
                },
            )
            .unwrap();

        AppState {
            policy,
            observer_name: Some("Home".into()),
            cache,
            stats: Arc::new(TrackerStats::default()),
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn lists_sondes_sorted() {
        let (status, body) = get_json(router(state()), "/api/sondes").await;
        assert_eq!(status, StatusCode::OK);

        let sondes = body.as_array().unwrap();
        assert_eq!(sondes.len(), 2);
        assert_eq!(sondes[0]["serial"], "T1");
        assert_eq!(sondes[0]["last_report"]["outcome"], "checked_no_alert");
        assert_eq!(sondes[0]["sonde_type"], "RS41");
        assert_eq!(sondes[1]["serial"], "T2");
        assert!(sondes[1]["last_checked"].is_null());
    }

    #[tokio::test]
    async fn gets_single_sonde() {
        let (status, body) = get_json(router(state()), "/api/sondes/T1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["position"]["lat"], 51.6);
        let distance = body["distance_km"].as_f64().unwrap();
        assert!(distance > 10.0 && distance < 11.0, "{distance}");
    }

    #[tokio::test]
    async fn unknown_sonde_is_404() {
        let (status, body) = get_json(router(state()), "/api/sondes/NOPE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "sonde_not_found");
        assert_eq!(body["message"], "NOPE");
    }

    #[tokio::test]
    async fn reports_status() {
        let (status, body) = get_json(router(state()), "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["observer_name"], "Home");
        assert_eq!(body["tracked"], 2);
        assert_eq!(body["check_interval_seconds"], 180);
        assert_eq!(body["retention_seconds"], 3600);
        assert_eq!(body["stats"]["alerts_sent"], 0);
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let (status, body) = get_json(router(state()), "/api-doc/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/sondes/{serial}"].is_object());
    }

    #[test]
    fn tracked_device_is_serializable() {
        let device: TrackedDevice = state().cache.get("T2").unwrap();
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["altitude_m"], 15000.0);
    }
}
