use utoipa::OpenApi;

use super::api::error::ErrorResponse;
use super::api::sondes::SondeResponse;
use super::api::status::StatusResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::status::status,
        super::api::sondes::list_sondes,
        super::api::sondes::get_sonde,
    ),
    components(
        schemas(
            StatusResponse,
            SondeResponse,
            ErrorResponse,
            crate::tracker::Position,
            crate::tracker::TrackedDevice,
            crate::tracker::CheckReport,
            crate::tracker::EvaluationOutcome,
            crate::tracker::StatsSnapshot,
            crate::predict::LandingPoint,
        )
    ),
    info(
        title = "Sonde Alert API",
        description = "Read-only view of tracked radiosondes",
        version = "0.1.0"
    ),
    tags(
        (name = "status", description = "Monitor status"),
        (name = "sondes", description = "Tracked sondes")
    )
)]
pub struct ApiDoc;
