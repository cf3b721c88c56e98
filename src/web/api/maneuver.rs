use axum::{extract::State, Json};

use crate::config::Permission;
use crate::maneuver::{calculate_maneuver, ManeuverProposal, ManeuverRequest};
use crate::propagation::{KeplerPropagator, Sgp4Propagator};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

#[utoipa::path(
    post,
    path = "/api/maneuver/calculate",
    tag = "maneuver",
    request_body = ManeuverRequest,
    responses(
        (status = 200, description = "Proposal; check `success`", body = ManeuverProposal),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Unknown object id", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn calculate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ManeuverRequest>,
) -> ApiResult<Json<ManeuverProposal>> {
    require_permission(&user, Permission::PlanManeuver)?;

    let catalog = state.catalog().await;
    let params = state.config.maneuver.params();
    let propagator = Sgp4Propagator::new(state.config.screening.velocity);

    let proposal = tokio::task::spawn_blocking(move || {
        calculate_maneuver(
            &catalog,
            &propagator,
            &KeplerPropagator::default(),
            &request,
            &params,
        )
    })
    .await??;

    Ok(Json(proposal))
}
