use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::alerts::AlertRecord;
use crate::config::Permission;
use crate::conjunction::{EventType, ScreeningSummary};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

const DEFAULT_ALERT_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct RunScreeningQuery {
    /// Reference time for the snapshot; now when omitted.
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
    #[serde(rename = "type", default, deserialize_with = "event_type_any_case")]
    pub event_type: EventType,
}

fn event_type_any_case<'de, D>(deserializer: D) -> Result<EventType, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Alert with the display names of both objects.
#[derive(Debug, Serialize, ToSchema)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: AlertRecord,
    pub sat1_name: Option<String>,
    pub sat2_name: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/conjunctions/run-screening",
    tag = "conjunctions",
    params(
        ("at" = Option<String>, Query, description = "Reference time (RFC3339), defaults to now")
    ),
    responses(
        (status = 200, description = "Screening finished", body = ScreeningSummary),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 409, description = "A screening run is already in progress", body = ErrorResponse),
        (status = 500, description = "Alert set could not be published", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn run_screening(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<RunScreeningQuery>,
) -> ApiResult<Json<ScreeningSummary>> {
    require_permission(&user, Permission::RunScreening)?;

    let slot = state
        .try_start_screening()
        .ok_or(ApiError::Conflict("screening_in_progress"))?;
    let reference_time = query.at.unwrap_or_else(Utc::now);
    let catalog = state.catalog().await;
    log::info!(
        "{} started screening of {} objects at {}",
        user.name,
        catalog.len(),
        reference_time
    );

    let summary = tokio::task::spawn_blocking(move || {
        let _slot = slot;
        state
            .engine
            .run_screening(catalog.tracked(), reference_time, &state.alerts, &state.abort)
    })
    .await??;

    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/api/conjunctions/alerts",
    tag = "conjunctions",
    params(
        ("limit" = Option<usize>, Query, description = "Maximum number of alerts (default 20)"),
        ("type" = Option<EventType>, Query, description = "COLLISION (default) or DOCKING")
    ),
    responses(
        (status = 200, description = "Alerts ordered by score, then TCA", body = Vec<AlertView>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Alert set unreadable", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AlertsQuery>,
) -> ApiResult<Json<Vec<AlertView>>> {
    require_permission(&user, Permission::ReadAlerts)?;

    let alerts = state
        .alerts
        .get_alerts(query.limit.unwrap_or(DEFAULT_ALERT_LIMIT), query.event_type)?;
    let catalog = state.catalog().await;

    let views = alerts
        .into_iter()
        .map(|alert| AlertView {
            sat1_name: catalog.name_of(alert.sat1_id).map(String::from),
            sat2_name: catalog.name_of(alert.sat2_id).map(String::from),
            alert,
        })
        .collect();
    Ok(Json(views))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_query_accepts_any_case() {
        let q: AlertsQuery = serde_json::from_str(r#"{"type": "docking", "limit": 5}"#).unwrap();
        assert_eq!(q.event_type, EventType::Docking);
        assert_eq!(q.limit, Some(5));

        let q: AlertsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.event_type, EventType::Collision);
        assert!(q.limit.is_none());
    }
}
