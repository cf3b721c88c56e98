use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::catalog::{Catalog, ObjectSummary, TleLoader};
use crate::config::Permission;
use crate::propagation::{sample_states, Sgp4Propagator, StateVector};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require_permission, AppState, AuthenticatedUser};

const DEFAULT_SAMPLE_WINDOW: &str = "90m";
const DEFAULT_SAMPLE_STEP: &str = "1m";
const MAX_SAMPLES: i64 = 10_000;
const DEFAULT_LIST_LIMIT: usize = 100;
const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Name fragment, at least two characters.
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct StatesQuery {
    /// Start of the window (RFC3339); now when omitted.
    pub start: Option<chrono::DateTime<Utc>>,
    /// Window length, e.g. `90m`.
    pub duration: Option<String>,
    /// Sample spacing, e.g. `30s`.
    pub step: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatesResponse {
    pub object: ObjectSummary,
    /// TEME frame, km and km/s.
    pub states: Vec<StateVector>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    pub objects: usize,
}

#[utoipa::path(
    get,
    path = "/api/catalog",
    tag = "catalog",
    params(
        ("q" = Option<String>, Query, description = "Name fragment, case-insensitive"),
        ("limit" = Option<usize>, Query, description = "Maximum objects returned, default 100")
    ),
    responses(
        (status = 200, description = "Tracked objects ordered by name", body = Vec<ObjectSummary>),
        (status = 400, description = "Search term too short", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_objects(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ObjectSummary>>> {
    require_permission(&user, Permission::ReadCatalog)?;
    let catalog = state.catalog().await;
    Ok(Json(select_objects(&catalog, &query)?))
}

#[utoipa::path(
    get,
    path = "/api/catalog/count",
    tag = "catalog",
    responses(
        (status = 200, description = "Number of tracked objects", body = CountResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn count_objects(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<CountResponse>> {
    require_permission(&user, Permission::ReadCatalog)?;
    Ok(Json(CountResponse {
        count: state.catalog().await.len(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/catalog/{id}",
    tag = "catalog",
    params(("id" = u32, Path, description = "Catalog number")),
    responses(
        (status = 200, description = "Object", body = ObjectSummary),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Unknown object", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_object(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<u32>,
) -> ApiResult<Json<ObjectSummary>> {
    require_permission(&user, Permission::ReadCatalog)?;
    state
        .catalog()
        .await
        .get(id)
        .map(|o| Json(o.summary()))
        .ok_or_else(|| ApiError::NotFound(format!("Object not found: {}", id)))
}

#[utoipa::path(
    get,
    path = "/api/catalog/{id}/states",
    tag = "catalog",
    params(
        ("id" = u32, Path, description = "Catalog number"),
        ("start" = Option<String>, Query, description = "Window start (RFC3339), defaults to now"),
        ("duration" = Option<String>, Query, description = "Window length, default 90m"),
        ("step" = Option<String>, Query, description = "Sample spacing, default 1m")
    ),
    responses(
        (status = 200, description = "Sampled states", body = StatesResponse),
        (status = 400, description = "Invalid window or propagation failure", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Unknown object", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn object_states(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<u32>,
    Query(query): Query<StatesQuery>,
) -> ApiResult<Json<StatesResponse>> {
    require_permission(&user, Permission::ReadCatalog)?;

    let window = SampleWindow::from_query(&query, Utc::now())?;

    let catalog = state.catalog().await;
    if catalog.get(id).is_none() {
        return Err(ApiError::NotFound(format!("Object not found: {}", id)));
    }
    let propagator = Sgp4Propagator::new(state.config.screening.velocity);

    let response = tokio::task::spawn_blocking(move || {
        let object = catalog
            .get(id)
            .ok_or_else(|| ApiError::NotFound(format!("Object not found: {}", id)))?;
        let states = sample_states(&propagator, object, window.start, window.end, window.step)
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        Ok::<_, ApiError>(StatesResponse {
            object: object.summary(),
            states,
        })
    })
    .await??;

    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/catalog/reload",
    tag = "catalog",
    responses(
        (status = 200, description = "Catalog reloaded", body = ReloadResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "TLE folder unreadable", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn reload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ReloadResponse>> {
    require_permission(&user, Permission::RunScreening)?;

    let loader = TleLoader::new(state.config.catalog.tle_folder.clone());
    let catalog = tokio::task::spawn_blocking(move || loader.load())
        .await?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let objects = catalog.len();
    *state.catalog.write().await = Arc::new(catalog);
    log::info!("{} reloaded catalog: {} objects", user.name, objects);

    Ok(Json(ReloadResponse { objects }))
}

fn select_objects(catalog: &Catalog, query: &ListQuery) -> Result<Vec<ObjectSummary>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    match query.q.as_deref().map(str::trim) {
        Some(q) if q.chars().count() < MIN_SEARCH_LEN => Err(ApiError::Validation(format!(
            "search term must be at least {} characters",
            MIN_SEARCH_LEN
        ))),
        Some(q) => Ok(catalog.search(q, limit)),
        None => Ok(catalog.search("", limit)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SampleWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: chrono::Duration,
}

impl SampleWindow {
    fn from_query(query: &StatesQuery, now: DateTime<Utc>) -> Result<Self, ApiError> {
        let duration =
            parse_duration(query.duration.as_deref().unwrap_or(DEFAULT_SAMPLE_WINDOW))?;
        let step = parse_duration(query.step.as_deref().unwrap_or(DEFAULT_SAMPLE_STEP))?;
        if step <= chrono::Duration::zero() {
            return Err(ApiError::Validation("step must be positive".into()));
        }
        let samples = duration.num_milliseconds() / step.num_milliseconds().max(1);
        if samples > MAX_SAMPLES {
            return Err(ApiError::Validation(format!(
                "window would produce {} samples (max {})",
                samples, MAX_SAMPLES
            )));
        }

        let start = query.start.unwrap_or(now);
        let end = start.checked_add_signed(duration).ok_or_else(|| {
            ApiError::Validation(format!("window starting at {} runs past the supported range", start))
        })?;
        Ok(Self { start, end, step })
    }
}

fn parse_duration(s: &str) -> Result<chrono::Duration, ApiError> {
    humantime::parse_duration(s.trim())
        .map_err(|e| e.to_string())
        .and_then(|d| chrono::Duration::from_std(d).map_err(|e| e.to_string()))
        .map_err(|e| ApiError::Validation(format!("invalid duration '{}': {}", s, e)))
}
