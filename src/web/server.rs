use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::abort::AbortHandle;
use crate::alerts::AlertStore;
use crate::catalog::{Catalog, TleLoader};
use crate::config::Config;
use crate::conjunction::ScreeningEngine;
use crate::propagation::Sgp4Propagator;

use super::api::catalog as catalog_handlers;
use super::api::conjunctions as conjunction_handlers;
use super::api::maneuver as maneuver_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;

pub async fn run_server(config: Config) -> std::io::Result<()> {
    let bind_addr = config.web.bind.clone();

    let catalog = match TleLoader::new(config.catalog.tle_folder.clone()).load() {
        Ok(catalog) => catalog,
        Err(e) => {
            log::warn!("Starting with an empty catalog: {}", e);
            Catalog::default()
        }
    };
    if catalog.is_empty() {
        log::warn!(
            "No objects in {}; screening will report insufficient data until a reload",
            config.catalog.tle_folder.display()
        );
    } else {
        log::info!("Catalog holds {} objects", catalog.len());
    }

    let mut engine = ScreeningEngine::new(
        Sgp4Propagator::new(config.screening.velocity),
        config.screening.params(),
    );
    if let Some(workers) = config.screening.workers {
        engine = engine.with_workers(workers).map_err(std::io::Error::other)?;
    }

    let abort = AbortHandle::new();
    let state = AppState {
        alerts: Arc::new(AlertStore::new(config.alerts.folder.clone())),
        config: Arc::new(config),
        catalog: Arc::new(RwLock::new(Arc::new(catalog))),
        engine: Arc::new(engine),
        screening_running: Arc::new(AtomicBool::new(false)),
        abort: abort.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        // Conjunction API endpoints
        .route(
            "/api/conjunctions/run-screening",
            post(conjunction_handlers::run_screening),
        )
        .route(
            "/api/conjunctions/alerts",
            get(conjunction_handlers::list_alerts),
        )
        // Maneuver API endpoints
        .route(
            "/api/maneuver/calculate",
            post(maneuver_handlers::calculate),
        )
        // Catalog API endpoints
        .route("/api/catalog", get(catalog_handlers::list_objects))
        .route("/api/catalog/count", get(catalog_handlers::count_objects))
        .route("/api/catalog/reload", post(catalog_handlers::reload))
        .route("/api/catalog/{id}", get(catalog_handlers::get_object))
        .route(
            "/api/catalog/{id}/states",
            get(catalog_handlers::object_states),
        )
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutting down, aborting any screening run");
            }
            abort.abort();
        })
        .await
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let objects = state.catalog().await.len();
    Json(json!({ "status": "ok", "objects": objects }))
}
