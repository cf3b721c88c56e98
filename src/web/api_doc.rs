use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::catalog::{CountResponse, ReloadResponse, StatesResponse};
use super::api::conjunctions::AlertView;
use super::api::error::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::conjunctions::run_screening,
        super::api::conjunctions::list_alerts,
        super::api::maneuver::calculate,
        super::api::catalog::list_objects,
        super::api::catalog::count_objects,
        super::api::catalog::get_object,
        super::api::catalog::object_states,
        super::api::catalog::reload,
    ),
    components(
        schemas(
            AlertView,
            StatesResponse,
            ReloadResponse,
            CountResponse,
            ErrorResponse,
            crate::alerts::AlertRecord,
            crate::conjunction::EventType,
            crate::conjunction::ScreeningSummary,
            crate::conjunction::ScreeningStatus,
            crate::maneuver::ManeuverRequest,
            crate::maneuver::ManeuverProposal,
            crate::catalog::ObjectSummary,
            crate::propagation::StateVector,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Conjunction Screener API",
        description = "Close-approach screening and avoidance maneuver planning",
        version = "0.1.0"
    ),
    tags(
        (name = "conjunctions", description = "Screening runs and alerts"),
        (name = "maneuver", description = "Avoidance maneuver planning"),
        (name = "catalog", description = "Tracked objects")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/conjunctions/run-screening",
            "/api/conjunctions/alerts",
            "/api/maneuver/calculate",
            "/api/catalog",
            "/api/catalog/count",
            "/api/catalog/{id}",
            "/api/catalog/{id}/states",
            "/api/catalog/reload",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
