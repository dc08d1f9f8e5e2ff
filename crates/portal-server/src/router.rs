use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all portal endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/users/:user/instances", get(handler::instances_handler))
        .route("/v1/users/:user/active-instance", put(handler::select_instance_handler))
        .route("/v1/users/:user/route/:kind", get(handler::route_handler))
        .route("/v1/users/:user/payslips", get(handler::payslips_handler))
        .route("/v1/users/:user/documents", get(handler::documents_handler))
        .route(
            "/v1/users/:user/personal-info",
            get(handler::get_personal_info_handler).put(handler::put_personal_info_handler),
        )
        .route("/v1/users/:user/entities/:entity/sync", post(handler::sync_handler))
        .route("/v1/users/:user/sessions", post(handler::open_session_handler))
        .route("/v1/sessions/:id", get(handler::get_session_handler))
        .route("/v1/sessions/:id/conflicts/:conflict", put(handler::set_resolution_handler))
        .route("/v1/sessions/:id/resolve-all", post(handler::resolve_all_handler))
        .route("/v1/sessions/:id/commit", post(handler::commit_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
