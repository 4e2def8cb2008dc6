pub mod auth;
pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::heater::HeaterService;
use auth::ApiAuth;
use handlers::ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub service: HeaterService,
    pub auth: ApiAuth,
}

pub fn router(state: AppState) -> Router {
    let (protected, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route(
            "/sessions",
            post(handlers::create_session).get(handlers::list_sessions),
        )
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/target", post(handlers::set_target))
        .route("/sessions/{id}/power", post(handlers::set_power))
        .with_state(state.clone())
        .split_for_parts();

    let protected = protected.route_layer(middleware::from_fn_with_state(
        state.auth.clone(),
        auth::require_bearer,
    ));

    // Device-originated report; carries no user identity.
    let public = Router::new()
        .route("/sessions/{id}/observed", post(handlers::report_observed))
        .with_state(state);

    protected
        .merge(public)
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
