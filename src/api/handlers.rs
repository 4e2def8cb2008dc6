use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use utoipa::OpenApi;
use uuid::Uuid;

use super::{
    dto::{
        ApplyResponse, CreateSessionRequest, HeaterSessionDto, ObservedRequest, SetPowerRequest,
        SetTargetRequest,
    },
    errors::ApiError,
    AppState,
};
use crate::db::models::HeaterStatus;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Create a new heater session.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = HeaterSessionDto),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 400, description = "Invalid target temperature"),
    ),
    tag = "sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<HeaterSessionDto>), ApiError> {
    let status = body.status.unwrap_or(HeaterStatus::Off);
    let session = state
        .service
        .create_session(body.target_temperature, status)
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// List all heater sessions in insertion order.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "All sessions", body = Vec<HeaterSessionDto>),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<HeaterSessionDto>>, ApiError> {
    let sessions = state.service.sessions().await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// Fetch a single session snapshot.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session snapshot", body = HeaterSessionDto),
        (status = 404, description = "Unknown session id"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HeaterSessionDto>, ApiError> {
    let session = state.service.snapshot(id).await?;
    Ok(Json(session.into()))
}

/// Delete a session.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Unknown session id"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set the session's target temperature.
///
/// Always succeeds once the intent is recorded locally; `confirmed` in the
/// response says whether the device acknowledged the command. A transport
/// failure is therefore a 200 with `confirmed: false`, not an HTTP error.
#[utoipa::path(
    post,
    path = "/sessions/{id}/target",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SetTargetRequest,
    responses(
        (status = 200, description = "Intent recorded", body = ApplyResponse),
        (status = 404, description = "Unknown session id"),
        (status = 400, description = "Invalid target temperature"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "sessions"
)]
pub async fn set_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetTargetRequest>,
) -> Result<Json<ApplyResponse>, ApiError> {
    let outcome = state.service.set_target(id, body.target).await?;
    Ok(Json(outcome.into()))
}

/// Switch the session's heater on or off.
#[utoipa::path(
    post,
    path = "/sessions/{id}/power",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SetPowerRequest,
    responses(
        (status = 200, description = "Intent recorded", body = ApplyResponse),
        (status = 404, description = "Unknown session id"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "sessions"
)]
pub async fn set_power(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetPowerRequest>,
) -> Result<Json<ApplyResponse>, ApiError> {
    let outcome = state.service.set_power(id, body.on).await?;
    Ok(Json(outcome.into()))
}

/// Device-originated temperature report.
///
/// Returns 204 even for unknown ids: the device may still be reporting
/// after its session was deleted, and that must stay an idempotent no-op.
#[utoipa::path(
    post,
    path = "/sessions/{id}/observed",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = ObservedRequest,
    responses(
        (status = 204, description = "Report accepted (or dropped for an unknown id)"),
    ),
    tag = "sessions"
)]
pub async fn report_observed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ObservedRequest>,
) -> Result<StatusCode, ApiError> {
    state.service.report_observed(id, body.current).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session,
        list_sessions,
        get_session,
        delete_session,
        set_target,
        set_power,
        report_observed,
        health
    ),
    components(schemas(
        HeaterSessionDto,
        CreateSessionRequest,
        SetTargetRequest,
        SetPowerRequest,
        ObservedRequest,
        ApplyResponse,
        HeaterStatus
    )),
    tags(
        (name = "sessions", description = "Heater session endpoints"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Heater Buddy Backend API",
        version = "0.1.0",
        description = "REST API for heater session control and device sync"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
