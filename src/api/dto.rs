use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{HeaterSession, HeaterStatus};
use crate::heater::ApplyOutcome;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HeaterSessionDto {
    pub id: Uuid,
    pub target_temperature: Option<f64>,
    pub current_temperature: Option<f64>,
    pub status: HeaterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<HeaterSession> for HeaterSessionDto {
    fn from(s: HeaterSession) -> Self {
        Self {
            id: s.id,
            target_temperature: s.target_temperature,
            current_temperature: s.current_temperature,
            status: s.status,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Request body for `POST /sessions`. Both fields are optional: an absent
/// target stays absent, an absent status defaults to off.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub target_temperature: Option<f64>,
    #[serde(default)]
    pub status: Option<HeaterStatus>,
}

/// Request body for `POST /sessions/{id}/target`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetTargetRequest {
    pub target: f64,
}

/// Request body for `POST /sessions/{id}/power`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPowerRequest {
    pub on: bool,
}

/// Request body for `POST /sessions/{id}/observed`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ObservedRequest {
    pub current: f64,
}

/// Response for intent endpoints. `applied` says the intent was recorded
/// locally; `confirmed` says the device acknowledged it. Callers must be
/// able to tell the two apart.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApplyResponse {
    pub applied: bool,
    pub confirmed: bool,
    pub session: HeaterSessionDto,
}

impl From<ApplyOutcome> for ApplyResponse {
    fn from(outcome: ApplyOutcome) -> Self {
        Self {
            applied: true,
            confirmed: outcome.confirmed,
            session: outcome.session.into(),
        }
    }
}
