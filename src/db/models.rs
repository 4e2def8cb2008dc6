use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Power state of a heater session, stored as lowercase TEXT.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HeaterStatus {
    On,
    Off,
}

impl fmt::Display for HeaterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeaterStatus::On => "on",
            HeaterStatus::Off => "off",
        };
        f.write_str(s)
    }
}

/// One controlled heater session.
///
/// `target_temperature` is the user's desired state and is only ever written
/// by an explicit intent. `current_temperature` is the last device
/// observation and is only ever written by telemetry. `status = On` records
/// the most recent power intent; it does not by itself imply the device
/// confirmed it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HeaterSession {
    pub id: Uuid,
    pub target_temperature: Option<f64>,
    pub current_temperature: Option<f64>,
    pub status: HeaterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&HeaterStatus::On).unwrap(), r#""on""#);
        assert_eq!(serde_json::to_string(&HeaterStatus::Off).unwrap(), r#""off""#);
    }

    #[test]
    fn status_display_matches_serde() {
        assert_eq!(HeaterStatus::On.to_string(), "on");
        assert_eq!(HeaterStatus::Off.to_string(), "off");
    }
}
