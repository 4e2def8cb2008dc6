use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{HeaterSession, HeaterStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found")]
    NotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Partial update over a `HeaterSession`. Only `Some` fields are written;
/// `updated_at` is refreshed on every application.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionPatch {
    pub target_temperature: Option<f64>,
    pub current_temperature: Option<f64>,
    pub status: Option<HeaterStatus>,
}

impl SessionPatch {
    pub fn target(temp: f64) -> Self {
        Self { target_temperature: Some(temp), ..Self::default() }
    }

    pub fn observed(temp: f64) -> Self {
        Self { current_temperature: Some(temp), ..Self::default() }
    }

    pub fn power(status: HeaterStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }
}

/// Durable CRUD over heater sessions, keyed by id.
///
/// Every mutation is a single SQL statement, so concurrent writers to the
/// same id serialize at the database and readers never observe a partially
/// applied update.
#[derive(Clone)]
pub struct HeaterStateStore {
    pool: SqlitePool,
}

impl HeaterStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        target_temperature: Option<f64>,
        status: HeaterStatus,
    ) -> Result<HeaterSession, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let session = sqlx::query_as::<_, HeaterSession>(
            r#"
            INSERT INTO heater_sessions
                (id, target_temperature, current_temperature, status, created_at, updated_at)
            VALUES (?1, ?2, NULL, ?3, ?4, ?5)
            RETURNING id, target_temperature, current_temperature, status,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(target_temperature)
        .bind(status)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Result<HeaterSession, StoreError> {
        let session = sqlx::query_as::<_, HeaterSession>(
            r#"
            SELECT id, target_temperature, current_temperature, status,
                   created_at, updated_at
            FROM heater_sessions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        session.ok_or(StoreError::NotFound)
    }

    /// All sessions in insertion order.
    pub async fn list(&self) -> Result<Vec<HeaterSession>, StoreError> {
        let sessions = sqlx::query_as::<_, HeaterSession>(
            r#"
            SELECT id, target_temperature, current_temperature, status,
                   created_at, updated_at
            FROM heater_sessions
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Merge `patch` into the session, refreshing `updated_at`.
    pub async fn update(
        &self,
        id: Uuid,
        patch: SessionPatch,
    ) -> Result<HeaterSession, StoreError> {
        let now = Utc::now();

        let session = sqlx::query_as::<_, HeaterSession>(
            r#"
            UPDATE heater_sessions
            SET target_temperature  = COALESCE(?1, target_temperature),
                current_temperature = COALESCE(?2, current_temperature),
                status              = COALESCE(?3, status),
                updated_at          = ?4
            WHERE id = ?5
            RETURNING id, target_temperature, current_temperature, status,
                      created_at, updated_at
            "#,
        )
        .bind(patch.target_temperature)
        .bind(patch.current_temperature)
        .bind(patch.status)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        session.ok_or(StoreError::NotFound)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM heater_sessions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
