use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::models::{HeaterSession, HeaterStatus};
use crate::device::DeviceTransport;
use crate::store::{HeaterStateStore, SessionPatch, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("session not found")]
    NotFound,
    #[error("invalid intent: {0}")]
    Validation(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            StoreError::Db(e) => Self::Db(e),
        }
    }
}

/// Result of applying a user intent. `confirmed` is true only when the
/// device acknowledged the command; the locally recorded intent in `session`
/// holds either way.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub session: HeaterSession,
    pub confirmed: bool,
}

/// Reconciles user intents and device observations into the session store.
///
/// Desired state (target, status) is authoritative locally: an unreachable
/// device downgrades an intent to "recorded but unconfirmed", it never rolls
/// it back. Observed state (current temperature) is written only from device
/// telemetry.
#[derive(Clone)]
pub struct HeaterService {
    store: HeaterStateStore,
    transport: Arc<dyn DeviceTransport>,
}

impl HeaterService {
    pub fn new(store: HeaterStateStore, transport: Arc<dyn DeviceTransport>) -> Self {
        Self { store, transport }
    }

    pub async fn create_session(
        &self,
        target_temperature: Option<f64>,
        status: HeaterStatus,
    ) -> Result<HeaterSession, ServiceError> {
        if let Some(temp) = target_temperature {
            validate_temperature(temp)?;
        }
        Ok(self.store.create(target_temperature, status).await?)
    }

    pub async fn sessions(&self) -> Result<Vec<HeaterSession>, ServiceError> {
        Ok(self.store.list().await?)
    }

    /// Pure read of the merged desired + observed state.
    pub async fn snapshot(&self, id: Uuid) -> Result<HeaterSession, ServiceError> {
        Ok(self.store.get(id).await?)
    }

    /// Deletes the session. Any observation still in flight for this id is
    /// dropped silently by `report_observed`.
    pub async fn delete_session(&self, id: Uuid) -> Result<(), ServiceError> {
        Ok(self.store.delete(id).await?)
    }

    /// Records the user's target temperature and sends it to the device
    /// best-effort. The local intent is written regardless of the transport
    /// outcome; the device picks it up on the next successful command.
    pub async fn set_target(&self, id: Uuid, temp: f64) -> Result<ApplyOutcome, ServiceError> {
        validate_temperature(temp)?;
        self.store.get(id).await?;

        // The device command runs outside any store operation so a hung
        // device cannot stall other readers.
        let confirmed = match self.transport.set_target(temp).await {
            Ok(()) => true,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Target command not confirmed by device");
                false
            }
        };

        let session = self.store.update(id, SessionPatch::target(temp)).await?;
        Ok(ApplyOutcome { session, confirmed })
    }

    /// Same pattern as `set_target`, applied to the power status.
    pub async fn set_power(&self, id: Uuid, on: bool) -> Result<ApplyOutcome, ServiceError> {
        self.store.get(id).await?;

        let confirmed = match self.transport.set_power(on).await {
            Ok(()) => true,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Power command not confirmed by device");
                false
            }
        };

        let status = if on { HeaterStatus::On } else { HeaterStatus::Off };
        let session = self.store.update(id, SessionPatch::power(status)).await?;
        Ok(ApplyOutcome { session, confirmed })
    }

    /// Merges a device observation into the session. Touches only
    /// `current_temperature`. A missing session is a logged no-op: the
    /// device may still be reporting after the session was deleted.
    pub async fn report_observed(&self, id: Uuid, temp: f64) -> Result<(), ServiceError> {
        if !temp.is_finite() {
            debug!(session_id = %id, value = temp, "Discarding non-finite observation");
            return Ok(());
        }

        match self.store.update(id, SessionPatch::observed(temp)).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => {
                debug!(session_id = %id, "Dropping observation for deleted session");
                Ok(())
            }
            Err(StoreError::Db(e)) => Err(e.into()),
        }
    }
}

fn validate_temperature(temp: f64) -> Result<(), ServiceError> {
    if temp.is_finite() {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "temperature must be a finite number, got {temp}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use sqlx::SqlitePool;

    use super::*;
    use crate::device::testing::FakeTransport;

    fn service(pool: SqlitePool) -> (HeaterService, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        let store = HeaterStateStore::new(pool);
        (HeaterService::new(store, transport.clone()), transport)
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn set_target_is_confirmed_when_device_acks(pool: SqlitePool) {
        let (service, transport) = service(pool);
        let session = service.create_session(None, HeaterStatus::Off).await.unwrap();

        let outcome = service.set_target(session.id, 72.5).await.unwrap();

        assert!(outcome.confirmed);
        assert_eq!(outcome.session.target_temperature, Some(72.5));
        assert_eq!(*transport.targets.lock().unwrap(), vec![72.5]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn set_target_persists_intent_when_device_offline(pool: SqlitePool) {
        let (service, transport) = service(pool);
        let session = service.create_session(Some(72.5), HeaterStatus::Off).await.unwrap();
        transport.go_offline();

        let outcome = service.set_target(session.id, 68.0).await.unwrap();

        assert!(!outcome.confirmed);
        let snapshot = service.snapshot(session.id).await.unwrap();
        assert_eq!(snapshot.target_temperature, Some(68.0));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn set_target_unknown_id_is_not_found(pool: SqlitePool) {
        let (service, _) = service(pool);
        let err = service.set_target(Uuid::new_v4(), 70.0).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn set_target_rejects_non_finite_values(pool: SqlitePool) {
        let (service, transport) = service(pool);
        let session = service.create_session(None, HeaterStatus::Off).await.unwrap();

        let err = service.set_target(session.id, f64::NAN).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(transport.targets.lock().unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn set_power_records_status_optimistically(pool: SqlitePool) {
        let (service, transport) = service(pool);
        let session = service.create_session(None, HeaterStatus::Off).await.unwrap();

        let outcome = service.set_power(session.id, true).await.unwrap();
        assert!(outcome.confirmed);
        assert_eq!(outcome.session.status, HeaterStatus::On);
        assert_eq!(*transport.powers.lock().unwrap(), vec![true]);

        transport.go_offline();
        let outcome = service.set_power(session.id, false).await.unwrap();
        assert!(!outcome.confirmed);
        assert_eq!(outcome.session.status, HeaterStatus::Off);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn observation_never_touches_target_or_status(pool: SqlitePool) {
        let (service, _) = service(pool);
        let session = service.create_session(Some(72.5), HeaterStatus::On).await.unwrap();

        service.report_observed(session.id, 74.2).await.unwrap();

        let snapshot = service.snapshot(session.id).await.unwrap();
        assert_eq!(snapshot.current_temperature, Some(74.2));
        assert_eq!(snapshot.target_temperature, Some(72.5));
        assert_eq!(snapshot.status, HeaterStatus::On);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn observation_after_delete_is_a_silent_noop(pool: SqlitePool) {
        let (service, _) = service(pool);
        let session = service.create_session(None, HeaterStatus::Off).await.unwrap();
        service.delete_session(session.id).await.unwrap();

        service.report_observed(session.id, 70.1).await.unwrap();

        assert!(service.sessions().await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn observation_for_unknown_id_is_a_silent_noop(pool: SqlitePool) {
        let (service, _) = service(pool);
        service.report_observed(Uuid::new_v4(), 70.1).await.unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn non_finite_observation_is_discarded(pool: SqlitePool) {
        let (service, _) = service(pool);
        let session = service.create_session(None, HeaterStatus::Off).await.unwrap();

        service.report_observed(session.id, f64::INFINITY).await.unwrap();

        let snapshot = service.snapshot(session.id).await.unwrap();
        assert_eq!(snapshot.current_temperature, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn snapshot_unknown_id_is_not_found(pool: SqlitePool) {
        let (service, _) = service(pool);
        let err = service.snapshot(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn create_session_rejects_non_finite_target(pool: SqlitePool) {
        let (service, _) = service(pool);
        let err = service
            .create_session(Some(f64::NEG_INFINITY), HeaterStatus::Off)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
