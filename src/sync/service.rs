use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, error, info, warn};

use crate::device::DeviceTransport;
use crate::heater::HeaterService;

/// Consecutive read failures before the loop escalates from debug to warn.
const FAILURE_WARN_THRESHOLD: u32 = 3;

/// Background polling loop that keeps observed state fresh.
///
/// One perpetual task for the whole process: each tick reads the device once
/// and merges the reading into every live session. An unreachable device is
/// counted and retried on the next tick; it never halts the loop and never
/// mutates state.
pub struct SyncService {
    service: HeaterService,
    transport: Arc<dyn DeviceTransport>,
    interval: Duration,
    consecutive_failures: AtomicU32,
}

impl SyncService {
    pub fn new(
        service: HeaterService,
        transport: Arc<dyn DeviceTransport>,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            transport,
            interval,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Runs the sync loop indefinitely. Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Device sync loop started");
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Sync iteration failed");
            }
        }
    }

    /// Number of consecutive ticks the device has been unreachable.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    async fn run_once(&self) -> anyhow::Result<()> {
        let temp = match self.transport.read_temperature().await {
            Ok(t) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                t
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= FAILURE_WARN_THRESHOLD {
                    warn!(consecutive_failures = failures, error = %e, "Device still unreachable");
                } else {
                    debug!(error = %e, "Device read failed; retrying next tick");
                }
                return Ok(());
            }
        };

        for session in self.service.sessions().await? {
            self.service.report_observed(session.id, temp).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::SqlitePool;

    use super::*;
    use crate::db::models::HeaterStatus;
    use crate::device::testing::FakeTransport;
    use crate::store::HeaterStateStore;

    fn sync_service(pool: SqlitePool) -> (SyncService, HeaterService, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new());
        let service = HeaterService::new(HeaterStateStore::new(pool), transport.clone());
        let sync = SyncService::new(service.clone(), transport.clone(), Duration::from_millis(100));
        (sync, service, transport)
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn reading_is_merged_into_every_session(pool: SqlitePool) {
        let (sync, service, transport) = sync_service(pool);
        let a = service.create_session(Some(72.5), HeaterStatus::On).await.unwrap();
        let b = service.create_session(None, HeaterStatus::Off).await.unwrap();
        transport.set_reading(71.3);

        sync.run_once().await.unwrap();

        for id in [a.id, b.id] {
            assert_eq!(
                service.snapshot(id).await.unwrap().current_temperature,
                Some(71.3)
            );
        }
        // Targets are never written by polling.
        assert_eq!(
            service.snapshot(a.id).await.unwrap().target_temperature,
            Some(72.5)
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unreachable_device_counts_failures_without_halting(pool: SqlitePool) {
        let (sync, service, transport) = sync_service(pool);
        let session = service.create_session(None, HeaterStatus::Off).await.unwrap();
        transport.go_offline();

        for _ in 0..3 {
            sync.run_once().await.unwrap();
        }
        assert_eq!(sync.consecutive_failures(), 3);
        assert_eq!(
            service.snapshot(session.id).await.unwrap().current_temperature,
            None
        );

        transport.go_online();
        transport.set_reading(69.8);
        sync.run_once().await.unwrap();

        assert_eq!(sync.consecutive_failures(), 0);
        assert_eq!(
            service.snapshot(session.id).await.unwrap().current_temperature,
            Some(69.8)
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn tick_with_no_sessions_is_a_noop(pool: SqlitePool) {
        let (sync, _, transport) = sync_service(pool);
        transport.set_reading(70.0);
        sync.run_once().await.unwrap();
    }
}
