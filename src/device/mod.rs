pub mod network;
pub mod serial;

pub use network::NetworkTransport;
pub use serial::SerialTransport;

use async_trait::async_trait;
use thiserror::Error;

/// The single failure signal of the device layer: timeout, connection
/// refusal, malformed response, or a reading that never arrived. Recovered
/// locally by the caller; never a crash.
#[derive(Debug, Clone, Error)]
#[error("device unreachable: {reason}")]
pub struct DeviceUnreachable {
    reason: String,
}

impl DeviceUnreachable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

pub type DeviceResult<T> = Result<T, DeviceUnreachable>;

/// Physical link to the heater. Every operation is total: it returns within
/// a bounded time with either a result or `DeviceUnreachable`.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Latest temperature reported by the device.
    async fn read_temperature(&self) -> DeviceResult<f64>;

    /// Switch the heater on or off.
    async fn set_power(&self, on: bool) -> DeviceResult<()>;

    /// Send a new target temperature to the device.
    async fn set_target(&self, temp: f64) -> DeviceResult<()>;
}
