use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serialport::SerialPort;
use tokio::sync::watch;
use tracing::{info, warn};

use super::{DeviceResult, DeviceTransport, DeviceUnreachable};

/// Per-read timeout on the serial port. Keeps the reader thread responsive
/// without an unbounded blocking wait.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// How old the last parsed reading may be before `read_temperature` reports
/// the device as unreachable.
const FRESHNESS: Duration = Duration::from_secs(5);

/// Back-off after a hard read error before retrying the port.
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct Reading {
    value: f64,
    at: Instant,
}

/// Serial link to the heater's microcontroller.
///
/// The device streams newline-delimited ASCII floats; a dedicated reader
/// thread accumulates lines, discards anything that does not parse as a
/// finite float, and publishes the latest reading through a watch channel.
/// Commands (`ON`, `OFF`, `SET <v>`) are written as lines from a blocking
/// task so a slow port never stalls the async runtime.
pub struct SerialTransport {
    writer: Arc<Mutex<Box<dyn SerialPort>>>,
    latest: watch::Receiver<Option<Reading>>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .with_context(|| format!("failed to open serial port {path}"))?;
        let reader = port
            .try_clone()
            .context("failed to clone serial port for reading")?;

        let (tx, rx) = watch::channel(None);
        std::thread::Builder::new()
            .name("serial-reader".to_owned())
            .spawn(move || read_loop(reader, tx))
            .context("failed to spawn serial reader thread")?;

        info!(port = %path, baud_rate, "Serial transport opened");
        Ok(Self {
            writer: Arc::new(Mutex::new(port)),
            latest: rx,
        })
    }

    async fn write_line(&self, line: String) -> DeviceResult<()> {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let mut port = writer
                .lock()
                .map_err(|_| DeviceUnreachable::new("serial writer lock poisoned"))?;
            port.write_all(line.as_bytes())
                .and_then(|_| port.write_all(b"\n"))
                .and_then(|_| port.flush())
                .map_err(|e| DeviceUnreachable::new(format!("serial write failed: {e}")))
        })
        .await
        .map_err(|e| DeviceUnreachable::new(format!("serial write task failed: {e}")))?
    }
}

#[async_trait]
impl DeviceTransport for SerialTransport {
    async fn read_temperature(&self) -> DeviceResult<f64> {
        match *self.latest.borrow() {
            Some(r) if r.at.elapsed() <= FRESHNESS => Ok(r.value),
            Some(_) => Err(DeviceUnreachable::new("last serial reading is stale")),
            None => Err(DeviceUnreachable::new("no serial reading received yet")),
        }
    }

    async fn set_power(&self, on: bool) -> DeviceResult<()> {
        self.write_line(if on { "ON" } else { "OFF" }.to_owned()).await
    }

    async fn set_target(&self, temp: f64) -> DeviceResult<()> {
        self.write_line(format!("SET {temp}")).await
    }
}

/// Reads the port until the transport is dropped, publishing each parsed
/// line. Per-read timeouts are expected and simply retried.
fn read_loop(mut port: Box<dyn SerialPort>, tx: watch::Sender<Option<Reading>>) {
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 256];

    loop {
        if tx.is_closed() {
            return;
        }

        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    if let Some(value) = parse_reading(&String::from_utf8_lossy(&line)) {
                        let _ = tx.send(Some(Reading { value, at: Instant::now() }));
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                warn!(error = %e, "Serial read failed; retrying");
                std::thread::sleep(RETRY_DELAY);
            }
        }
    }
}

/// Parse one serial line as a temperature. Anything that is not a finite
/// float is discarded.
fn parse_reading(line: &str) -> Option<f64> {
    let value = line.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_floats() {
        assert_eq!(parse_reading("72.5\n"), Some(72.5));
        assert_eq!(parse_reading("  -3.25  "), Some(-3.25));
        assert_eq!(parse_reading("70"), Some(70.0));
    }

    #[test]
    fn discards_garbage_lines() {
        assert_eq!(parse_reading(""), None);
        assert_eq!(parse_reading("booting...\n"), None);
        assert_eq!(parse_reading("temp=72.5"), None);
    }

    #[test]
    fn discards_non_finite_values() {
        assert_eq!(parse_reading("NaN"), None);
        assert_eq!(parse_reading("inf"), None);
        assert_eq!(parse_reading("-inf"), None);
    }
}
