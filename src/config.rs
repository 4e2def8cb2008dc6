use std::str::FromStr;

use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// TransportKind
// ---------------------------------------------------------------------------

/// Which physical link carries heater commands and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Serial,
    Network,
}

impl FromStr for TransportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "serial" => Ok(Self::Serial),
            "network" => Ok(Self::Network),
            other => Err(anyhow::anyhow!("unknown device transport: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Static bearer token required on user-facing endpoints.
    pub api_token: String,
    pub transport: TransportKind,
    /// Serial device path, used when `transport` is `serial`.
    pub serial_port: String,
    pub serial_baud: u32,
    /// Device base URL, required when `transport` is `network`.
    pub device_base_url: Option<String>,
    /// Timeout for network device requests, in seconds.
    pub device_timeout_secs: u64,
    /// Device polling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: optional("DATABASE_URL", "sqlite://heater.db"),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            api_token: required("API_TOKEN")?,
            transport: optional("DEVICE_TRANSPORT", "serial")
                .parse()
                .context("DEVICE_TRANSPORT must be 'serial' or 'network'")?,
            serial_port: optional("SERIAL_PORT", "/dev/ttyUSB0"),
            serial_baud: optional("SERIAL_BAUD", "9600")
                .parse()
                .context("SERIAL_BAUD must be a positive integer")?,
            device_base_url: std::env::var("DEVICE_BASE_URL").ok(),
            device_timeout_secs: optional("DEVICE_TIMEOUT_SECS", "2")
                .parse()
                .context("DEVICE_TIMEOUT_SECS must be a positive integer")?,
            poll_interval_ms: optional("POLL_INTERVAL_MS", "500")
                .parse()
                .context("POLL_INTERVAL_MS must be a positive integer")?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
