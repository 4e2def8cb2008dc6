use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{DeviceResult, DeviceTransport, DeviceUnreachable};

/// HTTP link to a microcontroller on the local network.
///
/// The device exposes `GET /on`, `GET /off`, `GET /set?target=<v>` and a
/// `GET /temperature` telemetry read returning a plain-text float. All
/// requests share one client with a short mandatory timeout, so a hung
/// device surfaces as `DeviceUnreachable` rather than a stalled caller.
pub struct NetworkTransport {
    http: Client,
    base_url: String,
}

impl NetworkTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build device HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn request(&self, path_and_query: &str) -> DeviceResult<String> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(url = %url, "Sending device request");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DeviceUnreachable::new(format!("request to {url} failed: {e}")))?
            .error_for_status()
            .map_err(|e| DeviceUnreachable::new(format!("device returned error status: {e}")))?;

        response
            .text()
            .await
            .map_err(|e| DeviceUnreachable::new(format!("failed to read device response: {e}")))
    }
}

#[async_trait]
impl DeviceTransport for NetworkTransport {
    async fn read_temperature(&self) -> DeviceResult<f64> {
        let body = self.request("/temperature").await?;
        body.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                DeviceUnreachable::new(format!("malformed temperature reading: {body:?}"))
            })
    }

    async fn set_power(&self, on: bool) -> DeviceResult<()> {
        let path = if on { "/on" } else { "/off" };
        self.request(path).await.map(drop)
    }

    async fn set_target(&self, temp: f64) -> DeviceResult<()> {
        self.request(&format!("/set?target={temp}")).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport(server: &MockServer) -> NetworkTransport {
        NetworkTransport::new(&server.uri(), Duration::from_millis(500)).unwrap()
    }

    #[tokio::test]
    async fn read_temperature_parses_plain_text_float() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/temperature"))
            .respond_with(ResponseTemplate::new(200).set_body_string("72.5\n"))
            .mount(&server)
            .await;

        let temp = transport(&server).read_temperature().await.unwrap();
        assert_eq!(temp, 72.5);
    }

    #[tokio::test]
    async fn read_temperature_rejects_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/temperature"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not a number"))
            .mount(&server)
            .await;

        assert!(transport(&server).read_temperature().await.is_err());
    }

    #[tokio::test]
    async fn error_status_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/temperature"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(transport(&server).read_temperature().await.is_err());
    }

    #[tokio::test]
    async fn slow_device_times_out_as_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/temperature"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("70.0")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        assert!(transport(&server).read_temperature().await.is_err());
    }

    #[tokio::test]
    async fn connection_refused_is_unreachable() {
        // Port 9 (discard) is almost certainly closed.
        let transport =
            NetworkTransport::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        assert!(transport.set_power(true).await.is_err());
    }

    #[tokio::test]
    async fn set_power_hits_on_and_off_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/on"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/off"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server);
        transport.set_power(true).await.unwrap();
        transport.set_power(false).await.unwrap();
    }

    #[tokio::test]
    async fn set_target_sends_query_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/set"))
            .and(query_param("target", "68.5"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        transport(&server).set_target(68.5).await.unwrap();
    }
}
