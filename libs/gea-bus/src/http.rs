//! HTTP gateway client
//!
//! Talks to the bus gateway daemon that owns the serial link to the
//! appliance. Binding a bus address and waiting for water-heater discovery
//! happen once in [`HttpBusClient::connect`]; the read/write primitives map
//! onto the gateway's REST endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::{BusError, DeviceBus, EnergyReading, Result};

/// Gateway client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusClientConfig {
    /// Base URL of the bus gateway daemon
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Bus address this client binds as
    #[serde(default = "default_bus_address")]
    pub address: u8,
    /// Application version vector announced on bind
    #[serde(default)]
    pub version: [u8; 4],
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long to wait for water-heater discovery on connect, in milliseconds
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:7700".to_string()
}

fn default_bus_address() -> u8 {
    0xbb
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_discovery_timeout_ms() -> u64 {
    30_000
}

impl Default for BusClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            address: default_bus_address(),
            version: [0, 0, 0, 0],
            request_timeout_ms: default_request_timeout_ms(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueResponse {
    value: u8,
}

#[derive(Debug, Deserialize)]
struct DeviceInfo {
    version: String,
}

/// HTTP client implementation of [`DeviceBus`]
pub struct HttpBusClient {
    http: reqwest::Client,
    base: String,
}

impl HttpBusClient {
    /// Bind to the gateway and wait for the water heater to be discovered.
    pub async fn connect(config: &BusClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BusError::connection(format!("building HTTP client: {e}")))?;

        let client = Self {
            http,
            base: config.gateway_url.trim_end_matches('/').to_string(),
        };

        client
            .post_json(
                "api/bus/bind",
                &json!({ "address": config.address, "version": config.version }),
            )
            .await?;
        debug!(address = config.address, "bus address bound");

        // The gateway long-polls until the appliance announces itself.
        let discovery = client
            .http
            .get(format!("{}/api/geospring", client.base))
            .timeout(Duration::from_millis(config.discovery_timeout_ms))
            .send()
            .await?;
        let info: DeviceInfo = Self::check(discovery).await?.json().await?;
        info!(version = %info.version, "water heater discovered");

        Ok(client)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(BusError::device(format!("gateway returned {status}: {body}")))
        }
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/{path}", self.base))
            .json(body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn put_value(&self, path: &str, value: u8) -> Result<()> {
        let response = self
            .http
            .put(format!("{}/{path}", self.base))
            .json(&json!({ "value": value }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_value(&self, path: &str) -> Result<u8> {
        let response = self.http.get(format!("{}/{path}", self.base)).send().await?;
        let payload: ValueResponse = Self::check(response).await?.json().await?;
        Ok(payload.value)
    }
}

#[async_trait]
impl DeviceBus for HttpBusClient {
    async fn write_mode(&self, code: u8) -> Result<()> {
        self.put_value("api/geospring/mode", code).await
    }

    async fn write_tank_temp(&self, temp_f: u8) -> Result<()> {
        self.put_value("api/geospring/tank-temp", temp_f).await
    }

    async fn read_mode_setting(&self) -> Result<u8> {
        self.get_value("api/geospring/mode-setting").await
    }

    async fn read_temp_setting(&self) -> Result<u8> {
        self.get_value("api/geospring/temp-setting").await
    }

    async fn read_temp_current(&self) -> Result<u8> {
        self.get_value("api/geospring/temp-current").await
    }

    async fn read_kwh(&self) -> Result<EnergyReading> {
        let response = self
            .http
            .get(format!("{}/api/geospring/kwh", self.base))
            .send()
            .await?;
        let reading: EnergyReading = Self::check(response).await?.json().await?;
        Ok(reading)
    }
}
