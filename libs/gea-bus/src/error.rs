//! Error handling for the appliance bus client

use thiserror::Error;

/// Appliance bus error type
#[derive(Error, Debug)]
pub enum BusError {
    /// Gateway connection establishment and maintenance errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Operation timeout errors
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Gateway protocol errors (unexpected status, malformed payload)
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Errors reported by the appliance itself
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Data handling errors (serialization, parsing, conversion)
    #[error("Data error: {0}")]
    DataError(String),
}

impl BusError {
    pub fn connection(msg: impl Into<String>) -> Self {
        BusError::ConnectionError(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        BusError::TimeoutError(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        BusError::ProtocolError(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        BusError::DeviceError(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        BusError::DataError(msg.into())
    }
}

impl From<reqwest::Error> for BusError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BusError::TimeoutError(err.to_string())
        } else if err.is_connect() {
            BusError::ConnectionError(err.to_string())
        } else {
            BusError::ProtocolError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::DataError(format!("JSON: {err}"))
    }
}
