//! Error handling for the water-heater control service

use thiserror::Error;

/// Control service error type
#[derive(Error, Debug)]
pub enum HeaterSrvError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Appliance bus communication errors
    #[error("Bus error: {0}")]
    BusError(String),

    /// Data handling errors (parsing, conversion, malformed device codes)
    #[error("Data error: {0}")]
    DataError(String),

    /// Mode registry errors (missing normal profile, malformed store)
    #[error("Mode error: {0}")]
    ModeError(String),

    /// Unknown mode slug, rejected fail-closed (maps to HTTP 404)
    #[error("Mode not found: {0}")]
    ModeNotFound(String),

    /// Validation errors (out-of-range values)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the control service
pub type Result<T> = std::result::Result<T, HeaterSrvError>;

impl HeaterSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        HeaterSrvError::ConfigError(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        HeaterSrvError::IoError(msg.into())
    }

    pub fn bus(msg: impl Into<String>) -> Self {
        HeaterSrvError::BusError(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        HeaterSrvError::DataError(msg.into())
    }

    pub fn mode(msg: impl Into<String>) -> Self {
        HeaterSrvError::ModeError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        HeaterSrvError::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        HeaterSrvError::InternalError(msg.into())
    }

    /// Fail-closed lookup failure for an unconfigured mode slug
    pub fn mode_not_found(slug: impl std::fmt::Display) -> Self {
        HeaterSrvError::ModeNotFound(slug.to_string())
    }

    /// True for unknown-slug lookups, used by the API layer to map to 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, HeaterSrvError::ModeNotFound(_))
    }
}

impl From<std::io::Error> for HeaterSrvError {
    fn from(err: std::io::Error) -> Self {
        HeaterSrvError::IoError(err.to_string())
    }
}

impl From<serde_yaml::Error> for HeaterSrvError {
    fn from(err: serde_yaml::Error) -> Self {
        HeaterSrvError::ConfigError(format!("YAML: {err}"))
    }
}

impl From<toml::de::Error> for HeaterSrvError {
    fn from(err: toml::de::Error) -> Self {
        HeaterSrvError::DataError(format!("TOML: {err}"))
    }
}

impl From<toml::ser::Error> for HeaterSrvError {
    fn from(err: toml::ser::Error) -> Self {
        HeaterSrvError::DataError(format!("TOML: {err}"))
    }
}

impl From<gea_bus::BusError> for HeaterSrvError {
    fn from(err: gea_bus::BusError) -> Self {
        HeaterSrvError::BusError(err.to_string())
    }
}
