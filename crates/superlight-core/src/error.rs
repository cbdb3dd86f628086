//! Error types for superlight-core.
//!
//! This module defines all error types that can occur when driving a
//! Superlight bulb over Bluetooth Low Energy.
//!
//! A few variants deserve context:
//!
//! - [`Error::DeviceNotReady`] is the normal answer to any get/set issued
//!   before the RGB characteristic has been resolved. It is always returned,
//!   never panicked on, and the operation is simply refused rather than
//!   queued for later delivery.
//! - [`Error::Transport`] is how an adapter-reported connect/discover/read
//!   failure surfaces to the host-facing getters. It is fatal to that one
//!   operation, not to the session.
//! - [`Error::MalformedFrame`] means the transport handed back a buffer that
//!   is not exactly 4 bytes. The read fails; the session keeps running.
//!
//! Disconnection is deliberately not an error: it triggers an automatic
//! rescan through the [`crate::coordinator::ScanCoordinator`]. No operation
//! is retried automatically besides that rescan.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when communicating with Superlight bulbs.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The RGB characteristic has not been resolved yet.
    #[error("device not ready: RGB characteristic not yet resolved")]
    DeviceNotReady,

    /// Adapter-reported failure surfaced from a transport operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport returned a buffer that violates the frame contract.
    #[error(transparent)]
    MalformedFrame(#[from] superlight_types::ParseError),

    /// No Bluetooth adapter available on this host.
    #[error("no Bluetooth adapter available")]
    AdapterUnavailable,

    /// The peripheral address has not been seen by the transport.
    #[error("peripheral '{address}' is not known to the transport")]
    UnknownPeripheral {
        /// The address that was requested.
        address: String,
    },

    /// The vendor RGB service was not among the discovered services.
    #[error("service {uuid} not found (searched {service_count} discovered services)")]
    ServiceNotFound {
        /// The UUID that was not found.
        uuid: uuid::Uuid,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// The vendor RGB characteristic was not found within its service.
    #[error("characteristic {uuid} not found in service {service}")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: uuid::Uuid,
        /// The service that was searched.
        service: uuid::Uuid,
    },

    /// Operation timed out.
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a transport error from any displayable source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a service not found error.
    pub fn service_not_found(uuid: uuid::Uuid, service_count: usize) -> Self {
        Self::ServiceNotFound {
            uuid,
            service_count,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: uuid::Uuid, service: uuid::Uuid) -> Self {
        Self::CharacteristicNotFound { uuid, service }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using superlight-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
