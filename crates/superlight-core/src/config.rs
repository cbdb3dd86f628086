//! Session configuration.
//!
//! [`BulbConfig`] carries what the host supplies for one bulb: the target
//! address and an optional minimum-brightness floor. [`SessionConfig`] holds
//! the timeout budget for the BLE phases, separated so deployments in
//! challenging RF environments can widen it without touching bulb identity.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default timeout for establishing a BLE connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for each discovery phase (services, characteristics).
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for characteristic reads.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for characteristic writes.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default dwell per color during the identify flash sequence.
const DEFAULT_FLASH_STEP: Duration = Duration::from_millis(500);

/// Host-supplied configuration for one bulb.
#[derive(Debug, Clone)]
pub struct BulbConfig {
    /// Target device address. Matched against discovery events by exact,
    /// case-sensitive string equality.
    pub address: String,
    /// Optional minimum usable brightness of the bulb, in percent.
    ///
    /// When set, host brightness `[1, 100]` is rescaled onto
    /// `[min_brightness, 100]`; zero stays zero so the darkest level
    /// remains reachable.
    pub min_brightness: Option<u8>,
}

impl BulbConfig {
    /// Create a config for the given device address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            min_brightness: None,
        }
    }

    /// Set the minimum-brightness floor.
    #[must_use]
    pub fn min_brightness(mut self, floor: u8) -> Self {
        self.min_brightness = Some(floor);
        self
    }

    /// Validate the config and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::invalid_config("device address must not be empty"));
        }
        if let Some(floor) = self.min_brightness
            && floor > 100
        {
            return Err(Error::invalid_config(
                "min_brightness must be within 0-100",
            ));
        }
        Ok(())
    }
}

/// Timeout configuration for session BLE phases.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use superlight_core::SessionConfig;
///
/// let config = SessionConfig::default()
///     .connect_timeout(Duration::from_secs(25))
///     .discovery_timeout(Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for establishing a BLE connection.
    pub connect_timeout: Duration,
    /// Timeout for each of the service and characteristic discovery phases.
    pub discovery_timeout: Duration,
    /// Timeout for characteristic reads.
    pub read_timeout: Duration,
    /// Timeout for characteristic writes.
    pub write_timeout: Duration,
    /// Dwell per color during the identify flash sequence.
    pub flash_step: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            flash_step: DEFAULT_FLASH_STEP,
        }
    }
}

impl SessionConfig {
    /// Create a new session config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the identify flash step duration.
    #[must_use]
    pub fn flash_step(mut self, step: Duration) -> Self {
        self.flash_step = step;
        self
    }
}
