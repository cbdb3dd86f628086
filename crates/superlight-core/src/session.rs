//! Per-bulb session lifecycle and light control.
//!
//! A [`BulbSession`] owns everything about one bulb: its lifecycle state
//! machine, its cached light state, and the read coalescer. The session does
//! not drive scanning itself; the [`ScanCoordinator`](crate::ScanCoordinator)
//! feeds it discovery and disconnect events and calls [`BulbSession::establish`]
//! when the right peripheral shows up.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Scanning -> Connecting -> ServiceDiscovery
//!      -> CharacteristicDiscovery -> Ready -> Disconnected -> Scanning -> ...
//! ```
//!
//! Every phase between `Scanning` and `Ready` is bounded by a timeout from
//! [`SessionConfig`]; a phase that overruns lands the session in
//! `Disconnected` with the reason attached, from where the coordinator
//! resumes scanning.

use std::time::Duration;

use superlight_types::{HsvState, frame, uuids};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::coalescer::ReadCoalescer;
use crate::config::{BulbConfig, SessionConfig};
use crate::error::{Error, Result};
use crate::transport::SharedTransport;

/// Lifecycle state of a bulb session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet participating in a scan.
    Idle,
    /// Waiting for the target peripheral to be discovered.
    Scanning,
    /// Connection attempt in progress.
    Connecting,
    /// Connected, enumerating services.
    ServiceDiscovery,
    /// RGB service found, enumerating its characteristics.
    CharacteristicDiscovery,
    /// RGB characteristic resolved; reads and writes are possible.
    Ready,
    /// Connection lost or establishment failed.
    Disconnected {
        /// Reason for the disconnect, when one is known.
        error: Option<String>,
    },
}

/// Cached light state, mirrored to the bulb on every set.
#[derive(Debug, Clone, Copy)]
struct LightState {
    color: HsvState,
    /// Power as last explicitly commanded by the host. Reads never touch
    /// this; a dimmed-to-black bulb still counts as on.
    power: bool,
    /// Whether the last frame read from the device had any lit channel.
    device_reported_on: bool,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            color: HsvState::clamped(0, 0, 100),
            power: false,
            device_reported_on: false,
        }
    }
}

/// A session with one RGB bulb.
pub struct BulbSession {
    transport: SharedTransport,
    address: String,
    min_brightness: Option<u8>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    light: Mutex<LightState>,
    coalescer: ReadCoalescer,
}

impl std::fmt::Debug for BulbSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulbSession")
            .field("address", &self.address)
            .field("min_brightness", &self.min_brightness)
            .finish_non_exhaustive()
    }
}

impl BulbSession {
    /// Create a session with default timeouts.
    pub fn new(transport: SharedTransport, bulb: BulbConfig) -> Result<Self> {
        Self::with_config(transport, bulb, SessionConfig::default())
    }

    /// Create a session with explicit timeouts.
    pub fn with_config(
        transport: SharedTransport,
        bulb: BulbConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        bulb.validate()?;
        Ok(Self {
            transport,
            address: bulb.address,
            min_brightness: bulb.min_brightness,
            config,
            state: RwLock::new(SessionState::Idle),
            light: Mutex::new(LightState::default()),
            coalescer: ReadCoalescer::new(),
        })
    }

    /// The device address this session targets.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Whether the session can currently reach the bulb.
    pub async fn is_ready(&self) -> bool {
        *self.state.read().await == SessionState::Ready
    }

    /// Number of physical reads performed, across all coalesced requests.
    pub fn physical_reads(&self) -> u64 {
        self.coalescer.physical_reads()
    }

    /// Move into `Scanning` if the session is waiting for a device.
    ///
    /// A session that is connecting or ready keeps its state; scan resumption
    /// only concerns sessions with no live connection.
    pub(crate) async fn mark_scanning(&self) {
        let mut state = self.state.write().await;
        match *state {
            SessionState::Idle | SessionState::Disconnected { .. } => {
                *state = SessionState::Scanning;
            }
            _ => {}
        }
    }

    /// Record a disconnect and its reason.
    pub(crate) async fn mark_disconnected(&self, error: Option<String>) {
        warn!(address = %self.address, ?error, "Disconnected");
        *self.state.write().await = SessionState::Disconnected { error };
    }

    /// Connect to the discovered peripheral and resolve the RGB characteristic.
    ///
    /// Normally invoked by the [`ScanCoordinator`](crate::ScanCoordinator)
    /// when the target peripheral is discovered; hosts that manage discovery
    /// themselves may call it directly.
    ///
    /// On success the session is `Ready`; on any failure it is `Disconnected`
    /// with the reason attached, and the error is also returned to the caller.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn establish(&self) -> Result<()> {
        *self.state.write().await = SessionState::Connecting;
        match self.try_establish().await {
            Ok(()) => {
                *self.state.write().await = SessionState::Ready;
                info!(address = %self.address, "Found RGB characteristic");
                Ok(())
            }
            Err(e) => {
                warn!(address = %self.address, error = %e, "Session establishment failed");
                *self.state.write().await = SessionState::Disconnected {
                    error: Some(e.to_string()),
                };
                Err(e)
            }
        }
    }

    async fn try_establish(&self) -> Result<()> {
        self.bounded(
            self.config.connect_timeout,
            "connect",
            self.transport.connect(&self.address),
        )
        .await?;

        *self.state.write().await = SessionState::ServiceDiscovery;
        let services = self
            .bounded(
                self.config.discovery_timeout,
                "service discovery",
                self.transport.discover_services(&self.address),
            )
            .await?;
        if !services.contains(&uuids::RGB_SERVICE) {
            return Err(Error::service_not_found(uuids::RGB_SERVICE, services.len()));
        }

        *self.state.write().await = SessionState::CharacteristicDiscovery;
        let characteristics = self
            .bounded(
                self.config.discovery_timeout,
                "characteristic discovery",
                self.transport
                    .discover_characteristics(&self.address, uuids::RGB_SERVICE),
            )
            .await?;
        if !characteristics.contains(&uuids::RGB_CHARACTERISTIC) {
            return Err(Error::characteristic_not_found(
                uuids::RGB_CHARACTERISTIC,
                uuids::RGB_SERVICE,
            ));
        }
        Ok(())
    }

    async fn bounded<T>(
        &self,
        limit: Duration,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        timeout(limit, fut)
            .await
            .map_err(|_| Error::timeout(operation, limit))?
    }

    /// Turn the bulb on or off.
    pub async fn set_power(&self, on: bool) -> Result<()> {
        let snapshot = {
            let mut light = self.light.lock().await;
            light.power = on;
            *light
        };
        self.write_frame(snapshot).await
    }

    /// Set brightness in percent, applying the minimum-brightness floor.
    pub async fn set_brightness(&self, value: u8) -> Result<()> {
        let value = self.remap_brightness(value.min(100));
        let snapshot = {
            let mut light = self.light.lock().await;
            light.color = HsvState::clamped(light.color.hue, light.color.saturation, value);
            *light
        };
        self.write_frame(snapshot).await
    }

    /// Set hue in degrees.
    pub async fn set_hue(&self, degrees: u16) -> Result<()> {
        let snapshot = {
            let mut light = self.light.lock().await;
            light.color = HsvState::clamped(degrees, light.color.saturation, light.color.value);
            *light
        };
        self.write_frame(snapshot).await
    }

    /// Set saturation in percent.
    pub async fn set_saturation(&self, percent: u8) -> Result<()> {
        let snapshot = {
            let mut light = self.light.lock().await;
            light.color = HsvState::clamped(light.color.hue, percent, light.color.value);
            *light
        };
        self.write_frame(snapshot).await
    }

    /// Current power state, refreshed from the device.
    pub async fn power(&self) -> Result<bool> {
        self.refresh().await?;
        Ok(self.light.lock().await.power)
    }

    /// Current brightness, refreshed from the device.
    pub async fn brightness(&self) -> Result<u8> {
        Ok(self.refresh().await?.value)
    }

    /// Current hue, refreshed from the device.
    pub async fn hue(&self) -> Result<u16> {
        Ok(self.refresh().await?.hue)
    }

    /// Current saturation, refreshed from the device.
    pub async fn saturation(&self) -> Result<u8> {
        Ok(self.refresh().await?.saturation)
    }

    /// Whether the last frame read from the device had any lit channel.
    pub async fn device_reported_on(&self) -> Result<bool> {
        self.refresh().await?;
        Ok(self.light.lock().await.device_reported_on)
    }

    /// Last color written or read, without touching the device.
    pub async fn last_known_color(&self) -> HsvState {
        self.light.lock().await.color
    }

    /// Last power state commanded, without touching the device.
    pub async fn last_known_power(&self) -> bool {
        self.light.lock().await.power
    }

    /// Flash red, green, blue, then restore the previous state.
    ///
    /// The light lock is held for the whole sequence so concurrent sets
    /// cannot interleave with the flash. A write failure mid-flash still
    /// restores the cached state before returning the error.
    pub async fn identify(&self) -> Result<()> {
        let mut light = self.light.lock().await;
        let snapshot = *light;
        info!(address = %self.address, "Identify: flashing");

        for (r, g, b) in [(255, 0, 0), (0, 255, 0), (0, 0, 255)] {
            light.color = HsvState::from_rgb(r, g, b);
            light.power = true;
            if let Err(e) = self.write_frame(*light).await {
                *light = snapshot;
                return Err(e);
            }
            tokio::time::sleep(self.config.flash_step).await;
        }

        *light = snapshot;
        self.write_frame(*light).await
    }

    /// Encode a light state and write it to the RGB characteristic.
    ///
    /// Takes a snapshot rather than locking so callers may hold the light
    /// lock across the write.
    async fn write_frame(&self, light: LightState) -> Result<()> {
        if !self.is_ready().await {
            warn!(address = %self.address, "Write skipped: characteristic not resolved");
            return Err(Error::DeviceNotReady);
        }

        let (r, g, b) = light.color.to_rgb();
        debug!(
            address = %self.address,
            "Set: {} = rgb({r}, {g}, {b}) ({})",
            light.color,
            if light.power { "On" } else { "Off" },
        );
        let payload = frame::encode(light.power, (r, g, b));
        self.bounded(
            self.config.write_timeout,
            "write",
            self.transport
                .write(&self.address, uuids::RGB_CHARACTERISTIC, &payload),
        )
        .await
    }

    /// Read the device's current frame, coalescing with concurrent readers.
    async fn refresh(&self) -> Result<HsvState> {
        if !self.is_ready().await {
            return Err(Error::DeviceNotReady);
        }

        let read = async {
            let raw = self
                .bounded(
                    self.config.read_timeout,
                    "read",
                    self.transport.read(&self.address, uuids::RGB_CHARACTERISTIC),
                )
                .await?;
            let (r, g, b) = frame::decode(&raw)?;
            let color = HsvState::from_rgb(r, g, b);
            debug!(address = %self.address, "Read: rgb({r}, {g}, {b}) = {color}");

            let mut light = self.light.lock().await;
            light.color = color;
            light.device_reported_on = color.value > 0;
            Ok(color)
        };

        self.coalescer.request(read).await.map_err(Error::from)
    }

    /// Rescale host brightness onto the bulb's usable range.
    ///
    /// `[1, 100]` maps linearly onto `[floor, 100]`; zero is exempt so the
    /// host can always reach dark.
    fn remap_brightness(&self, value: u8) -> u8 {
        match self.min_brightness {
            Some(floor) if value > 0 => {
                let floor = f64::from(floor.min(100));
                let scaled = floor + f64::from(value) / 100.0 * (100.0 - floor);
                scaled.round() as u8
            }
            _ => value,
        }
    }
}
