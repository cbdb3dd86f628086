//! Mock transport for testing without BLE hardware.
//!
//! [`MockTransport`] implements [`Transport`] against in-memory state: the
//! advertised services and characteristics, the frame returned by reads, and
//! every written payload are all scriptable and inspectable. Adapter events
//! are injected with the `emit_*` methods, which feed the same broadcast
//! channel the real transport uses.
//!
//! # Example
//!
//! ```
//! use superlight_core::MockTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mock = MockTransport::new();
//! mock.set_read_frame(255, 0, 0).await;
//! mock.emit_adapter(true);
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use superlight_types::uuids;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{EventReceiver, EventSender, Transport, TransportEvent, event_channel};

/// A scriptable in-memory [`Transport`].
pub struct MockTransport {
    events: EventSender,
    services: RwLock<Vec<Uuid>>,
    characteristics: RwLock<Vec<Uuid>>,
    /// Frame returned by reads of the RGB characteristic.
    read_frame: RwLock<Vec<u8>>,
    /// Every payload written, in order.
    written: Mutex<Vec<Vec<u8>>>,
    powered: AtomicBool,
    start_scan_count: AtomicU32,
    stop_scan_count: AtomicU32,
    connect_count: AtomicU32,
    fail_connect: AtomicBool,
    fail_read: AtomicBool,
    connect_latency_ms: AtomicU64,
    read_latency_ms: AtomicU64,
}

impl MockTransport {
    /// Create a mock advertising the RGB service and characteristic, with a
    /// dark bulb behind it.
    pub fn new() -> std::sync::Arc<Self> {
        let (events, _) = event_channel(64);
        std::sync::Arc::new(Self {
            events,
            services: RwLock::new(vec![uuids::RGB_SERVICE]),
            characteristics: RwLock::new(vec![uuids::RGB_CHARACTERISTIC]),
            read_frame: RwLock::new(vec![0xD0, 0, 0, 0]),
            written: Mutex::new(Vec::new()),
            powered: AtomicBool::new(false),
            start_scan_count: AtomicU32::new(0),
            stop_scan_count: AtomicU32::new(0),
            connect_count: AtomicU32::new(0),
            fail_connect: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
            connect_latency_ms: AtomicU64::new(0),
            read_latency_ms: AtomicU64::new(0),
        })
    }

    /// Script the adapter power state without emitting a transition, as an
    /// adapter that was already up before the process started would.
    pub fn set_powered(&self, powered: bool) {
        self.powered.store(powered, Ordering::SeqCst);
    }

    /// Inject an adapter power transition, updating the queryable state too.
    pub fn emit_adapter(&self, powered: bool) {
        self.powered.store(powered, Ordering::SeqCst);
        let _ = self
            .events
            .send(TransportEvent::AdapterStateChanged { powered });
    }

    /// Inject a peripheral discovery event.
    pub fn emit_discovered(&self, address: &str) {
        let _ = self.events.send(TransportEvent::Discovered {
            address: address.to_string(),
        });
    }

    /// Inject a disconnect event.
    pub fn emit_disconnected(&self, address: &str, error: Option<String>) {
        let _ = self.events.send(TransportEvent::Disconnected {
            address: address.to_string(),
            error,
        });
    }

    /// Replace the advertised services.
    pub async fn set_services(&self, services: Vec<Uuid>) {
        *self.services.write().await = services;
    }

    /// Replace the advertised characteristics of the RGB service.
    pub async fn set_characteristics(&self, characteristics: Vec<Uuid>) {
        *self.characteristics.write().await = characteristics;
    }

    /// Set the frame returned by reads to a well-formed RGB frame.
    pub async fn set_read_frame(&self, r: u8, g: u8, b: u8) {
        *self.read_frame.write().await = vec![0xD0, r, g, b];
    }

    /// Set the raw bytes returned by reads, malformed ones included.
    pub async fn set_raw_read_frame(&self, raw: Vec<u8>) {
        *self.read_frame.write().await = raw;
    }

    /// Every payload written so far, oldest first.
    pub async fn written_frames(&self) -> Vec<Vec<u8>> {
        self.written.lock().await.clone()
    }

    /// Make subsequent connect attempts fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent reads fail.
    pub fn set_fail_read(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::SeqCst);
    }

    /// Delay connect attempts by the given number of milliseconds.
    pub fn set_connect_latency_ms(&self, ms: u64) {
        self.connect_latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Delay reads by the given number of milliseconds.
    pub fn set_read_latency_ms(&self, ms: u64) {
        self.read_latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Number of scan starts requested.
    pub fn start_scan_count(&self) -> u32 {
        self.start_scan_count.load(Ordering::SeqCst)
    }

    /// Number of scan stops requested.
    pub fn stop_scan_count(&self) -> u32 {
        self.stop_scan_count.load(Ordering::SeqCst)
    }

    /// Number of connect attempts.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    async fn latency(&self, ms: &AtomicU64) {
        let ms = ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn is_powered(&self) -> Result<bool> {
        Ok(self.powered.load(Ordering::SeqCst))
    }

    async fn start_scan(&self) -> Result<()> {
        self.start_scan_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.stop_scan_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self, _address: &str) -> Result<()> {
        self.latency(&self.connect_latency_ms).await;
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::transport("mock connect failure"));
        }
        Ok(())
    }

    async fn discover_services(&self, _address: &str) -> Result<Vec<Uuid>> {
        Ok(self.services.read().await.clone())
    }

    async fn discover_characteristics(&self, _address: &str, service: Uuid) -> Result<Vec<Uuid>> {
        if !self.services.read().await.contains(&service) {
            return Err(Error::service_not_found(service, 0));
        }
        Ok(self.characteristics.read().await.clone())
    }

    async fn read(&self, _address: &str, characteristic: Uuid) -> Result<Vec<u8>> {
        self.latency(&self.read_latency_ms).await;
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(Error::transport("mock read failure"));
        }
        if !self.characteristics.read().await.contains(&characteristic) {
            return Err(Error::characteristic_not_found(
                characteristic,
                uuids::RGB_SERVICE,
            ));
        }
        Ok(self.read_frame.read().await.clone())
    }

    async fn write(&self, _address: &str, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        if !self.characteristics.read().await.contains(&characteristic) {
            return Err(Error::characteristic_not_found(
                characteristic,
                uuids::RGB_SERVICE,
            ));
        }
        self.written.lock().await.push(payload.to_vec());
        Ok(())
    }

    fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}
