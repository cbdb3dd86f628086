//! btleplug-backed transport.
//!
//! [`BtleTransport`] adapts the system BLE adapter to the [`Transport`]
//! trait. A background task pumps the adapter's [`CentralEvent`] stream into
//! the crate's [`TransportEvent`] channel and maintains an address-keyed map
//! of discovered peripherals, so the rest of the crate can speak in plain
//! addresses instead of platform peripheral handles.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use btleplug::api::{
    Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{EventReceiver, EventSender, Transport, TransportEvent, event_channel};

/// Capacity of the transport event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// [`Transport`] implementation over the first system BLE adapter.
pub struct BtleTransport {
    adapter: Adapter,
    /// Peripherals seen during scanning, keyed by address. Pruned down to
    /// the connected set on every scan stop, otherwise privacy-rotating
    /// random addresses accumulate without bound.
    peripherals: RwLock<HashMap<String, Peripheral>>,
    /// Addresses with a live connection.
    connected: RwLock<HashSet<String>>,
    events: EventSender,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Drop every scanned peripheral that has no live connection.
fn retain_connected<V>(peripherals: &mut HashMap<String, V>, connected: &HashSet<String>) {
    peripherals.retain(|address, _| connected.contains(address));
}

impl BtleTransport {
    /// Create a transport on the first available adapter and start pumping
    /// its events.
    pub async fn new() -> Result<Arc<Self>> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::AdapterUnavailable)?;

        let (events, _) = event_channel(EVENT_CHANNEL_CAPACITY);
        let transport = Arc::new(Self {
            adapter,
            peripherals: RwLock::new(HashMap::new()),
            connected: RwLock::new(HashSet::new()),
            events,
            pump: Mutex::new(None),
        });

        let pump = tokio::spawn(Self::pump_events(Arc::clone(&transport)));
        *transport.pump.lock().await = Some(pump);
        Ok(transport)
    }

    /// Translate adapter events and forward them to subscribers.
    async fn pump_events(self: Arc<Self>) {
        let mut stream = match self.adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Failed to open adapter event stream");
                return;
            }
        };

        while let Some(event) = stream.next().await {
            match event {
                CentralEvent::StateUpdate(state) => {
                    let powered = matches!(state, CentralState::PoweredOn);
                    debug!(?state, "Adapter state update");
                    let _ = self
                        .events
                        .send(TransportEvent::AdapterStateChanged { powered });
                }
                CentralEvent::DeviceDiscovered(id) => {
                    let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                        continue;
                    };
                    let Some(address) = Self::address_of(&peripheral).await else {
                        continue;
                    };
                    debug!(address, "Peripheral discovered");
                    self.peripherals
                        .write()
                        .await
                        .insert(address.clone(), peripheral);
                    let _ = self.events.send(TransportEvent::Discovered { address });
                }
                CentralEvent::DeviceDisconnected(id) => {
                    let address = {
                        let peripherals = self.peripherals.read().await;
                        peripherals
                            .iter()
                            .find(|(_, p)| p.id() == id)
                            .map(|(address, _)| address.clone())
                    };
                    if let Some(address) = address {
                        self.connected.write().await.remove(&address);
                        let _ = self.events.send(TransportEvent::Disconnected {
                            address,
                            error: None,
                        });
                    }
                }
                _ => {}
            }
        }
        debug!("Adapter event stream ended");
    }

    async fn address_of(peripheral: &Peripheral) -> Option<String> {
        match peripheral.properties().await {
            Ok(Some(props)) => Some(props.address.to_string()),
            _ => None,
        }
    }

    async fn peripheral(&self, address: &str) -> Result<Peripheral> {
        self.peripherals
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| Error::UnknownPeripheral {
                address: address.to_string(),
            })
    }

    fn find_characteristic(
        peripheral: &Peripheral,
        uuid: Uuid,
    ) -> Result<btleplug::api::Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| Error::characteristic_not_found(uuid, superlight_types::uuids::RGB_SERVICE))
    }
}

impl Drop for BtleTransport {
    fn drop(&mut self) {
        if let Ok(mut pump) = self.pump.try_lock()
            && let Some(handle) = pump.take()
        {
            handle.abort();
        }
    }
}

#[async_trait::async_trait]
impl Transport for BtleTransport {
    async fn is_powered(&self) -> Result<bool> {
        let state = self.adapter.adapter_state().await?;
        Ok(matches!(state, CentralState::PoweredOn))
    }

    async fn start_scan(&self) -> Result<()> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        let connected = self.connected.read().await;
        retain_connected(&mut *self.peripherals.write().await, &connected);
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<()> {
        let peripheral = self.peripheral(address).await?;
        peripheral.connect().await?;
        self.connected.write().await.insert(address.to_string());
        Ok(())
    }

    async fn discover_services(&self, address: &str) -> Result<Vec<Uuid>> {
        let peripheral = self.peripheral(address).await?;
        peripheral.discover_services().await?;
        Ok(peripheral.services().iter().map(|s| s.uuid).collect())
    }

    async fn discover_characteristics(&self, address: &str, service: Uuid) -> Result<Vec<Uuid>> {
        let peripheral = self.peripheral(address).await?;
        let services = peripheral.services();
        let service = services
            .iter()
            .find(|s| s.uuid == service)
            .ok_or_else(|| Error::service_not_found(service, services.len()))?;
        Ok(service.characteristics.iter().map(|c| c.uuid).collect())
    }

    async fn read(&self, address: &str, characteristic: Uuid) -> Result<Vec<u8>> {
        let peripheral = self.peripheral(address).await?;
        let characteristic = Self::find_characteristic(&peripheral, characteristic)?;
        Ok(peripheral.read(&characteristic).await?)
    }

    async fn write(&self, address: &str, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        let peripheral = self.peripheral(address).await?;
        let characteristic = Self::find_characteristic(&peripheral, characteristic)?;
        peripheral
            .write(&characteristic, payload, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}
