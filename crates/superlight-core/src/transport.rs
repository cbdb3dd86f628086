//! Transport abstraction over a BLE central.
//!
//! Sessions and the scan coordinator talk to the radio only through the
//! [`Transport`] trait, which narrows a BLE central down to the handful of
//! operations a GATT client needs: scan control, connection, discovery,
//! and characteristic I/O. Adapter-level happenings arrive out-of-band as
//! [`TransportEvent`]s on a broadcast channel, so any number of consumers
//! can observe the same stream.
//!
//! The production implementation is [`BtleTransport`](crate::ble::BtleTransport);
//! tests use [`MockTransport`](crate::mock::MockTransport).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;

/// Events emitted by a transport about adapter and peer activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransportEvent {
    /// The adapter's power state changed.
    AdapterStateChanged {
        /// Whether the adapter is powered on and usable.
        powered: bool,
    },
    /// A peripheral was discovered during scanning.
    Discovered {
        /// Address of the discovered peripheral.
        address: String,
    },
    /// A connected peripheral disconnected.
    Disconnected {
        /// Address of the peripheral that disconnected.
        address: String,
        /// Reason for the disconnect, when one is known.
        error: Option<String>,
    },
}

/// Sender side of the transport event channel.
pub type EventSender = broadcast::Sender<TransportEvent>;

/// Receiver side of the transport event channel.
pub type EventReceiver = broadcast::Receiver<TransportEvent>;

/// Create a transport event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// The operations a session needs from a BLE central.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the adapter is currently powered on.
    ///
    /// Adapters that are already powered when the process starts never emit
    /// an [`TransportEvent::AdapterStateChanged`] transition, so consumers
    /// query this once before relying on the event stream.
    async fn is_powered(&self) -> Result<bool>;

    /// Start scanning for peripherals.
    async fn start_scan(&self) -> Result<()>;

    /// Stop an in-progress scan.
    async fn stop_scan(&self) -> Result<()>;

    /// Connect to a previously discovered peripheral.
    async fn connect(&self, address: &str) -> Result<()>;

    /// Discover the services of a connected peripheral.
    async fn discover_services(&self, address: &str) -> Result<Vec<Uuid>>;

    /// Discover the characteristics of one service.
    async fn discover_characteristics(&self, address: &str, service: Uuid) -> Result<Vec<Uuid>>;

    /// Read the current value of a characteristic.
    async fn read(&self, address: &str, characteristic: Uuid) -> Result<Vec<u8>>;

    /// Write a payload to a characteristic without waiting for an ACK.
    async fn write(&self, address: &str, characteristic: Uuid, payload: &[u8]) -> Result<()>;

    /// Subscribe to transport events.
    fn subscribe(&self) -> EventReceiver;
}

/// A transport shared between sessions and the coordinator.
pub type SharedTransport = Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = TransportEvent::Discovered {
            address: "aa:bb:cc:dd:ee:ff".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"discovered\""));
        assert!(json.contains("aa:bb:cc:dd:ee:ff"));

        let back: TransportEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_disconnect_event_carries_reason() {
        let event = TransportEvent::Disconnected {
            address: "aa:bb:cc:dd:ee:ff".to_string(),
            error: Some("link supervision timeout".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("link supervision timeout"));
    }

    #[tokio::test]
    async fn test_event_channel_fan_out() {
        let (tx, mut rx1) = event_channel(8);
        let mut rx2 = tx.subscribe();

        tx.send(TransportEvent::AdapterStateChanged { powered: true })
            .unwrap();

        assert_eq!(
            rx1.recv().await.unwrap(),
            TransportEvent::AdapterStateChanged { powered: true }
        );
        assert_eq!(
            rx2.recv().await.unwrap(),
            TransportEvent::AdapterStateChanged { powered: true }
        );
    }
}
