//! Async BLE client for Superlight RGB bulbs.
//!
//! The bulb exposes a single writable-and-readable GATT characteristic
//! carrying a 4-byte color frame; this crate wraps it in a session that
//! handles the scan, connect, and discovery lifecycle, reconnects after
//! drops, and presents the light as hue, saturation, brightness, and power.
//!
//! # Architecture
//!
//! - [`Transport`] abstracts the BLE central; [`BtleTransport`] implements
//!   it with [`btleplug`], [`MockTransport`] with in-memory state.
//! - [`BulbSession`] owns one bulb's lifecycle and light state.
//! - [`ScanCoordinator`] routes adapter events to sessions and arbitrates
//!   when the adapter scans.
//!
//! # Example
//!
//! ```no_run
//! use superlight_core::{BtleTransport, BulbConfig, BulbSession, ScanCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> superlight_core::Result<()> {
//!     let transport = BtleTransport::new().await?;
//!     let session = std::sync::Arc::new(BulbSession::new(
//!         transport.clone(),
//!         BulbConfig::new("aa:bb:cc:dd:ee:ff"),
//!     )?);
//!
//!     let coordinator = ScanCoordinator::new(transport);
//!     coordinator.register(session.clone()).await;
//!     coordinator.spawn();
//!
//!     // Once the bulb is discovered and the session is ready:
//!     session.set_power(true).await?;
//!     session.set_hue(120).await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod coalescer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod mock;
pub mod session;
pub mod transport;

pub use ble::BtleTransport;
pub use coalescer::{ReadCoalescer, ReadFailure};
pub use config::{BulbConfig, SessionConfig};
pub use coordinator::ScanCoordinator;
pub use error::{Error, Result};
pub use mock::MockTransport;
pub use session::{BulbSession, SessionState};
pub use transport::{
    EventReceiver, EventSender, SharedTransport, Transport, TransportEvent, event_channel,
};

pub use superlight_types::{HsvState, frame, uuids};
