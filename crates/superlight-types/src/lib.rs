//! Platform-agnostic types for Superlight BLE RGB bulbs.
//!
//! This crate provides the shared, I/O-free pieces of the Superlight
//! protocol so they can be tested and reused without a Bluetooth stack:
//!
//! - [`HsvState`] and the RGB↔HSV conversion used on every read and write
//! - The 4-byte command-frame codec in [`frame`]
//! - UUID constants for the vendor service and characteristic
//! - Parse error types
//!
//! # Example
//!
//! ```
//! use superlight_types::{HsvState, frame};
//!
//! let hsv = HsvState::from_rgb(255, 0, 0);
//! assert_eq!(hsv.hue, 0);
//!
//! let cmd = frame::encode(true, hsv.to_rgb());
//! assert_eq!(cmd, [0xD0, 255, 0, 0]);
//! ```

pub mod color;
pub mod error;
pub mod frame;
pub mod uuid;

pub use color::HsvState;
pub use error::{ParseError, ParseResult};
pub use uuid as uuids;
