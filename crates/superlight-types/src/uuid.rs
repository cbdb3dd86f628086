//! Bluetooth UUIDs for Superlight bulbs.
//!
//! The bulb exposes a single vendor service with a single RGB control
//! characteristic. Both are advertised as 16-bit UUIDs, expanded here
//! onto the standard Bluetooth base UUID.

use uuid::{Uuid, uuid};

/// Vendor RGB service (16-bit `ffb0`).
pub const RGB_SERVICE: Uuid = uuid!("0000ffb0-0000-1000-8000-00805f9b34fb");

/// Vendor RGB control characteristic (16-bit `ffb2`).
pub const RGB_CHARACTERISTIC: Uuid = uuid!("0000ffb2-0000-1000-8000-00805f9b34fb");
