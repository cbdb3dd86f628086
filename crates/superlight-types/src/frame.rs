//! Command-frame codec for the Superlight RGB characteristic.
//!
//! Every write to the bulb is a fixed 4-byte frame: a magic prefix byte
//! followed by the raw RGB channels. Reads come back in the same shape.

use crate::error::{ParseError, ParseResult};

/// Exact length of a command frame.
pub const FRAME_LEN: usize = 4;

/// Magic prefix byte for command frames.
///
/// The vendor app prepends 0xD0 to every RGB write. The bulb does not
/// appear to care about its value, and does not echo it consistently on
/// read, so it is kept purely for wire compatibility and ignored on decode.
pub const FRAME_MAGIC: u8 = 0xD0;

/// Encode a command frame from power state and RGB channels.
///
/// When the bulb is powered off, the channels are forced to zero so the
/// device goes dark while the host-side color state is preserved.
#[must_use]
pub fn encode(power: bool, (r, g, b): (u8, u8, u8)) -> [u8; FRAME_LEN] {
    if power {
        [FRAME_MAGIC, r, g, b]
    } else {
        [FRAME_MAGIC, 0, 0, 0]
    }
}

/// Decode the RGB channels from a command frame.
///
/// Byte 0 (the magic) is not validated. The only failure mode is a frame
/// that is not exactly [`FRAME_LEN`] bytes, which indicates the transport
/// violated its contract.
pub fn decode(frame: &[u8]) -> ParseResult<(u8, u8, u8)> {
    if frame.len() != FRAME_LEN {
        return Err(ParseError::MalformedFrame {
            expected: FRAME_LEN,
            actual: frame.len(),
        });
    }
    Ok((frame[1], frame[2], frame[3]))
}
