//! RGB/HSV color-space conversion.
//!
//! The bulb speaks RGB on the wire while hosts model the light as
//! hue/saturation/brightness, so every read and write crosses this
//! conversion. Components are integer degrees/percent, rounded to the
//! nearest value rather than truncated, and the two directions round-trip
//! within ±1 per component.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Host-facing color state of a bulb.
///
/// Hue is in degrees `[0, 360]`, saturation and value (brightness) in
/// percent `[0, 100]`. Power is deliberately not part of this struct:
/// a bulb keeps its color while switched off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HsvState {
    /// Hue in degrees, `[0, 360]`.
    pub hue: u16,
    /// Saturation in percent, `[0, 100]`.
    pub saturation: u8,
    /// Brightness (value) in percent, `[0, 100]`.
    pub value: u8,
}

impl HsvState {
    /// Create a state with all components clamped into range.
    #[must_use]
    pub fn clamped(hue: u16, saturation: u8, value: u8) -> Self {
        Self {
            hue: hue.min(360),
            saturation: saturation.min(100),
            value: value.min(100),
        }
    }

    /// Convert device RGB bytes into HSV.
    ///
    /// Uses the standard max/min/diff decomposition. Achromatic colors
    /// (diff == 0) report hue and saturation as zero. The six-region hue
    /// is normalized into `[0, 360)` before rounding.
    #[must_use]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let rf = f64::from(r) / 255.0;
        let gf = f64::from(g) / 255.0;
        let bf = f64::from(b) / 255.0;

        let max = rf.max(gf).max(bf);
        let min = rf.min(gf).min(bf);
        let diff = max - min;

        let (hue, saturation) = if diff == 0.0 {
            (0.0, 0.0)
        } else {
            let sector = if max == rf {
                (gf - bf) / diff
            } else if max == gf {
                2.0 + (bf - rf) / diff
            } else {
                4.0 + (rf - gf) / diff
            };

            let mut hue = sector * 60.0;
            if hue < 0.0 {
                hue += 360.0;
            } else if hue >= 360.0 {
                hue -= 360.0;
            }

            (hue, diff / max)
        };

        Self {
            hue: hue.round() as u16,
            saturation: (saturation * 100.0).round() as u8,
            value: (max * 100.0).round() as u8,
        }
    }

    /// Convert HSV into device RGB bytes.
    ///
    /// Components are clamped into range first. Zero saturation short-cuts
    /// to an achromatic gray; otherwise the hue selects one of six sectors
    /// and the channels are interpolated in the `[0, 1]` domain before
    /// scaling back to bytes. A hue of exactly 360 lands on the sector-5
    /// mapping, which is identical to hue 0.
    #[must_use]
    pub fn to_rgb(self) -> (u8, u8, u8) {
        let clamped = Self::clamped(self.hue, self.saturation, self.value);

        let s = f64::from(clamped.saturation) / 100.0;
        let v = f64::from(clamped.value) / 100.0;

        let scale = |c: f64| (c * 255.0).round() as u8;

        if s == 0.0 {
            // Achromatic (gray)
            let gray = scale(v);
            return (gray, gray, gray);
        }

        let h = f64::from(clamped.hue) / 60.0;
        let i = h.floor();
        let f = h - i;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        // Hue 360 yields sector index 6, which wraps onto the last arm.
        let (r, g, b) = match i as i32 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };

        (scale(r), scale(g), scale(b))
    }
}

impl fmt::Display for HsvState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsv({},{},{})", self.hue, self.saturation, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_black_is_achromatic_zero() {
        let hsv = HsvState::from_rgb(0, 0, 0);
        assert_eq!(hsv, HsvState { hue: 0, saturation: 0, value: 0 });
    }

    #[test]
    fn test_white_is_achromatic_full() {
        let hsv = HsvState::from_rgb(255, 255, 255);
        assert_eq!(hsv, HsvState { hue: 0, saturation: 0, value: 100 });
    }

    #[test]
    fn test_pure_red() {
        let hsv = HsvState::from_rgb(255, 0, 0);
        assert_eq!(hsv, HsvState { hue: 0, saturation: 100, value: 100 });
    }

    #[test]
    fn test_pure_green_and_blue() {
        assert_eq!(HsvState::from_rgb(0, 255, 0).hue, 120);
        assert_eq!(HsvState::from_rgb(0, 0, 255).hue, 240);
    }

    #[test]
    fn test_zero_saturation_is_gray() {
        let (r, g, b) = HsvState { hue: 200, saturation: 0, value: 50 }.to_rgb();
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(r, 128); // round(0.5 * 255)
    }

    #[test]
    fn test_hue_360_equals_hue_0() {
        for (s, v) in [(100, 100), (50, 75), (100, 1), (33, 66)] {
            let wrapped = HsvState { hue: 360, saturation: s, value: v }.to_rgb();
            let zero = HsvState { hue: 0, saturation: s, value: v }.to_rgb();
            assert_eq!(wrapped, zero, "h=360 must behave like h=0 at s={s} v={v}");
        }
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let over = HsvState { hue: 400, saturation: 120, value: 200 }.to_rgb();
        let max = HsvState { hue: 360, saturation: 100, value: 100 }.to_rgb();
        assert_eq!(over, max);
    }

    #[test]
    fn test_display() {
        let hsv = HsvState { hue: 120, saturation: 50, value: 75 };
        assert_eq!(hsv.to_string(), "hsv(120,50,75)");
    }

    proptest! {
        #[test]
        fn prop_round_trip_within_one(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
            let (r2, g2, b2) = HsvState::from_rgb(r, g, b).to_rgb();
            prop_assert!(i16::from(r).abs_diff(i16::from(r2)) <= 1, "r {} -> {}", r, r2);
            prop_assert!(i16::from(g).abs_diff(i16::from(g2)) <= 1, "g {} -> {}", g, g2);
            prop_assert!(i16::from(b).abs_diff(i16::from(b2)) <= 1, "b {} -> {}", b, b2);
        }

        #[test]
        fn prop_from_rgb_components_in_range(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
            let hsv = HsvState::from_rgb(r, g, b);
            prop_assert!(hsv.hue <= 360);
            prop_assert!(hsv.saturation <= 100);
            prop_assert!(hsv.value <= 100);
        }

        #[test]
        fn prop_to_rgb_never_panics(h in 0u16..=360, s in 0u8..=100, v in 0u8..=100) {
            // Channels are u8 by construction; this exercises every sector.
            let _ = HsvState { hue: h, saturation: s, value: v }.to_rgb();
        }
    }
}
