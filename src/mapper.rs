//! Value mapper - conversions between the setting domain, the slider and text
//!
//! The setting lives in a domain range (`0.5..=3.0` for the text scaling
//! factor, `0..=100` for brightness). Sliders work on the unit interval and
//! the text entry shows the value at a fixed number of decimals. Everything
//! here is pure; [`ValueRange`] bundles the bounds so a degenerate range is
//! rejected once, when it is built.
//!
//! # Key Functions
//!
//! - [`clamp`]: restrict a value to `[min, max]`
//! - [`to_slider_position`] / [`from_slider_position`]: linear projection onto `[0, 1]`
//! - [`format`] / [`parse`]: locale-independent fixed-decimal text
//! - [`is_default`]: equality with the default at display precision

use std::ops::RangeInclusive;

use crate::error::{Result, SyncError};

/// Largest supported number of display decimals
pub const MAX_DECIMALS: u32 = 6;

/// Restrict `value` to `[min, max]`.
///
/// NaN collapses to `min` so the result is always inside the bounds.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// Project a domain value onto the slider's unit interval.
///
/// Callers guarantee `min < max` (see [`ValueRange::new`]).
pub fn to_slider_position(value: f64, min: f64, max: f64) -> f64 {
    clamp((value - min) / (max - min), 0.0, 1.0)
}

/// Inverse of [`to_slider_position`]
pub fn from_slider_position(position: f64, min: f64, max: f64) -> f64 {
    clamp(position, 0.0, 1.0) * (max - min) + min
}

/// Round to `decimals` fractional digits
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Render with exactly `decimals` fractional digits and `.` as separator.
///
/// A value that rounds to zero is printed without a sign.
pub fn format(value: f64, decimals: u32) -> String {
    let mut rounded = round_to(value, decimals);
    if rounded == 0.0 {
        rounded = 0.0;
    }
    format!("{:.*}", decimals as usize, rounded)
}

/// Parse user text. `None` for empty, non-numeric or non-finite input.
pub fn parse(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// True when `value` is indistinguishable from `default` at `decimals`
pub fn is_default(value: f64, default: f64, decimals: u32) -> bool {
    (value - default).abs() < 10f64.powi(-(decimals as i32)) / 2.0
}

/// Validated bounds, default and display precision of the adjustable value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    min: f64,
    max: f64,
    default: f64,
    decimals: u32,
}

impl ValueRange {
    /// Build a range, rejecting anything that could not be mapped to a slider
    pub fn new(min: f64, max: f64, default: f64, decimals: u32) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || !default.is_finite() {
            return Err(SyncError::Configuration(format!(
                "bounds must be finite (min={}, max={}, default={})",
                min, max, default
            )));
        }
        if min >= max {
            return Err(SyncError::Configuration(format!(
                "min ({}) must be strictly less than max ({})",
                min, max
            )));
        }
        if default < min || default > max {
            return Err(SyncError::Configuration(format!(
                "default {} is outside [{}, {}]",
                default, min, max
            )));
        }
        if decimals > MAX_DECIMALS {
            return Err(SyncError::Configuration(format!(
                "decimals {} exceeds maximum of {}",
                decimals, MAX_DECIMALS
            )));
        }

        Ok(Self {
            min,
            max,
            default,
            decimals,
        })
    }

    /// Desktop text scaling factor (`org.gnome.desktop.interface text-scaling-factor`)
    pub fn text_scaling() -> Self {
        Self {
            min: 0.5,
            max: 3.0,
            default: 1.0,
            decimals: 2,
        }
    }

    /// Monitor brightness percentage
    pub fn brightness() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            default: 0.0,
            decimals: 0,
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn clamp(&self, value: f64) -> f64 {
        clamp(value, self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn to_position(&self, value: f64) -> f64 {
        to_slider_position(value, self.min, self.max)
    }

    pub fn from_position(&self, position: f64) -> f64 {
        from_slider_position(position, self.min, self.max)
    }

    /// Round to display precision, then clamp
    pub fn snap(&self, value: f64) -> f64 {
        self.clamp(round_to(value, self.decimals))
    }

    pub fn format(&self, value: f64) -> String {
        format(value, self.decimals)
    }

    pub fn is_default(&self, value: f64) -> bool {
        is_default(value, self.default, self.decimals)
    }

    /// Convert to the integer scale a device understands (e.g. `0..=100`).
    ///
    /// Rounds to the nearest integer instead of truncating.
    pub fn device_level(&self, value: f64, levels: &RangeInclusive<i64>) -> i64 {
        let lo = *levels.start() as f64;
        let hi = *levels.end() as f64;
        from_slider_position(self.to_position(value), lo, hi).round() as i64
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::text_scaling()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_degenerate_range_rejected() {
        let err = ValueRange::new(1.0, 1.0, 1.0, 2).unwrap_err();
        assert!(err.is_fatal());

        assert!(ValueRange::new(3.0, 0.5, 1.0, 2).is_err());
        assert!(ValueRange::new(0.0, f64::INFINITY, 1.0, 2).is_err());
        assert!(ValueRange::new(0.0, 100.0, 101.0, 0).is_err());
        assert!(ValueRange::new(0.0, 100.0, 50.0, 7).is_err());
    }

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(clamp(-5.0, 0.0, 100.0), 0.0);
        assert_eq!(clamp(150.0, 0.0, 100.0), 100.0);
        assert_eq!(clamp(42.0, 0.0, 100.0), 42.0);
        assert_eq!(clamp(f64::NAN, 0.0, 100.0), 0.0);
    }

    #[test]
    fn test_slider_projection() {
        let range = ValueRange::text_scaling();
        assert_eq!(range.to_position(0.5), 0.0);
        assert_eq!(range.to_position(3.0), 1.0);
        assert!((range.to_position(1.75) - 0.5).abs() < 1e-12);
        assert_eq!(range.to_position(10.0), 1.0);
        assert_eq!(range.from_position(-0.2), 0.5);
    }

    #[test]
    fn test_format_fixed_decimals() {
        assert_eq!(format(1.0, 2), "1.00");
        assert_eq!(format(1.255, 1), "1.3");
        assert_eq!(format(74.6, 0), "75");
        assert_eq!(format(-2.5, 1), "-2.5");
        assert_eq!(format(-0.004, 2), "0.00");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse("42"), Some(42.0));
        assert_eq!(parse("  1.25 "), Some(1.25));
        assert_eq!(parse("-3"), Some(-3.0));
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse("abc"), None);
        assert_eq!(parse("1,5"), None);
        assert_eq!(parse("inf"), None);
        assert_eq!(parse("NaN"), None);
    }

    #[test]
    fn test_is_default_at_display_precision() {
        assert!(is_default(74.6, 75.0, 0));
        assert!(!is_default(74.4, 75.0, 0));
        assert!(is_default(1.004, 1.0, 2));
        assert!(!is_default(1.006, 1.0, 2));
    }

    #[test]
    fn test_device_level_rounds() {
        let range = ValueRange::brightness();
        assert_eq!(range.device_level(40.4, &(0..=100)), 40);
        assert_eq!(range.device_level(40.6, &(0..=100)), 41);

        let scaling = ValueRange::text_scaling();
        assert_eq!(scaling.device_level(0.5, &(0..=100)), 0);
        assert_eq!(scaling.device_level(3.0, &(0..=100)), 100);
        assert_eq!(scaling.device_level(1.75, &(0..=100)), 50);
    }

    proptest! {
        #[test]
        fn prop_slider_round_trip(min in -1000.0f64..1000.0, width in 0.001f64..1000.0, t in 0.0f64..=1.0) {
            let max = min + width;
            let v = min + t * width;
            let back = from_slider_position(to_slider_position(v, min, max), min, max);
            prop_assert!((back - v).abs() < 1e-9);
        }

        #[test]
        fn prop_clamp_idempotent(v in proptest::num::f64::ANY, min in -1000.0f64..0.0, max in 0.0f64..1000.0) {
            let once = clamp(v, min, max);
            prop_assert_eq!(clamp(once, min, max), once);
            prop_assert!(once >= min && once <= max);
        }

        #[test]
        fn prop_format_parse_round_trip(v in 0.0f64..100.0, d in 0u32..=2) {
            let parsed = parse(&format(v, d)).unwrap();
            prop_assert!((parsed - round_to(v, d)).abs() < 1e-9);
        }
    }
}
