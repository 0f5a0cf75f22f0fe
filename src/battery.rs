//! Battery status for the header row.
//!
//! The device reports its battery voltage in the `Battery-Voltage` header on
//! each poll. The last good reading is kept in a [`BatteryMonitor`] and mapped
//! through a [`BatteryScale`] into a [`BatteryLevel`] for display.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{BATTERY_MAX_MV, BATTERY_MIN_MV};

/// Linear mapping from a voltage range onto a percentage range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryScale {
    /// Voltage shown as `min_percent` (below this reads "LOW")
    pub min_volt: f32,
    /// Voltage shown as `max_percent` (above this reads "FULL")
    pub max_volt: f32,
    /// Percentage at `min_volt`
    pub min_percent: f32,
    /// Percentage at `max_volt`
    pub max_percent: f32,
}

impl Default for BatteryScale {
    fn default() -> Self {
        Self {
            min_volt: BATTERY_MIN_MV as f32 / 1000.0,
            max_volt: BATTERY_MAX_MV as f32 / 1000.0,
            min_percent: 0.0,
            max_percent: 100.0,
        }
    }
}

impl BatteryScale {
    /// Map a voltage reading onto a display level.
    ///
    /// # Example
    ///
    /// ```
    /// use framed::{BatteryLevel, BatteryScale};
    ///
    /// let scale = BatteryScale::default();
    /// assert_eq!(scale.level(2.9), BatteryLevel::Low);
    /// assert_eq!(scale.level(3.6), BatteryLevel::Percent(50));
    /// assert_eq!(scale.level(4.3), BatteryLevel::Full);
    /// ```
    pub fn level(&self, voltage: f32) -> BatteryLevel {
        if voltage < self.min_volt {
            return BatteryLevel::Low;
        }
        if voltage > self.max_volt {
            return BatteryLevel::Full;
        }
        let span = self.max_volt - self.min_volt;
        if span <= 0.0 {
            return BatteryLevel::Percent(self.max_percent.round().clamp(0.0, 255.0) as u8);
        }
        let fraction = (voltage - self.min_volt) / span;
        let percent = self.min_percent + fraction * (self.max_percent - self.min_percent);
        BatteryLevel::Percent(percent.round().clamp(0.0, 255.0) as u8)
    }
}

/// Battery status as shown in the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryLevel {
    /// Below the bottom of the scale
    Low,
    /// Above the top of the scale
    Full,
    /// Somewhere on the scale
    Percent(u8),
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryLevel::Low => write!(f, "LOW"),
            BatteryLevel::Full => write!(f, "FULL"),
            BatteryLevel::Percent(p) => write!(f, "{}%", p),
        }
    }
}

/// Last known good battery voltage, shared between request handlers.
///
/// Last write wins. The reading is stored as raw `f32` bits so readers never
/// take a lock.
#[derive(Debug)]
pub struct BatteryMonitor {
    bits: AtomicU32,
}

const UNKNOWN: u32 = u32::MAX;

impl Default for BatteryMonitor {
    fn default() -> Self {
        Self {
            bits: AtomicU32::new(UNKNOWN),
        }
    }
}

impl BatteryMonitor {
    /// Create a monitor with no reading yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new reading. Non-finite values are ignored.
    pub fn record(&self, voltage: f32) {
        if !voltage.is_finite() {
            tracing::warn!(voltage, "Ignoring non-finite battery voltage");
            return;
        }
        self.bits.store(voltage.to_bits(), Ordering::Relaxed);
    }

    /// The last good reading, if any.
    pub fn voltage(&self) -> Option<f32> {
        match self.bits.load(Ordering::Relaxed) {
            UNKNOWN => None,
            bits => Some(f32::from_bits(bits)),
        }
    }

    /// The last good reading mapped through `scale`.
    pub fn level(&self, scale: &BatteryScale) -> Option<BatteryLevel> {
        self.voltage().map(|v| scale.level(v))
    }
}
