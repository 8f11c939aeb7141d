//! Pattern registers: the controller's eight (duration, color) slots and the
//! host-side mirror of them.
//!
//! Durations are held as 10 ms ticks, exactly as they travel on the wire, so
//! the mirror never stores a value the device could not represent.

use serde::Serialize;

use crate::color::Rgb;
use crate::error::{CanLightError, Result};
use crate::protocol::{MAX_DURATION_TICKS, REGISTER_COUNT, TICKS_PER_SECOND};

/// Validated register index, 0–7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RegisterIndex(u8);

impl RegisterIndex {
    /// Validate a user-supplied index. Out-of-range values are rejected, never clamped.
    pub fn new(index: i32) -> Result<Self> {
        match u8::try_from(index) {
            Ok(i) if usize::from(i) < REGISTER_COUNT => Ok(RegisterIndex(i)),
            _ => Err(CanLightError::IndexOutOfRange(index)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn slot(self) -> usize {
        usize::from(self.0)
    }
}

impl std::fmt::Display for RegisterIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantize a duration in seconds to 10 ms ticks.
///
/// Rounds to the nearest tick and saturates at 255 (2.55 s). Negative and NaN
/// inputs are rejected with [`CanLightError::InvalidDuration`].
pub fn duration_to_ticks(seconds: f64) -> Result<u8> {
    if seconds.is_nan() || seconds < 0.0 {
        return Err(CanLightError::InvalidDuration(seconds));
    }
    let ticks = (seconds * TICKS_PER_SECOND).round();
    Ok(ticks.min(f64::from(MAX_DURATION_TICKS)) as u8)
}

/// One register: how long its phase lasts and which color it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Register {
    pub duration_ticks: u8,
    pub color: Rgb,
}

impl Register {
    pub const fn new(duration_ticks: u8, color: Rgb) -> Self {
        Register {
            duration_ticks,
            color,
        }
    }

    /// Phase duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        f64::from(self.duration_ticks) / TICKS_PER_SECOND
    }
}

/// Factory duration for every register: one second.
pub const FACTORY_DURATION_TICKS: u8 = 100;

/// Factory register colors, index 0–7.
pub const FACTORY_COLORS: [Rgb; REGISTER_COUNT] = [
    Rgb::OFF,
    Rgb::RED,
    Rgb::GREEN,
    Rgb::BLUE,
    Rgb::ORANGE,
    Rgb::TEAL,
    Rgb::PURPLE,
    Rgb::WHITE,
];

/// The register table a controller powers up with.
pub fn factory_defaults() -> [Register; REGISTER_COUNT] {
    FACTORY_COLORS.map(|color| Register::new(FACTORY_DURATION_TICKS, color))
}

/// Host-side mirror of a controller's registers.
///
/// Starts at factory defaults. It only tracks what this host wrote; a power
/// cycle on the device restores its defaults without the mirror noticing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterStore {
    registers: [Register; REGISTER_COUNT],
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterStore {
    pub fn new() -> Self {
        RegisterStore {
            registers: factory_defaults(),
        }
    }

    pub fn get(&self, index: RegisterIndex) -> Register {
        self.registers[index.slot()]
    }

    pub fn all(&self) -> &[Register; REGISTER_COUNT] {
        &self.registers
    }

    pub fn write(&mut self, index: RegisterIndex, register: Register) {
        self.registers[index.slot()] = register;
    }

    /// Restore every register to its factory value.
    pub fn reset(&mut self) {
        self.registers = factory_defaults();
    }
}
