//! RGB colors: channel saturation, parsing, and `#RRGGBB` formatting.

use std::fmt;

use serde::Serialize;

/// One light-strip color. Every channel is always within 0–255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Clamp a user-supplied channel value into 0–255.
pub fn saturate_channel(value: i32) -> u8 {
    value.clamp(0, i32::from(u8::MAX)) as u8
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const ORANGE: Rgb = Rgb::new(255, 128, 0);
    pub const TEAL: Rgb = Rgb::new(0, 128, 128);
    pub const PURPLE: Rgb = Rgb::new(128, 0, 255);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Rgb { red, green, blue }
    }

    /// Build a color from arbitrary integers, saturating each channel independently.
    pub fn saturating(red: i32, green: i32, blue: i32) -> Self {
        Rgb {
            red: saturate_channel(red),
            green: saturate_channel(green),
            blue: saturate_channel(blue),
        }
    }

    /// Wire order: red, green, blue.
    pub fn to_bytes(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

impl std::str::FromStr for Rgb {
    type Err = crate::CanLightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_color(s)
    }
}

/// Parse a color string.
///
/// Accepts:
/// - Hex: `"#FF8000"`, `"FF8000"`, `"#ff8000"`
/// - Named: the factory register colors (`"off"`, `"red"`, `"green"`, `"blue"`,
///   `"orange"`, `"teal"`, `"purple"`, `"white"`) plus `"black"`, `"yellow"`, `"cyan"`
pub fn parse_color(s: &str) -> crate::error::Result<Rgb> {
    let s = s.trim();

    match s.to_lowercase().as_str() {
        "off" | "black" => return Ok(Rgb::OFF),
        "red" => return Ok(Rgb::RED),
        "green" => return Ok(Rgb::GREEN),
        "blue" => return Ok(Rgb::BLUE),
        "orange" => return Ok(Rgb::ORANGE),
        "teal" => return Ok(Rgb::TEAL),
        "purple" => return Ok(Rgb::PURPLE),
        "white" => return Ok(Rgb::WHITE),
        "yellow" => return Ok(Rgb::new(255, 255, 0)),
        "cyan" => return Ok(Rgb::new(0, 255, 255)),
        _ => {}
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(crate::CanLightError::Color(format!(
            "Invalid color: {s} (use #RRGGBB or a color name)"
        )));
    }
    let val = u32::from_str_radix(hex, 16)
        .map_err(|_| crate::CanLightError::Color(format!("Invalid hex color: {s}")))?;
    Ok(Rgb::new(
        ((val >> 16) & 0xFF) as u8,
        ((val >> 8) & 0xFF) as u8,
        (val & 0xFF) as u8,
    ))
}
