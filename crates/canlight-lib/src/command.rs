//! Command encoding — validate and normalize caller input into wire payloads.
//!
//! Two policies apply, and they are deliberately different:
//! - colors and durations are *saturated* into range (no error);
//! - indices, negative durations and non-positive blink seconds are *rejected*
//!   before anything reaches the transport.

use serde::Serialize;

use crate::color::Rgb;
use crate::device::DisplayState;
use crate::error::{CanLightError, Result};
use crate::protocol::{MAX_BLINK_SECONDS, Opcode};
use crate::register::{Register, RegisterIndex, duration_to_ticks};

/// An ordered, inclusive span of registers used by cycle and fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RegisterRange {
    from: RegisterIndex,
    to: RegisterIndex,
}

impl RegisterRange {
    /// Validate both ends; if `a > b` they are swapped.
    pub fn new(a: i32, b: i32) -> Result<Self> {
        let a = RegisterIndex::new(a)?;
        let b = RegisterIndex::new(b)?;
        Ok(Self::ordered(a, b))
    }

    pub fn ordered(a: RegisterIndex, b: RegisterIndex) -> Self {
        RegisterRange {
            from: a.min(b),
            to: a.max(b),
        }
    }

    pub fn from(&self) -> RegisterIndex {
        self.from
    }

    pub fn to(&self) -> RegisterIndex {
        self.to
    }
}

impl std::fmt::Display for RegisterRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Diagnostic blink length in whole seconds, 1–255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlinkSeconds(u8);

impl BlinkSeconds {
    /// Seconds must be positive; anything above 255 is capped to 255.
    pub fn new(seconds: i32) -> Result<Self> {
        if seconds <= 0 {
            return Err(CanLightError::InvalidArgument(format!(
                "blink seconds must be a positive integer (got {seconds})"
            )));
        }
        Ok(BlinkSeconds(seconds.min(i32::from(MAX_BLINK_SECONDS)) as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// One normalized request for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShowRgb(Rgb),
    WriteRegister {
        index: RegisterIndex,
        register: Register,
    },
    Reset,
    ShowRegister(RegisterIndex),
    Flash(RegisterIndex),
    Cycle(RegisterRange),
    Fade(RegisterRange),
    BlinkLed {
        seconds: BlinkSeconds,
    },
}

impl Command {
    pub fn show_rgb(red: i32, green: i32, blue: i32) -> Self {
        Command::ShowRgb(Rgb::saturating(red, green, blue))
    }

    /// Index is validated, duration quantized to ticks, channels saturated.
    pub fn write_register(index: i32, seconds: f64, red: i32, green: i32, blue: i32) -> Result<Self> {
        let index = RegisterIndex::new(index)?;
        let duration_ticks = duration_to_ticks(seconds)?;
        Ok(Command::WriteRegister {
            index,
            register: Register::new(duration_ticks, Rgb::saturating(red, green, blue)),
        })
    }

    pub fn show_register(index: i32) -> Result<Self> {
        RegisterIndex::new(index).map(Command::ShowRegister)
    }

    pub fn flash(index: i32) -> Result<Self> {
        RegisterIndex::new(index).map(Command::Flash)
    }

    pub fn cycle(a: i32, b: i32) -> Result<Self> {
        RegisterRange::new(a, b).map(Command::Cycle)
    }

    pub fn fade(a: i32, b: i32) -> Result<Self> {
        RegisterRange::new(a, b).map(Command::Fade)
    }

    pub fn blink_led(seconds: i32) -> Result<Self> {
        BlinkSeconds::new(seconds).map(|seconds| Command::BlinkLed { seconds })
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Command::ShowRgb(_) => Opcode::ShowRgb,
            Command::WriteRegister { .. } => Opcode::WriteRegister,
            Command::Reset => Opcode::Reset,
            Command::ShowRegister(_) => Opcode::ShowRegister,
            Command::Flash(_) => Opcode::Flash,
            Command::Cycle(_) => Opcode::Cycle,
            Command::Fade(_) => Opcode::Fade,
            Command::BlinkLed { .. } => Opcode::BlinkLed,
        }
    }

    /// Wire payload, one unsigned byte per field.
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Command::ShowRgb(color) => color.to_bytes().to_vec(),
            Command::WriteRegister { index, register } => {
                let [r, g, b] = register.color.to_bytes();
                vec![index.get(), register.duration_ticks, r, g, b]
            }
            Command::Reset => Vec::new(),
            Command::ShowRegister(index) | Command::Flash(index) => vec![index.get()],
            Command::Cycle(range) | Command::Fade(range) => {
                vec![range.from().get(), range.to().get()]
            }
            Command::BlinkLed { seconds } => vec![seconds.get()],
        }
    }

    /// Decode a request as received on the bus.
    ///
    /// Returns `None` for getter opcodes and for payloads that a well-formed
    /// sender would never produce (wrong length, index out of range, zero blink).
    pub fn decode(opcode: Opcode, payload: &[u8]) -> Option<Command> {
        let index = |b: u8| RegisterIndex::new(i32::from(b)).ok();
        match (opcode, payload) {
            (Opcode::ShowRgb, &[r, g, b]) => Some(Command::ShowRgb(Rgb::new(r, g, b))),
            (Opcode::WriteRegister, &[i, ticks, r, g, b]) => Some(Command::WriteRegister {
                index: index(i)?,
                register: Register::new(ticks, Rgb::new(r, g, b)),
            }),
            (Opcode::Reset, &[]) => Some(Command::Reset),
            (Opcode::ShowRegister, &[i]) => Some(Command::ShowRegister(index(i)?)),
            (Opcode::Flash, &[i]) => Some(Command::Flash(index(i)?)),
            (Opcode::Cycle, &[a, b]) => Some(Command::Cycle(RegisterRange::ordered(
                index(a)?,
                index(b)?,
            ))),
            (Opcode::Fade, &[a, b]) => Some(Command::Fade(RegisterRange::ordered(
                index(a)?,
                index(b)?,
            ))),
            (Opcode::BlinkLed, &[seconds]) => Some(Command::BlinkLed {
                seconds: BlinkSeconds::new(i32::from(seconds)).ok()?,
            }),
            _ => None,
        }
    }

    /// The persistent display state this command leaves the strip in.
    ///
    /// `None` for commands that don't change what the strip shows: register
    /// programming and the diagnostic blink overlay.
    pub fn display_effect(&self) -> Option<DisplayState> {
        match *self {
            Command::ShowRgb(color) => Some(DisplayState::Color(color)),
            Command::ShowRegister(index) => Some(DisplayState::Register(index)),
            Command::Flash(index) => Some(DisplayState::Flashing(index)),
            Command::Cycle(range) => Some(DisplayState::Cycling(range)),
            Command::Fade(range) => Some(DisplayState::Fading(range)),
            Command::WriteRegister { .. } | Command::Reset | Command::BlinkLed { .. } => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::ShowRgb(color) => write!(f, "show {color}"),
            Command::WriteRegister { index, register } => write!(
                f,
                "write register {index} = {} for {:.2}s",
                register.color,
                register.duration_secs()
            ),
            Command::Reset => write!(f, "reset registers"),
            Command::ShowRegister(index) => write!(f, "show register {index}"),
            Command::Flash(index) => write!(f, "flash register {index}"),
            Command::Cycle(range) => write!(f, "cycle registers {range}"),
            Command::Fade(range) => write!(f, "fade registers {range}"),
            Command::BlinkLed { seconds } => write!(f, "blink diagnostic LED for {}s", seconds.get()),
        }
    }
}
