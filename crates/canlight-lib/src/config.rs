//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::CanLightError;
use crate::command::Command;
use crate::protocol::{DEFAULT_TIMEOUT_MS, FACTORY_DEVICE_ID};

/// Header comment at the top of files written by `config --init`.
const CONFIG_HEADER: &str = "# CANLight configuration\n\
# device_id: 1-60, factory controllers answer on 3.\n\
# [[registers]] entries are written by `canlight setup`: index 0-7, time in seconds (max 2.55).\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SocketCAN interface name. Default: "can0".
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Device identifier (1–60). Default: 3, the factory identifier.
    #[serde(default = "default_device_id")]
    pub device_id: i32,

    /// Response timeout for getter requests, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Register programme written by `canlight setup`.
    /// Example in TOML: `[[registers]]` / `index = 1` / `time = 0.5` / `color = "#FF0000"`
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,
}

/// One register entry in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterConfig {
    pub index: i32,
    /// Phase duration in seconds (quantized to 10 ms, max 2.55 s).
    pub time: f64,
    /// Hex (`#RRGGBB`) or a color name.
    pub color: String,
}

fn default_interface() -> String {
    "can0".into()
}
fn default_device_id() -> i32 {
    i32::from(FACTORY_DEVICE_ID)
}
fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interface: default_interface(),
            device_id: default_device_id(),
            timeout_ms: default_timeout_ms(),
            registers: Vec::new(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `interface` is empty or whitespace-only.
    EmptyInterface,
    /// `device_id` is outside 1–60.
    InvalidDeviceId(i32),
    /// `timeout_ms` is zero.
    ZeroTimeout,
    /// A `[[registers]]` entry is invalid (`entry` is its 0-based position in the file).
    InvalidRegister { entry: usize, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyInterface => write!(f, "Interface cannot be empty"),
            ValidationError::InvalidDeviceId(id) => {
                write!(f, "Invalid device_id {id} (must be between 1 and 60)")
            }
            ValidationError::ZeroTimeout => write!(f, "timeout_ms must be greater than zero"),
            ValidationError::InvalidRegister { entry, reason } => {
                write!(f, "Invalid registers[{entry}]: {reason}")
            }
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("canlight"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Write this config as a starter file for `canlight config --init`.
    ///
    /// An existing file is left alone unless `overwrite` is set. The text is
    /// staged in `config.toml.tmp` beside the target and renamed into place.
    pub fn write_starter(&self, path: &Path, overwrite: bool) -> crate::error::Result<()> {
        if path.exists() && !overwrite {
            return Err(CanLightError::Config(format!(
                "{} already exists (use --force to replace it)",
                path.display()
            )));
        }
        let io_err = |e: std::io::Error| CanLightError::Config(format!("{}: {e}", path.display()));
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let body = toml::to_string_pretty(self)
            .map_err(|e| CanLightError::Config(format!("TOML serialization failed: {e}")))?;
        let staged = path.with_extension("toml.tmp");
        std::fs::write(&staged, format!("{CONFIG_HEADER}{body}")).map_err(io_err)?;
        if let Err(e) = std::fs::rename(&staged, path) {
            let _ = std::fs::remove_file(&staged);
            return Err(io_err(e));
        }
        log::info!("wrote {}", path.display());
        Ok(())
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Turn the register programme into write commands, in file order.
    pub fn register_commands(&self) -> crate::error::Result<Vec<Command>> {
        self.registers
            .iter()
            .map(|r| {
                let c = crate::color::parse_color(&r.color)?;
                Command::write_register(
                    r.index,
                    r.time,
                    i32::from(c.red),
                    i32::from(c.green),
                    i32::from(c.blue),
                )
            })
            .collect()
    }

    /// Validate the entire config, collecting all errors.
    ///
    /// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all problems found.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.interface.trim().is_empty() {
            errors.push(ValidationError::EmptyInterface);
        }

        if crate::registry::DeviceId::new(self.device_id).is_err() {
            errors.push(ValidationError::InvalidDeviceId(self.device_id));
        }

        if self.timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout);
        }

        for (entry, r) in self.registers.iter().enumerate() {
            if let Err(e) = crate::register::RegisterIndex::new(r.index) {
                errors.push(ValidationError::InvalidRegister {
                    entry,
                    reason: e.to_string(),
                });
            }
            if let Err(e) = crate::register::duration_to_ticks(r.time) {
                errors.push(ValidationError::InvalidRegister {
                    entry,
                    reason: e.to_string(),
                });
            }
            if let Err(e) = crate::color::parse_color(&r.color) {
                errors.push(ValidationError::InvalidRegister {
                    entry,
                    reason: e.to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
