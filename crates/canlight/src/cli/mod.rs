//! CLI subcommands — display control, register programming, device info.

mod config_cmd;
mod display;
mod info;
mod program;
mod watch;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use canlight_lib::config::Config;
pub(super) use canlight_lib::device::{Device, DeviceMetadata};
pub(super) use canlight_lib::error::{CanLightError, Result};
use canlight_lib::transport::{Connector, PlatformConnector, platform_connector};
use canlight_lib::{DeviceRegistry, driver};

/// Device handle over the current platform's transport.
pub(super) type PlatformDevice = Device<<PlatformConnector as Connector>::Session>;

/// Global flags that apply to every subcommand.
#[derive(Debug, Default)]
pub struct Options {
    pub config_path: Option<PathBuf>,
    pub interface: Option<String>,
    pub id: Option<i32>,
    pub json: bool,
}

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

/// Battery reading for humans; 0.0 is the no-link sentinel.
pub(super) fn format_voltage(volts: f64) -> String {
    if canlight_lib::device::is_no_link_voltage(volts) {
        "0.00 V (no link)".to_string()
    } else {
        format!("{volts:.2} V")
    }
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| CanLightError::Config(format!("JSON serialization failed: {e}")))?;
    println!("{json_str}");
    Ok(())
}

// ── Config resolution ──

/// Load the config file (custom path or platform default), logging parse warnings.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    match custom_path {
        Some(path) => {
            let (config, warnings) = Config::load_from(path);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    }
}

/// Config file plus command-line overrides, not yet validated.
pub(super) fn effective_config(opts: &Options) -> Config {
    let mut config = load_config(opts.config_path.as_deref());
    if let Some(ref interface) = opts.interface {
        config.interface = interface.clone();
    }
    if let Some(id) = opts.id {
        config.device_id = id;
    }
    config
}

fn validated_config(opts: &Options) -> Result<Config> {
    let config = effective_config(opts);
    config.validate().map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        CanLightError::Config(msgs.join("; "))
    })?;
    Ok(config)
}

/// Acquire the configured device, run `f`, and release the handle afterwards
/// whether or not `f` succeeded.
///
/// Exits the process if the transport driver cannot be loaded.
pub(super) fn with_device<R>(
    opts: &Options,
    f: impl FnOnce(&mut PlatformDevice, &Config) -> Result<R>,
) -> Result<R> {
    let config = validated_config(opts)?;
    let connector = platform_connector(&config.interface, config.timeout());
    driver::load_or_exit(&connector);

    let mut device = DeviceRegistry::global().acquire(&connector, config.device_id)?;
    log::debug!("{} on {}", device.id(), config.interface);
    let result = f(&mut device, &config);
    let released = device.release();
    let value = result?;
    released?;
    Ok(value)
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct InfoOutput {
    pub library_version: String,
    pub interface: String,
    pub link: bool,
    pub device: DeviceMetadata,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show a color (hex like #FF8000 or a name like teal)
    Show { color: String },

    /// Show a literal RGB color (channels saturate to 0-255)
    Rgb { red: i32, green: i32, blue: i32 },

    /// Program a register: index 0-7, time in seconds (max 2.55), color
    Write {
        index: i32,
        time: f64,
        color: String,
    },

    /// Restore all registers to factory defaults
    Reset,

    /// Show a register's color
    Register { index: i32 },

    /// Flash a register's color on and off
    Flash { index: i32 },

    /// Step through a range of registers
    Cycle { from: i32, to: i32 },

    /// Fade smoothly through a range of registers
    Fade { from: i32, to: i32 },

    /// Blink the diagnostic LED (seconds, capped at 255)
    Blink { seconds: i32 },

    /// Read device metadata (name, versions, serial, battery)
    Info,

    /// Poll battery voltage until Ctrl+C
    Watch {
        /// Seconds between readings
        #[arg(long, default_value_t = 1.0)]
        interval: f64,
    },

    /// Write the register programme from the config file
    Setup,

    /// Show current configuration and file path
    Config {
        /// Write the effective settings to the config file as a starting point
        #[arg(long)]
        init: bool,

        /// With --init, replace an existing config file
        #[arg(long, requires = "init")]
        force: bool,
    },
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

fn command_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::Show { .. } => "show",
        Command::Rgb { .. } => "rgb",
        Command::Write { .. } => "write",
        Command::Reset => "reset",
        Command::Register { .. } => "register",
        Command::Flash { .. } => "flash",
        Command::Cycle { .. } => "cycle",
        Command::Fade { .. } => "fade",
        Command::Blink { .. } => "blink",
        Command::Info => "info",
        Command::Watch { .. } => "watch",
        Command::Setup => "setup",
        Command::Config { .. } => "config",
    }
}

pub fn run(cmd: Command, opts: &Options) -> Result<()> {
    if opts.json && !matches!(cmd, Command::Info | Command::Config { init: false, .. }) {
        warn_json_unsupported(command_name(&cmd));
    }
    match cmd {
        Command::Show { color } => display::cmd_show(opts, &color),
        Command::Rgb { red, green, blue } => display::cmd_rgb(opts, red, green, blue),
        Command::Write { index, time, color } => program::cmd_write(opts, index, time, &color),
        Command::Reset => program::cmd_reset(opts),
        Command::Register { index } => display::cmd_register(opts, index),
        Command::Flash { index } => display::cmd_flash(opts, index),
        Command::Cycle { from, to } => display::cmd_cycle(opts, from, to),
        Command::Fade { from, to } => display::cmd_fade(opts, from, to),
        Command::Blink { seconds } => display::cmd_blink(opts, seconds),
        Command::Info => info::cmd_info(opts),
        Command::Watch { interval } => watch::cmd_watch(opts, interval),
        Command::Setup => program::cmd_setup(opts),
        Command::Config { init: true, force } => config_cmd::cmd_config_init(opts, force),
        Command::Config { init: false, .. } => config_cmd::cmd_config(opts),
    }
}


#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "interface = \"can1\"\ndevice_id = 9\n").unwrap();

        let opts = Options {
            config_path: Some(path.clone()),
            interface: Some("vcan0".into()),
            ..Options::default()
        };
        let config = effective_config(&opts);
        assert_eq!(config.interface, "vcan0");
        assert_eq!(config.device_id, 9);

        let opts = Options {
            config_path: Some(path),
            id: Some(22),
            ..Options::default()
        };
        let config = effective_config(&opts);
        assert_eq!(config.interface, "can1");
        assert_eq!(config.device_id, 22);
    }

    #[test]
    fn invalid_override_rejected_before_bus() {
        let dir = tempfile::tempdir().unwrap();
        let opts = Options {
            config_path: Some(dir.path().join("missing.toml")),
            id: Some(61),
            ..Options::default()
        };
        let err = validated_config(&opts).unwrap_err();
        assert!(err.to_string().contains("device_id 61"), "got {err}");
    }
}
