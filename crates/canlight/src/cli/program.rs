//! Register programming — write, reset, setup.

use super::{CanLightError, Options, Result, kv_indent, kv_width, with_device};
use canlight_lib::color::parse_color;

pub(super) fn cmd_write(opts: &Options, index: i32, time: f64, color: &str) -> Result<()> {
    let rgb = parse_color(color)?;
    with_device(opts, |dev, _| {
        dev.write_register(
            index,
            time,
            i32::from(rgb.red),
            i32::from(rgb.green),
            i32::from(rgb.blue),
        )?;
        let reg = dev.register(index)?;
        println!(
            "CANLight {}: register {index} = {} for {:.2}s",
            dev.id(),
            reg.color,
            reg.duration_secs()
        );
        Ok(())
    })
}

pub(super) fn cmd_reset(opts: &Options) -> Result<()> {
    with_device(opts, |dev, _| {
        dev.reset()?;
        println!("CANLight {}: registers reset to factory defaults", dev.id());
        Ok(())
    })
}

/// Write every `[[registers]]` entry from the config, in file order.
///
/// Registers revert to factory values on power loss, so this is meant to be
/// re-run after the controller restarts.
pub(super) fn cmd_setup(opts: &Options) -> Result<()> {
    with_device(opts, |dev, config| {
        let commands = config.register_commands()?;
        if commands.is_empty() {
            return Err(CanLightError::Config(
                "no [[registers]] entries in config".into(),
            ));
        }

        println!("CANLight {}: writing {} register(s)", dev.id(), commands.len());
        for command in commands {
            dev.execute(command)?;
        }

        let w = kv_width(&[], &["Register 0:"]);
        for (i, reg) in dev.registers()?.iter().enumerate() {
            kv_indent(
                &format!("Register {i}:"),
                format_args!("{} for {:.2}s", reg.color, reg.duration_secs()),
                w,
            );
        }
        Ok(())
    })
}

