//! Display subcommands — show, rgb, register, flash, cycle, fade, blink.

use super::{Options, PlatformDevice, Result, with_device};
use canlight_lib::color::parse_color;
use canlight_lib::protocol::MAX_BLINK_SECONDS;

/// Print what the strip is now doing.
fn report(dev: &PlatformDevice) {
    match dev.display_state() {
        Some(state) => println!("CANLight {}: {state}", dev.id()),
        None => println!("CANLight {}: ok", dev.id()),
    }
}

pub(super) fn cmd_show(opts: &Options, color: &str) -> Result<()> {
    let rgb = parse_color(color)?;
    cmd_rgb(
        opts,
        i32::from(rgb.red),
        i32::from(rgb.green),
        i32::from(rgb.blue),
    )
}

pub(super) fn cmd_rgb(opts: &Options, red: i32, green: i32, blue: i32) -> Result<()> {
    with_device(opts, |dev, _| {
        dev.show_rgb(red, green, blue)?;
        report(dev);
        Ok(())
    })
}

pub(super) fn cmd_register(opts: &Options, index: i32) -> Result<()> {
    with_device(opts, |dev, _| {
        dev.show_register(index)?;
        report(dev);
        Ok(())
    })
}

pub(super) fn cmd_flash(opts: &Options, index: i32) -> Result<()> {
    with_device(opts, |dev, _| {
        dev.flash(index)?;
        report(dev);
        Ok(())
    })
}

pub(super) fn cmd_cycle(opts: &Options, from: i32, to: i32) -> Result<()> {
    with_device(opts, |dev, _| {
        dev.cycle(from, to)?;
        report(dev);
        Ok(())
    })
}

pub(super) fn cmd_fade(opts: &Options, from: i32, to: i32) -> Result<()> {
    with_device(opts, |dev, _| {
        dev.fade(from, to)?;
        report(dev);
        Ok(())
    })
}

/// The diagnostic LED blinks independently of the strip; the display is untouched.
pub(super) fn cmd_blink(opts: &Options, seconds: i32) -> Result<()> {
    with_device(opts, |dev, _| {
        dev.blink_led(seconds)?;
        let secs = seconds.min(i32::from(MAX_BLINK_SECONDS));
        println!("CANLight {}: diagnostic LED blinking for {secs}s", dev.id());
        Ok(())
    })
}
