//! `info` subcommand — read device metadata.

use super::{
    InfoOutput, Options, Result, format_voltage, kv, kv_indent, kv_width, print_json, with_device,
};

pub(super) fn cmd_info(opts: &Options) -> Result<()> {
    with_device(opts, |dev, config| {
        let meta = dev.metadata()?;

        if opts.json {
            let output = InfoOutput {
                library_version: canlight_lib::library_version(),
                interface: config.interface.clone(),
                link: meta.has_link(),
                device: meta,
            };
            return print_json(&output);
        }

        // Human-readable output
        let w = kv_width(
            &["Library:", "Interface:", "Device:"],
            &[
                "Identifier:",
                "Name:",
                "Firmware:",
                "Hardware:",
                "Bootloader:",
                "Serial:",
                "Battery:",
            ],
        );

        kv("Library:", canlight_lib::library_version(), w);
        kv("Interface:", &config.interface, w);
        println!();

        kv("Device:", dev.id(), w);
        kv_indent("Identifier:", meta.device_id, w);
        kv_indent("Name:", &meta.name, w);
        kv_indent("Firmware:", &meta.firmware_version, w);
        kv_indent("Hardware:", &meta.hardware_version, w);
        kv_indent("Bootloader:", &meta.bootloader_version, w);
        kv_indent("Serial:", &meta.serial_number, w);
        kv_indent("Battery:", format_voltage(meta.battery_voltage), w);

        if u8::try_from(config.device_id).ok() != Some(meta.device_id) {
            log::warn!(
                "device answered with identifier {} (expected {})",
                meta.device_id,
                config.device_id
            );
        }
        Ok(())
    })
}
