//! `config` subcommand — show effective configuration, or write a starter file.

use super::{
    Config, ConfigOutput, Options, Result, effective_config, kv, kv_indent, kv_width, print_json,
};
use canlight_lib::CanLightError;
use canlight_lib::color::parse_color;

/// `config --init`: write the effective settings (file plus overrides) to the config path.
pub(super) fn cmd_config_init(opts: &Options, force: bool) -> Result<()> {
    let path = opts
        .config_path
        .clone()
        .or_else(Config::path)
        .ok_or_else(|| CanLightError::Config("no config directory on this platform".into()))?;
    let config = effective_config(opts);
    if let Err(errors) = config.validate() {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(CanLightError::Config(msgs.join("; ")));
    }
    config.write_starter(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub(super) fn cmd_config(opts: &Options) -> Result<()> {
    let config = effective_config(opts);
    let config_path = opts.config_path.clone().or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if opts.json {
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        };
        return print_json(&output);
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &["interface:", "device_id:", "timeout_ms:", "registers:"],
    );

    match &config_path {
        Some(p) => {
            if config_exists {
                kv("Config file:", format_args!("{} (loaded)", p.display()), w);
            } else {
                kv(
                    "Config file:",
                    format_args!("{} (not found, using defaults)", p.display()),
                    w,
                );
            }
        }
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent("interface:", &config.interface, w);
    kv_indent("device_id:", config.device_id, w);
    kv_indent("timeout_ms:", config.timeout_ms, w);
    if config.registers.is_empty() {
        kv_indent("registers:", "(none)", w);
    } else {
        kv_indent("registers:", config.registers.len(), w);
        for r in &config.registers {
            let color_display = match parse_color(&r.color) {
                Ok(rgb) => format!("{} -> {rgb}", r.color),
                Err(_) => format!("{} (invalid)", r.color),
            };
            println!("    [{}] {}s {color_display}", r.index, r.time);
        }
    }

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
