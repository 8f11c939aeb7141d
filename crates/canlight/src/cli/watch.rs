//! `watch` subcommand — poll battery voltage until Ctrl+C.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use super::{CanLightError, Options, RUNNING, Result, format_voltage, with_device};

/// Granularity for noticing Ctrl+C while waiting between readings.
const TICK: Duration = Duration::from_millis(50);

fn sleep_while_running(period: Duration) {
    let deadline = Instant::now() + period;
    while RUNNING.load(Ordering::SeqCst) {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        std::thread::sleep(left.min(TICK));
    }
}

fn parse_interval(interval: f64) -> Result<Duration> {
    if !interval.is_finite() || interval <= 0.0 {
        return Err(CanLightError::InvalidArgument(format!(
            "interval must be a positive number of seconds, got {interval}"
        )));
    }
    Ok(Duration::from_secs_f64(interval))
}

/// Timeouts are reported and polling continues; link errors end the watch.
pub(super) fn cmd_watch(opts: &Options, interval: f64) -> Result<()> {
    let period = parse_interval(interval)?;

    with_device(opts, |dev, _| {
        println!("Watching CANLight {} battery (Ctrl+C to stop)", dev.id());
        while RUNNING.load(Ordering::SeqCst) {
            match dev.battery_voltage() {
                Ok(volts) => println!("  {}", format_voltage(volts)),
                Err(e) if e.is_timeout() => log::warn!("[device] {e}"),
                Err(e) => return Err(e),
            }
            sleep_while_running(period);
        }
        println!();
        Ok(())
    })
}
