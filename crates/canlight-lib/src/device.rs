//! Device façade — one bound CANLight controller.
//!
//! A [`Device`] owns its transport session and a mirror of the controller's
//! registers. Every operation validates locally first, so a rejected call
//! never reaches the bus. Transport failures are returned unchanged and never
//! retried here.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::color::Rgb;
use crate::command::{Command, RegisterRange};
use crate::error::{CanLightError, Result};
use crate::protocol::{self, Opcode, REGISTER_COUNT};
use crate::register::{Register, RegisterIndex, RegisterStore};
use crate::registry::{DeviceId, Lease};
use crate::transport::Transport;

// ── Display state ──

/// What the strip keeps showing until the next persistent command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "target", rename_all = "snake_case")]
pub enum DisplayState {
    /// A literal color from `show_rgb`.
    Color(Rgb),
    /// A register's color, shown statically.
    Register(RegisterIndex),
    /// A register's color toggled on/off, each phase lasting its duration.
    Flashing(RegisterIndex),
    /// Registers stepped through in order, wrapping.
    Cycling(RegisterRange),
    /// Colors interpolated across consecutive registers, wrapping.
    Fading(RegisterRange),
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayState::Color(c) => write!(f, "showing {c}"),
            DisplayState::Register(i) => write!(f, "showing register {i}"),
            DisplayState::Flashing(i) => write!(f, "flashing register {i}"),
            DisplayState::Cycling(r) => write!(f, "cycling registers {r}"),
            DisplayState::Fading(r) => write!(f, "fading registers {r}"),
        }
    }
}

// ── Metadata ──

/// Read-only device information, one transport round trip per field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceMetadata {
    pub device_id: u8,
    pub name: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub bootloader_version: String,
    pub serial_number: String,
    /// Supply voltage in volts. Exactly 0.0 means "no reliable reading".
    pub battery_voltage: f64,
}

impl DeviceMetadata {
    /// False when the battery reading is the 0.0 no-link sentinel.
    pub fn has_link(&self) -> bool {
        !is_no_link_voltage(self.battery_voltage)
    }
}

/// A reading of exactly 0.0 V signals a disconnected or faulted link.
pub fn is_no_link_voltage(volts: f64) -> bool {
    volts == 0.0
}

// ── Device ──

struct Binding<S> {
    session: S,
    // Held for its Drop: frees the identifier.
    _lease: Lease,
}

/// Handle to one controller, obtained from [`DeviceRegistry::acquire`](crate::DeviceRegistry::acquire).
///
/// Operations take `&mut self`: a handle processes one transaction at a time.
/// Threads sharing a handle must wrap it in a `Mutex` themselves.
pub struct Device<S: Transport> {
    id: DeviceId,
    binding: Option<Binding<S>>,
    registers: RegisterStore,
    display: Option<DisplayState>,
    blink_until: Option<Instant>,
}

impl<S: Transport> fmt::Debug for Device<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("released", &self.is_released())
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}

impl<S: Transport> Device<S> {
    pub(crate) fn bind(id: DeviceId, session: S, lease: Lease) -> Self {
        Device {
            id,
            binding: Some(Binding {
                session,
                _lease: lease,
            }),
            registers: RegisterStore::new(),
            display: None,
            blink_until: None,
        }
    }

    /// The identifier this handle was bound to (no bus traffic).
    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.binding.is_none()
    }

    fn session(&mut self) -> Result<&mut S> {
        match self.binding.as_mut() {
            Some(b) => Ok(&mut b.session),
            None => Err(CanLightError::HandleReleased(self.id.get())),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(CanLightError::HandleReleased(self.id.get()));
        }
        Ok(())
    }

    // ── Commands ──

    /// Send a normalized command and update the local view on success.
    pub fn execute(&mut self, command: Command) -> Result<()> {
        let id = self.id;
        let session = self.session()?;
        log::debug!("{id}: {command}");
        session.call(command.opcode(), &command.payload())?;

        match command {
            Command::WriteRegister { index, register } => self.registers.write(index, register),
            Command::Reset => self.registers.reset(),
            Command::BlinkLed { seconds } => {
                self.blink_until =
                    Some(Instant::now() + Duration::from_secs(u64::from(seconds.get())));
            }
            _ => self.display = command.display_effect(),
        }
        Ok(())
    }

    fn validated(&mut self, command: Result<Command>) -> Result<()> {
        self.ensure_live()?;
        self.execute(command?)
    }

    /// Display a literal color. Channels are saturated to 0–255.
    pub fn show_rgb(&mut self, red: i32, green: i32, blue: i32) -> Result<()> {
        self.validated(Ok(Command::show_rgb(red, green, blue)))
    }

    /// Program one register. `seconds` is quantized to 10 ms ticks (max 2.55 s).
    ///
    /// Registers return to factory values when the controller loses power;
    /// re-issue writes after a suspected power cycle.
    pub fn write_register(
        &mut self,
        index: i32,
        seconds: f64,
        red: i32,
        green: i32,
        blue: i32,
    ) -> Result<()> {
        self.validated(Command::write_register(index, seconds, red, green, blue))
    }

    /// Restore all eight registers to factory defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.validated(Ok(Command::Reset))
    }

    pub fn show_register(&mut self, index: i32) -> Result<()> {
        self.validated(Command::show_register(index))
    }

    pub fn flash(&mut self, index: i32) -> Result<()> {
        self.validated(Command::flash(index))
    }

    /// Step through registers `a..=b` (swapped if reversed), wrapping.
    pub fn cycle(&mut self, a: i32, b: i32) -> Result<()> {
        self.validated(Command::cycle(a, b))
    }

    /// Fade through registers `a..=b` (swapped if reversed), wrapping.
    pub fn fade(&mut self, a: i32, b: i32) -> Result<()> {
        self.validated(Command::fade(a, b))
    }

    /// Blink the on-board diagnostic LED. Does not touch the strip output.
    pub fn blink_led(&mut self, seconds: i32) -> Result<()> {
        self.validated(Command::blink_led(seconds))
    }

    // ── Local view ──

    /// Mirrored register (what this host last wrote, or the factory value).
    pub fn register(&self, index: i32) -> Result<Register> {
        self.ensure_live()?;
        Ok(self.registers.get(RegisterIndex::new(index)?))
    }

    pub fn registers(&self) -> Result<&[Register; REGISTER_COUNT]> {
        self.ensure_live()?;
        Ok(self.registers.all())
    }

    /// Persistent display state; `None` until this handle issues a display command.
    pub fn display_state(&self) -> Option<DisplayState> {
        self.display
    }

    /// Time left on the diagnostic blink overlay, if one is running.
    pub fn diagnostic_blink_remaining(&self) -> Option<Duration> {
        self.blink_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }

    // ── Getters ──

    fn query(&mut self, opcode: Opcode) -> Result<Vec<u8>> {
        let id = self.id;
        let session = self.session()?;
        let response = session.call(opcode, &[])?;
        log::debug!("{id}: {opcode} -> {} bytes", response.len());
        Ok(response)
    }

    fn query_string(&mut self, opcode: Opcode) -> Result<String> {
        self.query(opcode).map(|bytes| protocol::parse_string(&bytes))
    }

    /// Identifier as reported by the controller.
    pub fn device_id(&mut self) -> Result<u8> {
        let bytes = self.query(Opcode::GetDeviceId)?;
        bytes
            .first()
            .copied()
            .ok_or_else(|| CanLightError::MalformedResponse("empty device id".into()))
    }

    /// Configured name; factory default is "CANLight".
    pub fn device_name(&mut self) -> Result<String> {
        self.query_string(Opcode::GetDeviceName)
    }

    pub fn firmware_version(&mut self) -> Result<String> {
        self.query_string(Opcode::GetFirmwareVersion)
    }

    pub fn hardware_version(&mut self) -> Result<String> {
        self.query_string(Opcode::GetHardwareVersion)
    }

    pub fn bootloader_version(&mut self) -> Result<String> {
        self.query_string(Opcode::GetBootloaderVersion)
    }

    pub fn serial_number(&mut self) -> Result<String> {
        self.query_string(Opcode::GetSerialNumber)
    }

    /// Supply voltage in volts. 0.0 means the link is down or faulty.
    pub fn battery_voltage(&mut self) -> Result<f64> {
        let bytes = self.query(Opcode::GetBatteryVoltage)?;
        protocol::parse_millivolts(&bytes).ok_or_else(|| {
            CanLightError::MalformedResponse(format!(
                "battery voltage needs 2 bytes, got {}",
                bytes.len()
            ))
        })
    }

    /// Every getter in one snapshot.
    pub fn metadata(&mut self) -> Result<DeviceMetadata> {
        Ok(DeviceMetadata {
            device_id: self.device_id()?,
            name: self.device_name()?,
            firmware_version: self.firmware_version()?,
            hardware_version: self.hardware_version()?,
            bootloader_version: self.bootloader_version()?,
            serial_number: self.serial_number()?,
            battery_voltage: self.battery_voltage()?,
        })
    }

    // ── Lifecycle ──

    /// Close the session and free the identifier. A second call fails with
    /// `HandleReleased`, as does every other operation afterwards.
    pub fn release(&mut self) -> Result<()> {
        let Some(mut binding) = self.binding.take() else {
            return Err(CanLightError::HandleReleased(self.id.get()));
        };
        binding.session.close();
        log::info!("released CANLight {}", self.id);
        Ok(())
    }
}

impl<S: Transport> Drop for Device<S> {
    fn drop(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            log::warn!("CANLight {} dropped without release", self.id);
            binding.session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceRegistry;
    use crate::register::factory_defaults;
    use crate::transport::TransportError;
    use crate::transport::mock::{MockConnector, MockTransport};

    fn setup(id: i32) -> (DeviceRegistry, MockConnector, Device<MockTransport>) {
        let registry = DeviceRegistry::new();
        let connector = MockConnector::new();
        let device = registry.acquire(&connector, id).unwrap();
        (registry, connector, device)
    }

    fn idx(i: i32) -> RegisterIndex {
        RegisterIndex::new(i).unwrap()
    }

    // ── show_rgb ──

    #[test]
    fn show_rgb_sends_saturated_channels() {
        let (_r, conn, mut dev) = setup(3);
        dev.show_rgb(300, -4, 17).unwrap();
        conn.with_device(3, |d| {
            assert_eq!(d.calls, vec![(Opcode::ShowRgb, vec![255, 0, 17])]);
            assert_eq!(d.display, Some(DisplayState::Color(Rgb::new(255, 0, 17))));
        });
        assert_eq!(
            dev.display_state(),
            Some(DisplayState::Color(Rgb::new(255, 0, 17)))
        );
    }

    // ── write_register / reset ──

    #[test]
    fn write_register_updates_mirror_and_device() {
        let (_r, conn, mut dev) = setup(3);
        dev.write_register(2, 0.5, 10, 20, 30).unwrap();
        let expected = Register::new(50, Rgb::new(10, 20, 30));
        assert_eq!(dev.register(2).unwrap(), expected);
        conn.with_device(3, |d| assert_eq!(d.registers[2], expected));
    }

    #[test]
    fn write_register_rejects_before_transport() {
        let (_r, conn, mut dev) = setup(3);
        assert!(matches!(
            dev.write_register(8, 1.0, 0, 0, 0),
            Err(CanLightError::IndexOutOfRange(8))
        ));
        assert!(matches!(
            dev.write_register(0, -1.0, 0, 0, 0),
            Err(CanLightError::InvalidDuration(_))
        ));
        conn.with_device(3, |d| assert!(d.calls.is_empty()));
        assert_eq!(dev.registers().unwrap(), &factory_defaults());
    }

    #[test]
    fn write_register_duration_saturates() {
        let (_r, _c, mut dev) = setup(3);
        dev.write_register(1, 2.55, 0, 0, 0).unwrap();
        assert_eq!(dev.register(1).unwrap().duration_ticks, 255);
        dev.write_register(1, 9.99, 0, 0, 0).unwrap();
        assert_eq!(dev.register(1).unwrap().duration_ticks, 255);
    }

    #[test]
    fn reset_restores_factory_table() {
        let (_r, conn, mut dev) = setup(3);
        for i in 0..8 {
            dev.write_register(i, 0.1, 1, 2, 3).unwrap();
        }
        dev.reset().unwrap();
        assert_eq!(dev.registers().unwrap(), &factory_defaults());
        conn.with_device(3, |d| assert_eq!(d.registers, factory_defaults()));
    }

    #[test]
    fn failed_write_leaves_mirror_untouched() {
        let (_r, conn, mut dev) = setup(3);
        conn.with_device(3, |d| d.fail_calls = Some(TransportError::Timeout("mock".into())));
        let err = dev.write_register(4, 1.0, 1, 1, 1).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(dev.register(4).unwrap(), factory_defaults()[4]);
    }

    // ── patterns ──

    #[test]
    fn show_register_then_flash_is_flashing() {
        let (_r, _c, mut dev) = setup(3);
        assert_eq!(dev.display_state(), None);
        dev.show_register(3).unwrap();
        assert_eq!(dev.display_state(), Some(DisplayState::Register(idx(3))));
        dev.flash(3).unwrap();
        assert_eq!(dev.display_state(), Some(DisplayState::Flashing(idx(3))));
    }

    #[test]
    fn cycle_reversed_matches_forward() {
        let (_r, conn, mut dev) = setup(3);
        dev.cycle(5, 2).unwrap();
        let reversed = dev.display_state();
        dev.cycle(2, 5).unwrap();
        assert_eq!(reversed, dev.display_state());
        conn.with_device(3, |d| {
            assert_eq!(d.calls[0], (Opcode::Cycle, vec![2, 5]));
            assert_eq!(d.calls[0], d.calls[1]);
        });
    }

    #[test]
    fn fade_sets_fading_state() {
        let (_r, _c, mut dev) = setup(3);
        dev.fade(7, 1).unwrap();
        assert_eq!(
            dev.display_state(),
            Some(DisplayState::Fading(RegisterRange::new(1, 7).unwrap()))
        );
    }

    #[test]
    fn index_errors_reach_no_transport() {
        let (_r, conn, mut dev) = setup(3);
        assert!(dev.show_register(8).is_err());
        assert!(dev.flash(-1).is_err());
        assert!(dev.cycle(0, 9).is_err());
        assert!(dev.fade(10, 0).is_err());
        conn.with_device(3, |d| assert!(d.calls.is_empty()));
        assert_eq!(dev.display_state(), None);
    }

    // ── blink_led ──

    #[test]
    fn blink_does_not_change_display_state() {
        let (_r, conn, mut dev) = setup(3);
        dev.show_register(3).unwrap();
        dev.flash(3).unwrap();
        dev.blink_led(2).unwrap();
        assert_eq!(dev.display_state(), Some(DisplayState::Flashing(idx(3))));
        assert!(dev.diagnostic_blink_remaining().is_some());
        conn.with_device(3, |d| {
            assert_eq!(d.display, Some(DisplayState::Flashing(idx(3))));
            assert_eq!(d.blinks, vec![2]);
        });
    }

    #[test]
    fn blink_validation() {
        let (_r, conn, mut dev) = setup(3);
        assert!(matches!(
            dev.blink_led(0),
            Err(CanLightError::InvalidArgument(_))
        ));
        dev.blink_led(300).unwrap();
        dev.blink_led(255).unwrap();
        conn.with_device(3, |d| assert_eq!(d.blinks, vec![255, 255]));
    }

    #[test]
    fn zero_blink_never_reaches_transport() {
        let (_r, conn, mut dev) = setup(3);
        assert!(matches!(
            Command::blink_led(0),
            Err(CanLightError::InvalidArgument(_))
        ));
        assert!(matches!(
            dev.blink_led(0),
            Err(CanLightError::InvalidArgument(_))
        ));
        conn.with_device(3, |d| assert!(d.calls.is_empty()));
        assert_eq!(dev.diagnostic_blink_remaining(), None);

        // The only way to a BlinkLed command is through validated seconds.
        let one = Command::BlinkLed {
            seconds: crate::command::BlinkSeconds::new(1).unwrap(),
        };
        dev.execute(one).unwrap();
        conn.with_device(3, |d| assert_eq!(d.calls, vec![(Opcode::BlinkLed, vec![1])]));
    }

    #[test]
    fn no_blink_before_first_blink() {
        let (_r, _c, dev) = setup(3);
        assert_eq!(dev.diagnostic_blink_remaining(), None);
    }

    // ── getters ──

    #[test]
    fn getters_return_device_values() {
        let (_r, _c, mut dev) = setup(7);
        assert_eq!(dev.device_id().unwrap(), 7);
        assert_eq!(dev.device_name().unwrap(), "CANLight");
        assert_eq!(dev.firmware_version().unwrap(), "1.1");
        assert_eq!(dev.hardware_version().unwrap(), "2.0");
        assert_eq!(dev.bootloader_version().unwrap(), "1.0");
        assert_eq!(dev.serial_number().unwrap(), "MOCK0007");
        assert_eq!(dev.battery_voltage().unwrap(), 12.3);
    }

    #[test]
    fn each_getter_is_one_round_trip() {
        let (_r, conn, mut dev) = setup(3);
        dev.metadata().unwrap();
        conn.with_device(3, |d| {
            assert_eq!(
                d.opcodes(),
                vec![
                    Opcode::GetDeviceId,
                    Opcode::GetDeviceName,
                    Opcode::GetFirmwareVersion,
                    Opcode::GetHardwareVersion,
                    Opcode::GetBootloaderVersion,
                    Opcode::GetSerialNumber,
                    Opcode::GetBatteryVoltage,
                ]
            );
        });
    }

    #[test]
    fn zero_voltage_means_no_link() {
        let (_r, conn, mut dev) = setup(3);
        conn.with_device(3, |d| d.battery_millivolts = 0);
        let meta = dev.metadata().unwrap();
        assert_eq!(meta.battery_voltage, 0.0);
        assert!(!meta.has_link());
    }

    #[test]
    fn malformed_battery_response() {
        let (_r, conn, mut dev) = setup(3);
        conn.with_device(3, |d| d.add_response(Opcode::GetBatteryVoltage, vec![1]));
        assert!(matches!(
            dev.battery_voltage(),
            Err(CanLightError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_device_id_response_is_malformed() {
        let (_r, conn, mut dev) = setup(3);
        conn.with_device(3, |d| d.add_response(Opcode::GetDeviceId, vec![]));
        assert!(matches!(
            dev.device_id(),
            Err(CanLightError::MalformedResponse(_))
        ));
    }

    #[test]
    fn link_errors_pass_through_unchanged() {
        let (_r, conn, mut dev) = setup(3);
        conn.with_device(3, |d| d.fail_calls = Some(TransportError::Link("bus off".into())));
        match dev.device_name() {
            Err(CanLightError::Transport(TransportError::Link(m))) => assert_eq!(m, "bus off"),
            other => panic!("expected link error, got {other:?}"),
        }
        conn.with_device(3, |d| assert_eq!(d.calls.len(), 1, "no retry"));
    }

    #[test]
    fn metadata_serializes() {
        let (_r, _c, mut dev) = setup(3);
        let json = serde_json::to_string(&dev.metadata().unwrap()).unwrap();
        assert!(json.contains("\"serial_number\":\"MOCK0003\""));
        assert!(json.contains("\"battery_voltage\":12.3"));
    }

    #[test]
    fn display_state_serializes_tagged() {
        let json = serde_json::to_string(&DisplayState::Flashing(idx(3))).unwrap();
        assert_eq!(json, r#"{"mode":"flashing","target":3}"#);
    }

    // ── release ──

    #[test]
    fn released_handle_rejects_everything() {
        let (registry, conn, mut dev) = setup(3);
        dev.release().unwrap();
        assert!(dev.is_released());
        assert!(!registry.is_bound(dev.id()));
        conn.with_device(3, |d| assert!(d.closed));

        assert!(matches!(dev.show_rgb(1, 2, 3), Err(CanLightError::HandleReleased(3))));
        assert!(matches!(dev.flash(9), Err(CanLightError::HandleReleased(3))));
        assert!(matches!(dev.reset(), Err(CanLightError::HandleReleased(3))));
        assert!(matches!(dev.device_name(), Err(CanLightError::HandleReleased(3))));
        assert!(matches!(dev.register(0), Err(CanLightError::HandleReleased(3))));
        assert!(matches!(dev.release(), Err(CanLightError::HandleReleased(3))));
    }

    #[test]
    fn drop_closes_session() {
        let (registry, conn, dev) = setup(3);
        drop(dev);
        conn.with_device(3, |d| assert!(d.closed));
        assert!(registry.bound_ids().is_empty());
    }

    #[test]
    fn display_state_text() {
        assert_eq!(
            DisplayState::Cycling(RegisterRange::new(1, 7).unwrap()).to_string(),
            "cycling registers 1..=7"
        );
        assert_eq!(
            DisplayState::Color(Rgb::ORANGE).to_string(),
            "showing #FF8000"
        );
    }
}
