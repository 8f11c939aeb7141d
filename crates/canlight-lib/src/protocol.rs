//! Protocol constants for CANLight light-strip controllers.
//!
//! Every value on the wire that has a protocol range of 0–255 (color channels,
//! register indices, duration ticks, blink seconds) travels as a single
//! unsigned byte. Strings come back as raw UTF-8.
//!
//! ## Arbitration id layout
//!
//! Requests use CAN 2.0B extended (29-bit) identifiers:
//!
//! ```text
//!  28      24 23            16 15                 6 5          0
//! [dev type  ][ manufacturer   ][ api (opcode)       ][ device no ]
//! ```

// ── Identifier and register ranges ──

/// Lowest valid device identifier.
pub const MIN_DEVICE_ID: u8 = 1;

/// Highest valid device identifier.
pub const MAX_DEVICE_ID: u8 = 60;

/// Identifier new hardware ships with.
pub const FACTORY_DEVICE_ID: u8 = 3;

/// Number of pattern registers on the controller.
pub const REGISTER_COUNT: usize = 8;

/// Duration ticks per second.
pub const TICKS_PER_SECOND: f64 = 100.0;

/// Largest representable duration in ticks (2.55 s).
pub const MAX_DURATION_TICKS: u8 = u8::MAX;

/// Longest diagnostic blink in seconds; longer requests are capped.
pub const MAX_BLINK_SECONDS: u8 = u8::MAX;

// ── CAN framing ──

/// FRC device type "miscellaneous".
pub const DEVICE_TYPE: u32 = 10;

/// Manufacturer code placed in every arbitration id.
pub const MANUFACTURER: u32 = 7;

/// Maximum data bytes in a classic CAN frame.
pub const FRAME_DATA_LEN: usize = 8;

/// Default response timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Build the 29-bit arbitration id for `opcode` addressed to `device_id`.
pub fn arbitration_id(device_id: u8, opcode: Opcode) -> u32 {
    ((DEVICE_TYPE & 0x1F) << 24)
        | ((MANUFACTURER & 0xFF) << 16)
        | ((u32::from(opcode.code()) & 0x3FF) << 6)
        | (u32::from(device_id) & 0x3F)
}

/// Split an arbitration id into `(device_id, opcode code)`.
///
/// Returns `None` when the device type or manufacturer bits don't match ours.
pub fn split_arbitration_id(raw: u32) -> Option<(u8, u16)> {
    if (raw >> 24) & 0x1F != DEVICE_TYPE || (raw >> 16) & 0xFF != MANUFACTURER {
        return None;
    }
    let api = ((raw >> 6) & 0x3FF) as u16;
    let device = (raw & 0x3F) as u8;
    Some((device, api))
}

/// True when a frame carrying `raw` answers `opcode` sent to `device_id`.
pub fn is_reply_to(raw: u32, device_id: u8, opcode: Opcode) -> bool {
    split_arbitration_id(raw) == Some((device_id & 0x3F, u16::from(opcode.code())))
}

// ── Opcodes ──

/// One request type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    ShowRgb,
    WriteRegister,
    Reset,
    ShowRegister,
    Flash,
    Cycle,
    Fade,
    BlinkLed,
    GetDeviceId,
    GetDeviceName,
    GetFirmwareVersion,
    GetHardwareVersion,
    GetBootloaderVersion,
    GetSerialNumber,
    GetBatteryVoltage,
}

impl Opcode {
    /// Wire code carried in the api field of the arbitration id.
    pub fn code(self) -> u8 {
        match self {
            Opcode::ShowRgb => 0x01,
            Opcode::WriteRegister => 0x02,
            Opcode::Reset => 0x03,
            Opcode::ShowRegister => 0x04,
            Opcode::Flash => 0x05,
            Opcode::Cycle => 0x06,
            Opcode::Fade => 0x07,
            Opcode::BlinkLed => 0x08,
            Opcode::GetDeviceId => 0x10,
            Opcode::GetDeviceName => 0x11,
            Opcode::GetFirmwareVersion => 0x12,
            Opcode::GetHardwareVersion => 0x13,
            Opcode::GetBootloaderVersion => 0x14,
            Opcode::GetSerialNumber => 0x15,
            Opcode::GetBatteryVoltage => 0x16,
        }
    }

    /// Getters wait for a response; display commands are fire-and-forget.
    pub fn expects_response(self) -> bool {
        self.code() >= 0x10
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}(0x{:02X})", self.code())
    }
}

// ── Response decoding ──

/// Parse a string response: UTF-8, cut at the first NUL if present, otherwise verbatim.
pub fn parse_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Parse a battery voltage response (`u16` little-endian millivolts) into volts.
pub fn parse_millivolts(bytes: &[u8]) -> Option<f64> {
    let raw: [u8; 2] = bytes.get(..2)?.try_into().ok()?;
    Some(f64::from(u16::from_le_bytes(raw)) / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_codes_are_unique() {
        let all = [
            Opcode::ShowRgb,
            Opcode::WriteRegister,
            Opcode::Reset,
            Opcode::ShowRegister,
            Opcode::Flash,
            Opcode::Cycle,
            Opcode::Fade,
            Opcode::BlinkLed,
            Opcode::GetDeviceId,
            Opcode::GetDeviceName,
            Opcode::GetFirmwareVersion,
            Opcode::GetHardwareVersion,
            Opcode::GetBootloaderVersion,
            Opcode::GetSerialNumber,
            Opcode::GetBatteryVoltage,
        ];
        let mut codes: Vec<u8> = all.iter().map(|op| op.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn only_getters_expect_response() {
        assert!(!Opcode::ShowRgb.expects_response());
        assert!(!Opcode::BlinkLed.expects_response());
        assert!(Opcode::GetDeviceId.expects_response());
        assert!(Opcode::GetBatteryVoltage.expects_response());
    }

    #[test]
    fn opcode_display_includes_code() {
        assert_eq!(Opcode::Flash.to_string(), "Flash(0x05)");
    }

    #[test]
    fn arbitration_id_layout() {
        let id = arbitration_id(3, Opcode::ShowRgb);
        assert_eq!(id >> 24, DEVICE_TYPE);
        assert_eq!((id >> 16) & 0xFF, MANUFACTURER);
        assert_eq!((id >> 6) & 0x3FF, 0x01);
        assert_eq!(id & 0x3F, 3);
        assert!(id < (1 << 29), "must fit in 29 bits");
    }

    #[test]
    fn arbitration_id_split_recovers_fields() {
        let id = arbitration_id(60, Opcode::GetSerialNumber);
        assert_eq!(split_arbitration_id(id), Some((60, 0x15)));
    }

    #[test]
    fn split_rejects_foreign_ids() {
        assert_eq!(split_arbitration_id(0x0204_0000), None);
    }

    #[test]
    fn reply_matching_checks_device_and_opcode() {
        let id = arbitration_id(12, Opcode::GetDeviceName);
        assert!(is_reply_to(id, 12, Opcode::GetDeviceName));
        assert!(!is_reply_to(id, 13, Opcode::GetDeviceName));
        assert!(!is_reply_to(id, 12, Opcode::GetSerialNumber));
        assert!(!is_reply_to(0x0204_0000 | 12, 12, Opcode::ShowRgb));
    }

    #[test]
    fn parse_string_null_terminated() {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(b"CANLight");
        assert_eq!(parse_string(&bytes), "CANLight");
    }

    #[test]
    fn parse_string_no_null() {
        assert_eq!(parse_string(b"1.2"), "1.2");
    }

    #[test]
    fn parse_string_keeps_whitespace() {
        assert_eq!(parse_string(b" Front strip \0junk"), " Front strip ");
        assert_eq!(parse_string(b"v1.0\n"), "v1.0\n");
    }

    #[test]
    fn parse_string_empty() {
        assert_eq!(parse_string(&[]), "");
        assert_eq!(parse_string(&[0, 0]), "");
    }

    #[test]
    fn parse_millivolts_decodes_le() {
        assert_eq!(parse_millivolts(&12_500u16.to_le_bytes()), Some(12.5));
        assert_eq!(parse_millivolts(&[0, 0]), Some(0.0));
    }

    #[test]
    fn parse_millivolts_short_is_none() {
        assert_eq!(parse_millivolts(&[0x10]), None);
        assert_eq!(parse_millivolts(&[]), None);
    }
}
