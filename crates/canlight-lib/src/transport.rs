//! Transport — the request/response channel to one controller on the bus.
//!
//! [`Connector`] opens sessions; a [`Transport`] session carries requests for a
//! single device identifier. Calls are synchronous and block until the device
//! answers (getters) or the frame is on the bus (display commands).
//! `call` takes `&mut self`, so one session only ever has one request in flight.

use std::fmt;

use crate::protocol::Opcode;
use crate::registry::DeviceId;

// ── Error type ──

/// Transport failures.
///
/// String payloads follow the convention **"context: details"** where *context*
/// identifies the step (e.g. `"can0"`, `"write ShowRgb(0x01)"`) and *details*
/// describes what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    OpenFailed(String),
    Link(String),
    Timeout(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::OpenFailed(e) => write!(f, "Failed to open CAN session: {e}"),
            TransportError::Link(e) => write!(f, "Link error: {e}"),
            TransportError::Timeout(e) => write!(f, "Timed out: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

// ── Traits ──

/// One open session to one device.
pub trait Transport {
    /// Send `opcode` with `payload` and return the response bytes.
    ///
    /// Display commands return an empty response.
    fn call(&mut self, opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>>;

    /// Terminate the session. Further calls fail with a link error.
    fn close(&mut self);
}

/// Opens transport sessions.
pub trait Connector {
    type Session: Transport;

    /// One-time driver bootstrap, run before the first `open` in the process.
    fn load(&self) -> Result<()> {
        Ok(())
    }

    fn open(&self, id: DeviceId) -> Result<Self::Session>;
}

// ── SocketCAN backend ──

#[cfg(target_os = "linux")]
mod socketcan_impl {
    use super::*;
    use std::io::ErrorKind;
    use std::time::{Duration, Instant};

    use socketcan::{CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Id, Socket};

    use crate::protocol::{FRAME_DATA_LEN, arbitration_id, is_reply_to};

    /// Opens SocketCAN sessions on a named interface (e.g. `can0`).
    #[derive(Debug, Clone)]
    pub struct SocketCanConnector {
        interface: String,
        timeout: Duration,
    }

    impl SocketCanConnector {
        pub fn new(interface: impl Into<String>, timeout: Duration) -> Self {
            SocketCanConnector {
                interface: interface.into(),
                timeout,
            }
        }

        fn open_socket(&self) -> Result<CanSocket> {
            CanSocket::open(&self.interface)
                .map_err(|e| TransportError::OpenFailed(format!("{}: {e}", self.interface)))
        }
    }

    impl Connector for SocketCanConnector {
        type Session = SocketCanSession;

        fn load(&self) -> Result<()> {
            self.open_socket().map(|_| ())
        }

        fn open(&self, id: DeviceId) -> Result<SocketCanSession> {
            let socket = self.open_socket()?;
            socket
                .set_read_timeout(self.timeout)
                .map_err(|e| TransportError::OpenFailed(format!("set_read_timeout: {e}")))?;
            Ok(SocketCanSession {
                socket: Some(socket),
                device_id: id.get(),
                timeout: self.timeout,
            })
        }
    }

    pub struct SocketCanSession {
        socket: Option<CanSocket>,
        device_id: u8,
        timeout: Duration,
    }

    /// Build the request frame for `opcode` addressed to `device_id`.
    pub fn build_request(device_id: u8, opcode: Opcode, payload: &[u8]) -> Result<CanFrame> {
        if payload.len() > FRAME_DATA_LEN {
            return Err(TransportError::Link(format!(
                "{opcode}: payload of {} bytes exceeds one frame",
                payload.len()
            )));
        }
        let raw = arbitration_id(device_id, opcode);
        let id = ExtendedId::new(raw)
            .ok_or_else(|| TransportError::Link(format!("{opcode}: bad id 0x{raw:08X}")))?;
        CanFrame::new(id, payload)
            .ok_or_else(|| TransportError::Link(format!("{opcode}: frame rejected")))
    }

    /// Collect response frames from `device_id` for `opcode` until a short frame
    /// ends the reply. Traffic for other devices, types or opcodes is skipped.
    fn read_response(
        socket: &CanSocket,
        device_id: u8,
        opcode: Opcode,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let raw_id = arbitration_id(device_id, opcode);
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        loop {
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout(format!(
                    "0x{raw_id:08X}: no complete reply within {}ms",
                    timeout.as_millis()
                )));
            }
            let frame = match socket.read_frame() {
                Ok(frame) => frame,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(TransportError::Timeout(format!(
                        "0x{raw_id:08X}: no reply within {}ms",
                        timeout.as_millis()
                    )));
                }
                Err(e) => return Err(TransportError::Link(format!("read: {e}"))),
            };
            let Id::Extended(id) = EmbeddedFrame::id(&frame) else {
                continue;
            };
            if !is_reply_to(id.as_raw(), device_id, opcode) || frame.is_remote_frame() {
                continue;
            }
            let data = EmbeddedFrame::data(&frame);
            out.extend_from_slice(data);
            if data.len() < FRAME_DATA_LEN {
                return Ok(out);
            }
        }
    }

    impl Transport for SocketCanSession {
        fn call(&mut self, opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>> {
            let socket = self
                .socket
                .as_ref()
                .ok_or_else(|| TransportError::Link("session closed".into()))?;
            let frame = build_request(self.device_id, opcode, payload)?;
            socket
                .write_frame(&frame)
                .map_err(|e| TransportError::Link(format!("write {opcode}: {e}")))?;
            if !opcode.expects_response() {
                return Ok(Vec::new());
            }
            read_response(socket, self.device_id, opcode, self.timeout)
        }

        fn close(&mut self) {
            self.socket = None;
        }
    }
}

#[cfg(target_os = "linux")]
pub use socketcan_impl::{SocketCanConnector, SocketCanSession, build_request};

// ── Stub connector for unsupported platforms ──

/// Placeholder connector that never opens a session.
/// Enables compilation and `cargo test` on hosts without SocketCAN.
#[cfg(not(target_os = "linux"))]
#[derive(Debug, Clone)]
pub struct StubConnector {
    interface: String,
}

#[cfg(not(target_os = "linux"))]
impl StubConnector {
    pub fn new(interface: impl Into<String>, _timeout: std::time::Duration) -> Self {
        StubConnector {
            interface: interface.into(),
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub struct StubSession;

#[cfg(not(target_os = "linux"))]
impl Transport for StubSession {
    fn call(&mut self, opcode: Opcode, _payload: &[u8]) -> Result<Vec<u8>> {
        Err(TransportError::Link(format!(
            "{opcode}: SocketCAN is only available on Linux"
        )))
    }
    fn close(&mut self) {}
}

#[cfg(not(target_os = "linux"))]
impl Connector for StubConnector {
    type Session = StubSession;

    fn load(&self) -> Result<()> {
        Err(TransportError::OpenFailed(format!(
            "{}: SocketCAN is only available on Linux",
            self.interface
        )))
    }

    fn open(&self, _id: DeviceId) -> Result<StubSession> {
        self.load().map(|_| StubSession)
    }
}

/// Concrete connector type for the current platform.
#[cfg(target_os = "linux")]
pub type PlatformConnector = SocketCanConnector;
#[cfg(not(target_os = "linux"))]
pub type PlatformConnector = StubConnector;

/// Build the platform connector for `interface` with a per-request timeout.
pub fn platform_connector(interface: &str, timeout: std::time::Duration) -> PlatformConnector {
    PlatformConnector::new(interface, timeout)
}

// ── Mock transport for testing ──

/// In-memory mock bus for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex, MutexGuard};

    use crate::command::Command;
    use crate::device::DisplayState;
    use crate::protocol::REGISTER_COUNT;
    use crate::register::{Register, factory_defaults};

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// What one simulated controller knows and has been asked to do.
    ///
    /// Commands are decoded from the wire and applied, so tests can inspect
    /// the device's view (registers, display) independently of the host mirror.
    #[derive(Debug)]
    pub struct MockState {
        pub device_id: u8,
        pub name: String,
        pub firmware_version: String,
        pub hardware_version: String,
        pub bootloader_version: String,
        pub serial_number: String,
        pub battery_millivolts: u16,
        /// Device-side register memory.
        pub registers: [Register; REGISTER_COUNT],
        /// Device-side persistent display state.
        pub display: Option<DisplayState>,
        /// Seconds of every diagnostic blink requested.
        pub blinks: Vec<u8>,
        /// Recorded calls: (opcode, payload).
        pub calls: Vec<(Opcode, Vec<u8>)>,
        /// Scripted responses, served before the simulated ones.
        pub responses: HashMap<Opcode, VecDeque<Vec<u8>>>,
        /// If set, every call fails with this error.
        pub fail_calls: Option<TransportError>,
        pub closed: bool,
    }

    impl MockState {
        fn new(device_id: u8) -> Self {
            MockState {
                device_id,
                name: "CANLight".into(),
                firmware_version: "1.1".into(),
                hardware_version: "2.0".into(),
                bootloader_version: "1.0".into(),
                serial_number: format!("MOCK{device_id:04}"),
                battery_millivolts: 12_300,
                registers: factory_defaults(),
                display: None,
                blinks: Vec::new(),
                calls: Vec::new(),
                responses: HashMap::new(),
                fail_calls: None,
                closed: false,
            }
        }

        /// Queue a response for the next call with `opcode`.
        pub fn add_response(&mut self, opcode: Opcode, response: Vec<u8>) {
            self.responses.entry(opcode).or_default().push_back(response);
        }

        /// Opcodes called so far, in order.
        pub fn opcodes(&self) -> Vec<Opcode> {
            self.calls.iter().map(|(op, _)| *op).collect()
        }

        /// Simulate a power cycle: registers return to factory defaults.
        pub fn power_cycle(&mut self) {
            self.registers = factory_defaults();
            self.display = None;
        }

        fn apply(&mut self, command: Command) {
            match command {
                Command::WriteRegister { index, register } => {
                    self.registers[usize::from(index.get())] = register;
                }
                Command::Reset => self.registers = factory_defaults(),
                Command::BlinkLed { seconds } => self.blinks.push(seconds.get()),
                other => self.display = other.display_effect(),
            }
        }

        fn handle(&mut self, opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>> {
            if let Some(response) = self.responses.get_mut(&opcode).and_then(VecDeque::pop_front) {
                return Ok(response);
            }
            let text = |s: &str| s.as_bytes().to_vec();
            match opcode {
                Opcode::GetDeviceId => Ok(vec![self.device_id]),
                Opcode::GetDeviceName => Ok(text(&self.name)),
                Opcode::GetFirmwareVersion => Ok(text(&self.firmware_version)),
                Opcode::GetHardwareVersion => Ok(text(&self.hardware_version)),
                Opcode::GetBootloaderVersion => Ok(text(&self.bootloader_version)),
                Opcode::GetSerialNumber => Ok(text(&self.serial_number)),
                Opcode::GetBatteryVoltage => Ok(self.battery_millivolts.to_le_bytes().to_vec()),
                _ => {
                    let command = Command::decode(opcode, payload).ok_or_else(|| {
                        TransportError::Link(format!("mock: malformed {opcode} payload {payload:?}"))
                    })?;
                    self.apply(command);
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Shared handle to one simulated device.
    pub type MockHandle = Arc<Mutex<MockState>>;

    /// Mock connector: one [`MockState`] per device identifier, created on demand.
    #[derive(Debug, Default)]
    pub struct MockConnector {
        devices: Mutex<HashMap<u8, MockHandle>>,
        /// If set, `open` fails with this error.
        pub fail_open: Mutex<Option<TransportError>>,
        /// If set, `load` fails with this error.
        pub fail_load: Mutex<Option<TransportError>>,
        loads: Mutex<usize>,
        opens: Mutex<Vec<u8>>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        /// The simulated device for `id`, created at factory state if new.
        pub fn device(&self, id: u8) -> MockHandle {
            lock(&self.devices)
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(MockState::new(id))))
                .clone()
        }

        /// Lock and inspect the simulated device for `id`.
        pub fn with_device<R>(&self, id: u8, f: impl FnOnce(&mut MockState) -> R) -> R {
            let handle = self.device(id);
            let mut state = lock(&handle);
            f(&mut state)
        }

        pub fn set_fail_open(&self, error: Option<TransportError>) {
            *lock(&self.fail_open) = error;
        }

        pub fn set_fail_load(&self, error: Option<TransportError>) {
            *lock(&self.fail_load) = error;
        }

        /// How many times `load` ran.
        pub fn load_count(&self) -> usize {
            *lock(&self.loads)
        }

        /// Identifiers opened so far, in order.
        pub fn opened(&self) -> Vec<u8> {
            lock(&self.opens).clone()
        }
    }

    impl Connector for MockConnector {
        type Session = MockTransport;

        fn load(&self) -> Result<()> {
            *lock(&self.loads) += 1;
            match lock(&self.fail_load).clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn open(&self, id: DeviceId) -> Result<MockTransport> {
            if let Some(e) = lock(&self.fail_open).clone() {
                return Err(e);
            }
            lock(&self.opens).push(id.get());
            let state = self.device(id.get());
            lock(&state).closed = false;
            Ok(MockTransport { state })
        }
    }

    /// Session onto a [`MockState`].
    #[derive(Debug)]
    pub struct MockTransport {
        state: MockHandle,
    }

    impl MockTransport {
        /// Standalone session for tests that don't go through a registry.
        pub fn new(device_id: u8) -> Self {
            MockTransport {
                state: Arc::new(Mutex::new(MockState::new(device_id))),
            }
        }

        pub fn state(&self) -> MockHandle {
            self.state.clone()
        }
    }

    impl Transport for MockTransport {
        fn call(&mut self, opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>> {
            let mut state = lock(&self.state);
            if state.closed {
                return Err(TransportError::Link("mock: session closed".into()));
            }
            state.calls.push((opcode, payload.to_vec()));
            if let Some(e) = state.fail_calls.clone() {
                return Err(e);
            }
            state.handle(opcode, payload)
        }

        fn close(&mut self) {
            lock(&self.state).closed = true;
        }
    }
}
