//! CANLight — control layer for CAN-attached addressable RGB light-strip controllers.
//!
//! A [`Device`](device::Device) is acquired from a [`DeviceRegistry`](registry::DeviceRegistry)
//! for one identifier on the bus, mirrors the controller's eight color registers,
//! and issues display commands over a [`Transport`](transport::Transport) session.

pub mod color;
pub mod command;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod register;
pub mod registry;
pub mod transport;

pub use color::Rgb;
pub use device::{Device, DeviceMetadata, DisplayState};
pub use driver::library_version;
pub use error::CanLightError;
pub use register::{Register, RegisterIndex};
pub use registry::{DeviceId, DeviceRegistry};
