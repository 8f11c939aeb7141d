//! Device registry — at most one live [`Device`] per identifier.
//!
//! The registry owns the identifier → handle table. `acquire` reserves the
//! identifier under the registry lock before opening the transport, so two
//! racing acquires for the same identifier cannot both succeed. Acquires for
//! different identifiers only contend on that brief reservation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde::Serialize;

use crate::device::Device;
use crate::driver::Bootstrap;
use crate::error::{CanLightError, Result};
use crate::protocol::{FACTORY_DEVICE_ID, MAX_DEVICE_ID, MIN_DEVICE_ID};
use crate::transport::{Connector, Transport};

/// Validated device identifier, 1–60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Identifier new hardware ships with.
    pub const FACTORY: DeviceId = DeviceId(FACTORY_DEVICE_ID);

    pub fn new(id: i32) -> Result<Self> {
        match u8::try_from(id) {
            Ok(v) if (MIN_DEVICE_ID..=MAX_DEVICE_ID).contains(&v) => Ok(DeviceId(v)),
            _ => Err(CanLightError::InvalidIdentifier(id)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Shared {
    bound: Mutex<HashSet<u8>>,
    bootstrap: Bootstrap,
}

impl Shared {
    fn bound(&self) -> MutexGuard<'_, HashSet<u8>> {
        self.bound.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Reservation of one identifier. Dropping it frees the identifier.
#[derive(Debug)]
pub(crate) struct Lease {
    id: DeviceId,
    shared: Arc<Shared>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.shared.bound().remove(&self.id.get());
    }
}

/// Identifier → live handle table.
///
/// Cloning shares the same table. Use [`DeviceRegistry::global`] for the
/// process-wide instance; separate instances are mainly useful in tests.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    shared: Arc<Shared>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static DeviceRegistry {
        static GLOBAL: OnceLock<DeviceRegistry> = OnceLock::new();
        GLOBAL.get_or_init(DeviceRegistry::new)
    }

    /// Load the transport driver if this registry hasn't yet.
    pub fn bootstrap<C: Connector>(&self, connector: &C) -> Result<()> {
        self.shared.bootstrap.ensure(connector)
    }

    /// Bind `id` to a new transport session and return the device handle.
    ///
    /// Fails with `InvalidIdentifier` outside 1–60 and `AlreadyBound` while
    /// another live handle holds `id`. Nothing is reserved on failure.
    pub fn acquire<C: Connector>(&self, connector: &C, id: i32) -> Result<Device<C::Session>> {
        let id = DeviceId::new(id)?;
        self.bootstrap(connector)?;
        let lease = self.reserve(id)?;
        // On open failure `lease` drops here and frees the identifier.
        let session = connector.open(id)?;
        log::info!("acquired CANLight {id}");
        Ok(Device::bind(id, session, lease))
    }

    /// Release `device`: close its session and free its identifier.
    pub fn release<S: Transport>(&self, device: &mut Device<S>) -> Result<()> {
        device.release()
    }

    pub fn is_bound(&self, id: DeviceId) -> bool {
        self.shared.bound().contains(&id.get())
    }

    /// Identifiers currently held by live handles, ascending.
    pub fn bound_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.shared.bound().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn reserve(&self, id: DeviceId) -> Result<Lease> {
        if !self.shared.bound().insert(id.get()) {
            return Err(CanLightError::AlreadyBound(id.get()));
        }
        Ok(Lease {
            id,
            shared: self.shared.clone(),
        })
    }
}
