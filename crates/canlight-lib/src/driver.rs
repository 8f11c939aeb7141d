//! Process-wide driver bootstrap.
//!
//! The transport backend is loaded exactly once before the first session is
//! opened. The outcome (success or failure) is remembered, so repeated calls
//! are cheap and a failed load fails every later acquire the same way.

use std::sync::OnceLock;

use crate::error::{CanLightError, Result};
use crate::transport::Connector;

/// Library version as `"major.minor"`.
pub fn library_version() -> String {
    format!(
        "{}.{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    )
}

/// Once-only bootstrap state.
#[derive(Debug, Default)]
pub struct Bootstrap {
    outcome: OnceLock<std::result::Result<(), String>>,
}

impl Bootstrap {
    pub const fn new() -> Self {
        Bootstrap {
            outcome: OnceLock::new(),
        }
    }

    /// Run `connector.load()` if no load has happened yet, then report the outcome.
    pub fn ensure<C: Connector>(&self, connector: &C) -> Result<()> {
        let outcome = self.outcome.get_or_init(|| match connector.load() {
            Ok(()) => {
                log::debug!("transport driver loaded");
                Ok(())
            }
            Err(e) => {
                log::error!("transport driver failed to load: {e}");
                Err(e.to_string())
            }
        });
        outcome
            .clone()
            .map_err(CanLightError::DriverUnavailable)
    }
}

/// Load the driver through the process-wide registry, or terminate the process.
///
/// Nothing in this layer can work without a transport; host binaries call this
/// during startup so a missing bus fails loudly instead of on the first command.
pub fn load_or_exit<C: Connector>(connector: &C) {
    if let Err(e) = crate::registry::DeviceRegistry::global().bootstrap(connector) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use crate::transport::mock::MockConnector;

    #[test]
    fn library_version_is_major_minor() {
        let v = library_version();
        assert_eq!(v.split('.').count(), 2, "got {v}");
        assert!(env!("CARGO_PKG_VERSION").starts_with(&v));
    }

    #[test]
    fn bootstrap_loads_once() {
        let boot = Bootstrap::new();
        let connector = MockConnector::new();
        assert_eq!(connector.load_count(), 0);
        boot.ensure(&connector).unwrap();
        boot.ensure(&connector).unwrap();
        boot.ensure(&connector).unwrap();
        assert_eq!(connector.load_count(), 1);
    }

    #[test]
    fn bootstrap_failure_is_sticky() {
        let boot = Bootstrap::new();
        let connector = MockConnector::new();
        connector.set_fail_load(Some(TransportError::OpenFailed("can0: down".into())));
        let err = boot.ensure(&connector).unwrap_err();
        assert!(matches!(err, CanLightError::DriverUnavailable(ref m) if m.contains("can0")));

        // Clearing the fault does not retry the load.
        connector.set_fail_load(None);
        assert!(boot.ensure(&connector).is_err());
        assert_eq!(connector.load_count(), 1);
    }
}
