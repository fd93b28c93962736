//! One-time module announcements on the middleware bus.
//!
//! At startup the bridge publishes its operational description and its
//! module configuration.  Both embed an XML document read from disk; a
//! missing file is not fatal and publishes an empty document instead.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use amm_core::{Middleware, MiddlewareError, ModuleConfiguration, ModuleId, OperationalDescription};
use tracing::{info, warn};

use crate::domain::config::ModuleIdentity;

/// Reads a capability or configuration document.
///
/// Returns an empty string, after logging a warning, if the file cannot be
/// read.
pub fn read_document(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("could not read {}: {e}; publishing an empty document", path.display());
            String::new()
        }
    }
}

/// Builds the operational description for `identity`.
pub fn operational_description(
    identity: &ModuleIdentity,
    module_id: ModuleId,
    capabilities_schema: String,
) -> OperationalDescription {
    OperationalDescription {
        name: identity.name.clone(),
        model: identity.model.clone(),
        manufacturer: identity.manufacturer.clone(),
        serial_number: identity.serial_number.clone(),
        module_id,
        module_version: identity.version.clone(),
        description: identity.description.clone(),
        capabilities_schema,
    }
}

/// Builds the module configuration for `identity`, stamped at `timestamp_ms`.
pub fn module_configuration(
    identity: &ModuleIdentity,
    module_id: ModuleId,
    capabilities_configuration: String,
    timestamp_ms: u64,
) -> ModuleConfiguration {
    ModuleConfiguration {
        timestamp_ms,
        module_id,
        name: identity.name.clone(),
        capabilities_configuration,
    }
}

/// Milliseconds since the Unix epoch, or zero if the clock is before it.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Publishes both startup documents for `identity`.
///
/// # Errors
///
/// Returns the first [`MiddlewareError`] raised by `middleware`.  The module
/// configuration is not published if the description fails.
pub fn publish_module_documents(
    middleware: &dyn Middleware,
    identity: &ModuleIdentity,
    module_id: ModuleId,
) -> Result<(), MiddlewareError> {
    let description = operational_description(
        identity,
        module_id,
        read_document(&identity.capabilities_path),
    );
    middleware.publish_operational_description(&description)?;

    let configuration = module_configuration(
        identity,
        module_id,
        read_document(&identity.configuration_path),
        now_ms(),
    );
    middleware.publish_module_configuration(&configuration)?;

    info!("{} announced as module {module_id}", identity.name);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::always;
    use std::path::PathBuf;

    mock! {
        pub Bus {}
        impl Middleware for Bus {
            fn publish_operational_description(
                &self,
                description: &OperationalDescription,
            ) -> Result<(), MiddlewareError>;
            fn publish_module_configuration(
                &self,
                configuration: &ModuleConfiguration,
            ) -> Result<(), MiddlewareError>;
            fn shutdown(&self);
        }
    }

    /// Writes `contents` to a per-test file under the system temp dir.
    fn temp_document(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ros-bridge-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn identity_with(capabilities: PathBuf, configuration: PathBuf) -> ModuleIdentity {
        ModuleIdentity {
            capabilities_path: capabilities,
            configuration_path: configuration,
            ..ModuleIdentity::default()
        }
    }

    #[test]
    fn test_publishes_description_then_configuration_with_documents() {
        // Arrange
        let caps = temp_document("caps.xml", "<Capabilities/>");
        let conf = temp_document("conf.xml", "<Configuration/>");
        let identity = identity_with(caps.clone(), conf.clone());
        let module_id = ModuleId::generate();

        let mut bus = MockBus::new();
        let mut seq = mockall::Sequence::new();
        bus.expect_publish_operational_description()
            .withf(move |d| {
                d.name == "ROS Bridge"
                    && d.manufacturer == "CREST"
                    && d.module_id == module_id
                    && d.capabilities_schema == "<Capabilities/>"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        bus.expect_publish_module_configuration()
            .withf(move |c| {
                c.module_id == module_id
                    && c.capabilities_configuration == "<Configuration/>"
                    && c.timestamp_ms > 0
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        bus.expect_shutdown().never();

        // Act
        let result = publish_module_documents(&bus, &identity, module_id);

        // Assert
        assert!(result.is_ok());
        std::fs::remove_file(caps).ok();
        std::fs::remove_file(conf).ok();
    }

    #[test]
    fn test_missing_documents_publish_empty_payloads() {
        // Arrange
        let identity = identity_with(
            PathBuf::from("/nonexistent/caps.xml"),
            PathBuf::from("/nonexistent/conf.xml"),
        );
        let mut bus = MockBus::new();
        bus.expect_publish_operational_description()
            .withf(|d| d.capabilities_schema.is_empty())
            .times(1)
            .returning(|_| Ok(()));
        bus.expect_publish_module_configuration()
            .withf(|c| c.capabilities_configuration.is_empty())
            .times(1)
            .returning(|_| Ok(()));

        // Act / Assert
        tokio_test::assert_ok!(publish_module_documents(&bus, &identity, ModuleId::generate()));
    }

    #[test]
    fn test_description_failure_skips_configuration() {
        // Arrange
        let identity = ModuleIdentity::default();
        let mut bus = MockBus::new();
        bus.expect_publish_operational_description()
            .with(always())
            .times(1)
            .returning(|_| Err(MiddlewareError::Closed));
        bus.expect_publish_module_configuration().never();

        // Act
        let result = publish_module_documents(&bus, &identity, ModuleId::generate());

        // Assert
        assert_eq!(result, Err(MiddlewareError::Closed));
    }

    #[test]
    fn test_operational_description_copies_identity() {
        let identity = ModuleIdentity::default();
        let id = ModuleId::generate();
        let description = operational_description(&identity, id, "caps".to_string());
        assert_eq!(description.model, identity.model);
        assert_eq!(description.serial_number, "0000");
        assert_eq!(description.module_version, "0.1.0");
        assert_eq!(description.capabilities_schema, "caps");
    }
}
