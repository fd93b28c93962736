//! Module identity documents published once at startup.
//!
//! Every module on the bus announces itself with two documents:
//!
//! - an [`OperationalDescription`] (who am I, what can I do), and
//! - a [`ModuleConfiguration`] (how am I currently configured).
//!
//! Both carry the module's [`ModuleId`] and an opaque capability or
//! configuration payload (XML text read from disk by the caller).

use std::fmt;

use uuid::Uuid;

/// Identity of one running module instance.
///
/// A fresh id is generated every time a module starts, so two instances of
/// the same module are distinguishable on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(Uuid);

impl ModuleId {
    /// Generates a new random (v4) module id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Static description of a module and its capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationalDescription {
    /// Display name, e.g. `ROS Bridge`.
    pub name: String,
    /// Hardware or software model name.
    pub model: String,
    /// Organisation that built the module.
    pub manufacturer: String,
    /// Serial number of this unit.
    pub serial_number: String,
    /// Instance id.
    pub module_id: ModuleId,
    /// Semantic version of the module.
    pub module_version: String,
    /// One-line description.
    pub description: String,
    /// Capabilities schema document (XML).
    pub capabilities_schema: String,
}

/// Current configuration of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfiguration {
    /// Milliseconds since the Unix epoch when the configuration was produced.
    pub timestamp_ms: u64,
    /// Instance id.
    pub module_id: ModuleId,
    /// Display name.
    pub name: String,
    /// Capabilities configuration document (XML).
    pub capabilities_configuration: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_module_ids_are_distinct() {
        let a = ModuleId::generate();
        let b = ModuleId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_module_id_displays_as_hyphenated_uuid() {
        let id = ModuleId::generate();
        assert_eq!(id.to_string(), id.as_uuid().hyphenated().to_string());
    }
}
