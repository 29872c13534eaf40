//! CodeUnitAccessor: the pluggable capability that reaches into the runtime
//!
//! Obtaining a code unit from a loaded class, and bytes from a code unit, is
//! version-sensitive and failure-prone. The engine depends on this trait only;
//! one implementation is chosen when the session is built.

use thiserror::Error;

use super::models::CodeUnit;

/// Failure inside the accessor; always treated as "nothing to capture"
#[derive(Debug, Error)]
pub enum AccessorError {
    /// The runtime doesn't offer what this accessor needs
    #[error("{operation} is not supported by this runtime: {detail}")]
    Unsupported {
        operation: &'static str,
        detail: String,
    },

    /// The runtime call itself failed
    #[error("{operation} failed: {detail}")]
    Failed {
        operation: &'static str,
        detail: String,
    },
}

impl AccessorError {
    pub fn failed(operation: &'static str, detail: impl Into<String>) -> Self {
        AccessorError::Failed {
            operation,
            detail: detail.into(),
        }
    }

    pub fn unsupported(operation: &'static str, detail: impl Into<String>) -> Self {
        AccessorError::Unsupported {
            operation,
            detail: detail.into(),
        }
    }
}

/// Capability for turning a loaded-class handle into raw code bytes
///
/// `Ok(None)` means "absent"; `Err` means the lookup broke and should be
/// logged. Implementations must not panic.
pub trait CodeUnitAccessor: Send + Sync + 'static {
    /// Handle to a loaded class as delivered by the interception point
    type Class;

    /// Fully-qualified class name, if the runtime exposes one
    fn class_name(&self, class: &Self::Class) -> Option<String>;

    /// Code unit backing `class`
    fn resolve_code_unit(&self, class: &Self::Class) -> Result<Option<CodeUnit>, AccessorError>;

    /// Raw payload of `unit`
    fn extract_bytes(&self, unit: &CodeUnit) -> Result<Option<Vec<u8>>, AccessorError>;
}
