// SPDX-License-Identifier: GPL-3.0-only

use solid_types::{DeviceInterfaceType, ErrorType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolidError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device {udi} does not provide {interface}")]
    UnsupportedInterface {
        udi: String,
        interface: DeviceInterfaceType,
    },

    #[error("No backend handles {0}")]
    NoBackend(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("D-Bus error: {0}")]
    DBusError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{kind}: {message}")]
    Action { kind: ErrorType, message: String },
}

impl SolidError {
    pub fn action(kind: ErrorType, message: impl Into<String>) -> Self {
        Self::Action {
            kind,
            message: message.into(),
        }
    }

    /// Error kind to report when this error ends a storage action.
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::Action { kind, .. } => *kind,
            Self::UnsupportedInterface { .. } => ErrorType::InvalidOption,
            _ => ErrorType::OperationFailed,
        }
    }
}

impl From<std::io::Error> for SolidError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
