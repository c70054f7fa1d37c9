// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use solid_types::ErrorType;

/// Hotplug notification emitted by a device manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "udi", rename_all = "snake_case")]
pub enum DeviceEvent {
    Added(String),
    Removed(String),
    /// Properties of an existing device changed (mount state, media, ...).
    Changed(String),
}

impl DeviceEvent {
    pub fn udi(&self) -> &str {
        match self {
            Self::Added(udi) | Self::Removed(udi) | Self::Changed(udi) => udi,
        }
    }
}

/// Lifecycle notification of a storage access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StorageAccessEvent {
    SetupRequested {
        udi: String,
    },
    SetupDone {
        error: ErrorType,
        message: String,
        udi: String,
    },
    TeardownRequested {
        udi: String,
    },
    TeardownDone {
        error: ErrorType,
        message: String,
        udi: String,
    },
    AccessibilityChanged {
        accessible: bool,
        udi: String,
    },
}

impl StorageAccessEvent {
    pub fn udi(&self) -> &str {
        match self {
            Self::SetupRequested { udi }
            | Self::SetupDone { udi, .. }
            | Self::TeardownRequested { udi }
            | Self::TeardownDone { udi, .. }
            | Self::AccessibilityChanged { udi, .. } => udi,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::SetupDone { .. } | Self::TeardownDone { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_events_serialize_with_tag() {
        let event = StorageAccessEvent::SetupDone {
            error: ErrorType::UserCanceled,
            message: String::new(),
            udi: "/org/x/block_1".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["event"], "setup_done");
        assert_eq!(json["error"], "user_canceled");
        assert!(event.is_done());
    }
}
