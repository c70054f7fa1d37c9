// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Capability tag a device can expose.
///
/// The numeric values are stable and match the values exchanged with
/// other Solid consumers, hence the gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeviceInterfaceType {
    Unknown = 0,
    GenericInterface = 1,
    Processor = 2,
    Block = 3,
    StorageAccess = 4,
    StorageDrive = 5,
    OpticalDrive = 6,
    StorageVolume = 7,
    OpticalDisc = 8,
    Camera = 9,
    PortableMediaPlayer = 10,
    Battery = 12,
    NetworkShare = 14,
}

impl DeviceInterfaceType {
    pub const ALL: [DeviceInterfaceType; 13] = [
        Self::Unknown,
        Self::GenericInterface,
        Self::Processor,
        Self::Block,
        Self::StorageAccess,
        Self::StorageDrive,
        Self::OpticalDrive,
        Self::StorageVolume,
        Self::OpticalDisc,
        Self::Camera,
        Self::PortableMediaPlayer,
        Self::Battery,
        Self::NetworkShare,
    ];

    pub fn type_to_string(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::GenericInterface => "GenericInterface",
            Self::Processor => "Processor",
            Self::Block => "Block",
            Self::StorageAccess => "StorageAccess",
            Self::StorageDrive => "StorageDrive",
            Self::OpticalDrive => "OpticalDrive",
            Self::StorageVolume => "StorageVolume",
            Self::OpticalDisc => "OpticalDisc",
            Self::Camera => "Camera",
            Self::PortableMediaPlayer => "PortableMediaPlayer",
            Self::Battery => "Battery",
            Self::NetworkShare => "NetworkShare",
        }
    }

    /// Parses a tag name. Unrecognised names map to `Unknown`.
    pub fn string_to_type(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|ty| ty.type_to_string() == name)
            .unwrap_or(Self::Unknown)
    }

    pub fn type_description(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::GenericInterface => "Generic Interface",
            Self::Processor => "Processor",
            Self::Block => "Block",
            Self::StorageAccess => "Storage Access",
            Self::StorageDrive => "Storage Drive",
            Self::OpticalDrive => "Optical Drive",
            Self::StorageVolume => "Storage Volume",
            Self::OpticalDisc => "Optical Disc",
            Self::Camera => "Camera",
            Self::PortableMediaPlayer => "Portable Media Player",
            Self::Battery => "Battery",
            Self::NetworkShare => "Network Share",
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| *ty as u8 == value)
    }
}

impl std::fmt::Display for DeviceInterfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_back_to_their_tag() {
        for ty in DeviceInterfaceType::ALL {
            assert_eq!(DeviceInterfaceType::string_to_type(ty.type_to_string()), ty);
        }
        assert_eq!(
            DeviceInterfaceType::string_to_type("Webcam"),
            DeviceInterfaceType::Unknown
        );
    }

    #[test]
    fn numeric_values_keep_their_gaps() {
        assert_eq!(DeviceInterfaceType::Battery as u8, 12);
        assert_eq!(DeviceInterfaceType::NetworkShare as u8, 14);
        assert_eq!(DeviceInterfaceType::from_value(11), None);
        assert_eq!(
            DeviceInterfaceType::from_value(4),
            Some(DeviceInterfaceType::StorageAccess)
        );
    }
}
