// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use solid_types::DeviceInterfaceType;

use crate::FakeError;

/// One `[[device]]` table of a fake hardware description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FakeDeviceSpec {
    pub udi: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    /// Capability tag names, e.g. `"StorageAccess"`.
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Values read by the capabilities, keyed by their camelCase name.
    #[serde(default)]
    pub properties: toml::Table,
}

impl FakeDeviceSpec {
    pub fn interface_types(&self) -> Vec<DeviceInterfaceType> {
        self.interfaces
            .iter()
            .map(|name| DeviceInterfaceType::string_to_type(name))
            .filter(|ty| *ty != DeviceInterfaceType::Unknown)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FakeHardware {
    #[serde(default, rename = "device")]
    pub devices: Vec<FakeDeviceSpec>,
}

impl FakeHardware {
    pub fn from_toml(content: &str) -> Result<Self, FakeError> {
        let hardware: Self = toml::from_str(content)?;

        let mut seen = BTreeSet::new();
        for device in &hardware.devices {
            if !seen.insert(device.udi.as_str()) {
                return Err(FakeError::DuplicateUdi(device.udi.clone()));
            }
        }
        Ok(hardware)
    }

    pub fn load(path: &Path) -> Result<Self, FakeError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }
}
