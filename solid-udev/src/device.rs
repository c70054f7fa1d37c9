// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::UdevError;

/// Snapshot of one udev device.
///
/// Properties combine the kernel `uevent` attributes with the entries udev
/// stored for the device in its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdevDevice {
    syspath: PathBuf,
    devpath: String,
    properties: BTreeMap<String, String>,
}

impl UdevDevice {
    /// Reads the device at `syspath` (an absolute path below `sysfs_root`).
    pub fn from_syspath(
        sysfs_root: &Path,
        udev_data_root: &Path,
        syspath: &Path,
    ) -> Result<Self, UdevError> {
        let syspath = fs::canonicalize(syspath)
            .map_err(|_| UdevError::NotFound(syspath.display().to_string()))?;
        if !syspath.is_dir() {
            return Err(UdevError::NotFound(syspath.display().to_string()));
        }

        let root = fs::canonicalize(sysfs_root).unwrap_or_else(|_| sysfs_root.to_path_buf());
        let devpath = match syspath.strip_prefix(&root) {
            Ok(rel) => format!("/{}", rel.display()),
            Err(_) => return Err(UdevError::NotFound(syspath.display().to_string())),
        };

        let mut properties = BTreeMap::new();
        if let Ok(uevent) = fs::read_to_string(syspath.join("uevent")) {
            properties.extend(parse_key_values(&uevent));
        }

        properties.insert("DEVPATH".to_string(), devpath.clone());
        if let Some(subsystem) = link_name(&syspath.join("subsystem")) {
            properties.insert("SUBSYSTEM".to_string(), subsystem);
        }
        if !properties.contains_key("DRIVER")
            && let Some(driver) = link_name(&syspath.join("driver"))
        {
            properties.insert("DRIVER".to_string(), driver);
        }

        let mut device = Self {
            syspath,
            devpath,
            properties,
        };

        if let Some(db_id) = device.database_id()
            && let Ok(db) = fs::read_to_string(udev_data_root.join(db_id))
        {
            device.properties.extend(parse_database(&db));
        }

        Ok(device)
    }

    /// Builds a device from the properties carried by a uevent message.
    pub(crate) fn from_properties(
        sysfs_root: &Path,
        properties: BTreeMap<String, String>,
    ) -> Option<Self> {
        let devpath = properties.get("DEVPATH")?.clone();
        let syspath = sysfs_root.join(devpath.trim_start_matches('/'));
        Some(Self {
            syspath,
            devpath,
            properties,
        })
    }

    pub fn syspath(&self) -> &Path {
        &self.syspath
    }

    pub fn devpath(&self) -> &str {
        &self.devpath
    }

    /// Kernel name, e.g. `sda1` or `cpu0`.
    pub fn name(&self) -> &str {
        self.devpath.rsplit('/').next().unwrap_or_default()
    }

    pub fn subsystem(&self) -> Option<&str> {
        self.property("SUBSYSTEM")
    }

    pub fn devtype(&self) -> Option<&str> {
        self.property("DEVTYPE")
    }

    pub fn driver(&self) -> Option<&str> {
        self.property("DRIVER")
    }

    pub fn device_number(&self) -> Option<(u64, u64)> {
        let major = self.property("MAJOR")?.parse().ok()?;
        let minor = self.property("MINOR")?.parse().ok()?;
        Some((major, minor))
    }

    pub fn device_file(&self) -> Option<String> {
        self.property("DEVNAME").map(|name| {
            if name.starts_with('/') {
                name.to_string()
            } else {
                format!("/dev/{name}")
            }
        })
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Interprets a property as a udev boolean (`1`/`true`/`yes`).
    pub fn property_bool(&self, name: &str) -> Option<bool> {
        self.property(name)
            .map(|value| matches!(value, "1" | "true" | "yes" | "TRUE" | "YES"))
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Reads a sysfs attribute relative to the device directory.
    pub fn sysfs_attr<T: FromStr>(&self, key: &str) -> Option<T> {
        fs::read_to_string(self.syspath.join(key))
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    pub fn has_sysfs_attr(&self, key: &str) -> bool {
        self.syspath.join(key).exists()
    }

    fn database_id(&self) -> Option<String> {
        if let Some((major, minor)) = self.device_number() {
            let kind = if self.subsystem() == Some("block") {
                'b'
            } else {
                'c'
            };
            return Some(format!("{kind}{major}:{minor}"));
        }
        if let Some(ifindex) = self.property("IFINDEX") {
            return Some(format!("n{ifindex}"));
        }
        self.subsystem()
            .map(|subsystem| format!("+{subsystem}:{}", self.name()))
    }
}

fn link_name(path: &Path) -> Option<String> {
    let target = fs::read_link(path).ok()?;
    target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn parse_key_values(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    text.lines().filter_map(|line| {
        let (key, value) = line.split_once('=')?;
        Some((key.trim().to_string(), value.trim().to_string()))
    })
}

/// Extracts the `E:KEY=VALUE` property lines of a udev database entry.
fn parse_database(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    text.lines()
        .filter_map(|line| line.strip_prefix("E:"))
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
}
