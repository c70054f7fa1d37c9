// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use solid_contracts::{Notifier, Subscription};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{Monitor, UdevDevice, UdevError, UdevEvent};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys";
pub const DEFAULT_UDEV_DATA_ROOT: &str = "/run/udev/data";

/// Enumerates udev devices and, once subsystems are watched, reports their
/// hotplug events to subscribers.
pub struct Client {
    sysfs_root: PathBuf,
    udev_data_root: PathBuf,
    watched: Option<Vec<String>>,
    events: Notifier<UdevEvent>,
    monitor_task: Option<JoinHandle<()>>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_roots(DEFAULT_SYSFS_ROOT, DEFAULT_UDEV_DATA_ROOT)
    }

    pub fn with_roots(sysfs_root: impl Into<PathBuf>, udev_data_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            udev_data_root: udev_data_root.into(),
            watched: None,
            events: Notifier::new(),
            monitor_task: None,
        }
    }

    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }

    pub fn subscribe(&self) -> Subscription<UdevEvent> {
        self.events.subscribe()
    }

    /// Currently watched subsystems. When watching everything, lists every
    /// subsystem present right now.
    pub fn watched_subsystems(&self) -> Vec<String> {
        match &self.watched {
            None => Vec::new(),
            Some(list) if !list.is_empty() => list.clone(),
            Some(_) => self
                .subsystem_dirs()
                .into_iter()
                .map(|(subsystem, _)| subsystem)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }

    /// Replaces the monitor with one filtered on `subsystems`
    /// (`subsystem` or `subsystem/devtype`); empty watches everything.
    ///
    /// Must be called from within a tokio runtime.
    pub fn set_watched_subsystems(&mut self, subsystems: Vec<String>) -> Result<(), UdevError> {
        let mut monitor = Monitor::new(&subsystems, self.sysfs_root.clone())?;

        if let Some(task) = self.monitor_task.take() {
            task.abort();
        }

        let events = self.events.clone();
        self.monitor_task = Some(tokio::spawn(async move {
            loop {
                match monitor.next_event().await {
                    Ok(event) => events.emit(event),
                    Err(e) => {
                        warn!("udev monitor stopped: {e}");
                        break;
                    }
                }
            }
        }));
        self.watched = Some(subsystems);
        Ok(())
    }

    pub fn all_devices(&self) -> Vec<UdevDevice> {
        let dirs = self
            .subsystem_dirs()
            .into_iter()
            .map(|(_, dir)| dir)
            .collect::<Vec<_>>();
        self.devices_in(&dirs)
    }

    pub fn devices_by_subsystem(&self, subsystem: &str) -> Vec<UdevDevice> {
        self.devices_in(&self.dirs_for_subsystem(subsystem))
    }

    /// Devices carrying `property`, with `value` when given.
    pub fn devices_by_property(&self, property: &str, value: Option<&str>) -> Vec<UdevDevice> {
        self.all_devices()
            .into_iter()
            .filter(|device| property_matches(device, property, value))
            .collect()
    }

    /// Devices in any of `subsystems` that match any of `properties`.
    /// An empty list leaves that side unconstrained.
    pub fn devices_by_subsystems_and_properties(
        &self,
        subsystems: &[&str],
        properties: &[(&str, Option<&str>)],
    ) -> Vec<UdevDevice> {
        let candidates = if subsystems.is_empty() {
            self.all_devices()
        } else {
            let dirs = subsystems
                .iter()
                .flat_map(|s| self.dirs_for_subsystem(s))
                .collect::<Vec<_>>();
            self.devices_in(&dirs)
        };

        candidates
            .into_iter()
            .filter(|device| {
                properties.is_empty()
                    || properties
                        .iter()
                        .any(|(key, value)| property_matches(device, key, *value))
            })
            .collect()
    }

    /// Resolves a block or character device node through `/sys/dev`.
    pub fn device_by_device_file(&self, device_file: &str) -> Option<UdevDevice> {
        let metadata = fs::metadata(device_file).ok()?;
        let kind = if metadata.file_type().is_block_device() {
            "block"
        } else if metadata.file_type().is_char_device() {
            "char"
        } else {
            return None;
        };

        let rdev = metadata.rdev();
        let major = nix::sys::stat::major(rdev);
        let minor = nix::sys::stat::minor(rdev);
        let link = self
            .sysfs_root
            .join("dev")
            .join(kind)
            .join(format!("{major}:{minor}"));
        self.device_by_sysfs_path(&link)
    }

    pub fn device_by_sysfs_path(&self, sysfs_path: &Path) -> Option<UdevDevice> {
        match UdevDevice::from_syspath(&self.sysfs_root, &self.udev_data_root, sysfs_path) {
            Ok(device) => Some(device),
            Err(e) => {
                debug!("{e}");
                None
            }
        }
    }

    pub fn device_by_subsystem_and_name(&self, subsystem: &str, name: &str) -> Option<UdevDevice> {
        self.dirs_for_subsystem(subsystem)
            .into_iter()
            .map(|dir| dir.join(name))
            .find(|path| path.exists())
            .and_then(|path| self.device_by_sysfs_path(&path))
    }

    /// `(subsystem, directory of device links)` for every class and bus.
    fn subsystem_dirs(&self) -> Vec<(String, PathBuf)> {
        let mut dirs = Vec::new();
        for (base, suffix) in [("class", None), ("bus", Some("devices"))] {
            let Ok(entries) = fs::read_dir(self.sysfs_root.join(base)) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                let dir = match suffix {
                    Some(suffix) => entry.path().join(suffix),
                    None => entry.path(),
                };
                dirs.push((name, dir));
            }
        }
        dirs
    }

    fn dirs_for_subsystem(&self, subsystem: &str) -> Vec<PathBuf> {
        vec![
            self.sysfs_root.join("class").join(subsystem),
            self.sysfs_root.join("bus").join(subsystem).join("devices"),
        ]
    }

    fn devices_in(&self, dirs: &[PathBuf]) -> Vec<UdevDevice> {
        let mut seen = BTreeSet::new();
        let mut devices = Vec::new();
        for dir in dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let Ok(syspath) = fs::canonicalize(entry.path()) else {
                    continue;
                };
                if !seen.insert(syspath.clone()) {
                    continue;
                }
                if let Some(device) = self.device_by_sysfs_path(&syspath) {
                    devices.push(device);
                }
            }
        }
        devices.sort_by(|a, b| a.devpath().cmp(b.devpath()));
        devices
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(task) = self.monitor_task.take() {
            task.abort();
        }
    }
}

fn property_matches(device: &UdevDevice, key: &str, value: Option<&str>) -> bool {
    match (device.property(key), value) {
        (Some(actual), Some(expected)) => actual == expected,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
