// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use solid_contracts::{DeviceEvent, DeviceManager, Notifier, Subscription};
use solid_types::DeviceInterfaceType;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::Device;
use crate::backends;
use crate::config::SolidConfig;

type DeviceCache = Arc<Mutex<HashMap<String, Device>>>;

/// Entry point for device discovery.
///
/// Owns the active backends, routes every UDI to the backend whose prefix
/// it carries and merges their hotplug events into one subscription.
pub struct DeviceNotifier {
    managers: Vec<Arc<dyn DeviceManager>>,
    devices: DeviceCache,
    events: Notifier<DeviceEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl DeviceNotifier {
    /// Must be called from within a tokio runtime.
    pub fn new(managers: Vec<Arc<dyn DeviceManager>>) -> Self {
        let devices: DeviceCache = Arc::default();
        let events = Notifier::new();

        let tasks = managers
            .iter()
            .map(|manager| {
                let mut backend_events = manager.subscribe();
                let devices = Arc::clone(&devices);
                let events = events.clone();
                tokio::spawn(async move {
                    while let Some(event) = backend_events.recv().await {
                        debug!("{event:?}");
                        if !matches!(event, DeviceEvent::Changed(_)) {
                            lock(&devices).remove(event.udi());
                        }
                        events.emit(event);
                    }
                })
            })
            .collect();

        Self {
            managers,
            devices,
            events,
            tasks,
        }
    }

    /// Starts the backends selected by `config`.
    pub async fn from_config(config: &SolidConfig) -> anyhow::Result<Self> {
        Ok(Self::new(backends::start(config).await?))
    }

    pub fn managers(&self) -> &[Arc<dyn DeviceManager>] {
        &self.managers
    }

    /// Added, removed and changed devices of every backend.
    pub fn subscribe(&self) -> Subscription<DeviceEvent> {
        self.events.subscribe()
    }

    pub async fn all_devices(&self) -> Vec<Device> {
        let mut result = Vec::new();
        for manager in &self.managers {
            match manager.all_devices().await {
                Ok(udis) => {
                    for udi in udis {
                        result.push(self.find_device_by_udi(&udi).await);
                    }
                }
                Err(e) => warn!("Listing {} failed: {e}", manager.udi_prefix()),
            }
        }
        result
    }

    pub async fn list_from_type(&self, interface: DeviceInterfaceType) -> Vec<Device> {
        self.list_from_type_under(interface, "").await
    }

    /// Devices providing `interface` whose parent is `parent_udi` (any
    /// parent when empty).
    pub async fn list_from_type_under(
        &self,
        interface: DeviceInterfaceType,
        parent_udi: &str,
    ) -> Vec<Device> {
        let mut result = Vec::new();
        for manager in &self.managers {
            match manager.devices_from_query(parent_udi, Some(interface)).await {
                Ok(udis) => {
                    for udi in udis {
                        result.push(self.find_device_by_udi(&udi).await);
                    }
                }
                Err(e) => warn!("Querying {} failed: {e}", manager.udi_prefix()),
            }
        }
        result
    }

    /// Always returns a handle; it is invalid when no backend knows `udi`.
    pub async fn find_device_by_udi(&self, udi: &str) -> Device {
        if let Some(device) = lock(&self.devices).get(udi) {
            return device.clone();
        }

        let Some(manager) = self.manager_for(udi) else {
            debug!("No backend for {udi}");
            return Device::invalid(udi);
        };

        match manager.create_device(udi).await {
            Ok(backend) => lock(&self.devices)
                .entry(udi.to_string())
                .or_insert_with(|| Device::new(backend))
                .clone(),
            Err(e) => {
                debug!("{e}");
                Device::invalid(udi)
            }
        }
    }

    pub async fn parent(&self, device: &Device) -> Device {
        let parent_udi = device.parent_udi().await;
        self.find_device_by_udi(&parent_udi).await
    }

    /// The backend with the longest prefix covering `udi`.
    fn manager_for(&self, udi: &str) -> Option<&Arc<dyn DeviceManager>> {
        self.managers
            .iter()
            .filter(|manager| covers(manager.udi_prefix(), udi))
            .max_by_key(|manager| manager.udi_prefix().len())
    }
}

impl Drop for DeviceNotifier {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

fn covers(prefix: &str, udi: &str) -> bool {
    match udi.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn lock(devices: &DeviceCache) -> MutexGuard<'_, HashMap<String, Device>> {
    devices.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_cover_whole_segments() {
        assert!(covers("/org/kde/fstab", "/org/kde/fstab"));
        assert!(covers("/org/kde/fstab", "/org/kde/fstab/server:/export"));
        assert!(!covers("/org/kde/fstab", "/org/kde/fstabx"));
        assert!(!covers("/org/kde/solid/udev", "/org/kde/solid/fakehw/cpu0"));
    }

    #[tokio::test]
    async fn unknown_udis_give_invalid_devices() {
        let notifier = DeviceNotifier::new(Vec::new());
        let device = notifier.find_device_by_udi("/org/freedesktop/UDisks2/drives/x").await;
        assert!(!device.is_valid());
        assert!(notifier.all_devices().await.is_empty());
    }
}
