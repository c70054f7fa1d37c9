// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use solid_contracts::{
    BackendDevice, DeviceEvent, DeviceManager, Notifier, SolidError, Subscription,
};
use solid_types::DeviceInterfaceType;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::UdevBackendDevice;
use crate::{Client, UdevAction};

pub const UDEV_UDI_PREFIX: &str = "/org/kde/solid/udev";

const WATCHED_SUBSYSTEMS: &[&str] = &["cpu"];

/// Backend for devices only udev knows about.
pub struct UdevManager {
    client: Client,
    events: Notifier<DeviceEvent>,
    forward_task: Option<JoinHandle<()>>,
}

impl UdevManager {
    /// Enumeration only, no hotplug monitoring.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            events: Notifier::new(),
            forward_task: None,
        }
    }

    /// Starts monitoring the subsystems this backend exposes.
    pub fn with_monitor(mut client: Client) -> Result<Self, SolidError> {
        client.set_watched_subsystems(
            WATCHED_SUBSYSTEMS.iter().map(|s| s.to_string()).collect(),
        )?;

        let events = Notifier::new();
        let forward = events.clone();
        let mut udev_events = client.subscribe();
        let forward_task = tokio::spawn(async move {
            while let Some(event) = udev_events.recv().await {
                let udi = UdevBackendDevice::udi_for(&event.device);
                let mapped = match event.action {
                    UdevAction::Add => DeviceEvent::Added(udi),
                    UdevAction::Remove => DeviceEvent::Removed(udi),
                    UdevAction::Change
                    | UdevAction::Online
                    | UdevAction::Offline
                    | UdevAction::Bind
                    | UdevAction::Unbind => DeviceEvent::Changed(udi),
                };
                forward.emit(mapped);
            }
            debug!("udev event forwarding ended");
        });

        Ok(Self {
            client,
            events,
            forward_task: Some(forward_task),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Drop for UdevManager {
    fn drop(&mut self) {
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl DeviceManager for UdevManager {
    fn udi_prefix(&self) -> &str {
        UDEV_UDI_PREFIX
    }

    fn supported_interfaces(&self) -> Vec<DeviceInterfaceType> {
        vec![
            DeviceInterfaceType::GenericInterface,
            DeviceInterfaceType::Processor,
        ]
    }

    async fn all_devices(&self) -> Result<Vec<String>, SolidError> {
        Ok(self
            .client
            .devices_by_subsystem("cpu")
            .iter()
            .map(UdevBackendDevice::udi_for)
            .collect())
    }

    async fn create_device(&self, udi: &str) -> Result<Arc<dyn BackendDevice>, SolidError> {
        let devpath = udi
            .strip_prefix(UDEV_UDI_PREFIX)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| SolidError::DeviceNotFound(udi.to_string()))?;

        let syspath = self.client.sysfs_root().join(devpath.trim_start_matches('/'));
        match self.client.device_by_sysfs_path(&syspath) {
            Some(device) => Ok(Arc::new(UdevBackendDevice::new(device))),
            None => {
                warn!("No udev device behind {udi}");
                Err(SolidError::DeviceNotFound(udi.to_string()))
            }
        }
    }

    fn subscribe(&self) -> Subscription<DeviceEvent> {
        self.events.subscribe()
    }
}
