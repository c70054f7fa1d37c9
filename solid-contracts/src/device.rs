// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use solid_types::DeviceInterfaceType;
use tracing::debug;

use crate::{Capability, DeviceEvent, SolidError, Subscription};

/// One platform device as seen by a backend.
#[async_trait]
pub trait BackendDevice: Send + Sync {
    fn udi(&self) -> String;

    async fn parent_udi(&self) -> String;
    async fn vendor(&self) -> String;
    async fn product(&self) -> String;
    async fn icon(&self) -> String;

    async fn emblems(&self) -> Vec<String> {
        Vec::new()
    }

    async fn description(&self) -> String;

    async fn display_name(&self) -> String {
        self.description().await
    }

    async fn query_device_interface(&self, interface: DeviceInterfaceType) -> bool;

    async fn create_device_interface(&self, interface: DeviceInterfaceType)
    -> Option<Capability>;
}

/// Entry point of a backend: enumerates devices and reports hotplug events.
#[async_trait]
pub trait DeviceManager: Send + Sync {
    /// Prefix shared by every UDI this backend hands out.
    fn udi_prefix(&self) -> &str;

    fn supported_interfaces(&self) -> Vec<DeviceInterfaceType>;

    async fn all_devices(&self) -> Result<Vec<String>, SolidError>;

    async fn create_device(&self, udi: &str) -> Result<Arc<dyn BackendDevice>, SolidError>;

    fn subscribe(&self) -> Subscription<DeviceEvent>;

    /// Devices below `parent_udi` (any parent when empty) providing
    /// `interface` (any interface when `None`).
    async fn devices_from_query(
        &self,
        parent_udi: &str,
        interface: Option<DeviceInterfaceType>,
    ) -> Result<Vec<String>, SolidError> {
        if let Some(interface) = interface
            && !self.supported_interfaces().contains(&interface)
        {
            return Ok(Vec::new());
        }

        let mut result = Vec::new();
        for udi in self.all_devices().await? {
            let device = match self.create_device(&udi).await {
                Ok(device) => device,
                Err(e) => {
                    debug!("Skipping {udi} while querying: {e}");
                    continue;
                }
            };

            if !parent_udi.is_empty() && device.parent_udi().await != parent_udi {
                continue;
            }

            if let Some(interface) = interface
                && !device.query_device_interface(interface).await
            {
                continue;
            }

            result.push(udi);
        }

        Ok(result)
    }
}
