// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use solid_contracts::{BackendDevice, Capability};
use solid_types::DeviceInterfaceType;

use super::{UDEV_UDI_PREFIX, UdevProcessor};
use crate::UdevDevice;

pub struct UdevBackendDevice {
    device: UdevDevice,
}

impl UdevBackendDevice {
    pub fn new(device: UdevDevice) -> Self {
        Self { device }
    }

    pub fn udi_for(device: &UdevDevice) -> String {
        format!("{UDEV_UDI_PREFIX}{}", device.devpath())
    }

    fn is_processor(&self) -> bool {
        self.device.subsystem() == Some("cpu")
    }
}

#[async_trait]
impl BackendDevice for UdevBackendDevice {
    fn udi(&self) -> String {
        Self::udi_for(&self.device)
    }

    async fn parent_udi(&self) -> String {
        UDEV_UDI_PREFIX.to_string()
    }

    async fn vendor(&self) -> String {
        self.device
            .property("ID_VENDOR_FROM_DATABASE")
            .or_else(|| self.device.property("ID_VENDOR"))
            .unwrap_or_default()
            .to_string()
    }

    async fn product(&self) -> String {
        if self.is_processor() {
            return processor_model_name(self.device.name()).unwrap_or_default();
        }
        self.device
            .property("ID_MODEL_FROM_DATABASE")
            .or_else(|| self.device.property("ID_MODEL"))
            .unwrap_or_default()
            .to_string()
    }

    async fn icon(&self) -> String {
        if self.is_processor() {
            "cpu".to_string()
        } else {
            String::new()
        }
    }

    async fn description(&self) -> String {
        if self.is_processor() {
            return "Processor".to_string();
        }
        self.product().await
    }

    async fn query_device_interface(&self, interface: DeviceInterfaceType) -> bool {
        match interface {
            DeviceInterfaceType::Processor => self.is_processor(),
            DeviceInterfaceType::GenericInterface => true,
            _ => false,
        }
    }

    async fn create_device_interface(
        &self,
        interface: DeviceInterfaceType,
    ) -> Option<Capability> {
        match interface {
            DeviceInterfaceType::Processor if self.is_processor() => Some(Capability::Processor(
                Arc::new(UdevProcessor::new(self.device.clone())),
            )),
            _ => None,
        }
    }
}

/// `model name` of the matching `/proc/cpuinfo` block.
fn processor_model_name(sysname: &str) -> Option<String> {
    let number: u32 = sysname.trim_start_matches("cpu").parse().ok()?;
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    cpuinfo_model_name(&cpuinfo, number)
}

fn cpuinfo_model_name(cpuinfo: &str, number: u32) -> Option<String> {
    cpuinfo
        .split("\n\n")
        .find(|block| {
            block.lines().any(|line| {
                line.split_once(':').is_some_and(|(key, value)| {
                    key.trim() == "processor" && value.trim().parse() == Ok(number)
                })
            })
        })?
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == "model name").then(|| value.trim().to_string())
        })
}
