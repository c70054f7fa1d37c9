// SPDX-License-Identifier: GPL-3.0-only

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use solid_contracts::{BackendDevice, Capability, Notifier, StorageAccessEvent};
use solid_types::DeviceInterfaceType;

use crate::FakeDeviceSpec;
use crate::capability::{
    FakeBattery, FakeBlock, FakeNetworkShare, FakeProcessor, FakeStorageAccess, FakeStorageDrive,
    FakeStorageVolume,
};

/// State of one described device, shared by every handle to it.
pub(crate) struct FakeDeviceData {
    pub(crate) spec: FakeDeviceSpec,
    properties: Mutex<toml::Table>,
    broken: AtomicBool,
    pub(crate) access_events: Notifier<StorageAccessEvent>,
}

impl FakeDeviceData {
    pub(crate) fn new(mut spec: FakeDeviceSpec) -> Self {
        let properties = std::mem::take(&mut spec.properties);
        Self {
            spec,
            properties: Mutex::new(properties),
            broken: AtomicBool::new(false),
            access_events: Notifier::new(),
        }
    }

    fn properties(&self) -> MutexGuard<'_, toml::Table> {
        self.properties.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_property(&self, key: &str, value: toml::Value) {
        self.properties().insert(key.to_string(), value);
    }

    pub(crate) fn string(&self, key: &str) -> String {
        self.properties()
            .get(key)
            .and_then(toml::Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub(crate) fn bool(&self, key: &str) -> bool {
        self.properties()
            .get(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(false)
    }

    pub(crate) fn u64(&self, key: &str) -> u64 {
        self.properties()
            .get(key)
            .and_then(toml::Value::as_integer)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0)
    }

    pub(crate) fn u32(&self, key: &str) -> u32 {
        u32::try_from(self.u64(key)).unwrap_or(u32::MAX)
    }

    pub(crate) fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    pub(crate) fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

/// A device read from the fake hardware description.
pub struct FakeDevice {
    data: Arc<FakeDeviceData>,
}

impl FakeDevice {
    pub(crate) fn new(data: Arc<FakeDeviceData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl BackendDevice for FakeDevice {
    fn udi(&self) -> String {
        self.data.spec.udi.clone()
    }

    async fn parent_udi(&self) -> String {
        self.data.spec.parent.clone()
    }

    async fn vendor(&self) -> String {
        self.data.spec.vendor.clone()
    }

    async fn product(&self) -> String {
        self.data.spec.product.clone()
    }

    async fn icon(&self) -> String {
        self.data.spec.icon.clone()
    }

    async fn emblems(&self) -> Vec<String> {
        if self.data.bool("isMounted") {
            vec!["emblem-mounted".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn description(&self) -> String {
        self.data.spec.description.clone()
    }

    async fn query_device_interface(&self, interface: DeviceInterfaceType) -> bool {
        interface == DeviceInterfaceType::GenericInterface
            || self.data.spec.interface_types().contains(&interface)
    }

    async fn create_device_interface(
        &self,
        interface: DeviceInterfaceType,
    ) -> Option<Capability> {
        if !self.data.spec.interface_types().contains(&interface) {
            return None;
        }

        let data = Arc::clone(&self.data);
        let capability = match interface {
            DeviceInterfaceType::StorageAccess => {
                Capability::StorageAccess(Arc::new(FakeStorageAccess::new(data)))
            }
            DeviceInterfaceType::StorageDrive => {
                Capability::StorageDrive(Arc::new(FakeStorageDrive::new(data)))
            }
            DeviceInterfaceType::StorageVolume => {
                Capability::StorageVolume(Arc::new(FakeStorageVolume::new(data)))
            }
            DeviceInterfaceType::Block => Capability::Block(Arc::new(FakeBlock::new(data))),
            DeviceInterfaceType::NetworkShare => {
                Capability::NetworkShare(Arc::new(FakeNetworkShare::new(data)))
            }
            DeviceInterfaceType::Processor => {
                Capability::Processor(Arc::new(FakeProcessor::new(data)))
            }
            DeviceInterfaceType::Battery => Capability::Battery(Arc::new(FakeBattery::new(data))),
            _ => return None,
        };
        Some(capability)
    }
}
