// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use solid_contracts::{
    BackendDevice, Battery, Block, Capability, NetworkShare, Processor, StorageAccess,
    StorageDrive, StorageVolume,
};
use solid_types::DeviceInterfaceType;

struct DeviceInner {
    udi: String,
    backend: Option<Arc<dyn BackendDevice>>,
    /// Capabilities handed out so far, so repeated lookups share state.
    interfaces: Mutex<HashMap<DeviceInterfaceType, Capability>>,
}

/// Handle to one device. Clones refer to the same device.
///
/// A handle whose UDI no backend knows is invalid: it answers every query
/// with an empty value and provides no interface.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

macro_rules! capability_accessor {
    ($name:ident, $variant:ident, $trait:ident) => {
        pub async fn $name(&self) -> Option<Arc<dyn $trait>> {
            match self.as_device_interface(DeviceInterfaceType::$variant).await? {
                Capability::$variant(capability) => Some(capability),
                _ => None,
            }
        }
    };
}

impl Device {
    pub(crate) fn new(backend: Arc<dyn BackendDevice>) -> Self {
        Self::with_backend(backend.udi(), Some(backend))
    }

    pub(crate) fn invalid(udi: &str) -> Self {
        Self::with_backend(udi.to_string(), None)
    }

    fn with_backend(udi: String, backend: Option<Arc<dyn BackendDevice>>) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                udi,
                backend,
                interfaces: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn udi(&self) -> &str {
        &self.inner.udi
    }

    pub fn is_valid(&self) -> bool {
        self.inner.backend.is_some()
    }

    pub async fn parent_udi(&self) -> String {
        match &self.inner.backend {
            Some(backend) => backend.parent_udi().await,
            None => String::new(),
        }
    }

    pub async fn vendor(&self) -> String {
        match &self.inner.backend {
            Some(backend) => backend.vendor().await,
            None => String::new(),
        }
    }

    pub async fn product(&self) -> String {
        match &self.inner.backend {
            Some(backend) => backend.product().await,
            None => String::new(),
        }
    }

    pub async fn icon(&self) -> String {
        match &self.inner.backend {
            Some(backend) => backend.icon().await,
            None => String::new(),
        }
    }

    pub async fn emblems(&self) -> Vec<String> {
        match &self.inner.backend {
            Some(backend) => backend.emblems().await,
            None => Vec::new(),
        }
    }

    pub async fn description(&self) -> String {
        match &self.inner.backend {
            Some(backend) => backend.description().await,
            None => String::new(),
        }
    }

    pub async fn display_name(&self) -> String {
        match &self.inner.backend {
            Some(backend) => backend.display_name().await,
            None => String::new(),
        }
    }

    pub async fn is_device_interface(&self, interface: DeviceInterfaceType) -> bool {
        match &self.inner.backend {
            Some(backend) => backend.query_device_interface(interface).await,
            None => false,
        }
    }

    /// Resolves `interface` to its capability. The first successful lookup
    /// is kept and returned by later calls.
    pub async fn as_device_interface(&self, interface: DeviceInterfaceType) -> Option<Capability> {
        let backend = self.inner.backend.as_ref()?;
        if let Some(capability) = self.cached(interface) {
            return Some(capability);
        }

        let capability = backend.create_device_interface(interface).await?;
        let mut interfaces = self
            .inner
            .interfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // a concurrent lookup may have won
        Some(interfaces.entry(interface).or_insert(capability).clone())
    }

    fn cached(&self, interface: DeviceInterfaceType) -> Option<Capability> {
        self.inner
            .interfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&interface)
            .cloned()
    }

    capability_accessor!(storage_access, StorageAccess, StorageAccess);
    capability_accessor!(storage_drive, StorageDrive, StorageDrive);
    capability_accessor!(storage_volume, StorageVolume, StorageVolume);
    capability_accessor!(block, Block, Block);
    capability_accessor!(network_share, NetworkShare, NetworkShare);
    capability_accessor!(processor, Processor, Processor);
    capability_accessor!(battery, Battery, Battery);
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("udi", &self.inner.udi)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.inner.udi == other.inner.udi
    }
}

impl Eq for Device {}
