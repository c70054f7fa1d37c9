// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use solid_contracts::{
    BackendDevice, DeviceEvent, DeviceManager, Notifier, SolidError, Subscription,
};
use solid_types::DeviceInterfaceType;
use tracing::{debug, info};

use crate::device::{FakeDevice, FakeDeviceData};
use crate::{FakeError, FakeHardware};

pub const FAKE_UDI_PREFIX: &str = "/org/kde/solid/fakehw";

#[derive(Default)]
struct ManagerState {
    /// Every described device, in file order.
    devices: Vec<Arc<FakeDeviceData>>,
    plugged: BTreeSet<String>,
}

impl ManagerState {
    fn find(&self, udi: &str) -> Option<&Arc<FakeDeviceData>> {
        self.devices.iter().find(|data| data.spec.udi == udi)
    }
}

/// Serves the devices of a [`FakeHardware`] description and lets tests
/// plug, unplug and break them.
pub struct FakeManager {
    state: Mutex<ManagerState>,
    events: Notifier<DeviceEvent>,
}

impl FakeManager {
    /// Every described device starts plugged.
    pub fn new(hardware: FakeHardware) -> Self {
        let mut state = ManagerState::default();
        for spec in hardware.devices {
            state.plugged.insert(spec.udi.clone());
            state.devices.push(Arc::new(FakeDeviceData::new(spec)));
        }
        info!("Fake hardware with {} devices", state.devices.len());

        Self {
            state: Mutex::new(state),
            events: Notifier::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, FakeError> {
        Ok(Self::new(FakeHardware::load(path)?))
    }

    pub fn plug(&self, udi: &str) -> Result<(), FakeError> {
        let added = {
            let mut state = self.lock();
            if state.find(udi).is_none() {
                return Err(FakeError::UnknownDevice(udi.to_string()));
            }
            state.plugged.insert(udi.to_string())
        };
        if added {
            debug!("Plugged {udi}");
            self.events.emit(DeviceEvent::Added(udi.to_string()));
        }
        Ok(())
    }

    pub fn unplug(&self, udi: &str) -> Result<(), FakeError> {
        let removed = {
            let mut state = self.lock();
            if state.find(udi).is_none() {
                return Err(FakeError::UnknownDevice(udi.to_string()));
            }
            state.plugged.remove(udi)
        };
        if removed {
            debug!("Unplugged {udi}");
            self.events.emit(DeviceEvent::Removed(udi.to_string()));
        }
        Ok(())
    }

    /// A broken device fails every setup and teardown.
    pub fn set_broken(&self, udi: &str, broken: bool) -> Result<(), FakeError> {
        self.data(udi)?.set_broken(broken);
        Ok(())
    }

    pub fn set_property(&self, udi: &str, key: &str, value: toml::Value) -> Result<(), FakeError> {
        self.data(udi)?.set_property(key, value);
        self.events.emit(DeviceEvent::Changed(udi.to_string()));
        Ok(())
    }

    fn data(&self, udi: &str) -> Result<Arc<FakeDeviceData>, FakeError> {
        self.lock()
            .find(udi)
            .cloned()
            .ok_or_else(|| FakeError::UnknownDevice(udi.to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeviceManager for FakeManager {
    fn udi_prefix(&self) -> &str {
        FAKE_UDI_PREFIX
    }

    fn supported_interfaces(&self) -> Vec<DeviceInterfaceType> {
        DeviceInterfaceType::ALL
            .into_iter()
            .filter(|ty| *ty != DeviceInterfaceType::Unknown)
            .collect()
    }

    async fn all_devices(&self) -> Result<Vec<String>, SolidError> {
        let state = self.lock();
        Ok(state
            .devices
            .iter()
            .map(|data| data.spec.udi.clone())
            .filter(|udi| state.plugged.contains(udi))
            .collect())
    }

    async fn create_device(&self, udi: &str) -> Result<Arc<dyn BackendDevice>, SolidError> {
        let state = self.lock();
        match state.find(udi) {
            Some(data) if state.plugged.contains(udi) => {
                Ok(Arc::new(FakeDevice::new(Arc::clone(data))))
            }
            _ => Err(SolidError::DeviceNotFound(udi.to_string())),
        }
    }

    fn subscribe(&self) -> Subscription<DeviceEvent> {
        self.events.subscribe()
    }
}
