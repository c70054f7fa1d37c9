// SPDX-License-Identifier: GPL-3.0-only

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use solid_contracts::{
    BackendDevice, DeviceEvent, DeviceManager, Notifier, SolidError, Subscription,
};
use solid_types::DeviceInterfaceType;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::device::udi_for;
use super::{FstabContext, FstabDevice};
use crate::{CommandRunner, MountTableCache, MountTableChange, MountTableWatcher};

pub const FSTAB_UDI_PREFIX: &str = "/org/kde/fstab";

struct ManagerInner {
    ctx: FstabContext,
    events: Notifier<DeviceEvent>,
    known: Mutex<Vec<String>>,
}

/// Backend for network shares and encrypted/overlay folders listed in the
/// mount tables.
pub struct FstabManager {
    inner: Arc<ManagerInner>,
    _watcher: Option<MountTableWatcher>,
    watch_task: Option<JoinHandle<()>>,
}

impl FstabManager {
    /// Enumeration only; call [`FstabManager::handle_change`] to refresh.
    pub fn new(cache: Arc<MountTableCache>, runner: Arc<dyn CommandRunner>) -> Self {
        let known = cache.device_list();
        Self {
            inner: Arc::new(ManagerInner {
                ctx: FstabContext {
                    cache,
                    runner,
                    mtab_changed: Notifier::new(),
                },
                events: Notifier::new(),
                known: Mutex::new(known),
            }),
            _watcher: None,
            watch_task: None,
        }
    }

    /// Also follows both tables. Must be called from within a tokio runtime.
    pub fn with_watcher(cache: Arc<MountTableCache>, runner: Arc<dyn CommandRunner>) -> Self {
        let mut manager = Self::new(cache, runner);
        let cache = &manager.inner.ctx.cache;
        let watcher = MountTableWatcher::start(cache.fstab_path(), cache.mtab_path());

        let mut changes = watcher.subscribe();
        let inner = Arc::clone(&manager.inner);
        manager.watch_task = Some(tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                inner.handle_change(change);
            }
        }));
        manager._watcher = Some(watcher);
        manager
    }

    pub fn cache(&self) -> &MountTableCache {
        &self.inner.ctx.cache
    }

    pub fn handle_change(&self, change: MountTableChange) {
        self.inner.handle_change(change);
    }
}

impl ManagerInner {
    fn handle_change(&self, change: MountTableChange) {
        match change {
            MountTableChange::Fstab => self.ctx.cache.flush_fstab_cache(),
            MountTableChange::Mtab => self.ctx.cache.flush_mtab_cache(),
        }

        let current = self.ctx.cache.device_list();
        let previous = std::mem::replace(
            &mut *self.known.lock().unwrap_or_else(PoisonError::into_inner),
            current.clone(),
        );

        for device in previous.iter().filter(|d| !current.contains(d)) {
            info!("fstab entry removed: {device}");
            self.events.emit(DeviceEvent::Removed(udi_for(device)));
        }
        for device in current.iter().filter(|d| !previous.contains(d)) {
            info!("fstab entry added: {device}");
            self.events.emit(DeviceEvent::Added(udi_for(device)));
        }

        if change == MountTableChange::Mtab {
            debug!("mount table changed, refreshing {} entries", current.len());
            for device in &current {
                self.events.emit(DeviceEvent::Changed(udi_for(device)));
            }
            self.ctx.mtab_changed.emit(());
        }
    }
}

impl Drop for FstabManager {
    fn drop(&mut self) {
        if let Some(task) = self.watch_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl DeviceManager for FstabManager {
    fn udi_prefix(&self) -> &str {
        FSTAB_UDI_PREFIX
    }

    fn supported_interfaces(&self) -> Vec<DeviceInterfaceType> {
        vec![
            DeviceInterfaceType::GenericInterface,
            DeviceInterfaceType::NetworkShare,
            DeviceInterfaceType::StorageAccess,
        ]
    }

    async fn all_devices(&self) -> Result<Vec<String>, SolidError> {
        let mut udis = vec![FSTAB_UDI_PREFIX.to_string()];
        udis.extend(self.inner.ctx.cache.device_list().iter().map(|d| udi_for(d)));
        Ok(udis)
    }

    async fn create_device(&self, udi: &str) -> Result<Arc<dyn BackendDevice>, SolidError> {
        if udi == FSTAB_UDI_PREFIX {
            return Ok(Arc::new(FstabDevice::root(self.inner.ctx.clone())));
        }

        let device = udi
            .strip_prefix(FSTAB_UDI_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|device| self.inner.ctx.cache.device_list().iter().any(|d| d == device))
            .ok_or_else(|| SolidError::DeviceNotFound(udi.to_string()))?;

        Ok(Arc::new(FstabDevice::entry(
            device.to_string(),
            self.inner.ctx.clone(),
        )))
    }

    fn subscribe(&self) -> Subscription<DeviceEvent> {
        self.inner.events.subscribe()
    }
}
