// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use solid_contracts::{
    BackendDevice, DeviceEvent, DeviceManager, Notifier, SolidError, Subscription,
};
use solid_types::DeviceInterfaceType;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::property::{BLOCK_INTERFACE, DRIVE_INTERFACE};
use crate::{
    AccessSettings, DBusPassphrasePrompt, DaemonEvent, NoPassphrasePrompt, PassphrasePrompt,
    RealDaemon, UDISKS_ROOT, UDisksContext, UDisksDevice,
};

pub const UDISKS_UDI_PREFIX: &str = UDISKS_ROOT;

/// Backend for everything the UDisks2 daemon exports.
pub struct UDisksManager {
    ctx: UDisksContext,
    events: Notifier<DeviceEvent>,
    event_task: Option<JoinHandle<()>>,
}

impl UDisksManager {
    /// Enumeration only; feed daemon events through
    /// [`UDisksManager::handle_event`].
    pub fn new(ctx: UDisksContext) -> Self {
        Self {
            ctx,
            events: Notifier::new(),
            event_task: None,
        }
    }

    /// Also follows the daemon's signals. Must be called from within a
    /// tokio runtime.
    pub async fn with_events(ctx: UDisksContext) -> Result<Self, SolidError> {
        let mut manager = Self::new(ctx);
        let mut stream = manager.ctx.daemon.events().await?;

        let ctx = manager.ctx.clone();
        let events = manager.events.clone();
        manager.event_task = Some(tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                dispatch(&ctx, &events, event).await;
            }
            warn!("UDisks2 signal stream ended");
        }));
        Ok(manager)
    }

    /// Connects to the daemon on the system bus and to the passphrase
    /// dialog `prompt_service` on the session bus.
    pub async fn connect(settings: AccessSettings, prompt_service: &str) -> Result<Self, SolidError> {
        let daemon = RealDaemon::system()
            .await
            .map_err(|e| SolidError::BackendUnavailable(e.to_string()))?;

        let prompt: Arc<dyn PassphrasePrompt> =
            match DBusPassphrasePrompt::session(prompt_service).await {
                Ok(prompt) => Arc::new(prompt),
                Err(e) => {
                    warn!("No session bus, encrypted devices cannot be unlocked: {e}");
                    Arc::new(NoPassphrasePrompt)
                }
            };

        let ctx = UDisksContext::new(
            Arc::new(daemon),
            prompt,
            Arc::new(solid_udev::Client::new()),
            settings,
        );
        info!("Connected to UDisks2");
        Self::with_events(ctx).await
    }

    pub fn context(&self) -> &UDisksContext {
        &self.ctx
    }

    pub async fn handle_event(&self, event: DaemonEvent) {
        dispatch(&self.ctx, &self.events, event).await;
    }
}

impl Drop for UDisksManager {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
    }
}

fn is_device_interface(interface: &str) -> bool {
    interface == BLOCK_INTERFACE || interface == DRIVE_INTERFACE
}

async fn dispatch(ctx: &UDisksContext, events: &Notifier<DeviceEvent>, event: DaemonEvent) {
    debug!("{event:?}");
    match event {
        DaemonEvent::InterfacesAdded { path, interfaces } => {
            ctx.device_changed(&path).await;
            if interfaces.iter().any(|i| is_device_interface(i)) {
                events.emit(DeviceEvent::Added(path.clone()));
            } else {
                events.emit(DeviceEvent::Changed(path.clone()));
            }
            changed_backing_device(ctx, events, &path).await;
        }
        DaemonEvent::InterfacesRemoved { path, interfaces } => {
            ctx.device_changed(&path).await;
            if interfaces.iter().any(|i| is_device_interface(i)) {
                events.emit(DeviceEvent::Removed(path));
                // the removed device may have been the cleartext side of
                // a container
                for udi in ctx.bus.udis() {
                    ctx.device_changed(&udi).await;
                }
            } else {
                events.emit(DeviceEvent::Changed(path));
            }
        }
        DaemonEvent::PropertiesChanged { path } => {
            ctx.device_changed(&path).await;
            events.emit(DeviceEvent::Changed(path.clone()));
            changed_backing_device(ctx, events, &path).await;
        }
    }
}

/// A change of a cleartext device changes the accessibility of its
/// container as well.
async fn changed_backing_device(ctx: &UDisksContext, events: &Notifier<DeviceEvent>, path: &str) {
    let properties = ctx.objects.get(path).properties().await;
    if let Some(container) = properties.crypto_backing_device() {
        ctx.device_changed(&container).await;
        events.emit(DeviceEvent::Changed(container));
    }
}

#[async_trait]
impl DeviceManager for UDisksManager {
    fn udi_prefix(&self) -> &str {
        UDISKS_UDI_PREFIX
    }

    fn supported_interfaces(&self) -> Vec<DeviceInterfaceType> {
        vec![
            DeviceInterfaceType::GenericInterface,
            DeviceInterfaceType::Block,
            DeviceInterfaceType::StorageAccess,
            DeviceInterfaceType::StorageDrive,
            DeviceInterfaceType::StorageVolume,
        ]
    }

    async fn all_devices(&self) -> Result<Vec<String>, SolidError> {
        let objects = self.ctx.daemon.managed_objects().await?;
        Ok(objects
            .into_iter()
            .filter(|(_, properties)| properties.is_block() || properties.is_drive())
            .map(|(path, _)| path)
            .collect())
    }

    async fn create_device(&self, udi: &str) -> Result<Arc<dyn BackendDevice>, SolidError> {
        if !udi.starts_with(&format!("{UDISKS_UDI_PREFIX}/")) {
            return Err(SolidError::DeviceNotFound(udi.to_string()));
        }

        let device = UDisksDevice::new(udi, self.ctx.clone());
        let properties = self.ctx.objects.get(udi).properties().await;
        if !properties.is_block() && !properties.is_drive() {
            return Err(SolidError::DeviceNotFound(udi.to_string()));
        }
        Ok(Arc::new(device))
    }

    fn subscribe(&self) -> Subscription<DeviceEvent> {
        self.events.subscribe()
    }
}
