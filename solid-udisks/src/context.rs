// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use solid_fstab::table::DEFAULT_MOUNTINFO_PATH;
use tracing::warn;

use crate::action_bus::ActionBus;
use crate::object::ObjectRegistry;
use crate::{Daemon, PassphrasePrompt};

pub const DEFAULT_UNMOUNT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct AccessSettings {
    /// Deadline of a single `Unmount` call.
    pub unmount_timeout: Duration,
    pub mountinfo_path: PathBuf,
    /// Mounts below it are not ignored.
    pub home_dir: Option<PathBuf>,
    /// Application id shown by the passphrase dialog.
    pub app_id: String,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            unmount_timeout: DEFAULT_UNMOUNT_TIMEOUT,
            mountinfo_path: PathBuf::from(DEFAULT_MOUNTINFO_PATH),
            home_dir: std::env::var_os("HOME").map(PathBuf::from),
            app_id: "solid".to_string(),
        }
    }
}

/// Everything the devices of one manager share.
#[derive(Clone)]
pub struct UDisksContext {
    pub(crate) daemon: Arc<dyn Daemon>,
    pub(crate) prompt: Arc<dyn PassphrasePrompt>,
    pub(crate) udev: Arc<solid_udev::Client>,
    pub(crate) objects: ObjectRegistry,
    pub(crate) bus: ActionBus,
    pub(crate) settings: Arc<AccessSettings>,
}

impl UDisksContext {
    pub fn new(
        daemon: Arc<dyn Daemon>,
        prompt: Arc<dyn PassphrasePrompt>,
        udev: Arc<solid_udev::Client>,
        settings: AccessSettings,
    ) -> Self {
        Self {
            objects: ObjectRegistry::new(Arc::clone(&daemon)),
            daemon,
            prompt,
            udev,
            bus: ActionBus::default(),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &AccessSettings {
        &self.settings
    }

    /// Drops cached properties of `path` and lets its storage access objects
    /// re-check accessibility.
    pub async fn device_changed(&self, path: &str) {
        self.objects.invalidate(path);
        self.bus.device_changed(path).await;
    }
}

/// Unlocked sibling of the container `udi`, found through the
/// `CryptoBackingDevice` back reference of every block device.
pub(crate) async fn cleartext_of(ctx: &UDisksContext, udi: &str) -> Option<String> {
    let siblings = match ctx.daemon.block_devices().await {
        Ok(siblings) => siblings,
        Err(e) => {
            warn!("Cannot enumerate block devices: {e}");
            return None;
        }
    };

    for path in siblings.into_iter().filter(|path| path != udi) {
        let properties = ctx.objects.get(&path).properties().await;
        if properties.crypto_backing_device().as_deref() == Some(udi) {
            return Some(path);
        }
    }
    None
}
