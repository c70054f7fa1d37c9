// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use anyhow::Context;
use solid_contracts::DeviceManager;
use solid_fake::FakeManager;
use solid_fstab::{FstabManager, MountTableCache, SystemCommandRunner};
use solid_udev::{Client, UdevManager};
use solid_udisks::UDisksManager;
use tracing::{info, warn};

use crate::config::{Backend, SolidConfig};

/// Starts the configured backends. A fake hardware description replaces
/// all of them; otherwise a backend that cannot start is logged and left
/// out.
pub(crate) async fn start(config: &SolidConfig) -> anyhow::Result<Vec<Arc<dyn DeviceManager>>> {
    if let Some(path) = &config.fake_hardware {
        let manager = FakeManager::from_file(path)
            .with_context(|| format!("Failed to load fake hardware {}", path.display()))?;
        info!("Using fake hardware from {}", path.display());
        return Ok(vec![Arc::new(manager)]);
    }

    let mut managers: Vec<Arc<dyn DeviceManager>> = Vec::new();
    for backend in &config.backends {
        match backend {
            Backend::Udisks2 => {
                match UDisksManager::connect(config.access_settings(), &config.prompt_service).await
                {
                    Ok(manager) => managers.push(Arc::new(manager)),
                    Err(e) => warn!("UDisks2 backend disabled: {e}"),
                }
            }
            Backend::Udev => {
                let client = || Client::with_roots(&config.sysfs_root, &config.udev_data_root);
                match UdevManager::with_monitor(client()) {
                    Ok(manager) => managers.push(Arc::new(manager)),
                    Err(e) => {
                        warn!("No udev monitor, processors will not be updated: {e}");
                        managers.push(Arc::new(UdevManager::new(client())));
                    }
                }
            }
            Backend::Fstab => {
                let cache = Arc::new(MountTableCache::new(&config.fstab_path, &config.mtab_path));
                managers.push(Arc::new(FstabManager::with_watcher(
                    cache,
                    Arc::new(SystemCommandRunner),
                )));
            }
        }
    }

    if managers.is_empty() && !config.backends.is_empty() {
        anyhow::bail!("No hardware backend could be started");
    }
    Ok(managers)
}
