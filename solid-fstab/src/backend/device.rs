// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use solid_contracts::{BackendDevice, Capability};
use solid_types::DeviceInterfaceType;

use super::{FSTAB_UDI_PREFIX, FstabContext, FstabNetworkShare, FstabStorageAccess};
use crate::table::is_network_file_system;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Nfs,
    Cifs,
    Encrypted,
    Overlay,
    Other,
}

/// The fstab root or one of its mount-table entries.
pub struct FstabDevice {
    udi: String,
    /// Cache key of the entry; `None` for the root device.
    device: Option<String>,
    ctx: FstabContext,
}

impl FstabDevice {
    pub(crate) fn root(ctx: FstabContext) -> Self {
        Self {
            udi: FSTAB_UDI_PREFIX.to_string(),
            device: None,
            ctx,
        }
    }

    pub(crate) fn entry(device: String, ctx: FstabContext) -> Self {
        Self {
            udi: udi_for(&device),
            device: Some(device),
            ctx,
        }
    }

    fn fs_type(&self) -> String {
        self.device
            .as_deref()
            .and_then(|device| self.ctx.cache.fs_type(device))
            .unwrap_or_default()
    }

    fn kind(&self) -> EntryKind {
        let Some(device) = self.device.as_deref() else {
            return EntryKind::Other;
        };
        let fs_type = self.fs_type();
        match fs_type.as_str() {
            _ if device.starts_with("//") => EntryKind::Cifs,
            "nfs" | "nfs4" => EntryKind::Nfs,
            "cifs" | "smbfs" => EntryKind::Cifs,
            "fuse.encfs" | "fuse.cryfs" => EntryKind::Encrypted,
            "overlay" => EntryKind::Overlay,
            _ => EntryKind::Other,
        }
    }

    fn is_network_share(&self) -> bool {
        self.device
            .as_deref()
            .is_some_and(|device| is_network_file_system(&self.fs_type(), device))
    }

    fn is_mounted(&self) -> bool {
        self.device
            .as_deref()
            .is_some_and(|device| !self.ctx.cache.current_mount_points(device).is_empty())
    }

    fn mount_point(&self) -> String {
        self.device
            .as_deref()
            .and_then(|device| self.ctx.cache.mount_points(device).into_iter().next())
            .unwrap_or_default()
    }
}

pub(crate) fn udi_for(device: &str) -> String {
    format!("{FSTAB_UDI_PREFIX}/{device}")
}

/// Splits `host:/path` and `//host/share` into host and remote path.
fn split_remote(device: &str) -> Option<(&str, &str)> {
    if let Some(rest) = device.strip_prefix("//") {
        return Some(rest.split_once('/').unwrap_or((rest, "")));
    }
    device.split_once(':')
}

#[async_trait]
impl BackendDevice for FstabDevice {
    fn udi(&self) -> String {
        self.udi.clone()
    }

    async fn parent_udi(&self) -> String {
        match self.device {
            Some(_) => FSTAB_UDI_PREFIX.to_string(),
            None => String::new(),
        }
    }

    async fn vendor(&self) -> String {
        match self.device.as_deref() {
            Some(device) if self.is_network_share() => split_remote(device)
                .map(|(host, _)| host.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    async fn product(&self) -> String {
        match self.device.as_deref() {
            None => "Network Shares".to_string(),
            Some(device) if self.is_network_share() => split_remote(device)
                .map(|(_, path)| path.to_string())
                .unwrap_or_else(|| device.to_string()),
            Some(_) => self.mount_point(),
        }
    }

    async fn icon(&self) -> String {
        let icon = match self.kind() {
            _ if self.device.is_none() => "folder-remote",
            EntryKind::Nfs => "network-server",
            EntryKind::Cifs => "network-workgroup",
            EntryKind::Encrypted if self.is_mounted() => "folder-decrypted",
            EntryKind::Encrypted => "folder-encrypted",
            EntryKind::Overlay | EntryKind::Other => "folder",
        };
        icon.to_string()
    }

    async fn emblems(&self) -> Vec<String> {
        if self.device.is_some() && self.is_mounted() {
            vec!["emblem-mounted".to_string()]
        } else {
            Vec::new()
        }
    }

    async fn description(&self) -> String {
        match self.kind() {
            _ if self.device.is_none() => "Network Shares".to_string(),
            EntryKind::Nfs | EntryKind::Cifs => {
                format!("{} on {}", self.product().await, self.vendor().await)
            }
            EntryKind::Encrypted => format!("Encrypted folder {}", self.mount_point()),
            EntryKind::Overlay => format!("Overlay {}", self.mount_point()),
            EntryKind::Other => self.product().await,
        }
    }

    async fn query_device_interface(&self, interface: DeviceInterfaceType) -> bool {
        match interface {
            DeviceInterfaceType::GenericInterface => true,
            DeviceInterfaceType::StorageAccess => self.device.is_some(),
            DeviceInterfaceType::NetworkShare => self.is_network_share(),
            _ => false,
        }
    }

    async fn create_device_interface(
        &self,
        interface: DeviceInterfaceType,
    ) -> Option<Capability> {
        let device = self.device.clone()?;
        match interface {
            DeviceInterfaceType::StorageAccess => Some(Capability::StorageAccess(Arc::new(
                FstabStorageAccess::new(self.udi.clone(), device, self.ctx.clone()),
            ))),
            DeviceInterfaceType::NetworkShare if self.is_network_share() => Some(
                Capability::NetworkShare(Arc::new(FstabNetworkShare::new(device, self.fs_type()))),
            ),
            _ => None,
        }
    }
}
