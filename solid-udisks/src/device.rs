// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use solid_contracts::{BackendDevice, Capability};
use solid_types::{DeviceInterfaceType, DriveType};

use crate::context::cleartext_of;
use crate::drive::{drive_type_for, is_optical_drive};
use crate::object::CachedObject;
use crate::property::ObjectProperties;
use crate::{
    UDISKS_ROOT, UDisksBlock, UDisksContext, UDisksStorageAccess, UDisksStorageDrive,
    UDisksStorageVolume,
};

/// A UDisks2 block device or drive.
pub struct UDisksDevice {
    object: Arc<CachedObject>,
    ctx: UDisksContext,
}

impl UDisksDevice {
    pub(crate) fn new(udi: &str, ctx: UDisksContext) -> Self {
        Self {
            object: ctx.objects.get(udi),
            ctx,
        }
    }

    async fn properties(&self) -> Arc<ObjectProperties> {
        self.object.properties().await
    }

    /// The drive itself, or the drive holding this block device (through
    /// its encrypted container when it has none of its own).
    async fn drive_properties(&self) -> Option<Arc<ObjectProperties>> {
        let properties = self.properties().await;
        if properties.is_drive() {
            return Some(properties);
        }

        let drive = match properties.object_path("Drive") {
            Some(drive) => drive,
            None => {
                let parent = properties.crypto_backing_device()?;
                self.ctx
                    .objects
                    .get(&parent)
                    .properties()
                    .await
                    .object_path("Drive")?
            }
        };
        Some(self.ctx.objects.get(&drive).properties().await)
    }

    async fn is_storage_access(&self) -> bool {
        let properties = self.properties().await;
        properties.is_block()
            && (properties.is_filesystem() || properties.is_encrypted_container())
    }

    async fn is_storage_volume(&self) -> bool {
        let properties = self.properties().await;
        properties.is_block()
            && !properties.is_partition_table()
            && (properties.is_filesystem()
                || properties.is_encrypted_container()
                || properties.is_partition()
                || !properties.string("IdUsage").is_empty())
    }
}

fn drive_icon(drive: &ObjectProperties) -> &'static str {
    if is_optical_drive(drive) || drive.bool("Optical") {
        return "drive-optical";
    }
    match drive_type_for(drive) {
        DriveType::Floppy => "media-floppy",
        DriveType::CompactFlash
        | DriveType::MemoryStick
        | DriveType::SmartMedia
        | DriveType::SdMmc
        | DriveType::Xd => "media-flash",
        _ if drive.bool("MediaRemovable") || drive.bool("Removable") => {
            if drive.string("ConnectionBus") == "usb" {
                "drive-removable-media-usb"
            } else {
                "drive-removable-media"
            }
        }
        _ => "drive-harddisk",
    }
}

fn drive_description(drive: &ObjectProperties) -> String {
    let kind = if is_optical_drive(drive) || drive.bool("Optical") {
        "Optical Drive"
    } else if drive.bool("MediaRemovable") || drive.bool("Removable") {
        "Removable Drive"
    } else {
        "Hard Disk Drive"
    };
    with_size(drive.u64("Size"), kind)
}

fn with_size(bytes: u64, what: &str) -> String {
    if bytes == 0 {
        what.to_string()
    } else {
        format!("{} {what}", format_size(bytes))
    }
}

/// Decimal units, one fractional digit.
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[async_trait]
impl BackendDevice for UDisksDevice {
    fn udi(&self) -> String {
        self.object.path().to_string()
    }

    /// Partition table, then encrypted container, then drive.
    async fn parent_udi(&self) -> String {
        let properties = self.properties().await;
        if properties.is_drive() {
            return UDISKS_ROOT.to_string();
        }

        properties
            .object_path("Table")
            .or_else(|| properties.crypto_backing_device())
            .or_else(|| properties.object_path("Drive"))
            .unwrap_or_else(|| UDISKS_ROOT.to_string())
    }

    async fn vendor(&self) -> String {
        self.drive_properties()
            .await
            .map(|drive| drive.string("Vendor"))
            .unwrap_or_default()
    }

    async fn product(&self) -> String {
        let properties = self.properties().await;
        if !properties.is_drive() {
            let label = properties.string("IdLabel");
            if !label.is_empty() {
                return label;
            }
        }
        match self.drive_properties().await {
            Some(drive) => drive.string("Model"),
            None => properties.string("Device"),
        }
    }

    async fn icon(&self) -> String {
        let properties = self.properties().await;
        let drive = self.drive_properties().await;

        if !properties.is_drive()
            && let Some(drive) = &drive
            && (is_optical_drive(drive) || drive.bool("Optical"))
            && drive.bool("MediaAvailable")
        {
            return "media-optical".to_string();
        }

        drive
            .as_deref()
            .map(drive_icon)
            .unwrap_or("drive-harddisk")
            .to_string()
    }

    async fn emblems(&self) -> Vec<String> {
        let properties = self.properties().await;
        if properties.is_encrypted_container() {
            let emblem = match cleartext_of(&self.ctx, self.object.path()).await {
                Some(_) => "emblem-unlocked",
                None => "emblem-locked",
            };
            return vec![emblem.to_string()];
        }
        if properties.is_filesystem() {
            let emblem = if properties.is_mounted() {
                "emblem-mounted"
            } else {
                "emblem-unmounted"
            };
            return vec![emblem.to_string()];
        }
        Vec::new()
    }

    async fn description(&self) -> String {
        let properties = self.properties().await;
        if properties.is_drive() {
            return drive_description(&properties);
        }

        let size = properties.u64("Size");
        if properties.is_encrypted_container() {
            return with_size(size, "Encrypted Container");
        }
        if properties.is_partition_table() {
            return with_size(size, "Partition Table");
        }

        let label = properties.string("IdLabel");
        if !label.is_empty() {
            return label;
        }
        if properties.is_filesystem() {
            return with_size(size, "Volume");
        }
        with_size(size, "Block Device")
    }

    async fn query_device_interface(&self, interface: DeviceInterfaceType) -> bool {
        match interface {
            DeviceInterfaceType::GenericInterface => true,
            DeviceInterfaceType::Block => self.properties().await.is_block(),
            DeviceInterfaceType::StorageDrive => self.properties().await.is_drive(),
            DeviceInterfaceType::StorageVolume => self.is_storage_volume().await,
            DeviceInterfaceType::StorageAccess => self.is_storage_access().await,
            _ => false,
        }
    }

    async fn create_device_interface(
        &self,
        interface: DeviceInterfaceType,
    ) -> Option<Capability> {
        if !self.query_device_interface(interface).await {
            return None;
        }

        let object = Arc::clone(&self.object);
        match interface {
            DeviceInterfaceType::Block => Some(Capability::Block(Arc::new(UDisksBlock::new(object)))),
            DeviceInterfaceType::StorageDrive => Some(Capability::StorageDrive(Arc::new(
                UDisksStorageDrive::new(object, self.ctx.clone()),
            ))),
            DeviceInterfaceType::StorageVolume => Some(Capability::StorageVolume(Arc::new(
                UDisksStorageVolume::new(object),
            ))),
            DeviceInterfaceType::StorageAccess => Some(Capability::StorageAccess(Arc::new(
                UDisksStorageAccess::new(self.object.path(), self.ctx.clone()).await,
            ))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDaemon, context, drive, filesystem_block, luks_block, table_block};

    const DRIVE: &str = "/org/freedesktop/UDisks2/drives/Kingston";
    const SDB: &str = "/org/freedesktop/UDisks2/block_devices/sdb";
    const SDB1: &str = "/org/freedesktop/UDisks2/block_devices/sdb1";
    const SDB2: &str = "/org/freedesktop/UDisks2/block_devices/sdb2";

    fn daemon() -> Arc<FakeDaemon> {
        FakeDaemon::with_objects([
            (DRIVE, drive().removable(true).usb().size(32_000_000_000).build()),
            (SDB, table_block("/dev/sdb", Some(DRIVE)).build()),
            (SDB1, filesystem_block("/dev/sdb1", Some(DRIVE)).partition_of(SDB).label("STICK").build()),
            (SDB2, luks_block("/dev/sdb2", Some(DRIVE)).partition_of(SDB).size(8_000_000_000).build()),
        ])
    }

    #[tokio::test]
    async fn parents_follow_table_then_drive() {
        let ctx = context(daemon());
        assert_eq!(UDisksDevice::new(SDB1, ctx.clone()).parent_udi().await, SDB);
        assert_eq!(UDisksDevice::new(SDB, ctx.clone()).parent_udi().await, DRIVE);
        assert_eq!(UDisksDevice::new(DRIVE, ctx).parent_udi().await, UDISKS_ROOT);
    }

    #[tokio::test]
    async fn interfaces_by_object_kind() {
        let ctx = context(daemon());
        let drive = UDisksDevice::new(DRIVE, ctx.clone());
        let table = UDisksDevice::new(SDB, ctx.clone());
        let volume = UDisksDevice::new(SDB1, ctx.clone());
        let container = UDisksDevice::new(SDB2, ctx);

        assert!(drive.query_device_interface(DeviceInterfaceType::StorageDrive).await);
        assert!(!drive.query_device_interface(DeviceInterfaceType::Block).await);
        assert!(table.query_device_interface(DeviceInterfaceType::Block).await);
        assert!(!table.query_device_interface(DeviceInterfaceType::StorageVolume).await);
        assert!(!table.query_device_interface(DeviceInterfaceType::StorageAccess).await);
        assert!(volume.query_device_interface(DeviceInterfaceType::StorageAccess).await);
        assert!(volume.query_device_interface(DeviceInterfaceType::StorageVolume).await);
        assert!(container.query_device_interface(DeviceInterfaceType::StorageAccess).await);
        assert!(!volume.query_device_interface(DeviceInterfaceType::Battery).await);

        assert!(matches!(
            volume.create_device_interface(DeviceInterfaceType::StorageAccess).await,
            Some(Capability::StorageAccess(_))
        ));
        assert!(drive.create_device_interface(DeviceInterfaceType::StorageVolume).await.is_none());
    }

    #[tokio::test]
    async fn presentation() {
        let ctx = context(daemon());
        let drive = UDisksDevice::new(DRIVE, ctx.clone());
        let volume = UDisksDevice::new(SDB1, ctx.clone());
        let container = UDisksDevice::new(SDB2, ctx);

        assert_eq!(drive.icon().await, "drive-removable-media-usb");
        assert_eq!(drive.description().await, "32.0 GB Removable Drive");
        assert_eq!(drive.vendor().await, "Kingston");

        assert_eq!(volume.product().await, "STICK");
        assert_eq!(volume.description().await, "STICK");
        assert_eq!(volume.emblems().await, vec!["emblem-unmounted"]);
        assert_eq!(volume.vendor().await, "Kingston");

        assert_eq!(container.description().await, "8.0 GB Encrypted Container");
        assert_eq!(container.emblems().await, vec!["emblem-locked"]);
    }

    #[test]
    fn sizes_use_decimal_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1_500_000), "1.5 MB");
        assert_eq!(format_size(500_107_862_016), "500.1 GB");
    }
}
