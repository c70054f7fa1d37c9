// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use solid_contracts::StorageDrive;
use solid_types::{Bus, DriveType};
use solid_udev::UdevDevice;

use crate::UDisksContext;
use crate::object::CachedObject;
use crate::property::ObjectProperties;

pub struct UDisksStorageDrive {
    drive: Arc<CachedObject>,
    ctx: UDisksContext,
}

impl UDisksStorageDrive {
    pub(crate) fn new(drive: Arc<CachedObject>, ctx: UDisksContext) -> Self {
        Self { drive, ctx }
    }

    /// udev view of the whole-disk block device of this drive.
    async fn udev_device(&self) -> Option<UdevDevice> {
        let blocks = self.ctx.daemon.block_devices().await.ok()?;
        for path in blocks {
            let block = self.ctx.objects.get(&path).properties().await;
            if block.object_path("Drive").as_deref() == Some(self.drive.path())
                && !block.is_partition()
            {
                return self.ctx.udev.device_by_device_file(&block.string("Device"));
            }
        }
        None
    }
}

#[async_trait]
impl StorageDrive for UDisksStorageDrive {
    async fn size(&self) -> u64 {
        self.drive.properties().await.u64("Size")
    }

    async fn is_hotpluggable(&self) -> bool {
        if matches!(self.bus().await, Bus::Usb | Bus::Ieee1394) {
            return true;
        }
        self.udev_device()
            .await
            .and_then(|device| device.property_bool("UDISKS_SYSTEM"))
            .is_some_and(|system| !system)
    }

    async fn is_removable(&self) -> bool {
        let drive = self.drive.properties().await;
        drive.bool("MediaRemovable") || drive.bool("Removable")
    }

    async fn drive_type(&self) -> DriveType {
        drive_type_for(&*self.drive.properties().await)
    }

    async fn bus(&self) -> Bus {
        let drive = self.drive.properties().await;
        let udev = self.udev_device().await;
        bus_for(
            &drive.string("ConnectionBus"),
            udev.as_ref().and_then(|device| device.property("ID_BUS")),
            udev.as_ref()
                .and_then(|device| device.property("ID_ATA_SATA"))
                == Some("1"),
        )
    }
}

pub(crate) fn is_optical_drive(drive: &ObjectProperties) -> bool {
    drive
        .strings("MediaCompatibility")
        .iter()
        .any(|media| media.starts_with("optical"))
}

pub(crate) fn drive_type_for(drive: &ObjectProperties) -> DriveType {
    if is_optical_drive(drive) {
        return DriveType::CdromDrive;
    }

    let compatibility = drive.strings("MediaCompatibility");
    let supports = |media: &str| compatibility.iter().any(|m| m == media);
    if supports("floppy") {
        DriveType::Floppy
    } else if supports("flash_cf") {
        DriveType::CompactFlash
    } else if supports("flash_ms") {
        DriveType::MemoryStick
    } else if supports("flash_sm") {
        DriveType::SmartMedia
    } else if ["flash_sd", "flash_sdhc", "flash_mmc", "flash_sdxc"]
        .into_iter()
        .any(supports)
    {
        DriveType::SdMmc
    } else {
        DriveType::HardDisk
    }
}

pub(crate) fn bus_for(connection_bus: &str, udev_bus: Option<&str>, ata_sata: bool) -> Bus {
    match (udev_bus, connection_bus) {
        (Some("ata"), _) if ata_sata => Bus::Sata,
        (Some("ata"), _) => Bus::Ide,
        (_, "usb") => Bus::Usb,
        (_, "ieee1394") => Bus::Ieee1394,
        (Some("scsi"), _) => Bus::Scsi,
        _ => Bus::Platform,
    }
}
