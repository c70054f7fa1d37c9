// SPDX-License-Identifier: GPL-3.0-only

//! Capabilities backed by the `properties` table of a fake device.

use std::sync::Arc;

use async_trait::async_trait;
use solid_contracts::{
    Battery, Block, NetworkShare, Processor, StorageAccess, StorageAccessEvent, StorageDrive,
    StorageVolume, Subscription,
};
use solid_types::{BatteryType, Bus, ChargeState, DriveType, ErrorType, ShareType, UsageType};
use tracing::{debug, info};

use crate::device::FakeDeviceData;

const BROKEN_MESSAGE: &str = "Device is broken";

/// Flips `isMounted` and reports like a real storage access would.
pub struct FakeStorageAccess {
    data: Arc<FakeDeviceData>,
}

impl FakeStorageAccess {
    pub(crate) fn new(data: Arc<FakeDeviceData>) -> Self {
        Self { data }
    }

    fn udi(&self) -> String {
        self.data.spec.udi.clone()
    }

    fn run(&self, mount: bool) -> bool {
        if self.data.bool("isMounted") == mount {
            debug!("{} already {}", self.udi(), if mount { "mounted" } else { "unmounted" });
            return false;
        }

        let udi = self.udi();
        let events = &self.data.access_events;
        events.emit(if mount {
            StorageAccessEvent::SetupRequested { udi: udi.clone() }
        } else {
            StorageAccessEvent::TeardownRequested { udi: udi.clone() }
        });

        let (error, message) = if self.data.is_broken() {
            info!("{udi} is broken, refusing to {}", if mount { "mount" } else { "unmount" });
            (ErrorType::OperationFailed, BROKEN_MESSAGE.to_string())
        } else {
            self.data.set_property("isMounted", toml::Value::Boolean(mount));
            events.emit(StorageAccessEvent::AccessibilityChanged {
                accessible: mount,
                udi: udi.clone(),
            });
            (ErrorType::NoError, String::new())
        };

        events.emit(if mount {
            StorageAccessEvent::SetupDone {
                error,
                message,
                udi,
            }
        } else {
            StorageAccessEvent::TeardownDone {
                error,
                message,
                udi,
            }
        });
        true
    }
}

#[async_trait]
impl StorageAccess for FakeStorageAccess {
    async fn is_accessible(&self) -> bool {
        self.data.bool("isMounted")
    }

    async fn file_path(&self) -> String {
        if self.data.bool("isMounted") {
            self.data.string("filePath")
        } else {
            String::new()
        }
    }

    async fn is_ignored(&self) -> bool {
        self.data.bool("isIgnored")
    }

    async fn is_encrypted(&self) -> bool {
        self.data.bool("isEncrypted")
    }

    async fn setup(&self) -> bool {
        self.run(true)
    }

    async fn teardown(&self) -> bool {
        self.run(false)
    }

    fn subscribe(&self) -> Subscription<StorageAccessEvent> {
        self.data.access_events.subscribe()
    }
}

pub struct FakeNetworkShare {
    data: Arc<FakeDeviceData>,
}

impl FakeNetworkShare {
    pub(crate) fn new(data: Arc<FakeDeviceData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl NetworkShare for FakeNetworkShare {
    async fn share_type(&self) -> ShareType {
        match self.data.string("type").as_str() {
            "nfs" => ShareType::Nfs,
            "cifs" | "smb3" => ShareType::Cifs,
            _ => ShareType::Unknown,
        }
    }

    async fn url(&self) -> Option<String> {
        Some(self.data.string("url")).filter(|url| !url.is_empty())
    }
}

pub struct FakeStorageDrive {
    data: Arc<FakeDeviceData>,
}

impl FakeStorageDrive {
    pub(crate) fn new(data: Arc<FakeDeviceData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl StorageDrive for FakeStorageDrive {
    async fn size(&self) -> u64 {
        self.data.u64("size")
    }

    async fn is_hotpluggable(&self) -> bool {
        self.data.bool("isHotpluggable")
    }

    async fn is_removable(&self) -> bool {
        self.data.bool("isRemovable")
    }

    async fn drive_type(&self) -> DriveType {
        match self.data.string("driveType").as_str() {
            "cdrom" => DriveType::CdromDrive,
            "floppy" => DriveType::Floppy,
            "tape" => DriveType::Tape,
            "compact_flash" => DriveType::CompactFlash,
            "memory_stick" => DriveType::MemoryStick,
            "smart_media" => DriveType::SmartMedia,
            "sd_mmc" => DriveType::SdMmc,
            "xd" => DriveType::Xd,
            _ => DriveType::HardDisk,
        }
    }

    async fn bus(&self) -> Bus {
        match self.data.string("bus").as_str() {
            "ide" => Bus::Ide,
            "usb" => Bus::Usb,
            "ieee1394" => Bus::Ieee1394,
            "scsi" => Bus::Scsi,
            "sata" => Bus::Sata,
            _ => Bus::Platform,
        }
    }
}

pub struct FakeStorageVolume {
    data: Arc<FakeDeviceData>,
}

impl FakeStorageVolume {
    pub(crate) fn new(data: Arc<FakeDeviceData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl StorageVolume for FakeStorageVolume {
    async fn fs_type(&self) -> String {
        self.data.string("fsType")
    }

    async fn label(&self) -> String {
        self.data.string("label")
    }

    async fn uuid(&self) -> String {
        self.data.string("uuid")
    }

    async fn size(&self) -> u64 {
        self.data.u64("size")
    }

    async fn usage(&self) -> UsageType {
        match self.data.string("usage").as_str() {
            "partitiontable" => UsageType::PartitionTable,
            usage => UsageType::from_id_usage(usage),
        }
    }

    async fn is_ignored(&self) -> bool {
        self.data.bool("isIgnored")
    }

    async fn encrypted_container_udi(&self) -> String {
        self.data.string("encryptedContainerUdi")
    }
}

pub struct FakeBlock {
    data: Arc<FakeDeviceData>,
}

impl FakeBlock {
    pub(crate) fn new(data: Arc<FakeDeviceData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl Block for FakeBlock {
    async fn device(&self) -> String {
        self.data.string("device")
    }

    async fn major(&self) -> u32 {
        self.data.u32("major")
    }

    async fn minor(&self) -> u32 {
        self.data.u32("minor")
    }
}

pub struct FakeProcessor {
    data: Arc<FakeDeviceData>,
}

impl FakeProcessor {
    pub(crate) fn new(data: Arc<FakeDeviceData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl Processor for FakeProcessor {
    async fn number(&self) -> u32 {
        self.data.u32("number")
    }

    async fn max_speed(&self) -> u32 {
        self.data.u32("maxSpeed")
    }

    async fn can_change_frequency(&self) -> bool {
        self.data.bool("canChangeFrequency")
    }
}

pub struct FakeBattery {
    data: Arc<FakeDeviceData>,
}

impl FakeBattery {
    pub(crate) fn new(data: Arc<FakeDeviceData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl Battery for FakeBattery {
    async fn is_present(&self) -> bool {
        self.data.bool("isPresent")
    }

    async fn battery_type(&self) -> BatteryType {
        match self.data.string("batteryType").as_str() {
            "primary" => BatteryType::Primary,
            "mouse" => BatteryType::Mouse,
            "keyboard" => BatteryType::Keyboard,
            "keyboard_mouse" => BatteryType::KeyboardMouse,
            "camera" => BatteryType::Camera,
            "phone" => BatteryType::Phone,
            "monitor" => BatteryType::Monitor,
            "gaming" => BatteryType::Gaming,
            _ => BatteryType::Unknown,
        }
    }

    async fn charge_percent(&self) -> u32 {
        self.data.u32("chargePercent").min(100)
    }

    async fn capacity(&self) -> u32 {
        self.data.u32("capacity")
    }

    async fn is_rechargeable(&self) -> bool {
        self.data.bool("isRechargeable")
    }

    async fn is_power_supply(&self) -> bool {
        self.data.bool("isPowerSupply")
    }

    async fn charge_state(&self) -> ChargeState {
        match self.data.string("chargeState").as_str() {
            "charging" => ChargeState::Charging,
            "discharging" => ChargeState::Discharging,
            "fullyCharged" => ChargeState::FullyCharged,
            _ => ChargeState::NoCharge,
        }
    }
}
