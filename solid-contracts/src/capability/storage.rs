// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use solid_types::{Bus, DriveType, ShareType, UsageType};

use crate::{StorageAccessEvent, Subscription};

/// Mount/unmount access to a storage device.
///
/// `setup` and `teardown` return once the request has been dispatched; the
/// outcome arrives as a `SetupDone`/`TeardownDone` event. Both return `false`
/// without doing anything while another action is in flight on the device.
#[async_trait]
pub trait StorageAccess: Send + Sync {
    async fn is_accessible(&self) -> bool;

    /// Mount point of the device, empty when not mounted.
    async fn file_path(&self) -> String;

    /// Whether the device should be hidden from regular users.
    async fn is_ignored(&self) -> bool;

    async fn is_encrypted(&self) -> bool;

    async fn setup(&self) -> bool;

    async fn teardown(&self) -> bool;

    fn subscribe(&self) -> Subscription<StorageAccessEvent>;
}

#[async_trait]
pub trait StorageDrive: Send + Sync {
    async fn size(&self) -> u64;
    async fn is_hotpluggable(&self) -> bool;
    async fn is_removable(&self) -> bool;
    async fn drive_type(&self) -> DriveType;
    async fn bus(&self) -> Bus;
}

#[async_trait]
pub trait StorageVolume: Send + Sync {
    async fn fs_type(&self) -> String;
    async fn label(&self) -> String;
    async fn uuid(&self) -> String;
    async fn size(&self) -> u64;
    async fn usage(&self) -> UsageType;
    async fn is_ignored(&self) -> bool;

    /// UDI of the encrypted container backing this volume, empty otherwise.
    async fn encrypted_container_udi(&self) -> String;
}

#[async_trait]
pub trait Block: Send + Sync {
    /// Device file, e.g. `/dev/sda1`.
    async fn device(&self) -> String;
    async fn major(&self) -> u32;
    async fn minor(&self) -> u32;
}

#[async_trait]
pub trait NetworkShare: Send + Sync {
    async fn share_type(&self) -> ShareType;
    async fn url(&self) -> Option<String>;
}
