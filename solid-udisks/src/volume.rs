// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use solid_contracts::StorageVolume;
use solid_types::UsageType;

use crate::object::CachedObject;
use crate::property::ObjectProperties;

pub struct UDisksStorageVolume {
    object: Arc<CachedObject>,
}

impl UDisksStorageVolume {
    pub(crate) fn new(object: Arc<CachedObject>) -> Self {
        Self { object }
    }
}

pub(crate) fn usage_for(block: &ObjectProperties) -> UsageType {
    if block.is_partition_table() {
        return UsageType::PartitionTable;
    }
    UsageType::from_id_usage(&block.string("IdUsage"))
}

#[async_trait]
impl StorageVolume for UDisksStorageVolume {
    async fn fs_type(&self) -> String {
        self.object.properties().await.string("IdType")
    }

    async fn label(&self) -> String {
        let block = self.object.properties().await;
        let label = block.string("IdLabel");
        if label.is_empty() {
            block.string("Name")
        } else {
            label
        }
    }

    async fn uuid(&self) -> String {
        self.object.properties().await.string("IdUUID")
    }

    async fn size(&self) -> u64 {
        self.object.properties().await.u64("Size")
    }

    async fn usage(&self) -> UsageType {
        usage_for(&*self.object.properties().await)
    }

    async fn is_ignored(&self) -> bool {
        let block = self.object.properties().await;
        block.bool("HintIgnore") || block.string("IdType") == "swap"
    }

    async fn encrypted_container_udi(&self) -> String {
        self.object
            .properties()
            .await
            .crypto_backing_device()
            .unwrap_or_default()
    }
}
