// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use solid_contracts::Block;

use crate::object::CachedObject;

pub struct UDisksBlock {
    object: Arc<CachedObject>,
}

impl UDisksBlock {
    pub(crate) fn new(object: Arc<CachedObject>) -> Self {
        Self { object }
    }

    async fn device_number(&self) -> u64 {
        self.object.properties().await.u64("DeviceNumber")
    }
}

#[async_trait]
impl Block for UDisksBlock {
    async fn device(&self) -> String {
        self.object.properties().await.string("Device")
    }

    async fn major(&self) -> u32 {
        nix::sys::stat::major(self.device_number().await) as u32
    }

    async fn minor(&self) -> u32 {
        nix::sys::stat::minor(self.device_number().await) as u32
    }
}
