// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use solid_contracts::NetworkShare;
use solid_types::ShareType;

pub struct FstabNetworkShare {
    device: String,
    fs_type: String,
}

impl FstabNetworkShare {
    pub(crate) fn new(device: String, fs_type: String) -> Self {
        Self { device, fs_type }
    }
}

#[async_trait]
impl NetworkShare for FstabNetworkShare {
    async fn share_type(&self) -> ShareType {
        if self.device.starts_with("//") {
            return ShareType::Cifs;
        }
        ShareType::from_fs_type(&self.fs_type)
    }

    async fn url(&self) -> Option<String> {
        share_url(&self.device, self.share_type().await)
    }
}

fn share_url(device: &str, share_type: ShareType) -> Option<String> {
    match share_type {
        ShareType::Nfs => {
            let (host, path) = device.split_once(':')?;
            Some(format!("nfs://{host}{path}"))
        }
        ShareType::Cifs => Some(format!("smb:{}", device.replace('\\', "/"))),
        ShareType::Unknown | ShareType::Upnp => None,
    }
}
