// SPDX-License-Identifier: GPL-3.0-only

//! Capability operation sets.
//!
//! A backend device reports which [`DeviceInterfaceType`] tags it supports and
//! resolves each of them to a [`Capability`], which carries the operation set
//! for that tag.

mod power;
mod storage;

use std::sync::Arc;

use solid_types::DeviceInterfaceType;

pub use power::{Battery, Processor};
pub use storage::{Block, NetworkShare, StorageAccess, StorageDrive, StorageVolume};

#[derive(Clone)]
pub enum Capability {
    StorageAccess(Arc<dyn StorageAccess>),
    StorageDrive(Arc<dyn StorageDrive>),
    StorageVolume(Arc<dyn StorageVolume>),
    Block(Arc<dyn Block>),
    NetworkShare(Arc<dyn NetworkShare>),
    Processor(Arc<dyn Processor>),
    Battery(Arc<dyn Battery>),
}

impl Capability {
    pub fn interface_type(&self) -> DeviceInterfaceType {
        match self {
            Self::StorageAccess(_) => DeviceInterfaceType::StorageAccess,
            Self::StorageDrive(_) => DeviceInterfaceType::StorageDrive,
            Self::StorageVolume(_) => DeviceInterfaceType::StorageVolume,
            Self::Block(_) => DeviceInterfaceType::Block,
            Self::NetworkShare(_) => DeviceInterfaceType::NetworkShare,
            Self::Processor(_) => DeviceInterfaceType::Processor,
            Self::Battery(_) => DeviceInterfaceType::Battery,
        }
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Capability")
            .field(&self.interface_type())
            .finish()
    }
}
