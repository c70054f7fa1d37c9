// SPDX-License-Identifier: GPL-3.0-only

pub mod capability;
pub mod device;
pub mod error;
pub mod event;
pub mod notifier;

pub use capability::{
    Battery, Block, Capability, NetworkShare, Processor, StorageAccess, StorageDrive,
    StorageVolume,
};
pub use device::{BackendDevice, DeviceManager};
pub use error::SolidError;
pub use event::{DeviceEvent, StorageAccessEvent};
pub use notifier::{Notifier, Subscription};
