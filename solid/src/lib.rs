// SPDX-License-Identifier: GPL-3.0-only

//! Hardware discovery and storage access.
//!
//! [`DeviceNotifier`] starts the backends selected in [`config::SolidConfig`]
//! and hands out [`Device`] handles. Each device exposes capabilities such
//! as storage access or processor details, and [`power::Power`] takes
//! sleep and shutdown inhibitor locks.

mod backends;
pub mod config;
mod device;
pub mod logging;
mod notifier;
pub mod power;

pub use device::Device;
pub use notifier::DeviceNotifier;

pub use solid_contracts::{
    Battery, Block, Capability, DeviceEvent, DeviceManager, NetworkShare, Processor, SolidError,
    StorageAccess, StorageAccessEvent, StorageDrive, StorageVolume, Subscription,
};
pub use solid_types::{
    BatteryType, Bus, ChargeState, DeviceInterfaceType, DriveType, ErrorType, InhibitionState,
    InhibitionType, ShareType, UsageType,
};
