// SPDX-License-Identifier: GPL-3.0-only

//! Fake hardware backend.
//!
//! Devices come from a TOML description with one `[[device]]` table per
//! device. Capabilities read their answers from the device's `properties`
//! table, and the storage access flips `isMounted` instead of mounting.

mod capability;
mod device;
mod error;
mod hardware;
mod manager;

pub use capability::{
    FakeBattery, FakeBlock, FakeNetworkShare, FakeProcessor, FakeStorageAccess, FakeStorageDrive,
    FakeStorageVolume,
};
pub use device::FakeDevice;
pub use error::FakeError;
pub use hardware::{FakeDeviceSpec, FakeHardware};
pub use manager::{FAKE_UDI_PREFIX, FakeManager};

/// A small laptop with a disk, a USB stick, a network share and a battery.
pub const FAKE_COMPUTER: &str = include_str!("../data/fakecomputer.toml");
