// SPDX-License-Identifier: GPL-3.0-only

//! Plain data shared by every Solid backend and by the frontend.
//!
//! Nothing in here talks to a platform service. The types describe
//! capability tags, the error kinds reported by storage actions and the
//! enumerations exposed by the individual capabilities:
//!
//! - `DeviceInterfaceType` → the capability tag a device may support
//! - `ErrorType` → outcome of a setup/teardown request
//! - `DriveType`, `Bus`, `UsageType`, `ShareType` → storage details
//! - `BatteryType`, `ChargeState` → power supply details
//! - `InhibitionType`, `InhibitionState` → power management inhibition

pub mod battery;
pub mod device_interface;
pub mod error;
pub mod inhibition;
pub mod storage;

pub use battery::{BatteryType, ChargeState};
pub use device_interface::DeviceInterfaceType;
pub use error::ErrorType;
pub use inhibition::{InhibitionState, InhibitionType};
pub use storage::{Bus, DriveType, ShareType, UsageType};
