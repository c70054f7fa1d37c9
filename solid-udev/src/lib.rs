// SPDX-License-Identifier: GPL-3.0-only

//! udev access without libudev.
//!
//! Devices are read straight from sysfs and the udev database
//! (`/run/udev/data`), and hotplug events come from the
//! `NETLINK_KOBJECT_UEVENT` socket. The [`backend`] module exposes the
//! devices udev alone can describe (processors) as a Solid backend.

pub mod backend;
mod client;
mod device;
mod error;
mod monitor;

pub use backend::{UDEV_UDI_PREFIX, UdevManager};
pub use client::{Client, DEFAULT_SYSFS_ROOT, DEFAULT_UDEV_DATA_ROOT};
pub use device::UdevDevice;
pub use error::UdevError;
pub use monitor::{Monitor, UdevAction, UdevEvent};
