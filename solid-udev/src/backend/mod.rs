// SPDX-License-Identifier: GPL-3.0-only

mod device;
mod manager;
mod processor;

pub use device::UdevBackendDevice;
pub use manager::{UDEV_UDI_PREFIX, UdevManager};
pub use processor::UdevProcessor;
