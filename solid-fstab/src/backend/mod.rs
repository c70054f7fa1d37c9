// SPDX-License-Identifier: GPL-3.0-only

mod access;
mod device;
mod manager;
mod share;

use std::sync::Arc;

use solid_contracts::Notifier;

use crate::{CommandRunner, MountTableCache};

pub use access::FstabStorageAccess;
pub use device::FstabDevice;
pub use manager::{FSTAB_UDI_PREFIX, FstabManager};
pub use share::FstabNetworkShare;

/// State shared by the manager and every device it hands out.
#[derive(Clone)]
pub(crate) struct FstabContext {
    pub(crate) cache: Arc<MountTableCache>,
    pub(crate) runner: Arc<dyn CommandRunner>,
    /// Fired after the live mount table was flushed.
    pub(crate) mtab_changed: Notifier<()>,
}
