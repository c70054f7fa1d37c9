// SPDX-License-Identifier: GPL-3.0-only

//! Static (`/etc/fstab`) and live (`/proc/self/mountinfo`) mount tables.
//!
//! [`MountTableCache`] keeps network shares and a few supported pseudo
//! filesystems from both tables. The [`backend`] module turns those entries
//! into Solid devices that can be mounted with the system `mount` tool.

pub mod backend;
mod cache;
mod command;
mod error;
pub mod table;
mod watcher;

pub use backend::{FSTAB_UDI_PREFIX, FstabManager};
pub use cache::MountTableCache;
pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use error::FstabError;
pub use watcher::{MountTableChange, MountTableWatcher};
