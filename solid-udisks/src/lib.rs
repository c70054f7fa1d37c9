// SPDX-License-Identifier: GPL-3.0-only

//! UDisks2 backend: block devices and drives exported by the UDisks2
//! daemon on the system bus.
//!
//! Every call into the daemon goes through the [`Daemon`] trait, and the
//! passphrase dialog through [`PassphrasePrompt`], so the storage access
//! state machine in [`UDisksStorageAccess`] runs the same against the real
//! bus and against test doubles.

mod access;
mod action_bus;
mod block;
mod context;
mod daemon;
mod device;
mod drive;
mod error;
mod manager;
mod object;
mod passphrase;
pub mod property;
mod volume;

#[cfg(test)]
mod testing;

pub use access::UDisksStorageAccess;
pub use block::UDisksBlock;
pub use context::{AccessSettings, DEFAULT_UNMOUNT_TIMEOUT, UDisksContext};
pub use daemon::{
    BLOCK_DEVICES_PATH, Daemon, DaemonEvent, MountOptions, RealDaemon, UDISKS_ROOT,
    UDISKS_SERVICE,
};
pub use device::UDisksDevice;
pub use drive::UDisksStorageDrive;
pub use error::{DaemonError, error_type_for};
pub use manager::{UDISKS_UDI_PREFIX, UDisksManager};
pub use object::CachedObject;
pub use passphrase::{
    DBusPassphrasePrompt, DEFAULT_PROMPT_SERVICE, NoPassphrasePrompt, PassphrasePrompt,
    PassphraseRequest, ReplyHandler,
};
pub use property::{ObjectProperties, Property};
pub use volume::UDisksStorageVolume;
