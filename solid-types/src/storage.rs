// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Kind of media a storage drive accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveType {
    #[default]
    HardDisk,
    CdromDrive,
    Floppy,
    Tape,
    CompactFlash,
    MemoryStick,
    SmartMedia,
    SdMmc,
    Xd,
}

/// Bus a storage drive is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bus {
    Ide,
    Usb,
    Ieee1394,
    Scsi,
    Sata,
    #[default]
    Platform,
}

/// What a storage volume is used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageType {
    #[default]
    Other,
    Unused,
    FileSystem,
    PartitionTable,
    Raid,
    Encrypted,
}

impl UsageType {
    /// Maps the `IdUsage` value reported by the block layer.
    pub fn from_id_usage(usage: &str) -> Self {
        match usage {
            "filesystem" => Self::FileSystem,
            "crypto" => Self::Encrypted,
            "raid" => Self::Raid,
            "" => Self::Unused,
            _ => Self::Other,
        }
    }
}

/// Protocol of a network share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareType {
    #[default]
    Unknown,
    Nfs,
    Cifs,
    Upnp,
}

impl ShareType {
    /// Maps a filesystem type name (`nfs`, `nfs4`, `cifs`, `smb3`, ...).
    pub fn from_fs_type(fs_type: &str) -> Self {
        match fs_type {
            "nfs" | "nfs4" => Self::Nfs,
            "cifs" | "smb3" | "smbfs" => Self::Cifs,
            "upnp" => Self::Upnp,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_type_from_fs_type() {
        assert_eq!(ShareType::from_fs_type("nfs4"), ShareType::Nfs);
        assert_eq!(ShareType::from_fs_type("smb3"), ShareType::Cifs);
        assert_eq!(ShareType::from_fs_type("ext4"), ShareType::Unknown);
    }

    #[test]
    fn usage_from_id_usage() {
        assert_eq!(UsageType::from_id_usage("crypto"), UsageType::Encrypted);
        assert_eq!(UsageType::from_id_usage(""), UsageType::Unused);
        assert_eq!(UsageType::from_id_usage("other"), UsageType::Other);
    }
}
