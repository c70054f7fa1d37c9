// SPDX-License-Identifier: GPL-3.0-only

//! Parsers for the static and live mount tables.

use std::path::Path;

use crate::FstabError;

pub const DEFAULT_FSTAB_PATH: &str = "/etc/fstab";
pub const DEFAULT_MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// One line of the static mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    pub source: String,
    pub mount_point: String,
    pub fs_type: String,
    pub options: Vec<String>,
}

/// One line of `/proc/self/mountinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfoEntry {
    /// Root of the mount within its filesystem; `/` unless bind mounted.
    pub root: String,
    pub mount_point: String,
    pub options: Vec<String>,
    pub fs_type: String,
    pub source: String,
}

pub fn is_network_file_system(fs_type: &str, source: &str) -> bool {
    matches!(fs_type, "nfs" | "nfs4" | "smbfs" | "cifs") || source.starts_with("//")
}

pub fn is_supported_local_file_system(fs_type: &str) -> bool {
    matches!(fs_type, "fuse.encfs" | "fuse.cryfs" | "overlay")
}

/// Key under which an entry is cached. FUSE and overlay sources are not
/// unique, so those are keyed by type and mount point.
pub fn device_name_for_mount_point(source: &str, fs_type: &str, mount_point: &str) -> String {
    if fs_type.starts_with("fuse.") || fs_type == "overlay" {
        format!("{fs_type}{mount_point}")
    } else {
        source.to_string()
    }
}

pub fn parse_fstab(content: &str) -> Vec<FstabEntry> {
    content.lines().filter_map(parse_fstab_line).collect()
}

fn parse_fstab_line(line: &str) -> Option<FstabEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }

    let options = fields.get(3).copied().unwrap_or("defaults");
    Some(FstabEntry {
        source: unescape_mount_field(fields[0]),
        mount_point: unescape_mount_field(fields[1]),
        fs_type: fields[2].to_string(),
        options: split_options(options),
    })
}

pub fn parse_mountinfo(content: &str) -> Result<Vec<MountInfoEntry>, FstabError> {
    let mut entries = Vec::new();

    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        let (left, right) = line
            .split_once(" - ")
            .ok_or_else(|| FstabError::InvalidMountInfoLine(line.to_string()))?;

        let left_fields: Vec<&str> = left.split_whitespace().collect();
        let mut right_fields = right.split_whitespace();
        let (Some(root), Some(mount_point), Some(options)) =
            (left_fields.get(3), left_fields.get(4), left_fields.get(5))
        else {
            return Err(FstabError::InvalidMountInfoLine(line.to_string()));
        };
        let (Some(fs_type), Some(source)) = (right_fields.next(), right_fields.next()) else {
            return Err(FstabError::InvalidMountInfoLine(line.to_string()));
        };

        entries.push(MountInfoEntry {
            root: unescape_mount_field(root),
            mount_point: unescape_mount_field(mount_point),
            options: split_options(options),
            fs_type: fs_type.to_string(),
            source: unescape_mount_field(source),
        });
    }

    Ok(entries)
}

/// Mount point of `device` whose root is `/`, skipping bind mounts.
///
/// Searches from the end, where recently mounted devices sit.
pub fn base_mount_point(mountinfo: &Path, device: &str) -> Option<String> {
    let content = std::fs::read_to_string(mountinfo).ok()?;
    let entries = parse_mountinfo(&content).ok()?;
    entries
        .into_iter()
        .rev()
        .find(|entry| entry.source == device && entry.root == "/")
        .map(|entry| entry.mount_point)
}

pub fn split_options(options: &str) -> Vec<String> {
    options
        .split(',')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Decodes the `\ooo` octal escapes used for spaces and tabs.
pub fn unescape_mount_field(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(|b| (b'0'..=b'7').contains(b))
            && let Ok(num) = u8::from_str_radix(&value[index + 1..index + 4], 8)
        {
            output.push(num);
            index += 4;
            continue;
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fstab_skips_comments_and_short_lines() {
        let content = "\
# <fs> <mp> <type> <opts>
UUID=abc / ext4 defaults 0 1

server:/export /mnt/nfs nfs rw,soft 0 0
//nas/share /mnt/My\\040Share cifs
broken-line /only
";
        let entries = parse_fstab(content);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].options, vec!["rw", "soft"]);
        assert_eq!(entries[2].mount_point, "/mnt/My Share");
        assert_eq!(entries[2].options, vec!["defaults"]);
    }

    #[test]
    fn mountinfo_fields() {
        let sample = "36 25 8:2 / / rw,relatime shared:1 - ext4 /dev/nvme0n1p2 rw\n\
                      90 36 0:57 / /mnt/nfs rw,relatime - nfs4 server:/x rw\n\
                      91 36 8:17 /sub /srv/bind rw - ext4 /dev/sdb1 rw\n";

        let entries = parse_mountinfo(sample).expect("parse should succeed");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].fs_type, "nfs4");
        assert_eq!(entries[1].source, "server:/x");
        assert_eq!(entries[2].root, "/sub");
        assert_eq!(entries[0].options, vec!["rw", "relatime"]);
    }

    #[test]
    fn mountinfo_rejects_lines_without_separator() {
        assert!(parse_mountinfo("36 25 8:2 / / rw ext4 /dev/sda rw\n").is_err());
    }

    #[test]
    fn base_mount_point_skips_bind_mounts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mountinfo");
        std::fs::write(
            &path,
            "40 25 8:17 / /run/media/user/DISK rw - ext4 /dev/sdb1 rw\n\
             41 25 8:17 /photos /home/user/photos rw - ext4 /dev/sdb1 rw\n",
        )
        .expect("write");

        assert_eq!(
            base_mount_point(&path, "/dev/sdb1").as_deref(),
            Some("/run/media/user/DISK")
        );
        assert_eq!(base_mount_point(&path, "/dev/sdc1"), None);
    }

    #[test]
    fn cache_keys_for_fuse_and_overlay() {
        assert_eq!(
            device_name_for_mount_point("encfs", "fuse.encfs", "/home/u/Vault"),
            "fuse.encfs/home/u/Vault"
        );
        assert_eq!(
            device_name_for_mount_point("server:/x", "nfs", "/mnt/x"),
            "server:/x"
        );
    }

    #[test]
    fn filesystem_filters() {
        assert!(is_network_file_system("nfs4", "server:/x"));
        assert!(is_network_file_system("", "//nas/share"));
        assert!(!is_network_file_system("ext4", "/dev/sda1"));
        assert!(is_supported_local_file_system("fuse.cryfs"));
        assert!(!is_supported_local_file_system("fuse.sshfs"));
    }
}
