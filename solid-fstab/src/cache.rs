// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::table::{
    self, DEFAULT_FSTAB_PATH, DEFAULT_MOUNTINFO_PATH, device_name_for_mount_point,
    is_network_file_system, is_supported_local_file_system,
};

#[derive(Debug, Default)]
struct CacheState {
    fstab_valid: bool,
    mtab_valid: bool,
    /// device → configured mount points, in file order
    fstab: Vec<(String, String)>,
    fstab_options: BTreeMap<String, Vec<String>>,
    /// device → current mount points
    mtab: Vec<(String, String)>,
    fs_types: BTreeMap<String, String>,
}

/// Lazily parsed view of the static and live mount tables.
///
/// Only network filesystems and the supported pseudo filesystems are kept.
/// Each table is parsed at most once until flushed.
#[derive(Debug)]
pub struct MountTableCache {
    fstab_path: PathBuf,
    mtab_path: PathBuf,
    state: Mutex<CacheState>,
}

impl Default for MountTableCache {
    fn default() -> Self {
        Self::new(DEFAULT_FSTAB_PATH, DEFAULT_MOUNTINFO_PATH)
    }
}

impl MountTableCache {
    pub fn new(fstab_path: impl Into<PathBuf>, mtab_path: impl Into<PathBuf>) -> Self {
        Self {
            fstab_path: fstab_path.into(),
            mtab_path: mtab_path.into(),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn fstab_path(&self) -> &Path {
        &self.fstab_path
    }

    pub fn mtab_path(&self) -> &Path {
        &self.mtab_path
    }

    /// Every known device key, configured ones first.
    pub fn device_list(&self) -> Vec<String> {
        let state = self.load(true, true);
        let mut devices: Vec<String> = Vec::new();
        for (device, _) in state.fstab.iter().chain(state.mtab.iter()) {
            if !devices.contains(device) {
                devices.push(device.clone());
            }
        }
        devices
    }

    /// Configured and current mount points of `device`.
    pub fn mount_points(&self, device: &str) -> Vec<String> {
        let state = self.load(true, true);
        let mut points: Vec<String> = Vec::new();
        for (_, point) in state
            .fstab
            .iter()
            .chain(state.mtab.iter())
            .filter(|(key, _)| key == device)
        {
            if !points.contains(point) {
                points.push(point.clone());
            }
        }
        points
    }

    pub fn current_mount_points(&self, device: &str) -> Vec<String> {
        let state = self.load(false, true);
        state
            .mtab
            .iter()
            .filter(|(key, _)| key == device)
            .map(|(_, point)| point.clone())
            .collect()
    }

    pub fn options(&self, device: &str) -> Vec<String> {
        let state = self.load(true, false);
        state.fstab_options.get(device).cloned().unwrap_or_default()
    }

    pub fn fs_type(&self, device: &str) -> Option<String> {
        let state = self.load(true, false);
        state.fs_types.get(device).cloned()
    }

    pub fn flush_fstab_cache(&self) {
        self.lock().fstab_valid = false;
    }

    pub fn flush_mtab_cache(&self) {
        self.lock().mtab_valid = false;
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, fstab: bool, mtab: bool) -> MutexGuard<'_, CacheState> {
        let mut state = self.lock();
        if fstab && !state.fstab_valid {
            self.reload_fstab(&mut state);
        }
        if mtab && !state.mtab_valid {
            self.reload_mtab(&mut state);
        }
        state
    }

    fn reload_fstab(&self, state: &mut CacheState) {
        state.fstab.clear();
        state.fstab_options.clear();

        match std::fs::read_to_string(&self.fstab_path) {
            Ok(content) => {
                for entry in table::parse_fstab(&content) {
                    if !is_network_file_system(&entry.fs_type, &entry.source)
                        && !is_supported_local_file_system(&entry.fs_type)
                    {
                        continue;
                    }
                    let device = device_name_for_mount_point(
                        &entry.source,
                        &entry.fs_type,
                        &entry.mount_point,
                    );
                    state.fstab.push((device.clone(), entry.mount_point));
                    state.fs_types.insert(device.clone(), entry.fs_type);
                    state
                        .fstab_options
                        .entry(device)
                        .or_default()
                        .extend(entry.options);
                }
            }
            Err(e) => warn!("Cannot read {}: {e}", self.fstab_path.display()),
        }

        debug!("Parsed {} fstab entries", state.fstab.len());
        state.fstab_valid = true;
    }

    fn reload_mtab(&self, state: &mut CacheState) {
        state.mtab.clear();

        let entries = std::fs::read_to_string(&self.mtab_path)
            .map_err(crate::FstabError::from)
            .and_then(|content| table::parse_mountinfo(&content));

        match entries {
            Ok(entries) => {
                for entry in entries {
                    if !is_network_file_system(&entry.fs_type, "")
                        && !is_supported_local_file_system(&entry.fs_type)
                    {
                        continue;
                    }
                    let device = device_name_for_mount_point(
                        &entry.source,
                        &entry.fs_type,
                        &entry.mount_point,
                    );
                    state.mtab.push((device.clone(), entry.mount_point));
                    state.fs_types.insert(device, entry.fs_type);
                }
            }
            Err(e) => warn!("Cannot read {}: {e}", self.mtab_path.display()),
        }

        debug!("Parsed {} mtab entries", state.mtab.len());
        state.mtab_valid = true;
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const FSTAB: &str = "\
UUID=root / ext4 defaults 0 1
server:/export /mnt/nfs nfs rw,soft 0 0
encfs /home/u/Vault fuse.encfs noauto,user 0 0
";

    const MOUNTINFO: &str = "\
36 25 8:2 / / rw - ext4 /dev/sda2 rw
90 36 0:57 / /mnt/nfs rw - nfs server:/export rw
";

    fn cache_with(dir: &Path) -> MountTableCache {
        fs::write(dir.join("fstab"), FSTAB).expect("fstab");
        fs::write(dir.join("mountinfo"), MOUNTINFO).expect("mountinfo");
        MountTableCache::new(dir.join("fstab"), dir.join("mountinfo"))
    }

    #[test]
    fn keeps_only_network_and_supported_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache_with(dir.path());

        assert_eq!(
            cache.device_list(),
            vec!["server:/export", "fuse.encfs/home/u/Vault"]
        );
        assert_eq!(cache.mount_points("server:/export"), vec!["/mnt/nfs"]);
        assert_eq!(cache.current_mount_points("server:/export"), vec!["/mnt/nfs"]);
        assert!(cache.current_mount_points("fuse.encfs/home/u/Vault").is_empty());
        assert_eq!(cache.options("fuse.encfs/home/u/Vault"), vec!["noauto", "user"]);
        assert_eq!(
            cache.fs_type("fuse.encfs/home/u/Vault").as_deref(),
            Some("fuse.encfs")
        );
        assert_eq!(cache.fs_type("UUID=root"), None);
    }

    #[test]
    fn results_stay_stable_until_flushed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache_with(dir.path());
        let before = cache.device_list();

        fs::write(
            dir.path().join("fstab"),
            format!("{FSTAB}//nas/media /mnt/media cifs guest 0 0\n"),
        )
        .expect("rewrite fstab");
        assert_eq!(cache.device_list(), before);
        assert!(cache.mount_points("//nas/media").is_empty());

        cache.flush_fstab_cache();
        assert_eq!(cache.mount_points("//nas/media"), vec!["/mnt/media"]);
        assert_eq!(cache.device_list().len(), before.len() + 1);
    }

    #[test]
    fn mtab_flush_is_independent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache_with(dir.path());
        assert!(cache.current_mount_points("fuse.encfs/home/u/Vault").is_empty());

        fs::write(
            dir.path().join("mountinfo"),
            format!("{MOUNTINFO}95 36 0:60 / /home/u/Vault rw - fuse.encfs encfs rw\n"),
        )
        .expect("rewrite mountinfo");

        cache.flush_fstab_cache();
        assert!(cache.current_mount_points("fuse.encfs/home/u/Vault").is_empty());

        cache.flush_mtab_cache();
        assert_eq!(
            cache.current_mount_points("fuse.encfs/home/u/Vault"),
            vec!["/home/u/Vault"]
        );
    }

    #[test]
    fn missing_files_yield_empty_tables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = MountTableCache::new(dir.path().join("nope"), dir.path().join("none"));
        assert!(cache.device_list().is_empty());
    }
}
