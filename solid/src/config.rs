// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use solid_fstab::table::{DEFAULT_FSTAB_PATH, DEFAULT_MOUNTINFO_PATH};
use solid_udev::{DEFAULT_SYSFS_ROOT, DEFAULT_UDEV_DATA_ROOT};
use solid_udisks::{AccessSettings, DEFAULT_PROMPT_SERVICE};

pub const CONFIG_ENV: &str = "SOLID_CONFIG";
pub const FAKE_HARDWARE_ENV: &str = "SOLID_FAKEHW";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Udisks2,
    Udev,
    Fstab,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SolidConfig {
    pub log_level: LoggingLevel,
    pub backends: Vec<Backend>,
    /// Device description for the fake backend. When set, it is the only
    /// backend.
    pub fake_hardware: Option<PathBuf>,
    pub fstab_path: PathBuf,
    pub mtab_path: PathBuf,
    pub sysfs_root: PathBuf,
    pub udev_data_root: PathBuf,
    pub unmount_timeout_secs: u64,
    /// Bus name of the passphrase dialog service.
    pub prompt_service: String,
    pub app_id: String,
}

impl Default for SolidConfig {
    fn default() -> Self {
        Self {
            log_level: LoggingLevel::Info,
            backends: vec![Backend::Udisks2, Backend::Udev, Backend::Fstab],
            fake_hardware: None,
            fstab_path: PathBuf::from(DEFAULT_FSTAB_PATH),
            mtab_path: PathBuf::from(DEFAULT_MOUNTINFO_PATH),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            udev_data_root: PathBuf::from(DEFAULT_UDEV_DATA_ROOT),
            unmount_timeout_secs: 300,
            prompt_service: DEFAULT_PROMPT_SERVICE.to_string(),
            app_id: "solid".to_string(),
        }
    }
}

impl SolidConfig {
    /// Loads the configuration file of the current user, or the defaults
    /// when there is none, then applies `$SOLID_FAKEHW`.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path(
            std::env::var_os(CONFIG_ENV),
            std::env::var_os("XDG_CONFIG_HOME"),
            std::env::var_os("HOME"),
        );

        let mut config = match path {
            // an explicitly named file has to exist
            Some(path) if path.exists() || std::env::var_os(CONFIG_ENV).is_some() => {
                Self::load_from(&path)?
            }
            _ => Self::default(),
        };

        if let Some(fake) = std::env::var_os(FAKE_HARDWARE_ENV).filter(|v| !v.is_empty()) {
            config.fake_hardware = Some(PathBuf::from(fake));
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn unmount_timeout(&self) -> Duration {
        Duration::from_secs(self.unmount_timeout_secs)
    }

    pub fn uses(&self, backend: Backend) -> bool {
        self.backends.contains(&backend)
    }

    pub fn access_settings(&self) -> AccessSettings {
        AccessSettings {
            unmount_timeout: self.unmount_timeout(),
            mountinfo_path: self.mtab_path.clone(),
            app_id: self.app_id.clone(),
            ..AccessSettings::default()
        }
    }
}

/// `$SOLID_CONFIG`, else `solid/solid.toml` below the XDG config home,
/// else below `~/.config`.
fn config_path(
    explicit: Option<OsString>,
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    let base = match xdg_config_home.filter(|p| !p.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(home?).join(".config"),
    };
    Some(base.join("solid").join("solid.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config = SolidConfig::from_toml(
            r#"
            log_level = "debug"
            backends = ["fstab"]
            unmount_timeout_secs = 30
            "#,
        )
        .expect("config");

        assert_eq!(config.log_level, LoggingLevel::Debug);
        assert_eq!(config.backends, vec![Backend::Fstab]);
        assert!(!config.uses(Backend::Udisks2));
        assert_eq!(config.unmount_timeout(), Duration::from_secs(30));
        assert_eq!(config.fstab_path, PathBuf::from("/etc/fstab"));
        assert_eq!(config.prompt_service, DEFAULT_PROMPT_SERVICE);
        assert_eq!(config.fake_hardware, None);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(SolidConfig::from_toml(r#"backends = ["hal"]"#).is_err());
    }

    #[test]
    fn load_from_reports_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("solid.toml");
        std::fs::write(&path, "log_level = 3").expect("write");

        let error = SolidConfig::load_from(&path).expect_err("invalid level");
        assert!(format!("{error:#}").contains("solid.toml"));

        std::fs::write(&path, "fake_hardware = \"/tmp/hw.toml\"\napp_id = \"dolphin\"")
            .expect("write");
        let config = SolidConfig::load_from(&path).expect("config");
        assert_eq!(config.fake_hardware, Some(PathBuf::from("/tmp/hw.toml")));
        assert_eq!(config.access_settings().app_id, "dolphin");
    }

    #[test]
    fn config_path_resolution_order() {
        assert_eq!(
            config_path(Some("/etc/solid.toml".into()), Some("/xdg".into()), Some("/home/u".into())),
            Some(PathBuf::from("/etc/solid.toml"))
        );
        assert_eq!(
            config_path(None, Some("/xdg".into()), Some("/home/u".into())),
            Some(PathBuf::from("/xdg/solid/solid.toml"))
        );
        assert_eq!(
            config_path(None, Some("".into()), Some("/home/u".into())),
            Some(PathBuf::from("/home/u/.config/solid/solid.toml"))
        );
        assert_eq!(config_path(None, None, None), None);
    }

    #[test]
    fn levels_map_to_filter_directives() {
        assert_eq!(LoggingLevel::default().as_directive(), "info");
        assert_eq!(LoggingLevel::Trace.as_directive(), "trace");
    }
}
