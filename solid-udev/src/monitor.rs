// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeMap;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::PathBuf;

use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::{debug, warn};

use crate::{UdevDevice, UdevError};

/// Multicast group of events re-broadcast by udevd after rule processing.
const UDEV_MONITOR_GROUP: u32 = 2;
const UDEV_HEADER_PREFIX: &[u8; 8] = b"libudev\0";
const UDEV_HEADER_MAGIC: u32 = 0xfeed_cafe;
const RECV_BUFFER_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdevAction {
    Add,
    Remove,
    Change,
    Online,
    Offline,
    Bind,
    Unbind,
}

impl UdevAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "change" => Some(Self::Change),
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "bind" => Some(Self::Bind),
            "unbind" => Some(Self::Unbind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdevEvent {
    pub action: UdevAction,
    pub device: UdevDevice,
}

/// `subsystem` or `subsystem/devtype` match.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SubsystemFilter {
    subsystem: String,
    devtype: Option<String>,
}

impl SubsystemFilter {
    fn parse(spec: &str) -> Self {
        match spec.split_once('/') {
            Some((subsystem, devtype)) if !subsystem.is_empty() => Self {
                subsystem: subsystem.to_string(),
                devtype: Some(devtype.to_string()),
            },
            _ => Self {
                subsystem: spec.to_string(),
                devtype: None,
            },
        }
    }

    fn matches(&self, properties: &BTreeMap<String, String>) -> bool {
        if properties.get("SUBSYSTEM") != Some(&self.subsystem) {
            return false;
        }
        match &self.devtype {
            Some(devtype) => properties.get("DEVTYPE") == Some(devtype),
            None => true,
        }
    }
}

/// Netlink listener for udev events.
pub struct Monitor {
    fd: AsyncFd<OwnedFd>,
    filters: Vec<SubsystemFilter>,
    sysfs_root: PathBuf,
}

impl Monitor {
    /// Opens the uevent socket. An empty `subsystems` list receives everything.
    pub fn new(subsystems: &[String], sysfs_root: PathBuf) -> Result<Self, UdevError> {
        let fd = open_uevent_socket()?;
        let fd = AsyncFd::with_interest(fd, Interest::READABLE)?;
        Ok(Self {
            fd,
            filters: subsystems
                .iter()
                .map(|s| SubsystemFilter::parse(s))
                .collect(),
            sysfs_root,
        })
    }

    /// Waits for the next event passing the subsystem filters.
    pub async fn next_event(&mut self) -> Result<UdevEvent, UdevError> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;
            let received = recv_datagram(guard.get_inner().as_raw_fd(), &mut buf);
            let len = match received {
                Ok(len) => len,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    guard.clear_ready();
                    continue;
                }
                Err(e) => return Err(UdevError::Monitor(e.to_string())),
            };

            if let Some(event) = self.decode(&buf[..len]) {
                return Ok(event);
            }
        }
    }

    fn decode(&self, message: &[u8]) -> Option<UdevEvent> {
        let properties = parse_message(message)?;
        if !self.filters.is_empty() && !self.filters.iter().any(|f| f.matches(&properties)) {
            return None;
        }

        let action_name = properties.get("ACTION")?.clone();
        let Some(action) = UdevAction::parse(&action_name) else {
            warn!("Unhandled udev device action \"{action_name}\"");
            return None;
        };

        let device = UdevDevice::from_properties(&self.sysfs_root, properties)?;
        debug!("udev {action_name} {}", device.devpath());
        Some(UdevEvent { action, device })
    }
}

fn open_uevent_socket() -> Result<OwnedFd, UdevError> {
    unsafe {
        let fd = libc::socket(
            libc::AF_NETLINK,
            libc::SOCK_DGRAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            libc::NETLINK_KOBJECT_UEVENT,
        );
        if fd < 0 {
            return Err(UdevError::Monitor(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        let owned = OwnedFd::from_raw_fd(fd);

        let mut addr: libc::sockaddr_nl = std::mem::zeroed();
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        addr.nl_groups = UDEV_MONITOR_GROUP;

        if libc::bind(
            owned.as_raw_fd(),
            &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
        ) < 0
        {
            return Err(UdevError::Monitor(
                std::io::Error::last_os_error().to_string(),
            ));
        }

        Ok(owned)
    }
}

fn recv_datagram(fd: i32, buf: &mut [u8]) -> std::io::Result<usize> {
    let n = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
    if n < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Decodes a uevent datagram in either the udevd or the raw kernel format.
pub(crate) fn parse_message(message: &[u8]) -> Option<BTreeMap<String, String>> {
    let payload = if message.starts_with(UDEV_HEADER_PREFIX) {
        if message.len() < 24 {
            return None;
        }
        let magic = u32::from_be_bytes(message[8..12].try_into().ok()?);
        if magic != UDEV_HEADER_MAGIC {
            return None;
        }
        let offset = u32::from_ne_bytes(message[16..20].try_into().ok()?) as usize;
        let len = u32::from_ne_bytes(message[20..24].try_into().ok()?) as usize;
        message.get(offset..offset.checked_add(len)?)?
    } else {
        // kernel format: "action@devpath\0KEY=VALUE\0..."
        let header_end = message.iter().position(|b| *b == 0)?;
        if !message[..header_end].contains(&b'@') {
            return None;
        }
        &message[header_end + 1..]
    };

    let properties: BTreeMap<String, String> = payload
        .split(|b| *b == 0)
        .filter_map(|entry| {
            let entry = std::str::from_utf8(entry).ok()?;
            let (key, value) = entry.split_once('=')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect();

    if properties.contains_key("ACTION") && properties.contains_key("DEVPATH") {
        Some(properties)
    } else {
        None
    }
}
