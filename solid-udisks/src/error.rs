// SPDX-License-Identifier: GPL-3.0-only

use solid_contracts::SolidError;
use solid_types::ErrorType;
use thiserror::Error;
use zbus::DBusError;

const FAILED: &str = "org.freedesktop.UDisks2.Error.Failed";
const TIMEOUT: &str = "org.freedesktop.DBus.Error.Timeout";

/// A failed UDisks2 call, keyed by its D-Bus error name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct DaemonError {
    pub name: String,
    pub message: String,
}

impl DaemonError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(FAILED, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TIMEOUT, message)
    }

    pub fn error_type(&self) -> ErrorType {
        error_type_for(&self.name)
    }

    /// `"<description>: <daemon message>"`, as reported in completions.
    pub fn completion_message(&self) -> String {
        format!("{}: {}", self.error_type().description(), self.message)
    }
}

/// Maps a UDisks2 or bus error name onto a completion kind.
pub fn error_type_for(name: &str) -> ErrorType {
    let suffix = name.rsplit('.').next().unwrap_or(name);
    match suffix {
        s if s.starts_with("NotAuthorized") => ErrorType::UnauthorizedOperation,
        "DeviceBusy" | "Busy" => ErrorType::DeviceBusy,
        "Failed" => ErrorType::OperationFailed,
        "Cancelled" => ErrorType::UserCanceled,
        "OptionNotPermitted" => ErrorType::InvalidOption,
        "NotSupported" => ErrorType::MissingDriver,
        "Timeout" | "NoReply" | "TimedOut" | "Timedout" => ErrorType::Timeout,
        _ => ErrorType::OperationFailed,
    }
}

impl From<zbus::Error> for DaemonError {
    fn from(e: zbus::Error) -> Self {
        match e {
            zbus::Error::MethodError(name, message, _info) => {
                Self::new(name.as_str(), message.unwrap_or_default())
            }
            zbus::Error::FDO(fdo) => Self::from(*fdo),
            other => Self::failed(other.to_string()),
        }
    }
}

impl From<zbus::fdo::Error> for DaemonError {
    fn from(e: zbus::fdo::Error) -> Self {
        Self::new(e.name().as_str(), e.description().unwrap_or_default())
    }
}

/// The `udisks2` proxies decode daemon errors into variants; turn them back
/// into their D-Bus names so the completion kind survives.
impl From<udisks2::Error> for DaemonError {
    fn from(e: udisks2::Error) -> Self {
        match e {
            udisks2::Error::Zbus(inner) => Self::from(inner),
            other => Self::new(udisks_error_name(&other), other.to_string()),
        }
    }
}

fn udisks_error_name(e: &udisks2::Error) -> &'static str {
    use udisks2::Error;

    match e {
        Error::Failed | Error::Iscsi(_) | Error::Zbus(_) => FAILED,
        Error::Cancelled => "org.freedesktop.UDisks2.Error.Cancelled",
        Error::AlreadyCancelled => "org.freedesktop.UDisks2.Error.AlreadyCancelled",
        Error::NotAuthorized => "org.freedesktop.UDisks2.Error.NotAuthorized",
        Error::NotAuthorizedCanObtain => "org.freedesktop.UDisks2.Error.NotAuthorizedCanObtain",
        Error::NotAuthorizedDismissed => "org.freedesktop.UDisks2.Error.NotAuthorizedDismissed",
        Error::AlreadyMounted => "org.freedesktop.UDisks2.Error.AlreadyMounted",
        Error::NotMounted => "org.freedesktop.UDisks2.Error.NotMounted",
        Error::OptionNotPermitted => "org.freedesktop.UDisks2.Error.OptionNotPermitted",
        Error::MountedByOtherUser => "org.freedesktop.UDisks2.Error.MountedByOtherUser",
        Error::AlreadyUnmounting => "org.freedesktop.UDisks2.Error.AlreadyUnmounting",
        Error::NotSupported => "org.freedesktop.UDisks2.Error.NotSupported",
        Error::TimedOut => "org.freedesktop.UDisks2.Error.Timedout",
        Error::WouldWakeup => "org.freedesktop.UDisks2.Error.WouldWakeup",
        Error::DeviceBusy => "org.freedesktop.UDisks2.Error.DeviceBusy",
    }
}

impl From<DaemonError> for SolidError {
    fn from(e: DaemonError) -> Self {
        SolidError::action(e.error_type(), e.completion_message())
    }
}
