// SPDX-License-Identifier: GPL-3.0-only

use solid_contracts::SolidError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FakeError {
    #[error("Cannot read fake hardware description: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fake hardware description: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Device {0} is described twice")]
    DuplicateUdi(String),

    #[error("No fake device {0}")]
    UnknownDevice(String),
}

impl From<FakeError> for SolidError {
    fn from(e: FakeError) -> Self {
        match e {
            FakeError::UnknownDevice(udi) => SolidError::DeviceNotFound(udi),
            FakeError::Io(e) => SolidError::Io(e.to_string()),
            other => SolidError::Parse(other.to_string()),
        }
    }
}
