// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UdevError {
    #[error("No udev device at {0}")]
    NotFound(String),

    #[error("udev monitor failed: {0}")]
    Monitor(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UdevError> for solid_contracts::SolidError {
    fn from(e: UdevError) -> Self {
        match e {
            UdevError::NotFound(path) => Self::DeviceNotFound(path),
            other => Self::Io(other.to_string()),
        }
    }
}
