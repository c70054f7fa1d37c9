// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Outcome kind carried by a setup/teardown completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    #[default]
    NoError,
    UnauthorizedOperation,
    DeviceBusy,
    OperationFailed,
    UserCanceled,
    InvalidOption,
    MissingDriver,
    Timeout,
}

impl ErrorType {
    pub fn is_error(self) -> bool {
        self != Self::NoError
    }

    /// Human readable description, used as the prefix of completion messages.
    pub fn description(self) -> &'static str {
        match self {
            Self::NoError => "",
            Self::UnauthorizedOperation => "You are not authorized to perform this operation",
            Self::DeviceBusy => "The device is currently busy",
            Self::OperationFailed => "The requested operation has failed",
            Self::UserCanceled => "The requested operation has been canceled by the user",
            Self::InvalidOption => "The requested operation has an invalid option",
            Self::MissingDriver => "The kernel driver for this filesystem type is not available",
            Self::Timeout => "The operation did not finish in time",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}
