// SPDX-License-Identifier: GPL-3.0-only

use enumflags2::{BitFlags, bitflags};
use serde::{Deserialize, Serialize};

/// Power management transition an inhibition may block.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InhibitionType {
    Sleep = 0b01,
    Shutdown = 0b10,
}

impl InhibitionType {
    /// Builds the colon separated `what` argument understood by logind.
    pub fn logind_what(types: BitFlags<InhibitionType>) -> String {
        types
            .iter()
            .map(|ty| match ty {
                InhibitionType::Sleep => "sleep",
                InhibitionType::Shutdown => "shutdown",
            })
            .collect::<Vec<_>>()
            .join(":")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InhibitionState {
    #[default]
    Stopped,
    Started,
}
