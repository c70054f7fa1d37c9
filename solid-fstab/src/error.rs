// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FstabError {
    #[error("Invalid mountinfo line: {0}")]
    InvalidMountInfoLine(String),

    #[error("Failed to start {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
