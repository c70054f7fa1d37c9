// SPDX-License-Identifier: GPL-3.0-only

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::SolidConfig;

/// Logs to stderr. `RUST_LOG` wins over the configured level.
///
/// Calling it again once a subscriber is installed does nothing.
pub fn init(config: &SolidConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive()));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
