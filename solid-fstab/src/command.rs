// SPDX-License-Identifier: GPL-3.0-only

use futures::future::BoxFuture;
use tracing::debug;

use crate::FstabError;

/// `PATH` used for mount helpers, regardless of the caller's environment.
const SYSTEM_PATH: &str = "/sbin:/bin:/usr/sbin/:/usr/bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the external mount helpers.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: String, args: Vec<String>)
    -> BoxFuture<'_, Result<CommandOutput, FstabError>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        program: String,
        args: Vec<String>,
    ) -> BoxFuture<'_, Result<CommandOutput, FstabError>> {
        Box::pin(async move {
            debug!("Running {program} {}", args.join(" "));
            let output = tokio::process::Command::new(&program)
                .args(&args)
                .env("PATH", SYSTEM_PATH)
                .output()
                .await
                .map_err(|e| FstabError::Spawn {
                    command: program.clone(),
                    message: e.to_string(),
                })?;

            Ok(CommandOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        })
    }
}
