// SPDX-License-Identifier: GPL-3.0-only

use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use solid_contracts::{Notifier, StorageAccess, StorageAccessEvent, Subscription};
use solid_types::ErrorType;
use tracing::{debug, info};

use super::FstabContext;
use crate::{CommandOutput, FstabError};

#[derive(Debug, Default)]
struct ActionState {
    setup_in_progress: bool,
    teardown_in_progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Setup,
    Teardown,
}

struct AccessInner {
    udi: String,
    device: String,
    ctx: FstabContext,
    state: Mutex<ActionState>,
    accessible: Mutex<bool>,
    notifier: Notifier<StorageAccessEvent>,
}

/// Mounts an fstab entry with the system `mount`/`umount` tools.
pub struct FstabStorageAccess {
    inner: Arc<AccessInner>,
}

impl FstabStorageAccess {
    pub(crate) fn new(udi: String, device: String, ctx: FstabContext) -> Self {
        let accessible = !ctx.cache.current_mount_points(&device).is_empty();
        let mut mtab_changes = ctx.mtab_changed.subscribe();
        let inner = Arc::new(AccessInner {
            udi,
            device,
            ctx,
            state: Mutex::new(ActionState::default()),
            accessible: Mutex::new(accessible),
            notifier: Notifier::new(),
        });

        let weak: Weak<AccessInner> = Arc::downgrade(&inner);
        tokio::spawn(async move {
            while mtab_changes.recv().await.is_some() {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.check_accessibility();
            }
        });

        Self { inner }
    }
}

impl AccessInner {
    fn state(&self) -> std::sync::MutexGuard<'_, ActionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_accessible(&self) -> bool {
        !self.ctx.cache.current_mount_points(&self.device).is_empty()
    }

    fn check_accessibility(&self) {
        let mut cached = self.accessible.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.is_accessible();
        if *cached != now {
            *cached = now;
            self.notifier.emit(StorageAccessEvent::AccessibilityChanged {
                accessible: now,
                udi: self.udi.clone(),
            });
        }
    }

    fn fs_type(&self) -> String {
        self.ctx.cache.fs_type(&self.device).unwrap_or_default()
    }

    /// Claims the action slot; fails while another action runs.
    fn begin(&self, action: Action) -> bool {
        let mut state = self.state();
        if state.setup_in_progress || state.teardown_in_progress {
            return false;
        }
        match action {
            Action::Setup => state.setup_in_progress = true,
            Action::Teardown => state.teardown_in_progress = true,
        }
        drop(state);

        let udi = self.udi.clone();
        self.notifier.emit(match action {
            Action::Setup => StorageAccessEvent::SetupRequested { udi },
            Action::Teardown => StorageAccessEvent::TeardownRequested { udi },
        });
        true
    }

    fn finish(&self, action: Action, result: Result<CommandOutput, FstabError>) {
        let (error, message) = match result {
            Ok(output) if output.success => (ErrorType::NoError, String::new()),
            Ok(output) => (ErrorType::OperationFailed, output.stderr),
            Err(e) => (ErrorType::OperationFailed, e.to_string()),
        };

        {
            let mut state = self.state();
            state.setup_in_progress = false;
            state.teardown_in_progress = false;
        }

        self.ctx.cache.flush_mtab_cache();
        self.check_accessibility();

        let udi = self.udi.clone();
        self.notifier.emit(match action {
            Action::Setup => StorageAccessEvent::SetupDone {
                error,
                message,
                udi,
            },
            Action::Teardown => StorageAccessEvent::TeardownDone {
                error,
                message,
                udi,
            },
        });
    }

    fn spawn_command(self: &Arc<Self>, action: Action, program: &str, args: Vec<String>) {
        let inner = Arc::clone(self);
        let program = program.to_string();
        tokio::spawn(async move {
            let result = inner.ctx.runner.run(program, args).await;
            inner.finish(action, result);
        });
    }
}

#[async_trait]
impl StorageAccess for FstabStorageAccess {
    async fn is_accessible(&self) -> bool {
        self.inner.is_accessible()
    }

    async fn file_path(&self) -> String {
        let cache = &self.inner.ctx.cache;
        cache
            .current_mount_points(&self.inner.device)
            .into_iter()
            .next()
            .or_else(|| cache.mount_points(&self.inner.device).into_iter().next())
            .unwrap_or_default()
    }

    async fn is_ignored(&self) -> bool {
        false
    }

    async fn is_encrypted(&self) -> bool {
        matches!(self.inner.fs_type().as_str(), "fuse.encfs" | "fuse.cryfs")
    }

    async fn setup(&self) -> bool {
        let mount_point = self.file_path().await;
        if mount_point.is_empty() || !self.inner.begin(Action::Setup) {
            return false;
        }

        info!("Mounting {} at {mount_point}", self.inner.device);
        self.inner
            .spawn_command(Action::Setup, "mount", vec![mount_point]);
        true
    }

    async fn teardown(&self) -> bool {
        let mount_point = self.file_path().await;
        if mount_point.is_empty() || !self.inner.begin(Action::Teardown) {
            return false;
        }

        let fs_type = self.inner.fs_type();
        debug!("Unmounting {mount_point} ({fs_type})");
        if fs_type.starts_with("fuse.") {
            self.inner.spawn_command(
                Action::Teardown,
                "fusermount",
                vec!["-u".to_string(), mount_point],
            );
        } else {
            self.inner
                .spawn_command(Action::Teardown, "umount", vec![mount_point]);
        }
        true
    }

    fn subscribe(&self) -> Subscription<StorageAccessEvent> {
        self.inner.notifier.subscribe()
    }
}
