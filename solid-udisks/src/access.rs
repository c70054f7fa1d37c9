// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use solid_contracts::{Notifier, StorageAccess, StorageAccessEvent, Subscription};
use solid_fstab::table::base_mount_point;
use solid_types::ErrorType;
use tracing::{debug, info, warn};

use crate::action_bus::Action;
use crate::context::cleartext_of;
use crate::object::CachedObject;
use crate::passphrase::{PassphraseRequest, ReplyHandler, active_window_id, next_return_object};
use crate::property::ObjectProperties;
use crate::{DaemonError, MountOptions, UDisksContext};

#[derive(Debug, Default)]
struct ActionState {
    setup_in_progress: bool,
    teardown_in_progress: bool,
    passphrase_requested: bool,
    return_object: Option<String>,
}

pub(crate) struct AccessInner {
    udi: String,
    object: Arc<CachedObject>,
    ctx: UDisksContext,
    state: Mutex<ActionState>,
    /// Last reported accessibility; held while re-checking.
    accessible: tokio::sync::Mutex<bool>,
    notifier: Notifier<StorageAccessEvent>,
}

/// Mounts, unlocks, unmounts and locks a UDisks2 block device.
pub struct UDisksStorageAccess {
    inner: Arc<AccessInner>,
}

impl UDisksStorageAccess {
    pub(crate) async fn new(udi: &str, ctx: UDisksContext) -> Self {
        let mut inner = AccessInner {
            udi: udi.to_string(),
            object: ctx.objects.get(udi),
            ctx,
            state: Mutex::new(ActionState::default()),
            accessible: tokio::sync::Mutex::new(false),
            notifier: Notifier::new(),
        };
        let accessible = inner.is_accessible().await;
        *inner.accessible.get_mut() = accessible;

        let inner = Arc::new(inner);
        inner.ctx.bus.register(udi, &inner);
        Self { inner }
    }

    /// Delivers the passphrase entered for a pending setup. Ignored unless a
    /// passphrase was requested.
    pub async fn passphrase_reply(&self, passphrase: &str) {
        Arc::clone(&self.inner)
            .passphrase_reply(passphrase.to_string())
            .await;
    }

    pub async fn check_accessibility(&self) {
        self.inner.check_accessibility().await;
    }
}

impl AccessInner {
    fn state(&self) -> MutexGuard<'_, ActionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_busy(&self) -> bool {
        let state = self.state();
        state.setup_in_progress || state.teardown_in_progress
    }

    pub(crate) fn mark_in_progress(&self, action: Action) {
        let mut state = self.state();
        match action {
            Action::Setup => state.setup_in_progress = true,
            Action::Teardown => state.teardown_in_progress = true,
        }
    }

    pub(crate) fn clear(&self, action: Action) {
        let mut state = self.state();
        match action {
            Action::Setup => state.setup_in_progress = false,
            Action::Teardown => state.teardown_in_progress = false,
        }
    }

    pub(crate) fn emit_requested(&self, action: Action) {
        let udi = self.udi.clone();
        self.notifier.emit(match action {
            Action::Setup => StorageAccessEvent::SetupRequested { udi },
            Action::Teardown => StorageAccessEvent::TeardownRequested { udi },
        });
    }

    pub(crate) async fn action_done(&self, action: Action, error: ErrorType, message: String) {
        self.clear(action);
        self.object.invalidate_cache();
        self.check_accessibility().await;

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

    pub(crate) async fn device_changed(&self) {
        self.object.invalidate_cache();
        self.check_accessibility().await;
    }

    async fn check_accessibility(&self) {
        let mut cached = self.accessible.lock().await;
        let accessible = self.is_accessible().await;
        if *cached == accessible {
            return;
        }

        *cached = accessible;
        debug!("{} accessible: {accessible}", self.udi);
        self.notifier.emit(StorageAccessEvent::AccessibilityChanged {
            accessible,
            udi: self.udi.clone(),
        });
    }

    async fn cleartext_path(&self) -> Option<String> {
        cleartext_of(&self.ctx, &self.udi).await
    }

    /// Properties of the device holding the filesystem: the cleartext
    /// sibling of an unlocked container, else this device.
    async fn filesystem_properties(&self) -> Option<Arc<ObjectProperties>> {
        let properties = self.object.properties().await;
        if !properties.is_encrypted_container() {
            return Some(properties);
        }
        let cleartext = self.cleartext_path().await?;
        Some(self.ctx.objects.get(&cleartext).properties().await)
    }

    async fn is_accessible(&self) -> bool {
        self.filesystem_properties()
            .await
            .is_some_and(|properties| properties.is_mounted())
    }

    async fn file_path(&self) -> String {
        let Some(properties) = self.filesystem_properties().await else {
            return String::new();
        };

        match properties.mount_points().as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, ..] => {
                let device = properties.string("Device");
                base_mount_point(&self.ctx.settings.mountinfo_path, &device)
                    .unwrap_or_else(|| first.clone())
            }
        }
    }

    async fn is_ignored(&self) -> bool {
        let properties = self.object.properties().await;
        if properties.bool("HintIgnore") {
            return true;
        }
        if properties
            .strings("UserspaceMountOptions")
            .iter()
            .any(|option| option == "x-gdu.hide")
        {
            return true;
        }

        let path = self.file_path().await;
        let in_user_path = path.starts_with("/media/")
            || path.starts_with("/run/media/")
            || self
                .ctx
                .settings
                .home_dir
                .as_deref()
                .is_some_and(|home| !path.is_empty() && Path::new(&path).starts_with(home));
        !in_user_path
    }

    async fn start_setup(self: &Arc<Self>) -> bool {
        if !self.ctx.bus.try_begin(&self.udi, Action::Setup) {
            return false;
        }

        let properties = self.object.properties().await;
        if properties.is_encrypted_container() && self.cleartext_path().await.is_none() {
            if self.request_passphrase().await {
                return true;
            }
            self.ctx.bus.abort(&self.udi, Action::Setup);
            return false;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = match inner.cleartext_path().await {
                Some(cleartext) => inner.mount(&cleartext).await,
                None => inner.mount(&inner.udi).await,
            };
            inner.finish(Action::Setup, result).await;
        });
        true
    }

    async fn mount(&self, target: &str) -> Result<(), DaemonError> {
        let properties = self.ctx.objects.get(target).properties().await;
        let mut options = MountOptions::new();
        if properties.string("IdType") == "vfat" {
            options.insert("options".to_string(), "flush".to_string());
        }

        info!("Mounting {target}");
        let mounted = self.ctx.daemon.mount(target.to_string(), options).await;
        self.ctx.objects.invalidate(target);
        let mount_point = mounted?;
        debug!("{target} mounted at {mount_point}");
        Ok(())
    }

    async fn request_passphrase(self: &Arc<Self>) -> bool {
        let return_object = next_return_object();
        {
            let mut state = self.state();
            state.passphrase_requested = true;
            state.return_object = Some(return_object.clone());
        }

        let runtime = tokio::runtime::Handle::current();
        let weak = Arc::downgrade(self);
        let on_reply: ReplyHandler = Arc::new(move |passphrase: String| {
            let weak = weak.clone();
            runtime.spawn(async move {
                match weak.upgrade() {
                    Some(inner) => inner.passphrase_reply(passphrase).await,
                    None => debug!("Dropping passphrase reply for a released device"),
                }
            });
        });

        let request = PassphraseRequest {
            udi: self.udi.clone(),
            return_object,
            window_id: active_window_id(),
            app_id: self.ctx.settings.app_id.clone(),
        };

        match self.ctx.prompt.show(request, on_reply).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cannot ask for the passphrase of {}: {e}", self.udi);
                let mut state = self.state();
                state.passphrase_requested = false;
                state.return_object = None;
                false
            }
        }
    }

    async fn passphrase_reply(self: Arc<Self>, passphrase: String) {
        let return_object = {
            let mut state = self.state();
            if !state.passphrase_requested {
                debug!("Ignoring unrequested passphrase for {}", self.udi);
                return;
            }
            state.passphrase_requested = false;
            state.return_object.take()
        };
        if let Some(return_object) = return_object {
            self.ctx.prompt.release(return_object).await;
        }

        if passphrase.is_empty() {
            info!("Unlocking {} canceled", self.udi);
            self.ctx
                .bus
                .broadcast_done(&self.udi, Action::Setup, ErrorType::UserCanceled, String::new())
                .await;
            return;
        }

        let result = self.unlock_and_mount(passphrase).await;
        self.finish(Action::Setup, result).await;
    }

    async fn unlock_and_mount(&self, passphrase: String) -> Result<(), DaemonError> {
        info!("Unlocking {}", self.udi);
        let cleartext = self.ctx.daemon.unlock(self.udi.clone(), passphrase).await?;
        debug!("{} unlocked as {cleartext}", self.udi);
        self.object.invalidate_cache();

        // the daemon may already have mounted the cleartext device
        if self.is_accessible().await {
            return Ok(());
        }
        let target = self.cleartext_path().await.unwrap_or(cleartext);
        self.mount(&target).await
    }

    async fn start_teardown(self: &Arc<Self>) -> bool {
        if !self.ctx.bus.try_begin(&self.udi, Action::Teardown) {
            return false;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.run_teardown().await;
            inner.finish(Action::Teardown, result).await;
        });
        true
    }

    /// Unmount, then lock, then release the drive.
    async fn run_teardown(&self) -> Result<(), DaemonError> {
        let properties = self.object.properties().await;
        let cleartext = if properties.is_encrypted_container() {
            self.cleartext_path().await
        } else {
            None
        };
        let target = cleartext.clone().unwrap_or_else(|| self.udi.clone());

        info!("Unmounting {target}");
        let deadline = self.ctx.settings.unmount_timeout;
        let unmounted = tokio::time::timeout(deadline, self.ctx.daemon.unmount(target.clone())).await;
        self.ctx.objects.invalidate(&target);
        match unmounted {
            Ok(result) => result?,
            Err(_) => {
                return Err(DaemonError::timeout(format!(
                    "Unmounting {target} did not finish within {}s",
                    deadline.as_secs()
                )));
            }
        }

        if cleartext.is_some() {
            info!("Locking {}", self.udi);
            self.ctx.daemon.lock(self.udi.clone()).await?;
        } else if let Some(parent) = properties.crypto_backing_device() {
            info!("Locking encrypted parent {parent}");
            self.ctx.daemon.lock(parent.clone()).await?;
            self.ctx.objects.invalidate(&parent);
        }

        self.release_drive(&properties).await;
        Ok(())
    }

    /// Ejects removable media or powers the drive off. Outcomes are only
    /// logged.
    async fn release_drive(&self, properties: &ObjectProperties) {
        let drive_path = match (properties.object_path("Drive"), properties.crypto_backing_device()) {
            (Some(drive), _) => Some(drive),
            (None, Some(parent)) => self
                .ctx
                .objects
                .get(&parent)
                .properties()
                .await
                .object_path("Drive"),
            (None, None) => None,
        };
        let Some(drive_path) = drive_path else {
            return;
        };

        let drive = self.ctx.objects.get(&drive_path).properties().await;
        let optical = drive.bool("Optical");
        let daemon = Arc::clone(&self.ctx.daemon);
        if drive.bool("MediaRemovable") && drive.bool("MediaAvailable") && !optical {
            debug!("Ejecting {drive_path}");
            tokio::spawn(async move {
                if let Err(e) = daemon.eject(drive_path.clone()).await {
                    warn!("Ejecting {drive_path} failed: {e}");
                }
            });
        } else if drive.bool("CanPowerOff") && !optical {
            debug!("Powering off {drive_path}");
            tokio::spawn(async move {
                if let Err(e) = daemon.power_off(drive_path.clone()).await {
                    warn!("Powering off {drive_path} failed: {e}");
                }
            });
        }
    }

    async fn finish(&self, action: Action, result: Result<(), DaemonError>) {
        let (error, message) = match result {
            Ok(()) => (ErrorType::NoError, String::new()),
            Err(e) => {
                warn!("{action:?} of {} failed: {e}", self.udi);
                (e.error_type(), e.completion_message())
            }
        };
        self.object.invalidate_cache();
        self.ctx
            .bus
            .broadcast_done(&self.udi, action, error, message)
            .await;
    }
}

/// A pending passphrase request dies with the object that made it: peers
/// that were marked busy get a failed completion.
impl Drop for AccessInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.passphrase_requested {
            return;
        }
        state.passphrase_requested = false;
        let return_object = state.return_object.take();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.ctx.bus.abort(&self.udi, Action::Setup);
            return;
        };
        let ctx = self.ctx.clone();
        let udi = self.udi.clone();
        runtime.spawn(async move {
            if let Some(return_object) = return_object {
                ctx.prompt.release(return_object).await;
            }
            ctx.bus
                .broadcast_done(
                    &udi,
                    Action::Setup,
                    ErrorType::OperationFailed,
                    format!("{udi} was released while waiting for its passphrase"),
                )
                .await;
        });
    }
}

#[async_trait]
impl StorageAccess for UDisksStorageAccess {
    async fn is_accessible(&self) -> bool {
        self.inner.is_accessible().await
    }

    async fn file_path(&self) -> String {
        self.inner.file_path().await
    }

    async fn is_ignored(&self) -> bool {
        self.inner.is_ignored().await
    }

    async fn is_encrypted(&self) -> bool {
        let properties = self.inner.object.properties().await;
        properties.is_encrypted_container() || properties.crypto_backing_device().is_some()
    }

    async fn setup(&self) -> bool {
        self.inner.start_setup().await
    }

    async fn teardown(&self) -> bool {
        self.inner.start_teardown().await
    }

    fn subscribe(&self) -> Subscription<StorageAccessEvent> {
        self.inner.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{
        Call, FakeDaemon, FakePrompt, context, context_with, drive, filesystem_block,
        luks_block, settings,
    };

    const DRIVE: &str = "/org/freedesktop/UDisks2/drives/Stick";
    const SDB1: &str = "/org/freedesktop/UDisks2/block_devices/sdb1";
    const LUKS: &str = "/org/x/block_1";
    const CLEARTEXT: &str = "/org/x/block_1_clear";

    fn requested(udi: &str) -> StorageAccessEvent {
        StorageAccessEvent::SetupRequested {
            udi: udi.to_string(),
        }
    }

    fn accessibility(accessible: bool, udi: &str) -> StorageAccessEvent {
        StorageAccessEvent::AccessibilityChanged {
            accessible,
            udi: udi.to_string(),
        }
    }

    fn setup_done(error: ErrorType, message: &str, udi: &str) -> StorageAccessEvent {
        StorageAccessEvent::SetupDone {
            error,
            message: message.to_string(),
            udi: udi.to_string(),
        }
    }

    /// Collects events up to and including the next completion.
    async fn until_done(events: &mut Subscription<StorageAccessEvent>) -> Vec<StorageAccessEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("completion within timeout")
                .expect("notifier alive");
            let done = event.is_done();
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    fn plain_volume(drive_fixture: crate::testing::Fixture) -> Arc<FakeDaemon> {
        FakeDaemon::with_objects([
            (DRIVE, drive_fixture.build()),
            (SDB1, filesystem_block("/dev/sdb1", Some(DRIVE)).build()),
        ])
    }

    fn mounted_volume(drive_fixture: crate::testing::Fixture) -> Arc<FakeDaemon> {
        FakeDaemon::with_objects([
            (DRIVE, drive_fixture.build()),
            (
                SDB1,
                filesystem_block("/dev/sdb1", Some(DRIVE))
                    .mounted_at(&["/run/media/user/sdb1"])
                    .build(),
            ),
        ])
    }

    #[tokio::test]
    async fn setup_mounts_and_reports_in_order() {
        let daemon = plain_volume(drive());
        let access = UDisksStorageAccess::new(SDB1, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();
        assert!(!access.is_accessible().await);

        assert!(access.setup().await);
        assert_eq!(
            until_done(&mut events).await,
            vec![
                requested(SDB1),
                accessibility(true, SDB1),
                setup_done(ErrorType::NoError, "", SDB1),
            ]
        );
        assert_eq!(daemon.calls(), vec![Call::Mount(SDB1.to_string(), MountOptions::new())]);
        assert!(access.is_accessible().await);
        assert_eq!(access.file_path().await, "/run/media/user/sdb1");
        assert!(!access.is_ignored().await);
        assert!(!access.is_encrypted().await);
    }

    #[tokio::test]
    async fn vfat_is_mounted_with_flush() {
        let daemon = FakeDaemon::with_objects([(
            SDB1,
            filesystem_block("/dev/sdb1", None).fs_type("vfat").build(),
        )]);
        let access = UDisksStorageAccess::new(SDB1, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();

        assert!(access.setup().await);
        until_done(&mut events).await;

        let expected = MountOptions::from([("options".to_string(), "flush".to_string())]);
        assert_eq!(daemon.calls(), vec![Call::Mount(SDB1.to_string(), expected)]);
    }

    #[tokio::test]
    async fn actions_are_refused_while_one_is_in_flight() {
        let daemon = plain_volume(drive());
        let access = UDisksStorageAccess::new(SDB1, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();

        assert!(access.setup().await);
        assert!(!access.setup().await);
        assert!(!access.teardown().await);

        let seen = until_done(&mut events).await;
        let requests = seen
            .iter()
            .filter(|event| matches!(event, StorageAccessEvent::SetupRequested { .. }))
            .count();
        assert_eq!(requests, 1);
        assert_eq!(daemon.calls().len(), 1);

        assert!(access.teardown().await);
        until_done(&mut events).await;
    }

    #[tokio::test]
    async fn peers_of_the_same_device_share_the_action() {
        let daemon = plain_volume(drive());
        let ctx = context(Arc::clone(&daemon));
        let first = UDisksStorageAccess::new(SDB1, ctx.clone()).await;
        let second = UDisksStorageAccess::new(SDB1, ctx).await;
        let mut observed = second.subscribe();

        assert!(first.setup().await);
        assert!(!second.setup().await);
        assert_eq!(
            until_done(&mut observed).await,
            vec![
                requested(SDB1),
                accessibility(true, SDB1),
                setup_done(ErrorType::NoError, "", SDB1),
            ]
        );
        assert!(second.is_accessible().await);
    }

    #[tokio::test]
    async fn accessibility_is_only_reported_when_it_flips() {
        let daemon = plain_volume(drive());
        let ctx = context(Arc::clone(&daemon));
        let access = UDisksStorageAccess::new(SDB1, ctx.clone()).await;
        let mut events = access.subscribe();

        daemon.set_mount_points(SDB1, &["/media/data"]);
        ctx.device_changed(SDB1).await;
        assert_eq!(events.try_recv(), Some(accessibility(true, SDB1)));

        ctx.device_changed(SDB1).await;
        access.check_accessibility().await;
        assert_eq!(events.try_recv(), None);
        assert_eq!(access.file_path().await, "/media/data");

        daemon.set_mount_points(SDB1, &[]);
        ctx.device_changed(SDB1).await;
        assert_eq!(events.try_recv(), Some(accessibility(false, SDB1)));
        assert_eq!(access.file_path().await, "");
    }

    #[tokio::test]
    async fn mounts_outside_user_locations_are_ignored() {
        let daemon = plain_volume(drive());
        let ctx = context(Arc::clone(&daemon));
        let access = UDisksStorageAccess::new(SDB1, ctx.clone()).await;

        for (point, ignored) in [
            ("/mnt/backup", true),
            ("/home/user/Photos", false),
            ("/run/media/user/STICK", false),
        ] {
            daemon.set_mount_points(SDB1, &[point]);
            ctx.device_changed(SDB1).await;
            assert_eq!(access.is_ignored().await, ignored, "{point}");
        }
    }

    #[tokio::test]
    async fn failed_mount_reports_mapped_error_and_clears_flags() {
        let daemon = plain_volume(drive());
        daemon.fail(
            "mount",
            DaemonError::new("org.freedesktop.UDisks2.Error.DeviceBusy", "target is busy"),
        );
        let access = UDisksStorageAccess::new(SDB1, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();

        assert!(access.setup().await);
        assert_eq!(
            until_done(&mut events).await,
            vec![
                requested(SDB1),
                setup_done(
                    ErrorType::DeviceBusy,
                    "The device is currently busy: target is busy",
                    SDB1
                ),
            ]
        );
        assert!(access.setup().await);
    }

    #[tokio::test]
    async fn locked_container_is_unlocked_then_mounted() {
        let daemon = FakeDaemon::with_objects([(LUKS, luks_block("/dev/sdc1", None).build())]);
        let prompt = Arc::new(FakePrompt::default());
        let ctx = context_with(Arc::clone(&daemon), Arc::clone(&prompt), settings());
        let access = UDisksStorageAccess::new(LUKS, ctx).await;
        let mut events = access.subscribe();
        assert!(access.is_encrypted().await);

        assert!(access.setup().await);
        assert!(daemon.calls().is_empty());
        let requests = prompt.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].udi, LUKS);
        assert_eq!(requests[0].app_id, "solid-tests");
        assert!(
            requests[0]
                .return_object
                .starts_with("/org/kde/solid/UDisks2StorageAccess_")
        );

        prompt.reply("secret");
        assert_eq!(
            until_done(&mut events).await,
            vec![
                requested(LUKS),
                accessibility(true, LUKS),
                setup_done(ErrorType::NoError, "", LUKS),
            ]
        );
        assert_eq!(
            daemon.calls(),
            vec![
                Call::Unlock(LUKS.to_string(), "secret".to_string()),
                Call::Mount(CLEARTEXT.to_string(), MountOptions::new()),
            ]
        );
        assert_eq!(prompt.released(), vec![requests[0].return_object.clone()]);
        assert!(access.is_accessible().await);
        assert_eq!(access.file_path().await, "/run/media/user/block_1_clear");

        settle().await;
        assert_eq!(events.try_recv(), None);
    }

    #[tokio::test]
    async fn empty_passphrase_cancels_without_unlocking() {
        let daemon = FakeDaemon::with_objects([(LUKS, luks_block("/dev/sdc1", None).build())]);
        let prompt = Arc::new(FakePrompt::default());
        let ctx = context_with(Arc::clone(&daemon), Arc::clone(&prompt), settings());
        let access = UDisksStorageAccess::new(LUKS, ctx).await;
        let mut events = access.subscribe();

        assert!(access.setup().await);
        prompt.reply("");
        assert_eq!(
            until_done(&mut events).await,
            vec![requested(LUKS), setup_done(ErrorType::UserCanceled, "", LUKS)]
        );
        assert!(daemon.calls().is_empty());
        assert!(!access.is_accessible().await);
        assert_eq!(prompt.released().len(), 1);

        assert!(access.setup().await);
    }

    #[tokio::test]
    async fn unrequested_passphrase_is_ignored() {
        let daemon = FakeDaemon::with_objects([(LUKS, luks_block("/dev/sdc1", None).build())]);
        let access = UDisksStorageAccess::new(LUKS, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();

        access.passphrase_reply("secret").await;
        assert!(daemon.calls().is_empty());
        assert_eq!(events.try_recv(), None);
    }

    #[tokio::test]
    async fn unreachable_prompt_refuses_setup() {
        let daemon = FakeDaemon::with_objects([(LUKS, luks_block("/dev/sdc1", None).build())]);
        let prompt = Arc::new(FakePrompt::default());
        prompt.set_unreachable(true);
        let ctx = context_with(Arc::clone(&daemon), Arc::clone(&prompt), settings());
        let access = UDisksStorageAccess::new(LUKS, ctx).await;

        assert!(!access.setup().await);
        prompt.set_unreachable(false);
        assert!(access.setup().await);
        assert_eq!(prompt.requests().len(), 1);
    }

    #[tokio::test]
    async fn peers_are_released_when_the_requester_goes_away() {
        let daemon = FakeDaemon::with_objects([(LUKS, luks_block("/dev/sdc1", None).build())]);
        let prompt = Arc::new(FakePrompt::default());
        let ctx = context_with(Arc::clone(&daemon), Arc::clone(&prompt), settings());
        let requester = UDisksStorageAccess::new(LUKS, ctx.clone()).await;
        let peer = UDisksStorageAccess::new(LUKS, ctx).await;
        let mut events = peer.subscribe();

        assert!(requester.setup().await);
        assert!(!peer.setup().await);
        drop(requester);

        let seen = until_done(&mut events).await;
        assert_eq!(seen[0], requested(LUKS));
        assert!(matches!(
            seen[1],
            StorageAccessEvent::SetupDone {
                error: ErrorType::OperationFailed,
                ..
            }
        ));
        assert_eq!(prompt.released(), vec![prompt.requests()[0].return_object.clone()]);

        // the late reply goes nowhere
        prompt.reply("secret");
        settle().await;
        assert!(daemon.calls().is_empty());
        assert!(peer.setup().await);
    }

    #[tokio::test]
    async fn wrong_passphrase_reports_unauthorized() {
        let daemon = FakeDaemon::with_objects([(LUKS, luks_block("/dev/sdc1", None).build())]);
        daemon.fail(
            "unlock",
            DaemonError::new(
                "org.freedesktop.UDisks2.Error.NotAuthorizedCanObtain",
                "Not authorized",
            ),
        );
        let prompt = Arc::new(FakePrompt::default());
        let ctx = context_with(Arc::clone(&daemon), Arc::clone(&prompt), settings());
        let access = UDisksStorageAccess::new(LUKS, ctx).await;
        let mut events = access.subscribe();

        assert!(access.setup().await);
        prompt.reply("wrong");
        let seen = until_done(&mut events).await;
        assert!(matches!(
            seen.last(),
            Some(StorageAccessEvent::SetupDone {
                error: ErrorType::UnauthorizedOperation,
                ..
            })
        ));
        assert_eq!(
            daemon.calls(),
            vec![Call::Unlock(LUKS.to_string(), "wrong".to_string())]
        );
    }

    #[tokio::test]
    async fn teardown_ejects_removable_media() {
        let daemon = mounted_volume(drive().removable(true).usb());
        let access = UDisksStorageAccess::new(SDB1, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();

        assert!(access.teardown().await);
        let seen = until_done(&mut events).await;
        assert_eq!(seen[1], accessibility(false, SDB1));
        assert!(matches!(
            seen[2],
            StorageAccessEvent::TeardownDone {
                error: ErrorType::NoError,
                ..
            }
        ));

        daemon.wait_for(&Call::Eject(DRIVE.to_string())).await;
        assert_eq!(daemon.calls()[0], Call::Unmount(SDB1.to_string()));
        assert!(!daemon.calls().contains(&Call::PowerOff(DRIVE.to_string())));
    }

    #[tokio::test]
    async fn teardown_powers_off_fixed_drives_that_allow_it() {
        let daemon = mounted_volume(drive().can_power_off());
        let access = UDisksStorageAccess::new(SDB1, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();

        assert!(access.teardown().await);
        until_done(&mut events).await;
        daemon.wait_for(&Call::PowerOff(DRIVE.to_string())).await;
    }

    #[tokio::test]
    async fn teardown_leaves_optical_and_fixed_drives_alone() {
        for fixture in [drive().removable(true).optical().can_power_off(), drive()] {
            let daemon = mounted_volume(fixture);
            let access = UDisksStorageAccess::new(SDB1, context(Arc::clone(&daemon))).await;
            let mut events = access.subscribe();

            assert!(access.teardown().await);
            until_done(&mut events).await;
            settle().await;
            assert_eq!(daemon.calls(), vec![Call::Unmount(SDB1.to_string())]);
        }
    }

    #[tokio::test]
    async fn teardown_of_unlocked_container_locks_it() {
        let daemon = FakeDaemon::with_objects([
            (LUKS, luks_block("/dev/sdc1", None).build()),
            (
                CLEARTEXT,
                filesystem_block("/dev/mapper/luks-1", None)
                    .mounted_at(&["/run/media/user/secret"])
                    .backed_by(LUKS)
                    .build(),
            ),
        ]);
        let access = UDisksStorageAccess::new(LUKS, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();
        assert!(access.is_accessible().await);

        assert!(access.teardown().await);
        let seen = until_done(&mut events).await;
        assert_eq!(seen[1], accessibility(false, LUKS));
        assert_eq!(
            daemon.calls(),
            vec![
                Call::Unmount(CLEARTEXT.to_string()),
                Call::Lock(LUKS.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn teardown_of_cleartext_device_locks_its_container() {
        let daemon = FakeDaemon::with_objects([
            (LUKS, luks_block("/dev/sdc1", None).build()),
            (
                CLEARTEXT,
                filesystem_block("/dev/mapper/luks-1", None)
                    .mounted_at(&["/run/media/user/secret"])
                    .backed_by(LUKS)
                    .build(),
            ),
        ]);
        let access = UDisksStorageAccess::new(CLEARTEXT, context(Arc::clone(&daemon))).await;
        let mut events = access.subscribe();
        assert!(access.is_encrypted().await);

        assert!(access.teardown().await);
        until_done(&mut events).await;
        assert_eq!(
            daemon.calls(),
            vec![
                Call::Unmount(CLEARTEXT.to_string()),
                Call::Lock(LUKS.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn hanging_unmount_times_out() {
        let daemon = mounted_volume(drive());
        daemon.hang_unmount();
        let mut settings = settings();
        settings.unmount_timeout = Duration::from_millis(50);
        let ctx = context_with(Arc::clone(&daemon), Arc::new(FakePrompt::default()), settings);
        let access = UDisksStorageAccess::new(SDB1, ctx).await;
        let mut events = access.subscribe();

        assert!(access.teardown().await);
        let seen = until_done(&mut events).await;
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            seen[1],
            StorageAccessEvent::TeardownDone {
                error: ErrorType::Timeout,
                ..
            }
        ));
        assert!(access.is_accessible().await);
    }
}
