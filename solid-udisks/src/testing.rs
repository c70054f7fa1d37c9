// SPDX-License-Identifier: GPL-3.0-only

//! In-memory daemon and prompt used by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::property::{
    BLOCK_INTERFACE, DRIVE_INTERFACE, ENCRYPTED_INTERFACE, FILESYSTEM_INTERFACE,
    PARTITION_INTERFACE, PARTITION_TABLE_INTERFACE,
};
use crate::{
    AccessSettings, Daemon, DaemonError, DaemonEvent, MountOptions, ObjectProperties,
    PassphrasePrompt, PassphraseRequest, Property, ReplyHandler, UDisksContext,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Mount(String, MountOptions),
    Unmount(String),
    Unlock(String, String),
    Lock(String),
    Eject(String),
    PowerOff(String),
}

/// Applies the effect of each call to its object table: mounting sets
/// `MountPoints`, unlocking adds a `<path>_clear` cleartext device, locking
/// removes it again.
#[derive(Default)]
pub(crate) struct FakeDaemon {
    objects: Mutex<BTreeMap<String, ObjectProperties>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, DaemonError>>,
    hang_unmount: AtomicBool,
    events: Mutex<Vec<mpsc::UnboundedSender<DaemonEvent>>>,
}

impl FakeDaemon {
    pub(crate) fn with_objects<'a>(
        objects: impl IntoIterator<Item = (&'a str, ObjectProperties)>,
    ) -> Arc<Self> {
        let daemon = Self::default();
        {
            let mut table = daemon.objects.lock().expect("objects");
            for (path, properties) in objects {
                table.insert(path.to_string(), properties);
            }
        }
        Arc::new(daemon)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    /// Makes every later call of `operation` fail with `error`.
    pub(crate) fn fail(&self, operation: &'static str, error: DaemonError) {
        self.failures.lock().expect("failures").insert(operation, error);
    }

    pub(crate) fn hang_unmount(&self) {
        self.hang_unmount.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_object(&self, path: &str, properties: ObjectProperties) {
        self.objects
            .lock()
            .expect("objects")
            .insert(path.to_string(), properties);
    }

    pub(crate) fn set_mount_points(&self, path: &str, points: &[&str]) {
        let mut objects = self.objects.lock().expect("objects");
        if let Some(object) = objects.get_mut(path) {
            object.insert(FILESYSTEM_INTERFACE, "MountPoints", mount_points(points));
        }
    }

    pub(crate) fn remove_object(&self, path: &str) {
        self.objects.lock().expect("objects").remove(path);
    }

    pub(crate) fn send(&self, event: DaemonEvent) {
        self.events
            .lock()
            .expect("events")
            .retain(|sender| sender.unbounded_send(event.clone()).is_ok());
    }

    /// Waits until `call` shows up; eject and power-off run detached.
    pub(crate) async fn wait_for(&self, call: &Call) {
        for _ in 0..200 {
            if self.calls().contains(call) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{call:?} was never issued, saw {:?}", self.calls());
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls").push(call);
    }

    fn failure(&self, operation: &str) -> Result<(), DaemonError> {
        match self.failures.lock().expect("failures").get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Daemon for FakeDaemon {
    fn object_properties(
        &self,
        path: String,
    ) -> BoxFuture<'_, Result<ObjectProperties, DaemonError>> {
        let result = self
            .objects
            .lock()
            .expect("objects")
            .get(&path)
            .cloned()
            .ok_or_else(|| {
                DaemonError::new(
                    "org.freedesktop.DBus.Error.UnknownObject",
                    format!("No such object path '{path}'"),
                )
            });
        Box::pin(async move { result })
    }

    fn managed_objects(
        &self,
    ) -> BoxFuture<'_, Result<BTreeMap<String, ObjectProperties>, DaemonError>> {
        let objects = self.objects.lock().expect("objects").clone();
        Box::pin(async move { Ok(objects) })
    }

    fn block_devices(&self) -> BoxFuture<'_, Result<Vec<String>, DaemonError>> {
        let paths: Vec<String> = self
            .objects
            .lock()
            .expect("objects")
            .iter()
            .filter(|(_, properties)| properties.is_block())
            .map(|(path, _)| path.clone())
            .collect();
        Box::pin(async move { Ok(paths) })
    }

    fn mount(
        &self,
        path: String,
        options: MountOptions,
    ) -> BoxFuture<'_, Result<String, DaemonError>> {
        self.record(Call::Mount(path.clone(), options));
        Box::pin(async move {
            self.failure("mount")?;
            let name = path.rsplit('/').next().unwrap_or_default();
            let mount_point = format!("/run/media/user/{name}");
            self.set_mount_points(&path, &[&mount_point]);
            Ok(mount_point)
        })
    }

    fn unmount(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>> {
        self.record(Call::Unmount(path.clone()));
        Box::pin(async move {
            if self.hang_unmount.load(Ordering::SeqCst) {
                futures::future::pending::<()>().await;
            }
            self.failure("unmount")?;
            self.set_mount_points(&path, &[]);
            Ok(())
        })
    }

    fn unlock(
        &self,
        path: String,
        passphrase: String,
    ) -> BoxFuture<'_, Result<String, DaemonError>> {
        self.record(Call::Unlock(path.clone(), passphrase));
        Box::pin(async move {
            self.failure("unlock")?;
            let cleartext = format!("{path}_clear");
            self.set_object(&cleartext, cleartext_block(&path).build());
            Ok(cleartext)
        })
    }

    fn lock(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>> {
        self.record(Call::Lock(path.clone()));
        Box::pin(async move {
            self.failure("lock")?;
            self.objects
                .lock()
                .expect("objects")
                .retain(|_, object| object.crypto_backing_device().as_deref() != Some(path.as_str()));
            Ok(())
        })
    }

    fn eject(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>> {
        self.record(Call::Eject(path));
        Box::pin(async move { self.failure("eject") })
    }

    fn power_off(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>> {
        self.record(Call::PowerOff(path));
        Box::pin(async move { self.failure("power_off") })
    }

    fn events(&self) -> BoxFuture<'_, Result<BoxStream<'static, DaemonEvent>, DaemonError>> {
        let (sender, receiver) = mpsc::unbounded();
        self.events.lock().expect("events").push(sender);
        Box::pin(async move { Ok(receiver.boxed()) })
    }
}

/// Records requests; replies are delivered with [`FakePrompt::reply`].
#[derive(Default)]
pub(crate) struct FakePrompt {
    requests: Mutex<Vec<PassphraseRequest>>,
    handlers: Mutex<Vec<ReplyHandler>>,
    released: Mutex<Vec<String>>,
    unreachable: AtomicBool,
}

impl FakePrompt {
    pub(crate) fn requests(&self) -> Vec<PassphraseRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub(crate) fn released(&self) -> Vec<String> {
        self.released.lock().expect("released").clone()
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Answers the most recent request as the dialog would.
    pub(crate) fn reply(&self, passphrase: &str) {
        let handler = self
            .handlers
            .lock()
            .expect("handlers")
            .last()
            .cloned()
            .expect("a passphrase was requested");
        handler(passphrase.to_string());
    }
}

impl PassphrasePrompt for FakePrompt {
    fn show(
        &self,
        request: PassphraseRequest,
        on_reply: ReplyHandler,
    ) -> BoxFuture<'_, Result<(), DaemonError>> {
        Box::pin(async move {
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(DaemonError::new(
                    "org.freedesktop.DBus.Error.ServiceUnknown",
                    "The name org.kde.kded6 was not provided by any .service files",
                ));
            }
            self.requests.lock().expect("requests").push(request);
            self.handlers.lock().expect("handlers").push(on_reply);
            Ok(())
        })
    }

    fn release(&self, return_object: String) -> BoxFuture<'_, ()> {
        self.released.lock().expect("released").push(return_object);
        Box::pin(async {})
    }
}

pub(crate) fn settings() -> AccessSettings {
    AccessSettings {
        unmount_timeout: Duration::from_secs(5),
        mountinfo_path: "/nonexistent/mountinfo".into(),
        home_dir: Some("/home/user".into()),
        app_id: "solid-tests".to_string(),
    }
}

pub(crate) fn context(daemon: Arc<FakeDaemon>) -> UDisksContext {
    context_with(daemon, Arc::new(FakePrompt::default()), settings())
}

pub(crate) fn context_with(
    daemon: Arc<FakeDaemon>,
    prompt: Arc<FakePrompt>,
    settings: AccessSettings,
) -> UDisksContext {
    let udev = solid_udev::Client::with_roots("/nonexistent/sys", "/nonexistent/udev");
    UDisksContext::new(daemon, prompt, Arc::new(udev), settings)
}

fn mount_points(points: &[&str]) -> Property {
    Property::ByteArrays(
        points
            .iter()
            .map(|point| {
                let mut bytes = point.as_bytes().to_vec();
                bytes.push(0);
                bytes
            })
            .collect(),
    )
}

/// Builder for object fixtures.
pub(crate) struct Fixture {
    properties: ObjectProperties,
}

impl Fixture {
    fn set(mut self, interface: &str, name: &str, property: Property) -> Self {
        self.properties.insert(interface, name, property);
        self
    }

    fn main_interface(&self) -> &'static str {
        if self.properties.is_drive() {
            DRIVE_INTERFACE
        } else {
            BLOCK_INTERFACE
        }
    }

    pub(crate) fn size(self, bytes: u64) -> Self {
        let interface = self.main_interface();
        self.set(interface, "Size", Property::U64(bytes))
    }

    pub(crate) fn removable(self, removable: bool) -> Self {
        self.set(DRIVE_INTERFACE, "Removable", Property::Bool(removable))
            .set(DRIVE_INTERFACE, "MediaRemovable", Property::Bool(removable))
            .set(DRIVE_INTERFACE, "MediaAvailable", Property::Bool(true))
    }

    pub(crate) fn usb(self) -> Self {
        self.set(DRIVE_INTERFACE, "ConnectionBus", Property::Str("usb".into()))
    }

    pub(crate) fn optical(self) -> Self {
        self.set(DRIVE_INTERFACE, "Optical", Property::Bool(true)).set(
            DRIVE_INTERFACE,
            "MediaCompatibility",
            Property::Strs(vec!["optical_cd".into(), "optical_dvd".into()]),
        )
    }

    pub(crate) fn can_power_off(self) -> Self {
        self.set(DRIVE_INTERFACE, "CanPowerOff", Property::Bool(true))
    }

    pub(crate) fn partition_of(self, table: &str) -> Self {
        self.set(PARTITION_INTERFACE, "Table", Property::ObjectPath(table.into()))
    }

    pub(crate) fn label(self, label: &str) -> Self {
        self.set(BLOCK_INTERFACE, "IdLabel", Property::Str(label.into()))
    }

    pub(crate) fn fs_type(self, fs_type: &str) -> Self {
        self.set(BLOCK_INTERFACE, "IdType", Property::Str(fs_type.into()))
    }

    pub(crate) fn mounted_at(self, points: &[&str]) -> Self {
        self.set(FILESYSTEM_INTERFACE, "MountPoints", mount_points(points))
    }

    pub(crate) fn backed_by(self, container: &str) -> Self {
        self.set(
            BLOCK_INTERFACE,
            "CryptoBackingDevice",
            Property::ObjectPath(container.into()),
        )
    }

    pub(crate) fn build(self) -> ObjectProperties {
        self.properties
    }
}

fn block(device: &str, drive: Option<&str>) -> Fixture {
    Fixture {
        properties: ObjectProperties::new(),
    }
    .set(BLOCK_INTERFACE, "Device", Property::Bytes(device.as_bytes().to_vec()))
    .set(
        BLOCK_INTERFACE,
        "Drive",
        Property::ObjectPath(drive.unwrap_or("/").into()),
    )
    .set(BLOCK_INTERFACE, "CryptoBackingDevice", Property::ObjectPath("/".into()))
}

pub(crate) fn drive() -> Fixture {
    Fixture {
        properties: ObjectProperties::new(),
    }
    .set(DRIVE_INTERFACE, "Vendor", Property::Str("Kingston".into()))
    .set(DRIVE_INTERFACE, "Model", Property::Str("DataTraveler".into()))
}

pub(crate) fn filesystem_block(device: &str, drive: Option<&str>) -> Fixture {
    block(device, drive)
        .set(BLOCK_INTERFACE, "IdUsage", Property::Str("filesystem".into()))
        .fs_type("ext4")
        .mounted_at(&[])
}

pub(crate) fn luks_block(device: &str, drive: Option<&str>) -> Fixture {
    block(device, drive)
        .set(BLOCK_INTERFACE, "IdUsage", Property::Str("crypto".into()))
        .fs_type("crypto_LUKS")
        .set(ENCRYPTED_INTERFACE, "HintEncryptionType", Property::Str("LUKS2".into()))
}

pub(crate) fn table_block(device: &str, drive: Option<&str>) -> Fixture {
    block(device, drive).set(PARTITION_TABLE_INTERFACE, "Type", Property::Str("gpt".into()))
}

fn cleartext_block(container: &str) -> Fixture {
    filesystem_block("/dev/mapper/luks-1", None).backed_by(container)
}
