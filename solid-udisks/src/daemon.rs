// SPDX-License-Identifier: GPL-3.0-only

use std::collections::{BTreeMap, HashMap};

use futures::StreamExt;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use tracing::{debug, warn};
use udisks2::{drive::DriveProxy, encrypted::EncryptedProxy, filesystem::FilesystemProxy};
use zbus::fdo::{IntrospectableProxy, ObjectManagerProxy, PropertiesProxy};
use zbus::names::InterfaceName;
use zbus::zvariant::{self, OwnedValue, Value};
use zbus::{Connection, MatchRule, MessageStream};
use zbus_macros::proxy;

use crate::DaemonError;
use crate::property::{ObjectProperties, Property, UDISKS_INTERFACE_PREFIX};

pub const UDISKS_SERVICE: &str = "org.freedesktop.UDisks2";
pub const UDISKS_ROOT: &str = "/org/freedesktop/UDisks2";
pub const BLOCK_DEVICES_PATH: &str = "/org/freedesktop/UDisks2/block_devices";

/// Options passed to `Filesystem.Mount`.
pub type MountOptions = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    InterfacesAdded { path: String, interfaces: Vec<String> },
    InterfacesRemoved { path: String, interfaces: Vec<String> },
    PropertiesChanged { path: String },
}

/// Calls issued against the UDisks2 daemon.
pub trait Daemon: Send + Sync {
    fn object_properties(&self, path: String)
    -> BoxFuture<'_, Result<ObjectProperties, DaemonError>>;

    fn managed_objects(
        &self,
    ) -> BoxFuture<'_, Result<BTreeMap<String, ObjectProperties>, DaemonError>>;

    /// Object paths below `block_devices`, from one introspection call.
    fn block_devices(&self) -> BoxFuture<'_, Result<Vec<String>, DaemonError>>;

    /// Returns the mount point chosen by the daemon.
    fn mount(
        &self,
        path: String,
        options: MountOptions,
    ) -> BoxFuture<'_, Result<String, DaemonError>>;

    fn unmount(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>>;

    /// Returns the object path of the cleartext device.
    fn unlock(
        &self,
        path: String,
        passphrase: String,
    ) -> BoxFuture<'_, Result<String, DaemonError>>;

    fn lock(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>>;
    fn eject(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>>;
    fn power_off(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>>;

    fn events(&self) -> BoxFuture<'_, Result<BoxStream<'static, DaemonEvent>, DaemonError>>;
}

#[proxy(
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2",
    interface = "org.freedesktop.DBus.ObjectManager"
)]
pub trait UDisks2ObjectManager {
    #[zbus(signal)]
    fn interfaces_added(
        &self,
        object_path: zvariant::OwnedObjectPath,
        interfaces_and_properties: HashMap<String, HashMap<String, zvariant::OwnedValue>>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    fn interfaces_removed(
        &self,
        object_path: zvariant::OwnedObjectPath,
        interfaces: Vec<String>,
    ) -> zbus::Result<()>;
}

#[derive(Clone)]
pub struct RealDaemon {
    connection: Connection,
}

impl RealDaemon {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn system() -> Result<Self, DaemonError> {
        Ok(Self::new(Connection::system().await?))
    }

    async fn introspect(&self, path: &str) -> Result<String, DaemonError> {
        let proxy = IntrospectableProxy::builder(&self.connection)
            .destination(UDISKS_SERVICE)?
            .path(path.to_string())?
            .build()
            .await?;
        Ok(proxy.introspect().await?)
    }
}

impl Daemon for RealDaemon {
    fn object_properties(
        &self,
        path: String,
    ) -> BoxFuture<'_, Result<ObjectProperties, DaemonError>> {
        Box::pin(async move {
            let xml = self.introspect(&path).await?;
            let properties = PropertiesProxy::builder(&self.connection)
                .destination(UDISKS_SERVICE)?
                .path(path.clone())?
                .build()
                .await?;

            let mut object = ObjectProperties::new();
            for interface in xml_names(&xml, "interface")
                .into_iter()
                .filter(|name| name.starts_with(UDISKS_INTERFACE_PREFIX))
            {
                let name = InterfaceName::try_from(interface.as_str())
                    .map_err(|e| DaemonError::failed(e.to_string()))?;
                let values = properties.get_all(name).await?;
                object.insert_interface(interface.clone());
                insert_values(&mut object, &interface, &values);
            }

            debug!("Loaded {} interfaces of {path}", object.interfaces().count());
            Ok(object)
        })
    }

    fn managed_objects(
        &self,
    ) -> BoxFuture<'_, Result<BTreeMap<String, ObjectProperties>, DaemonError>> {
        Box::pin(async move {
            let proxy = ObjectManagerProxy::builder(&self.connection)
                .destination(UDISKS_SERVICE)?
                .path(UDISKS_ROOT)?
                .build()
                .await?;

            let managed = proxy.get_managed_objects().await?;
            let mut objects = BTreeMap::new();
            for (path, interfaces) in &managed {
                let mut object = ObjectProperties::new();
                for (interface, values) in interfaces {
                    object.insert_interface(interface.as_str());
                    insert_values(&mut object, interface.as_str(), values);
                }
                objects.insert(path.as_str().to_string(), object);
            }
            Ok(objects)
        })
    }

    fn block_devices(&self) -> BoxFuture<'_, Result<Vec<String>, DaemonError>> {
        Box::pin(async move {
            let xml = self.introspect(BLOCK_DEVICES_PATH).await?;
            Ok(xml_names(&xml, "node")
                .into_iter()
                .map(|name| format!("{BLOCK_DEVICES_PATH}/{name}"))
                .collect())
        })
    }

    fn mount(
        &self,
        path: String,
        options: MountOptions,
    ) -> BoxFuture<'_, Result<String, DaemonError>> {
        Box::pin(async move {
            let proxy = FilesystemProxy::builder(&self.connection)
                .path(path)?
                .build()
                .await?;
            let options: HashMap<&str, Value<'_>> = options
                .iter()
                .map(|(key, value)| (key.as_str(), Value::from(value.as_str())))
                .collect();
            Ok(proxy.mount(options).await?)
        })
    }

    fn unmount(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>> {
        Box::pin(async move {
            let proxy = FilesystemProxy::builder(&self.connection)
                .path(path)?
                .build()
                .await?;
            proxy.unmount(HashMap::new()).await?;
            Ok(())
        })
    }

    fn unlock(
        &self,
        path: String,
        passphrase: String,
    ) -> BoxFuture<'_, Result<String, DaemonError>> {
        Box::pin(async move {
            let proxy = EncryptedProxy::builder(&self.connection)
                .path(path)?
                .build()
                .await?;
            let cleartext = proxy.unlock(&passphrase, HashMap::new()).await?;
            Ok(cleartext.to_string())
        })
    }

    fn lock(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>> {
        Box::pin(async move {
            let proxy = EncryptedProxy::builder(&self.connection)
                .path(path)?
                .build()
                .await?;
            proxy.lock(HashMap::new()).await?;
            Ok(())
        })
    }

    fn eject(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>> {
        Box::pin(async move {
            let proxy = DriveProxy::builder(&self.connection)
                .path(path)?
                .build()
                .await?;
            proxy.eject(HashMap::new()).await?;
            Ok(())
        })
    }

    fn power_off(&self, path: String) -> BoxFuture<'_, Result<(), DaemonError>> {
        Box::pin(async move {
            let proxy = DriveProxy::builder(&self.connection)
                .path(path)?
                .build()
                .await?;
            proxy.power_off(HashMap::new()).await?;
            Ok(())
        })
    }

    fn events(&self) -> BoxFuture<'_, Result<BoxStream<'static, DaemonEvent>, DaemonError>> {
        Box::pin(async move {
            let object_manager = UDisks2ObjectManagerProxy::new(&self.connection).await?;
            let added = object_manager
                .receive_interfaces_added()
                .await?
                .filter_map(|signal| {
                    future::ready(match signal.args() {
                        Ok(args) => Some(DaemonEvent::InterfacesAdded {
                            path: args.object_path.to_string(),
                            interfaces: args.interfaces_and_properties.keys().cloned().collect(),
                        }),
                        Err(e) => {
                            warn!("Failed to parse InterfacesAdded signal args: {e}");
                            None
                        }
                    })
                });
            let removed = object_manager
                .receive_interfaces_removed()
                .await?
                .filter_map(|signal| {
                    future::ready(match signal.args() {
                        Ok(args) => Some(DaemonEvent::InterfacesRemoved {
                            path: args.object_path.to_string(),
                            interfaces: args.interfaces.clone(),
                        }),
                        Err(e) => {
                            warn!("Failed to parse InterfacesRemoved signal args: {e}");
                            None
                        }
                    })
                });

            let rule = MatchRule::builder()
                .msg_type(zbus::message::Type::Signal)
                .sender(UDISKS_SERVICE)?
                .interface("org.freedesktop.DBus.Properties")?
                .member("PropertiesChanged")?
                .path_namespace(UDISKS_ROOT)?
                .build();
            let changed = MessageStream::for_match_rule(rule, &self.connection, None)
                .await?
                .filter_map(|message| {
                    future::ready(message.ok().and_then(|message| {
                        let path = message.header().path()?.to_string();
                        Some(DaemonEvent::PropertiesChanged { path })
                    }))
                });

            Ok(stream::select_all([added.boxed(), removed.boxed(), changed.boxed()]).boxed())
        })
    }
}

fn insert_values(object: &mut ObjectProperties, interface: &str, values: &HashMap<String, OwnedValue>) {
    for (name, value) in values {
        if let Some(property) = Property::from_value(value) {
            object.insert(interface, name.as_str(), property);
        }
    }
}

/// `name` attributes of every `<element name="...">` in an introspection
/// document. Either quote style is accepted.
fn xml_names(xml: &str, element: &str) -> Vec<String> {
    let open = format!("<{element}");
    xml.match_indices(&open)
        .filter_map(|(start, _)| {
            let rest = &xml[start + open.len()..];
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let tag = &rest[..rest.find('>').unwrap_or(rest.len())];
            xml_attribute(tag, "name")
        })
        .collect()
}

fn xml_attribute(tag: &str, key: &str) -> Option<String> {
    tag.match_indices(key).find_map(|(at, _)| {
        if !tag[..at].ends_with(char::is_whitespace) {
            return None;
        }
        let value = tag[at + key.len()..].trim_start().strip_prefix('=')?.trim_start();
        let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value = &value[1..];
        value.find(quote).map(|end| value[..end].to_string())
    })
}
