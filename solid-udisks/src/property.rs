// SPDX-License-Identifier: GPL-3.0-only

//! Cached UDisks2 object properties.

use std::collections::BTreeMap;

use zbus::zvariant::Value;

pub const UDISKS_INTERFACE_PREFIX: &str = "org.freedesktop.UDisks2.";

pub const BLOCK_INTERFACE: &str = "org.freedesktop.UDisks2.Block";
pub const DRIVE_INTERFACE: &str = "org.freedesktop.UDisks2.Drive";
pub const FILESYSTEM_INTERFACE: &str = "org.freedesktop.UDisks2.Filesystem";
pub const ENCRYPTED_INTERFACE: &str = "org.freedesktop.UDisks2.Encrypted";
pub const PARTITION_INTERFACE: &str = "org.freedesktop.UDisks2.Partition";
pub const PARTITION_TABLE_INTERFACE: &str = "org.freedesktop.UDisks2.PartitionTable";

/// Root object path; never a real device.
pub const NULL_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Bool(bool),
    U64(u64),
    I64(i64),
    Double(f64),
    Str(String),
    ObjectPath(String),
    Bytes(Vec<u8>),
    ByteArrays(Vec<Vec<u8>>),
    Strs(Vec<String>),
}

impl Property {
    /// Converts the value shapes UDisks2 uses; dictionaries and structs
    /// (such as `Configuration`) are skipped.
    pub fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::U8(n) => Some(Self::U64(u64::from(*n))),
            Value::U16(n) => Some(Self::U64(u64::from(*n))),
            Value::U32(n) => Some(Self::U64(u64::from(*n))),
            Value::U64(n) => Some(Self::U64(*n)),
            Value::I16(n) => Some(Self::I64(i64::from(*n))),
            Value::I32(n) => Some(Self::I64(i64::from(*n))),
            Value::I64(n) => Some(Self::I64(*n)),
            Value::F64(n) => Some(Self::Double(*n)),
            Value::Str(s) => Some(Self::Str(s.as_str().to_string())),
            Value::ObjectPath(p) => Some(Self::ObjectPath(p.as_str().to_string())),
            Value::Value(inner) => Self::from_value(inner),
            Value::Array(array) => {
                let items: Vec<&Value<'_>> = array.inner().iter().collect();
                if let Some(bytes) = items.iter().map(|v| byte_of(v)).collect::<Option<Vec<u8>>>()
                {
                    return Some(Self::Bytes(bytes));
                }
                let nested = items
                    .iter()
                    .map(|v| match Self::from_value(v) {
                        Some(Self::Bytes(bytes)) => Some(bytes),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>();
                if let Some(nested) = nested
                    && !items.is_empty()
                {
                    return Some(Self::ByteArrays(nested));
                }
                items
                    .iter()
                    .map(|v| match v {
                        Value::Str(s) => Some(s.as_str().to_string()),
                        Value::ObjectPath(p) => Some(p.as_str().to_string()),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(Self::Strs)
            }
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(n) => Some(*n),
            Self::I64(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Strings, object paths and NUL terminated byte strings.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::Str(s) | Self::ObjectPath(s) => Some(s.clone()),
            Self::Bytes(bytes) => Some(decode_bytes(bytes)),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Vec<String> {
        match self {
            Self::Strs(items) => items.clone(),
            Self::ByteArrays(items) => items.iter().map(|b| decode_bytes(b)).collect(),
            Self::Str(s) | Self::ObjectPath(s) => vec![s.clone()],
            // an empty `aay` decodes as an empty byte string
            Self::Bytes(bytes) if bytes.is_empty() => Vec::new(),
            Self::Bytes(bytes) => vec![decode_bytes(bytes)],
            _ => Vec::new(),
        }
    }
}

fn byte_of(value: &Value<'_>) -> Option<u8> {
    match value {
        Value::U8(b) => Some(*b),
        _ => None,
    }
}

fn decode_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// All interfaces of one object and their properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectProperties {
    interfaces: BTreeMap<String, BTreeMap<String, Property>>,
}

impl ObjectProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_interface(&mut self, interface: impl Into<String>) {
        self.interfaces.entry(interface.into()).or_default();
    }

    pub fn insert(
        &mut self,
        interface: impl Into<String>,
        name: impl Into<String>,
        property: Property,
    ) {
        self.interfaces
            .entry(interface.into())
            .or_default()
            .insert(name.into(), property);
    }

    /// Builder form of [`ObjectProperties::insert`].
    pub fn with(mut self, interface: &str, name: &str, property: Property) -> Self {
        self.insert(interface, name, property);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.contains_key(interface)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    /// Looks `name` up across every interface.
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.interfaces.values().find_map(|props| props.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn bool(&self, name: &str) -> bool {
        self.get(name).and_then(Property::as_bool).unwrap_or(false)
    }

    pub fn u64(&self, name: &str) -> u64 {
        self.get(name).and_then(Property::as_u64).unwrap_or(0)
    }

    pub fn string(&self, name: &str) -> String {
        self.get(name).and_then(Property::as_string).unwrap_or_default()
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        self.get(name).map(Property::as_strings).unwrap_or_default()
    }

    /// Object path property, `None` when unset or pointing at `/`.
    pub fn object_path(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(Property::as_string)
            .filter(|path| !path.is_empty() && path != NULL_PATH)
    }

    pub fn is_block(&self) -> bool {
        self.has_interface(BLOCK_INTERFACE)
    }

    pub fn is_drive(&self) -> bool {
        self.has_interface(DRIVE_INTERFACE)
    }

    pub fn is_filesystem(&self) -> bool {
        self.has_interface(FILESYSTEM_INTERFACE)
    }

    pub fn is_partition(&self) -> bool {
        self.has_interface(PARTITION_INTERFACE)
    }

    pub fn is_partition_table(&self) -> bool {
        self.has_interface(PARTITION_TABLE_INTERFACE)
    }

    /// A LUKS container, locked or not.
    pub fn is_encrypted_container(&self) -> bool {
        self.has_interface(ENCRYPTED_INTERFACE) || self.string("IdUsage") == "crypto"
    }

    /// The container this cleartext device was unlocked from.
    pub fn crypto_backing_device(&self) -> Option<String> {
        self.object_path("CryptoBackingDevice")
    }

    pub fn mount_points(&self) -> Vec<String> {
        self.strings("MountPoints")
            .into_iter()
            .filter(|point| !point.is_empty())
            .collect()
    }

    pub fn is_mounted(&self) -> bool {
        self.is_filesystem() && !self.mount_points().is_empty()
    }
}
