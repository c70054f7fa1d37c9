// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use crate::Daemon;
use crate::property::ObjectProperties;

/// Lazily loaded properties of one UDisks2 object.
pub struct CachedObject {
    path: String,
    daemon: Arc<dyn Daemon>,
    cache: Mutex<Option<Arc<ObjectProperties>>>,
}

impl CachedObject {
    pub fn new(path: impl Into<String>, daemon: Arc<dyn Daemon>) -> Self {
        Self {
            path: path.into(),
            daemon,
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cached properties; loads them on first use. A failed load yields an
    /// empty set until the cache is invalidated.
    pub async fn properties(&self) -> Arc<ObjectProperties> {
        if let Some(cached) = self.lock().clone() {
            return cached;
        }

        let loaded = match self.daemon.object_properties(self.path.clone()).await {
            Ok(properties) => properties,
            Err(e) => {
                debug!("Cannot load properties of {}: {e}", self.path);
                ObjectProperties::default()
            }
        };
        let loaded = Arc::new(loaded);
        *self.lock() = Some(Arc::clone(&loaded));
        loaded
    }

    pub fn invalidate_cache(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<ObjectProperties>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Hands out one [`CachedObject`] per path while it is alive.
#[derive(Clone)]
pub(crate) struct ObjectRegistry {
    daemon: Arc<dyn Daemon>,
    objects: Arc<Mutex<HashMap<String, Weak<CachedObject>>>>,
}

impl ObjectRegistry {
    pub(crate) fn new(daemon: Arc<dyn Daemon>) -> Self {
        Self {
            daemon,
            objects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn get(&self, path: &str) -> Arc<CachedObject> {
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(object) = objects.get(path).and_then(Weak::upgrade) {
            return object;
        }

        objects.retain(|_, object| object.strong_count() > 0);
        let object = Arc::new(CachedObject::new(path, Arc::clone(&self.daemon)));
        objects.insert(path.to_string(), Arc::downgrade(&object));
        object
    }

    pub(crate) fn invalidate(&self, path: &str) {
        let object = self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .and_then(Weak::upgrade);
        if let Some(object) = object {
            object.invalidate_cache();
        }
    }
}
