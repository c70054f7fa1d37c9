// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use solid_types::ErrorType;
use tracing::debug;

use crate::access::AccessInner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Setup,
    Teardown,
}

/// Connects every storage access object of the same UDI in this process, so
/// they all observe requests and completions regardless of which one
/// started the action.
#[derive(Clone, Default)]
pub(crate) struct ActionBus {
    peers: Arc<Mutex<HashMap<String, Vec<Weak<AccessInner>>>>>,
}

impl ActionBus {
    pub(crate) fn register(&self, udi: &str, inner: &Arc<AccessInner>) {
        self.lock()
            .entry(udi.to_string())
            .or_default()
            .push(Arc::downgrade(inner));
    }

    /// Claims `action` on every observer of `udi`; refused while any of
    /// them has an action in flight.
    pub(crate) fn try_begin(&self, udi: &str, action: Action) -> bool {
        let peers = {
            let mut registry = self.lock();
            let peers = live_peers(&mut registry, udi);
            if peers.iter().any(|peer| peer.is_busy()) {
                debug!("Refusing {action:?} of {udi}: another action is in progress");
                return false;
            }
            for peer in &peers {
                peer.mark_in_progress(action);
            }
            peers
        };

        for peer in &peers {
            peer.emit_requested(action);
        }
        true
    }

    /// Ends `action` everywhere without a completion event.
    pub(crate) fn abort(&self, udi: &str, action: Action) {
        let peers = live_peers(&mut self.lock(), udi);
        for peer in peers {
            peer.clear(action);
        }
    }

    pub(crate) async fn broadcast_done(
        &self,
        udi: &str,
        action: Action,
        error: ErrorType,
        message: String,
    ) {
        let peers = live_peers(&mut self.lock(), udi);
        for peer in peers {
            peer.action_done(action, error, message.clone()).await;
        }
    }

    pub(crate) async fn device_changed(&self, udi: &str) {
        let peers = live_peers(&mut self.lock(), udi);
        for peer in peers {
            peer.device_changed().await;
        }
    }

    /// Every UDI with a live storage access object.
    pub(crate) fn udis(&self) -> Vec<String> {
        let mut registry = self.lock();
        registry.retain(|_, peers| {
            peers.retain(|peer| peer.strong_count() > 0);
            !peers.is_empty()
        });
        registry.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Weak<AccessInner>>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn live_peers(
    registry: &mut HashMap<String, Vec<Weak<AccessInner>>>,
    udi: &str,
) -> Vec<Arc<AccessInner>> {
    let Some(entries) = registry.get_mut(udi) else {
        return Vec::new();
    };
    entries.retain(|peer| peer.strong_count() > 0);
    let peers: Vec<_> = entries.iter().filter_map(Weak::upgrade).collect();
    if entries.is_empty() {
        registry.remove(udi);
    }
    peers
}
