// SPDX-License-Identifier: GPL-3.0-only

//! Typed publish/subscribe used by devices and managers to report changes.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::stream::Stream;
use futures::task::{Context, Poll};
use tokio::sync::mpsc;

struct Registry<E> {
    next_id: u64,
    senders: Vec<(u64, mpsc::UnboundedSender<E>)>,
}

type SharedRegistry<E> = Arc<Mutex<Registry<E>>>;

/// Fan-out point for events of type `E`.
///
/// Clones share the same subscriber list.
pub struct Notifier<E> {
    registry: SharedRegistry<E>,
}

impl<E> Clone for Notifier<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Clone + Send + 'static> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> Notifier<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                senders: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self) -> Subscription<E> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.senders.push((id, sender));

        Subscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers `event` to every live subscription, pruning closed ones.
    pub fn emit(&self, event: E) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .senders
            .retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }
}

/// Receiving end of a [`Notifier`]. Dropping it unsubscribes.
pub struct Subscription<E> {
    id: u64,
    receiver: mpsc::UnboundedReceiver<E>,
    registry: Weak<Mutex<Registry<E>>>,
}

impl<E> Subscription<E> {
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    /// Returns an already delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.senders.retain(|(id, _)| *id != self.id);
        }
    }
}

impl<E> Stream for Subscription<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
