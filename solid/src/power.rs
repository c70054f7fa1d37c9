// SPDX-License-Identifier: GPL-3.0-only

//! Blocking sleep and shutdown through logind.

use std::os::fd::OwnedFd;
use std::sync::{Arc, Mutex, PoisonError};

use enumflags2::BitFlags;
use futures::future::BoxFuture;
use solid_contracts::{Notifier, SolidError, Subscription};
use solid_types::{ErrorType, InhibitionState, InhibitionType};
use tracing::{debug, info};
use zbus::{Connection, zvariant};
use zbus_macros::proxy;

#[proxy(
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1",
    interface = "org.freedesktop.login1.Manager"
)]
pub trait Login1Manager {
    fn inhibit(
        &self,
        what: &str,
        who: &str,
        why: &str,
        mode: &str,
    ) -> zbus::Result<zvariant::OwnedFd>;
}

/// Takes an inhibitor lock. The lock is held as long as the returned file
/// descriptor stays open.
pub trait Inhibitor: Send + Sync {
    fn inhibit(
        &self,
        what: String,
        who: String,
        why: String,
    ) -> BoxFuture<'_, Result<OwnedFd, SolidError>>;
}

pub struct LogindInhibitor {
    proxy: Login1ManagerProxy<'static>,
}

impl LogindInhibitor {
    pub async fn system() -> Result<Self, SolidError> {
        let connection = Connection::system()
            .await
            .map_err(|e| SolidError::BackendUnavailable(e.to_string()))?;
        let proxy = Login1ManagerProxy::new(&connection)
            .await
            .map_err(|e| SolidError::DBusError(e.to_string()))?;
        Ok(Self { proxy })
    }
}

impl Inhibitor for LogindInhibitor {
    fn inhibit(
        &self,
        what: String,
        who: String,
        why: String,
    ) -> BoxFuture<'_, Result<OwnedFd, SolidError>> {
        Box::pin(async move {
            debug!("Inhibit({what}, {who}, {why}, block)");
            let fd = self
                .proxy
                .inhibit(&what, &who, &why, "block")
                .await
                .map_err(|e| SolidError::action(ErrorType::OperationFailed, e.to_string()))?;
            Ok(fd.into())
        })
    }
}

pub struct Power {
    inhibitor: Arc<dyn Inhibitor>,
    app_id: String,
}

impl Power {
    /// `app_id` is reported to logind as the holder of every lock.
    pub fn new(inhibitor: Arc<dyn Inhibitor>, app_id: impl Into<String>) -> Self {
        Self {
            inhibitor,
            app_id: app_id.into(),
        }
    }

    pub async fn system(app_id: impl Into<String>) -> Result<Self, SolidError> {
        Ok(Self::new(Arc::new(LogindInhibitor::system().await?), app_id))
    }

    /// Prepares a lock against `states`; nothing happens until the job is
    /// started.
    pub fn inhibit(
        &self,
        states: BitFlags<InhibitionType>,
        description: impl Into<String>,
    ) -> InhibitionJob {
        InhibitionJob {
            inhibitor: Arc::clone(&self.inhibitor),
            states,
            who: self.app_id.clone(),
            why: description.into(),
        }
    }
}

pub struct InhibitionJob {
    inhibitor: Arc<dyn Inhibitor>,
    states: BitFlags<InhibitionType>,
    who: String,
    why: String,
}

impl InhibitionJob {
    pub async fn start(self) -> Result<Inhibition, SolidError> {
        if self.states.is_empty() {
            return Err(SolidError::action(
                ErrorType::InvalidOption,
                "Nothing to inhibit",
            ));
        }

        let what = InhibitionType::logind_what(self.states);
        let fd = self
            .inhibitor
            .inhibit(what.clone(), self.who, self.why)
            .await?;
        info!("Inhibiting {what}");

        Ok(Inhibition {
            fd: Mutex::new(Some(fd)),
            states: self.states,
            events: Notifier::new(),
        })
    }
}

/// A held inhibitor lock. Dropping it releases the lock.
pub struct Inhibition {
    fd: Mutex<Option<OwnedFd>>,
    states: BitFlags<InhibitionType>,
    events: Notifier<InhibitionState>,
}

impl Inhibition {
    pub fn states(&self) -> BitFlags<InhibitionType> {
        self.states
    }

    pub fn state(&self) -> InhibitionState {
        match *self.fd.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(_) => InhibitionState::Started,
            None => InhibitionState::Stopped,
        }
    }

    /// Releases the lock. Stopping twice does nothing.
    pub fn stop(&self) {
        let fd = self.fd.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(fd) = fd {
            drop(fd);
            info!("Released {} inhibition", InhibitionType::logind_what(self.states));
            self.events.emit(InhibitionState::Stopped);
        }
    }

    pub fn subscribe(&self) -> Subscription<InhibitionState> {
        self.events.subscribe()
    }
}
