// SPDX-License-Identifier: GPL-3.0-only

//! Passphrase round trip through the desktop's prompt service.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use tracing::{debug, warn};
use zbus::{Connection, interface};
use zbus_macros::proxy;

use crate::DaemonError;

pub const DEFAULT_PROMPT_SERVICE: &str = "org.kde.kded6";
const RETURN_OBJECT_PREFIX: &str = "/org/kde/solid/UDisks2StorageAccess_";

static NEXT_RETURN_OBJECT: AtomicU64 = AtomicU64::new(1);

/// A fresh, process-unique object path for receiving one reply.
pub(crate) fn next_return_object() -> String {
    let n = NEXT_RETURN_OBJECT.fetch_add(1, Ordering::Relaxed);
    format!("{RETURN_OBJECT_PREFIX}{n}")
}

/// Best effort id of the window asking; `0` when unknown.
pub(crate) fn active_window_id() -> u32 {
    std::env::var("WINDOWID")
        .ok()
        .and_then(|id| id.trim().parse().ok())
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassphraseRequest {
    pub udi: String,
    pub return_object: String,
    pub window_id: u32,
    pub app_id: String,
}

/// Receives the entered passphrase; empty when the user canceled.
pub type ReplyHandler = Arc<dyn Fn(String) + Send + Sync>;

pub trait PassphrasePrompt: Send + Sync {
    /// Shows the dialog; resolves once the prompt service accepted the
    /// request.
    fn show(
        &self,
        request: PassphraseRequest,
        on_reply: ReplyHandler,
    ) -> BoxFuture<'_, Result<(), DaemonError>>;

    /// Stops listening on `return_object`.
    fn release(&self, return_object: String) -> BoxFuture<'_, ()>;
}

#[proxy(
    interface = "org.kde.SolidUiServer",
    default_path = "/modules/soliduiserver"
)]
pub trait SolidUiServer {
    #[zbus(name = "showPassphraseDialog")]
    fn show_passphrase_dialog(
        &self,
        udi: &str,
        return_service: &str,
        return_object: &str,
        window_id: u32,
        app_id: &str,
    ) -> zbus::Result<()>;
}

struct PassphraseReceiver {
    on_reply: ReplyHandler,
}

#[interface(name = "org.kde.Solid.UDisks2StorageAccess")]
impl PassphraseReceiver {
    #[zbus(name = "passphraseReply")]
    fn passphrase_reply(&self, passphrase: String) {
        (self.on_reply)(passphrase);
    }
}

/// Prompt service reached over the session bus.
#[derive(Clone)]
pub struct DBusPassphrasePrompt {
    connection: Connection,
    service: String,
}

impl DBusPassphrasePrompt {
    pub fn new(connection: Connection, service: impl Into<String>) -> Self {
        Self {
            connection,
            service: service.into(),
        }
    }

    pub async fn session(service: impl Into<String>) -> Result<Self, DaemonError> {
        Ok(Self::new(Connection::session().await?, service))
    }
}

impl PassphrasePrompt for DBusPassphrasePrompt {
    fn show(
        &self,
        request: PassphraseRequest,
        on_reply: ReplyHandler,
    ) -> BoxFuture<'_, Result<(), DaemonError>> {
        Box::pin(async move {
            self.connection
                .object_server()
                .at(request.return_object.as_str(), PassphraseReceiver { on_reply })
                .await?;

            let return_service = self
                .connection
                .unique_name()
                .map(|name| name.to_string())
                .unwrap_or_default();

            let dispatched = async {
                let proxy = SolidUiServerProxy::builder(&self.connection)
                    .destination(self.service.as_str())?
                    .build()
                    .await?;
                proxy
                    .show_passphrase_dialog(
                        &request.udi,
                        &return_service,
                        &request.return_object,
                        request.window_id,
                        &request.app_id,
                    )
                    .await
            }
            .await;

            if let Err(e) = dispatched {
                self.release(request.return_object.clone()).await;
                return Err(e.into());
            }
            debug!("Passphrase requested for {}", request.udi);
            Ok(())
        })
    }

    fn release(&self, return_object: String) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self
                .connection
                .object_server()
                .remove::<PassphraseReceiver, _>(return_object.as_str())
                .await
            {
                warn!("Cannot unregister {return_object}: {e}");
            }
        })
    }
}

/// Used when no session bus is reachable; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassphrasePrompt;

impl PassphrasePrompt for NoPassphrasePrompt {
    fn show(
        &self,
        request: PassphraseRequest,
        _on_reply: ReplyHandler,
    ) -> BoxFuture<'_, Result<(), DaemonError>> {
        Box::pin(async move {
            Err(DaemonError::new(
                "org.freedesktop.DBus.Error.ServiceUnknown",
                format!("No passphrase dialog available for {}", request.udi),
            ))
        })
    }

    fn release(&self, _return_object: String) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::Mutex;
    use std::time::Duration;

    use zbus::Guid;
    use zbus::connection::Builder;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingUiServer {
        udis: Arc<Mutex<Vec<String>>>,
    }

    #[interface(name = "org.kde.SolidUiServer")]
    impl RecordingUiServer {
        #[zbus(name = "showPassphraseDialog")]
        fn show_passphrase_dialog(
            &self,
            udi: String,
            _return_service: String,
            _return_object: String,
            _window_id: u32,
            _app_id: String,
        ) {
            self.udis.lock().expect("udis").push(udi);
        }
    }

    /// A connected pair of peer-to-peer connections; the second one plays
    /// the prompt service.
    #[allow(deprecated)]
    async fn connections() -> (Connection, Connection) {
        let (client, server) = UnixStream::pair().expect("socket pair");
        let guid = Guid::generate();
        futures::try_join!(
            Builder::unix_stream(client).p2p().build(),
            async {
                let connection = Builder::unix_stream(server).server(guid)?.p2p().build().await?;
                Ok::<_, zbus::Error>(connection)
            },
        )
        .expect("peer connections")
    }

    fn request(return_object: String) -> PassphraseRequest {
        PassphraseRequest {
            udi: "/org/freedesktop/UDisks2/block_devices/sdc1".to_string(),
            return_object,
            window_id: 0,
            app_id: "solid-tests".to_string(),
        }
    }

    fn ignore_reply() -> ReplyHandler {
        Arc::new(|_passphrase: String| {})
    }

    #[tokio::test]
    async fn show_waits_for_the_prompt_service() {
        let (client, server) = connections().await;
        let ui = RecordingUiServer::default();
        server
            .object_server()
            .at("/modules/soliduiserver", ui.clone())
            .await
            .expect("serve prompt");

        let prompt = DBusPassphrasePrompt::new(client, DEFAULT_PROMPT_SERVICE);
        tokio::time::timeout(
            Duration::from_secs(5),
            prompt.show(request(next_return_object()), ignore_reply()),
        )
        .await
        .expect("reply within timeout")
        .expect("dialog shown");

        assert_eq!(
            *ui.udis.lock().expect("udis"),
            vec!["/org/freedesktop/UDisks2/block_devices/sdc1".to_string()]
        );
    }

    #[tokio::test]
    async fn show_fails_when_nobody_answers() {
        let (client, _server) = connections().await;
        let prompt = DBusPassphrasePrompt::new(client.clone(), "org.kde.NoSuchPromptService");
        let return_object = next_return_object();

        let shown = tokio::time::timeout(
            Duration::from_secs(5),
            prompt.show(request(return_object.clone()), ignore_reply()),
        )
        .await
        .expect("reply within timeout");
        assert!(shown.is_err());

        let receiver = client
            .object_server()
            .interface::<_, PassphraseReceiver>(return_object.as_str())
            .await;
        assert!(receiver.is_err());
    }

    #[test]
    fn return_objects_are_unique() {
        let first = next_return_object();
        let second = next_return_object();
        assert!(first.starts_with(RETURN_OBJECT_PREFIX));
        assert_ne!(first, second);
        let n: u64 = first[RETURN_OBJECT_PREFIX.len()..].parse().expect("counter");
        assert!(n >= 1);
    }
}
