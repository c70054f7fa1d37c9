// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsString;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use futures::StreamExt;
use inotify::{Inotify, WatchMask};
use solid_contracts::{Notifier, Subscription};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::FstabError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountTableChange {
    Fstab,
    Mtab,
}

/// Reports edits of the static table and mount/unmount activity.
pub struct MountTableWatcher {
    events: Notifier<MountTableChange>,
    tasks: Vec<JoinHandle<()>>,
}

impl MountTableWatcher {
    /// Watches both tables. A table that cannot be watched is logged and
    /// skipped. Must be called from within a tokio runtime.
    pub fn start(fstab_path: &Path, mtab_path: &Path) -> Self {
        let mut watcher = Self {
            events: Notifier::new(),
            tasks: Vec::new(),
        };

        if let Err(e) = watcher.watch_fstab(fstab_path) {
            warn!("Not watching {}: {e}", fstab_path.display());
        }
        if let Err(e) = watcher.watch_mtab(mtab_path) {
            warn!("Not watching {}: {e}", mtab_path.display());
        }

        watcher
    }

    pub fn subscribe(&self) -> Subscription<MountTableChange> {
        self.events.subscribe()
    }

    /// Watches the parent directory so editors that replace the file are
    /// noticed too.
    pub fn watch_fstab(&mut self, path: &Path) -> Result<(), FstabError> {
        let dir = path.parent().unwrap_or(Path::new("/"));
        let file_name: OsString = path.file_name().map(Into::into).unwrap_or_default();

        let inotify = Inotify::init()?;
        inotify.watches().add(
            dir,
            WatchMask::CLOSE_WRITE | WatchMask::MOVED_TO | WatchMask::CREATE | WatchMask::DELETE,
        )?;
        let mut stream = inotify.into_event_stream([0u8; 4096])?;

        let events = self.events.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                match event {
                    Ok(event) if event.name.as_deref() == Some(file_name.as_os_str()) => {
                        debug!("fstab changed ({:?})", event.mask);
                        events.emit(MountTableChange::Fstab);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("fstab watch failed: {e}");
                        break;
                    }
                }
            }
        }));

        Ok(())
    }

    /// The kernel flags `/proc/self/mountinfo` with priority data whenever
    /// the mount table changes.
    pub fn watch_mtab(&mut self, path: &Path) -> Result<(), FstabError> {
        let file = File::open(path)?;
        let fd = AsyncFd::with_interest(file, Interest::PRIORITY)?;

        let events = self.events.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                match fd.ready(Interest::PRIORITY).await {
                    Ok(mut guard) => {
                        guard.clear_ready();
                        let mut file = fd.get_ref();
                        // re-reading re-arms the notification
                        if let Err(e) = file
                            .seek(SeekFrom::Start(0))
                            .and_then(|_| std::io::copy(&mut file, &mut std::io::sink()))
                        {
                            warn!("Cannot re-read mount table: {e}");
                        }
                        debug!("mount table changed");
                        events.emit(MountTableChange::Mtab);
                    }
                    Err(e) => {
                        warn!("mount table watch failed: {e}");
                        break;
                    }
                }
            }
        }));

        Ok(())
    }
}

impl Drop for MountTableWatcher {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
