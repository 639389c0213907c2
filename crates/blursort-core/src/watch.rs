//! "File created" notifications.
//!
//! The pipeline only needs the next created-file path, so the watcher is
//! hidden behind [`EventSource`]. [`FsWatcher`] feeds a channel from the
//! `notify` background thread; a bare `mpsc::Receiver<PathBuf>` is a source
//! too, which is what the tests drive.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::Result;

/// Outcome of waiting for the next event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv {
    Created(PathBuf),
    Timeout,
    /// The source has shut down and will deliver nothing more.
    Closed,
}

pub trait EventSource {
    /// Block up to `timeout` for the next created file.
    fn next_created(&mut self, timeout: Duration) -> Recv;
}

impl EventSource for Receiver<PathBuf> {
    fn next_created(&mut self, timeout: Duration) -> Recv {
        match self.recv_timeout(timeout) {
            Ok(path) => Recv::Created(path),
            Err(RecvTimeoutError::Timeout) => Recv::Timeout,
            Err(RecvTimeoutError::Disconnected) => Recv::Closed,
        }
    }
}

/// Recursive watch on a directory, reporting created files only.
pub struct FsWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
    rx: Receiver<PathBuf>,
}

impl FsWatcher {
    pub fn watch(root: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in created_files(&event) {
                    if tx.send(path).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!("Watch error: {}", e),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!("Watching {} recursively", root.display());
        Ok(Self {
            watcher,
            root: root.to_path_buf(),
            rx,
        })
    }

    /// Stop the notification thread.
    pub fn stop(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            debug!("Unwatch {} failed: {}", self.root.display(), e);
        }
    }
}

impl EventSource for FsWatcher {
    fn next_created(&mut self, timeout: Duration) -> Recv {
        self.rx.next_created(timeout)
    }
}

/// File paths of a create event; folder creations are dropped.
fn created_files(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(CreateKind::File) => event.paths.clone(),
        EventKind::Create(_) => event.paths.iter().filter(|p| !p.is_dir()).cloned().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{ModifyKind, RemoveKind};
    use tempfile::tempdir;

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_only_created_files_pass() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("a.jpg");

        assert_eq!(created_files(&event(EventKind::Create(CreateKind::File), &p)), vec![p.clone()]);
        assert!(created_files(&event(EventKind::Create(CreateKind::Folder), &p)).is_empty());
        assert!(created_files(&event(EventKind::Modify(ModifyKind::Any), &p)).is_empty());
        assert!(created_files(&event(EventKind::Remove(RemoveKind::File), &p)).is_empty());
    }

    #[test]
    fn test_ambiguous_create_drops_directories() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        assert!(created_files(&event(EventKind::Create(CreateKind::Any), &sub)).is_empty());

        let file = dir.path().join("b.jpg");
        assert_eq!(
            created_files(&event(EventKind::Create(CreateKind::Any), &file)),
            vec![file]
        );
    }

    #[test]
    fn test_channel_source() {
        let (tx, mut rx) = mpsc::channel();
        tx.send(PathBuf::from("/in/x.jpg")).unwrap();
        assert_eq!(
            rx.next_created(Duration::from_millis(10)),
            Recv::Created(PathBuf::from("/in/x.jpg"))
        );
        assert_eq!(rx.next_created(Duration::from_millis(10)), Recv::Timeout);
        drop(tx);
        assert_eq!(rx.next_created(Duration::from_millis(10)), Recv::Closed);
    }
}
