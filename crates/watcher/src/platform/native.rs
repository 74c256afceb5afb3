//! Native adapters: `notify` subscriptions and `tokio::fs` listing

use super::{FileSystem, Notifier, RawSink, Subscription};
use crate::error::PlatformError;
use crate::event::{EntryStat, RawKind};
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Notifier backed by the platform's recommended `notify` watcher
///
/// Every subscription owns its own non-recursive watcher; dropping the
/// subscription drops the watcher, which releases the OS watch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl NotifyBackend {
    pub fn new() -> Self {
        Self
    }
}

struct NotifySubscription {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl Subscription for NotifySubscription {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Notifier for NotifyBackend {
    fn subscribe(
        &self,
        path: &Path,
        sink: RawSink,
    ) -> Result<Box<dyn Subscription>, PlatformError> {
        // notify reports a missing path lazily on some backends; fail up
        // front like the other primitives do
        std::fs::symlink_metadata(path).map_err(|e| PlatformError::from_io(path, &e))?;

        let watched = path.to_path_buf();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let Some(kind) = RawKind::from_notify(&event.kind) else {
                        return;
                    };
                    for changed in &event.paths {
                        let name = changed
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned());
                        trace!("Raw {:?} for {:?} on {}", kind, name, watched.display());
                        if !sink.deliver(kind, name) {
                            return;
                        }
                    }
                    if event.paths.is_empty() {
                        sink.deliver(kind, None);
                    }
                }
                Err(e) => {
                    warn!("Watch error on {}: {}", watched.display(), e);
                }
            },
        )
        .map_err(|e| PlatformError::from_notify(path, &e))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| PlatformError::from_notify(path, &e))?;

        Ok(Box::new(NotifySubscription {
            path: path.to_path_buf(),
            _watcher: watcher,
        }))
    }
}

/// Listing and stat through `tokio::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn list(&self, path: &Path) -> Result<Vec<String>, PlatformError> {
        let mut dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| PlatformError::from_io(path, &e))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| PlatformError::from_io(path, &e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        names.sort();
        Ok(names)
    }

    async fn stat(&self, path: &Path) -> Result<EntryStat, PlatformError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| PlatformError::from_io(path, &e))?;
        Ok(EntryStat::from(&meta))
    }
}
