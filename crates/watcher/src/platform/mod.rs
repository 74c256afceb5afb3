//! Boundary to the platform primitives
//!
//! The session never talks to the OS directly. It goes through two
//! capabilities:
//! - [`Notifier`]: per-path change subscriptions
//! - [`FileSystem`]: directory listing and single-entry stat
//!
//! [`native`] implements both on top of `notify` and `tokio::fs`;
//! [`crate::testing`] provides an in-memory pair.

pub mod native;

use crate::error::PlatformError;
use crate::event::{EntryStat, RawKind, RawNotification};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use native::{NotifyBackend, TokioFileSystem};

/// Handle to a live native subscription; dropping it releases the watch
pub trait Subscription: Send {
    /// Path the subscription watches
    fn path(&self) -> &Path;
}

/// Native change-notification facility
pub trait Notifier: Send + Sync {
    /// Subscribe to `path`, routing raw notifications into `sink`
    ///
    /// Fails synchronously with the platform error when the path cannot be
    /// watched (most commonly because it does not exist).
    fn subscribe(
        &self,
        path: &Path,
        sink: RawSink,
    ) -> Result<Box<dyn Subscription>, PlatformError>;
}

/// Directory listing and stat primitives
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Names directly under `path`
    async fn list(&self, path: &Path) -> Result<Vec<String>, PlatformError>;

    /// Stat a single entry
    async fn stat(&self, path: &Path) -> Result<EntryStat, PlatformError>;
}

/// The adapter pair a session runs against
#[derive(Clone)]
pub struct Adapters {
    pub notifier: Arc<dyn Notifier>,
    pub fs: Arc<dyn FileSystem>,
}

impl Adapters {
    pub fn new(notifier: Arc<dyn Notifier>, fs: Arc<dyn FileSystem>) -> Self {
        Self { notifier, fs }
    }

    /// `notify` subscriptions plus `tokio::fs` listing
    pub fn native() -> Self {
        Self::new(Arc::new(NotifyBackend::new()), Arc::new(TokioFileSystem))
    }
}

impl fmt::Debug for Adapters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapters").finish_non_exhaustive()
    }
}

/// Delivery end of a subscription
///
/// Tagged with the subscription key and generation so the session can
/// drop notifications from watches it has already released.
#[derive(Debug, Clone)]
pub struct RawSink {
    key: String,
    generation: u64,
    tx: mpsc::UnboundedSender<RawNotification>,
}

impl RawSink {
    pub(crate) fn new(
        key: impl Into<String>,
        generation: u64,
        tx: mpsc::UnboundedSender<RawNotification>,
    ) -> Self {
        Self {
            key: key.into(),
            generation,
            tx,
        }
    }

    /// Hand a raw notification to the owning session
    ///
    /// Returns false once the session is gone.
    pub fn deliver(&self, kind: RawKind, name: Option<String>) -> bool {
        self.tx
            .send(RawNotification {
                key: self.key.clone(),
                generation: self.generation,
                kind,
                name,
            })
            .is_ok()
    }
}
