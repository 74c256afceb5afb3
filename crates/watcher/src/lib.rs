//! Single-path file system watching
//!
//! A [`WatchSession`] watches one path, either a directory and its direct
//! children or a single file, and turns the platform's raw notifications
//! into normalized events:
//! - Per-entry debouncing of content changes
//! - Renames resolved by re-listing the directory
//! - Bounded retry of transient `EPERM` failures
//! - Polling while the watched path does not exist yet
//!
//! ```no_run
//! use surveil::{WatchOptions, WatchSession};
//!
//! # async fn run() -> surveil::Result<()> {
//! let mut session = WatchSession::open("/var/log", WatchOptions::default())?;
//! while let Some(event) = session.next_event().await {
//!     println!("{} {:?}", event.kind(), event.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod filter;
pub mod platform;
pub mod poll;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod testing;

pub use config::WatchOptions;
pub use error::{ErrorCode, PlatformError, Result, WatchError};
pub use event::{EntryKind, EntryStat, RawKind, WatchEvent};
pub use filter::NameFilter;
pub use platform::{Adapters, FileSystem, Notifier, NotifyBackend, RawSink, Subscription, TokioFileSystem};
pub use session::{CloseHandle, Phase, WatchSession};
