//! Semantic and raw event types

use crate::error::PlatformError;
use serde::Serialize;
use std::fs::Metadata;
use std::time::SystemTime;

/// Kind of a directory entry as reported by stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Result of a single-entry stat call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStat {
    pub kind: EntryKind,
    /// Size in bytes
    pub len: u64,
    /// Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,
}

impl EntryStat {
    pub fn file(len: u64) -> Self {
        Self {
            kind: EntryKind::File,
            len,
            modified: None,
        }
    }

    pub fn directory() -> Self {
        Self {
            kind: EntryKind::Directory,
            len: 0,
            modified: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl From<&Metadata> for EntryStat {
    fn from(meta: &Metadata) -> Self {
        let file_type = meta.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        };

        Self {
            kind,
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

/// Normalized, caller-facing event emitted by a watch session
///
/// A `None` name on `Add`, `Remove` or `Change` means the event concerns
/// the watched root itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WatchEvent {
    /// First reconciliation finished; carries the fatal error if it failed
    Ready {
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<PlatformError>,
    },
    Add {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stat: Option<EntryStat>,
    },
    Remove {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Change {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    AddDir { name: String, stat: EntryStat },
    RemoveDir { name: String },
    /// Directory discovered during the first reconciliation
    ChildDir { name: String, stat: EntryStat },
    /// File discovered during the first reconciliation
    Child { name: String, stat: EntryStat },
    /// Raw listing of the root, emitted once before `Ready`
    List { names: Vec<String> },
    Error { error: PlatformError },
}

impl WatchEvent {
    /// Event name in the caller-facing vocabulary
    pub fn kind(&self) -> &'static str {
        match self {
            WatchEvent::Ready { .. } => "ready",
            WatchEvent::Add { .. } => "add",
            WatchEvent::Remove { .. } => "remove",
            WatchEvent::Change { .. } => "change",
            WatchEvent::AddDir { .. } => "addDir",
            WatchEvent::RemoveDir { .. } => "removeDir",
            WatchEvent::ChildDir { .. } => "childDir",
            WatchEvent::Child { .. } => "child",
            WatchEvent::List { .. } => "list",
            WatchEvent::Error { .. } => "error",
        }
    }

    /// Child name the event refers to, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            WatchEvent::Add { name, .. }
            | WatchEvent::Remove { name }
            | WatchEvent::Change { name } => name.as_deref(),
            WatchEvent::AddDir { name, .. }
            | WatchEvent::RemoveDir { name }
            | WatchEvent::ChildDir { name, .. }
            | WatchEvent::Child { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Class of an unprocessed native notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    /// Entry appeared, disappeared or was renamed
    Rename,
    /// Entry content or metadata changed
    Change,
}

impl RawKind {
    /// Map a `notify` event kind; access events are not changes
    pub fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        use notify::event::ModifyKind;
        use notify::EventKind;

        match kind {
            EventKind::Create(_) | EventKind::Remove(_) => Some(RawKind::Rename),
            EventKind::Modify(ModifyKind::Name(_)) => Some(RawKind::Rename),
            EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(RawKind::Change),
            EventKind::Access(_) => None,
        }
    }
}

/// Raw notification routed from a subscription back into its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    /// Subscription key: child name, or empty for the root
    pub key: String,
    /// Generation of the subscription that produced it
    pub generation: u64,
    pub kind: RawKind,
    /// Entry name reported by the platform, if any
    pub name: Option<String>,
}
