//! Error types for watch sessions
//!
//! Platform failures are classified by code rather than by type: the
//! session only cares whether something is missing, is a file, is a
//! transient permission hiccup, or is anything else.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
const EPERM: i32 = 1;
#[cfg(unix)]
const ENOTDIR: i32 = 20;
#[cfg(windows)]
const ERROR_DIRECTORY: i32 = 267;

/// Result type for session construction and configuration
pub type Result<T> = std::result::Result<T, WatchError>;

/// Classification of a platform error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The path (or a stat target) does not exist
    NotFound,
    /// A listing was attempted on something that is not a directory
    NotADirectory,
    /// Likely-temporary access failure (`EPERM`)
    TransientPermission,
    /// Anything else, with the raw OS code when one is known
    Other(Option<i32>),
}

impl ErrorCode {
    /// Classify an I/O error by its platform code
    pub fn classify(err: &io::Error) -> Self {
        #[cfg(unix)]
        {
            match err.raw_os_error() {
                Some(EPERM) => return ErrorCode::TransientPermission,
                Some(ENOTDIR) => return ErrorCode::NotADirectory,
                _ => {}
            }
        }

        #[cfg(windows)]
        {
            if err.raw_os_error() == Some(ERROR_DIRECTORY) {
                return ErrorCode::NotADirectory;
            }
        }

        match err.kind() {
            io::ErrorKind::NotFound => ErrorCode::NotFound,
            // Windows reports handles racing a delete as access denied
            #[cfg(windows)]
            io::ErrorKind::PermissionDenied => ErrorCode::TransientPermission,
            _ => ErrorCode::Other(err.raw_os_error()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::NotFound => f.write_str("ENOENT"),
            ErrorCode::NotADirectory => f.write_str("ENOTDIR"),
            ErrorCode::TransientPermission => f.write_str("EPERM"),
            ErrorCode::Other(Some(code)) => write!(f, "os error {code}"),
            ErrorCode::Other(None) => f.write_str("unknown"),
        }
    }
}

/// A failure reported by a notification, listing or stat primitive
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{code} on {}: {message}", .path.display())]
pub struct PlatformError {
    /// Classified platform code
    pub code: ErrorCode,
    /// Path the failing call was made on
    pub path: PathBuf,
    /// Human readable description from the platform
    pub message: String,
}

impl PlatformError {
    /// Build an error from its parts
    pub fn new(code: ErrorCode, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a not-found error on `path`
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(ErrorCode::NotFound, path, "no such file or directory")
    }

    /// Classify an I/O error raised by a call on `path`
    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        Self::new(ErrorCode::classify(err), path, err.to_string())
    }

    /// Classify an error raised by the `notify` crate when subscribing to `path`
    pub fn from_notify(path: &Path, err: &notify::Error) -> Self {
        match &err.kind {
            notify::ErrorKind::Io(io_err) => Self::from_io(path, io_err),
            notify::ErrorKind::PathNotFound | notify::ErrorKind::WatchNotFound => {
                Self::not_found(path)
            }
            _ => Self::new(ErrorCode::Other(None), path, err.to_string()),
        }
    }
}

/// Errors raised while opening a session or loading its configuration
#[derive(Error, Debug)]
pub enum WatchError {
    /// A configured name pattern failed to compile
    #[error("invalid name pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    /// `open` was called outside of a tokio runtime
    #[error("watch sessions must be opened inside a tokio runtime")]
    NoRuntime,

    /// Configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
