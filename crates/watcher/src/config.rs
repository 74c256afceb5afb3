//! Session configuration
//!
//! `WatchOptions` is the typed replacement for the original option bag.
//! Every field has a default, so a partial TOML document (or `{}`) is a
//! valid configuration. The camelCase spellings used by earlier releases
//! are accepted as aliases.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default debounce window for `change` and post-ready `add`
pub const DEFAULT_CHANGE_TIMEOUT_MS: u64 = 150;
/// Default retry budget for transient permission failures
pub const DEFAULT_EPERM_RETRIES: u32 = 5;
/// Default delay between permission-failure retries
pub const DEFAULT_EPERM_EASING_MS: u64 = 300;
/// Default poll interval while the root is missing
pub const DEFAULT_MISSING_POLL_MS: u64 = 1000;

/// Options recognized by `WatchSession::open`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Debounce window in milliseconds (default: 150)
    #[serde(default = "default_change_timeout", alias = "changeTimeout")]
    pub change_timeout_ms: u64,

    /// Retries for transient permission failures (default: 5)
    #[serde(default = "default_eperm_retries", alias = "epermRetries")]
    pub eperm_retries: u32,

    /// Delay between permission retries in milliseconds (default: 300)
    #[serde(default = "default_eperm_easing", alias = "epermEasing")]
    pub eperm_easing_ms: u64,

    /// Poll interval while the root is missing, in milliseconds (default: 1000)
    #[serde(default = "default_missing_poll", alias = "hack_missingPoll")]
    pub missing_poll_ms: u64,

    /// Required name suffixes; takes precedence over `patterns`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    /// Required gitignore-style name patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
}

impl WatchOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load options from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render the options as TOML
    pub fn to_toml_string(&self) -> String {
        // Every field is a scalar or a list of strings
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn with_change_timeout(mut self, timeout: Duration) -> Self {
        self.change_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_eperm_retries(mut self, retries: u32) -> Self {
        self.eperm_retries = retries;
        self
    }

    pub fn with_eperm_easing(mut self, easing: Duration) -> Self {
        self.eperm_easing_ms = duration_ms(easing);
        self
    }

    pub fn with_missing_poll(mut self, interval: Duration) -> Self {
        self.missing_poll_ms = duration_ms(interval);
        self
    }

    /// Only report files whose names end with one of `extensions`
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Only report files whose names match one of `patterns`
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn change_timeout(&self) -> Duration {
        Duration::from_millis(self.change_timeout_ms)
    }

    pub fn eperm_easing(&self) -> Duration {
        Duration::from_millis(self.eperm_easing_ms)
    }

    pub fn missing_poll(&self) -> Duration {
        Duration::from_millis(self.missing_poll_ms)
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            change_timeout_ms: DEFAULT_CHANGE_TIMEOUT_MS,
            eperm_retries: DEFAULT_EPERM_RETRIES,
            eperm_easing_ms: DEFAULT_EPERM_EASING_MS,
            missing_poll_ms: DEFAULT_MISSING_POLL_MS,
            extensions: None,
            patterns: None,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_change_timeout() -> u64 {
    DEFAULT_CHANGE_TIMEOUT_MS
}

fn default_eperm_retries() -> u32 {
    DEFAULT_EPERM_RETRIES
}

fn default_eperm_easing() -> u64 {
    DEFAULT_EPERM_EASING_MS
}

fn default_missing_poll() -> u64 {
    DEFAULT_MISSING_POLL_MS
}
