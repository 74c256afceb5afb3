//! Child name filtering
//!
//! A session can restrict which child files it reports, by either:
//! 1. Extensions (plain name suffixes such as `.rs`)
//! 2. Patterns (gitignore-style globs such as `*.log` or `build-*`)
//!
//! The two are mutually exclusive. When both are configured, extensions
//! win and the patterns are ignored. Directories are never filtered.

use crate::config::WatchOptions;
use crate::error::{Result, WatchError};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

/// Name filter applied to child files
#[derive(Debug, Clone)]
pub enum NameFilter {
    /// Every name passes
    All,
    /// Name must end with one of the suffixes
    Extensions(Vec<String>),
    /// Name must match one of the compiled patterns
    Patterns(Gitignore),
}

impl NameFilter {
    /// Build the filter described by `options`
    pub fn from_options(options: &WatchOptions) -> Result<Self> {
        if let Some(extensions) = &options.extensions {
            if options.patterns.is_some() {
                debug!("Both extensions and patterns configured; using extensions");
            }
            return Ok(NameFilter::Extensions(extensions.clone()));
        }

        match &options.patterns {
            Some(patterns) => Self::patterns(patterns),
            None => Ok(NameFilter::All),
        }
    }

    /// Compile a pattern filter
    pub fn patterns(patterns: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|source| WatchError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
        }

        let matcher = builder.build().map_err(|source| WatchError::InvalidPattern {
            pattern: patterns.join(", "),
            source,
        })?;
        Ok(NameFilter::Patterns(matcher))
    }

    /// Check whether a child file name should be reported
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::All => true,
            NameFilter::Extensions(extensions) => {
                extensions.iter().any(|ext| name.ends_with(ext.as_str()))
            }
            // A gitignore "ignore" match is a hit; "!" lines carve exceptions
            NameFilter::Patterns(matcher) => matcher.matched(name, false).is_ignore(),
        }
    }

    /// Whether any filtering is active
    pub fn is_active(&self) -> bool {
        !matches!(self, NameFilter::All)
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        NameFilter::All
    }
}
