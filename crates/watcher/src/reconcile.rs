//! Child reconciliation
//!
//! Diffs a fresh listing of the root against what the session last
//! observed. `children` always holds the full snapshot of names (files and
//! directories); `subdirectories` is the subset known to be directories.

use std::collections::BTreeSet;

/// Result of diffing a listing against the stored snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDiff {
    /// Names that are new (or everything, on first discovery), in listing order
    pub added: Vec<String>,
    /// File names that disappeared
    pub dropped: Vec<String>,
    /// Directory names that disappeared
    pub dropped_dirs: Vec<String>,
}

impl ListingDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.dropped.is_empty() && self.dropped_dirs.is_empty()
    }
}

/// Names believed present directly under the root
#[derive(Debug, Clone, Default)]
pub struct ChildSet {
    children: BTreeSet<String>,
    subdirectories: BTreeSet<String>,
}

impl ChildSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with `listing` and report what changed
    ///
    /// On first discovery every listed name counts as added and nothing as
    /// dropped. Dropped directories leave `subdirectories` immediately.
    pub fn reconcile(&mut self, listing: &[String], first_discovery: bool) -> ListingDiff {
        let snapshot: BTreeSet<String> = listing.iter().cloned().collect();

        let diff = if first_discovery {
            ListingDiff {
                added: dedup_in_order(listing),
                ..ListingDiff::default()
            }
        } else {
            let added = dedup_in_order(listing)
                .into_iter()
                .filter(|name| !self.children.contains(name))
                .collect();

            let mut dropped = Vec::new();
            let mut dropped_dirs = Vec::new();
            for name in self.children.difference(&snapshot) {
                if self.subdirectories.contains(name) {
                    dropped_dirs.push(name.clone());
                } else {
                    dropped.push(name.clone());
                }
            }

            ListingDiff {
                added,
                dropped,
                dropped_dirs,
            }
        };

        self.subdirectories.retain(|name| snapshot.contains(name));
        self.children = snapshot;

        diff
    }

    /// Record that `name` is a directory
    pub fn mark_directory(&mut self, name: &str) {
        if self.children.contains(name) {
            self.subdirectories.insert(name.to_string());
        }
    }

    /// Forget `name` entirely so the next listing rediscovers it
    pub fn forget(&mut self, name: &str) {
        self.children.remove(name);
        self.subdirectories.remove(name);
    }

    pub fn clear(&mut self) {
        self.children.clear();
        self.subdirectories.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains(name)
    }

    pub fn is_directory(&self, name: &str) -> bool {
        self.subdirectories.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }
}

fn dedup_in_order(listing: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    listing
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}
