//! Common utilities for session tests

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;
use surveil::testing::MemoryFs;
use surveil::{WatchEvent, WatchOptions, WatchSession};
use tokio::time::{timeout, timeout_at, Instant};

/// Open a session over the in-memory tree
pub fn open(fs: &MemoryFs, path: impl AsRef<Path>, options: WatchOptions) -> WatchSession {
    WatchSession::open_with(path.as_ref(), options, fs.adapters()).expect("open session")
}

/// Collect events up to and including the first `ready`
pub async fn until_ready(session: &mut WatchSession) -> Vec<WatchEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(30), session.next_event())
            .await
            .expect("timed out waiting for ready")
            .expect("session ended before ready");
        let done = matches!(event, WatchEvent::Ready { .. });
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Collect every event delivered within `window`
pub async fn collect_for(session: &mut WatchSession, window: Duration) -> Vec<WatchEvent> {
    let deadline = Instant::now() + window;
    let mut events = Vec::new();
    while let Ok(Some(event)) = timeout_at(deadline, session.next_event()).await {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[WatchEvent]) -> Vec<&'static str> {
    events.iter().map(WatchEvent::kind).collect()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn add(name: &str, len: u64) -> WatchEvent {
    WatchEvent::Add {
        name: Some(name.to_string()),
        stat: Some(surveil::EntryStat::file(len)),
    }
}

pub fn root_add() -> WatchEvent {
    WatchEvent::Add {
        name: None,
        stat: None,
    }
}

pub fn change(name: &str) -> WatchEvent {
    WatchEvent::Change {
        name: Some(name.to_string()),
    }
}

pub fn remove(name: &str) -> WatchEvent {
    WatchEvent::Remove {
        name: Some(name.to_string()),
    }
}

pub fn ready() -> WatchEvent {
    WatchEvent::Ready { error: None }
}
