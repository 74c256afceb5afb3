//! Roots that do not exist, or stop existing

use crate::common::*;
use std::time::Duration;
use surveil::testing::MemoryFs;
use surveil::{Phase, WatchEvent, WatchOptions};
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_missing_root_is_ready_then_polled() {
    let fs = MemoryFs::new();
    let mut session = open(&fs, "/later", WatchOptions::default());

    assert_eq!(until_ready(&mut session).await, vec![ready()]);
    assert_eq!(session.phase(), Phase::Missing);

    sleep(Duration::from_millis(3500)).await;
    let attempts = fs.subscribe_times("/later");
    assert_eq!(attempts.len(), 4);
    for pair in attempts.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_millis(1000));
    }
    assert!(session.try_next_event().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_missing_root_appears() {
    let fs = MemoryFs::new();
    let mut session = open(&fs, "/later", WatchOptions::default());
    until_ready(&mut session).await;

    fs.create_dir("/later");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(2)).await,
        vec![root_add()]
    );
    assert_eq!(session.phase(), Phase::WatchingDirectory);

    // Polling retires once the root exists
    let attempts = fs.subscribe_count("/later");
    sleep(Duration::from_secs(5)).await;
    assert_eq!(fs.subscribe_count("/later"), attempts);

    fs.write("/later/a.txt", b"a");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![add("a.txt", 1)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_custom_poll_interval() {
    let fs = MemoryFs::new();
    let options = WatchOptions::default().with_missing_poll(Duration::from_millis(250));
    let mut session = open(&fs, "/later", options);
    until_ready(&mut session).await;

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(fs.subscribe_count("/later"), 5);
}

#[tokio::test(start_paused = true)]
async fn test_removed_directory_root() {
    let fs = MemoryFs::new();
    fs.write("/w/a.txt", b"a");
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.remove("/w");
    // Children go with the root without individual removes
    assert_eq!(
        collect_for(&mut session, Duration::from_millis(500)).await,
        vec![WatchEvent::Remove { name: None }]
    );
    assert_eq!(session.phase(), Phase::Missing);
    assert_eq!(session.active_subscriptions(), 0);
    assert_eq!(fs.active_watches(), 0);

    fs.write("/w/b.txt", b"bb");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(2)).await,
        vec![root_add(), add("b.txt", 2)]
    );
}
