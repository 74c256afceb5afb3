//! Watching a single file

use crate::common::*;
use std::time::Duration;
use surveil::testing::MemoryFs;
use surveil::{Phase, WatchEvent, WatchOptions};
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_file_root_ready_without_listing() {
    let fs = MemoryFs::new();
    fs.write("/notes.txt", b"v1");
    let mut session = open(&fs, "/notes.txt", WatchOptions::default());

    assert_eq!(until_ready(&mut session).await, vec![ready()]);
    assert_eq!(session.phase(), Phase::WatchingFile);
    assert_eq!(session.active_subscriptions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_file_root_changes_coalesce() {
    let fs = MemoryFs::new();
    fs.write("/notes.txt", b"v1");
    let mut session = open(&fs, "/notes.txt", WatchOptions::default());
    until_ready(&mut session).await;

    for _ in 0..3 {
        fs.write("/notes.txt", b"v2");
        sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![WatchEvent::Change { name: None }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_replaced_file_reports_add_not_remove() {
    let fs = MemoryFs::new();
    fs.write("/notes.txt", b"v1");
    let mut session = open(&fs, "/notes.txt", WatchOptions::default());
    until_ready(&mut session).await;

    fs.remove("/notes.txt");
    assert!(collect_for(&mut session, Duration::from_millis(500)).await.is_empty());
    assert_eq!(session.phase(), Phase::Missing);
    assert_eq!(fs.active_watches(), 0);

    fs.write("/notes.txt", b"v2");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(2)).await,
        vec![root_add()]
    );
    assert_eq!(session.phase(), Phase::WatchingFile);

    // Watching resumes on the new file
    fs.write("/notes.txt", b"v3");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![WatchEvent::Change { name: None }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_file_recreated_before_rescan_keeps_reporting() {
    let fs = MemoryFs::new();
    fs.write("/notes.txt", b"v1");
    let mut session = open(&fs, "/notes.txt", WatchOptions::default());
    until_ready(&mut session).await;

    fs.remove("/notes.txt");
    fs.write("/notes.txt", b"v2");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(2)).await,
        vec![root_add()]
    );
    assert!(fs.is_watched("/notes.txt"));
    assert_eq!(session.active_subscriptions(), 1);

    fs.write("/notes.txt", b"v3");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(3)).await,
        vec![WatchEvent::Change { name: None }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_atomic_save_over_file_root() {
    let fs = MemoryFs::new();
    fs.write("/notes.txt", b"v1");
    let mut session = open(&fs, "/notes.txt", WatchOptions::default());
    until_ready(&mut session).await;

    fs.write("/.notes.txt.swp", b"v2");
    fs.rename("/.notes.txt.swp", "/notes.txt");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(2)).await,
        vec![root_add()]
    );
    assert_eq!(session.phase(), Phase::WatchingFile);

    fs.write("/notes.txt", b"v3");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![WatchEvent::Change { name: None }]
    );
}
