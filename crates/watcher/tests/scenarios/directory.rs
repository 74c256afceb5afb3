//! Watching a directory and its direct children

use crate::common::*;
use std::time::Duration;
use surveil::testing::MemoryFs;
use surveil::{EntryStat, Phase, RawKind, WatchEvent, WatchOptions};
use tokio::time::sleep;

fn populated() -> MemoryFs {
    let fs = MemoryFs::new();
    fs.write("/w/a.txt", b"alpha");
    fs.create_dir("/w/sub");
    fs.write("/w/z.log", b"zz");
    fs
}

#[tokio::test(start_paused = true)]
async fn test_initial_discovery() {
    let fs = populated();
    let mut session = open(&fs, "/w", WatchOptions::default());

    let events = until_ready(&mut session).await;
    assert_eq!(
        events,
        vec![
            WatchEvent::List {
                names: names(&["a.txt", "sub", "z.log"]),
            },
            WatchEvent::Child {
                name: "a.txt".into(),
                stat: EntryStat::file(5),
            },
            WatchEvent::ChildDir {
                name: "sub".into(),
                stat: EntryStat::directory(),
            },
            WatchEvent::Child {
                name: "z.log".into(),
                stat: EntryStat::file(2),
            },
            ready(),
        ]
    );
    assert_eq!(session.phase(), Phase::WatchingDirectory);

    // Root plus one per child file; directories are not subscribed
    assert_eq!(session.active_subscriptions(), 3);
    assert!(fs.is_watched("/w/a.txt"));
    assert!(!fs.is_watched("/w/sub"));

    assert!(collect_for(&mut session, Duration::from_secs(1)).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_changes_coalesces() {
    let fs = MemoryFs::new();
    fs.write("/w/foo.txt", b"0");
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    for _ in 0..5 {
        fs.write("/w/foo.txt", b"1");
        sleep(Duration::from_millis(50)).await;
    }

    let events = collect_for(&mut session, Duration::from_secs(1)).await;
    assert_eq!(events, vec![change("foo.txt")]);
}

#[tokio::test(start_paused = true)]
async fn test_spaced_changes_are_separate() {
    let fs = MemoryFs::new();
    fs.write("/w/foo.txt", b"0");
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.write("/w/foo.txt", b"1");
    sleep(Duration::from_millis(400)).await;
    fs.write("/w/foo.txt", b"2");

    let events = collect_for(&mut session, Duration::from_secs(1)).await;
    assert_eq!(events, vec![change("foo.txt"), change("foo.txt")]);
}

#[tokio::test(start_paused = true)]
async fn test_rename_reports_remove_then_add() {
    let fs = MemoryFs::new();
    fs.write("/w/foo.txt", b"abc");
    fs.write("/w/keep.txt", b"k");
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.rename("/w/foo.txt", "/w/baz.txt");

    let events = collect_for(&mut session, Duration::from_secs(1)).await;
    assert_eq!(events, vec![remove("foo.txt"), add("baz.txt", 3)]);
    assert!(fs.is_watched("/w/baz.txt"));
    assert!(!fs.is_watched("/w/foo.txt"));
}

#[tokio::test(start_paused = true)]
async fn test_new_file_is_added_once() {
    let fs = MemoryFs::new();
    fs.create_dir("/w");
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    // Writes that follow the creation belong to the pending add
    fs.write("/w/new.txt", b"1234");
    sleep(Duration::from_millis(50)).await;
    fs.write("/w/new.txt", b"1234");

    let events = collect_for(&mut session, Duration::from_secs(1)).await;
    assert_eq!(events, vec![add("new.txt", 4)]);

    fs.write("/w/new.txt", b"5678");
    let events = collect_for(&mut session, Duration::from_secs(1)).await;
    assert_eq!(events, vec![change("new.txt")]);
}

#[tokio::test(start_paused = true)]
async fn test_removed_file() {
    let fs = populated();
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.remove("/w/a.txt");

    let events = collect_for(&mut session, Duration::from_secs(1)).await;
    assert_eq!(events, vec![remove("a.txt")]);
    assert_eq!(session.active_subscriptions(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_removed_then_recreated_file_keeps_reporting() {
    let fs = MemoryFs::new();
    fs.write("/w/foo.txt", b"1");
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.remove("/w/foo.txt");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![remove("foo.txt")]
    );

    fs.write("/w/foo.txt", b"22");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![add("foo.txt", 2)]
    );

    fs.write("/w/foo.txt", b"333");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![change("foo.txt")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_child_recreated_before_rescan_keeps_reporting() {
    let fs = MemoryFs::new();
    fs.write("/w/foo.txt", b"1");
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.remove("/w/foo.txt");
    fs.write("/w/foo.txt", b"22");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![add("foo.txt", 2)]
    );
    assert!(fs.is_watched("/w/foo.txt"));

    fs.write("/w/foo.txt", b"333");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![change("foo.txt")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_atomic_save_over_child() {
    let fs = MemoryFs::new();
    fs.write("/w/foo.txt", b"1");
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.write("/w/.foo.txt.tmp", b"4444");
    fs.rename("/w/.foo.txt.tmp", "/w/foo.txt");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![add("foo.txt", 4)]
    );
    assert_eq!(session.active_subscriptions(), 2);

    fs.write("/w/foo.txt", b"55555");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![change("foo.txt")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_subdirectories() {
    let fs = populated();
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.create_dir("/w/new");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![WatchEvent::AddDir {
            name: "new".into(),
            stat: EntryStat::directory(),
        }]
    );

    // Grandchildren are out of scope
    fs.write("/w/sub/inner.txt", b"x");
    assert!(collect_for(&mut session, Duration::from_secs(1)).await.is_empty());

    fs.remove("/w/sub");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![WatchEvent::RemoveDir { name: "sub".into() }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_root_notification_for_known_child_is_ignored() {
    let fs = populated();
    let mut session = open(&fs, "/w", WatchOptions::default());
    until_ready(&mut session).await;

    fs.notify_raw("/w", RawKind::Change, Some("a.txt"));
    assert!(collect_for(&mut session, Duration::from_secs(1)).await.is_empty());
}
