//! Extension and pattern filters

use crate::common::*;
use std::time::Duration;
use surveil::testing::MemoryFs;
use surveil::{EntryStat, WatchEvent, WatchOptions};

#[tokio::test(start_paused = true)]
async fn test_extension_filter() {
    let fs = MemoryFs::new();
    fs.create_dir("/w");
    let options = WatchOptions::default().with_extensions([".bar", ".baz"]);
    let mut session = open(&fs, "/w", options);
    until_ready(&mut session).await;

    fs.write("/w/a.txt", b"1");
    fs.write("/w/a.bar", b"1");
    fs.write("/w/a.baz", b"1");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![add("a.bar", 1), add("a.baz", 1)]
    );
    assert!(!fs.is_watched("/w/a.txt"));

    fs.write("/w/a.txt", b"2");
    fs.write("/w/a.bar", b"2");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![change("a.bar")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_initial_children_are_filtered() {
    let fs = MemoryFs::new();
    fs.write("/w/keep.rs", b"fn");
    fs.write("/w/skip.md", b"#");
    fs.create_dir("/w/docs");
    let options = WatchOptions::default().with_extensions([".rs"]);
    let mut session = open(&fs, "/w", options);

    let events = until_ready(&mut session).await;
    // The raw listing is unfiltered; directories are never filtered
    assert_eq!(
        events,
        vec![
            WatchEvent::List {
                names: names(&["docs", "keep.rs", "skip.md"]),
            },
            WatchEvent::ChildDir {
                name: "docs".into(),
                stat: EntryStat::directory(),
            },
            WatchEvent::Child {
                name: "keep.rs".into(),
                stat: EntryStat::file(2),
            },
            ready(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_pattern_filter() {
    let fs = MemoryFs::new();
    fs.write("/w/y.txt", b"y");
    let options = WatchOptions::default().with_patterns(["*.log", "!debug.log"]);
    let mut session = open(&fs, "/w", options);
    until_ready(&mut session).await;

    fs.write("/w/x.log", b"x");
    fs.write("/w/debug.log", b"d");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![add("x.log", 1)]
    );

    // Removal of a filtered-out name stays silent
    fs.remove("/w/y.txt");
    assert!(collect_for(&mut session, Duration::from_secs(1)).await.is_empty());

    fs.remove("/w/x.log");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![remove("x.log")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_extensions_win_over_patterns() {
    let fs = MemoryFs::new();
    fs.create_dir("/w");
    let options = WatchOptions::default()
        .with_extensions([".rs"])
        .with_patterns(["*.log"]);
    let mut session = open(&fs, "/w", options);
    until_ready(&mut session).await;

    fs.write("/w/a.log", b"1");
    fs.write("/w/b.rs", b"1");
    assert_eq!(
        collect_for(&mut session, Duration::from_secs(1)).await,
        vec![add("b.rs", 1)]
    );
}
