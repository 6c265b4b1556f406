//! Directory rescans: membership diffs, file kinds and identity changes.

mod common;

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::net::UnixListener;

use common::{Fixture, set_mtime, write};
use dirwatch::{Action, VnodeFlags};

#[test]
fn test_rescan_matches_directory_listing() {
    let mut fx = Fixture::new();
    for name in ["keep.txt", "gone1.txt", "gone2.txt"] {
        write(&fx.path(name), name);
    }
    let id = fx.watch_root();

    fs::remove_file(fx.path("gone1.txt")).unwrap();
    fs::remove_file(fx.path("gone2.txt")).unwrap();
    for name in ["new1.txt", "new2.txt", "new3.txt"] {
        write(&fx.path(name), name);
    }
    fx.fire_dir(id, VnodeFlags::WRITE);
    let stats = fx.watcher.pump();
    assert_eq!(stats.added, 3);
    assert_eq!(stats.removed, 2);

    let on_disk: BTreeSet<String> = fs::read_dir(fx.dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    let tracked: BTreeSet<String> = fx.tracked_names(id).into_iter().collect();
    assert_eq!(tracked, on_disk);

    assert_eq!(
        fx.take_sorted(),
        vec![
            (Action::Removed, "gone1.txt".to_string()),
            (Action::Removed, "gone2.txt".to_string()),
            (Action::Added, "new1.txt".to_string()),
            (Action::Added, "new2.txt".to_string()),
            (Action::Added, "new3.txt".to_string()),
        ]
    );
}

#[test]
fn test_non_regular_entries_are_ignored() {
    let mut fx = Fixture::new();
    write(&fx.path("file.txt"), "f");
    fs::create_dir(fx.path("subdir")).unwrap();
    std::os::unix::fs::symlink(fx.path("file.txt"), fx.path("link.txt")).unwrap();
    let _socket = UnixListener::bind(fx.path("sock")).unwrap();

    let id = fx.watch_root();
    assert_eq!(fx.tracked_names(id), vec!["file.txt"]);

    // Same on rescan
    fs::create_dir(fx.path("another")).unwrap();
    std::os::unix::fs::symlink(fx.path("subdir"), fx.path("dirlink")).unwrap();
    fx.fire_dir(id, VnodeFlags::WRITE);
    fx.watcher.pump();
    assert!(fx.take().is_empty());
    assert_eq!(fx.tracked_names(id), vec!["file.txt"]);
}

#[test]
fn test_write_reports_modified_only_when_mtime_moves() {
    let mut fx = Fixture::new();
    write(&fx.path("m.txt"), "m");
    set_mtime(&fx.path("m.txt"), 1);
    let id = fx.watch_root();

    // Attribute change without a new mtime
    fx.fire_file(id, "m.txt", VnodeFlags::ATTRIB);
    fx.watcher.pump();
    assert!(fx.take().is_empty());

    set_mtime(&fx.path("m.txt"), 2);
    fx.fire_file(id, "m.txt", VnodeFlags::ATTRIB);
    fx.watcher.pump();
    assert_eq!(fx.take(), vec![(Action::Modified, "m.txt".to_string())]);

    // Recorded mtime was updated, so the same value is quiet again
    fx.fire_file(id, "m.txt", VnodeFlags::WRITE);
    fx.watcher.pump();
    assert!(fx.take().is_empty());

    // Moving backwards still counts
    set_mtime(&fx.path("m.txt"), 0);
    fx.fire_file(id, "m.txt", VnodeFlags::EXTEND);
    fx.watcher.pump();
    assert_eq!(fx.take(), vec![(Action::Modified, "m.txt".to_string())]);
}

#[test]
fn test_coalesced_rename_and_write_never_reports_modified() {
    let mut fx = Fixture::new();
    write(&fx.path("r.txt"), "r");
    set_mtime(&fx.path("r.txt"), 1);
    let id = fx.watch_root();

    set_mtime(&fx.path("r.txt"), 5);
    assert!(fx.fire_file(id, "r.txt", VnodeFlags::WRITE));
    assert!(fx.fire_file(id, "r.txt", VnodeFlags::RENAME));
    assert_eq!(fx.queue.pending(), 1);

    let stats = fx.watcher.pump();
    assert_eq!(stats.events, 1);
    assert_eq!(stats.modified, 0);
    assert!(fx.take().is_empty());
    assert_eq!(fx.tracked_names(id), vec!["r.txt"]);
}

#[test]
fn test_modified_file_renamed_away_is_only_removed() {
    let mut fx = Fixture::new();
    write(&fx.path("a.txt"), "a");
    set_mtime(&fx.path("a.txt"), 1);
    let id = fx.watch_root();

    set_mtime(&fx.path("a.txt"), 2);
    fs::rename(fx.path("a.txt"), fx.path("b.txt")).unwrap();
    fx.fire_file(id, "a.txt", VnodeFlags::WRITE | VnodeFlags::RENAME);
    fx.fire_dir(id, VnodeFlags::WRITE);
    fx.watcher.pump();

    assert_eq!(
        fx.take_sorted(),
        vec![
            (Action::Removed, "a.txt".to_string()),
            (Action::Added, "b.txt".to_string()),
        ]
    );
}

#[test]
fn test_replaced_under_same_name_is_modified() {
    let mut fx = Fixture::new();
    write(&fx.path("a.txt"), "old");
    set_mtime(&fx.path("a.txt"), 1);
    let id = fx.watch_root();
    let old_token = fx.watcher.entry_token(id, &fx.path("a.txt")).unwrap();

    write(&fx.path("tmp"), "new");
    set_mtime(&fx.path("tmp"), 2);
    fs::rename(fx.path("tmp"), fx.path("a.txt")).unwrap();
    fx.fire_file(id, "a.txt", VnodeFlags::DELETE);
    fx.fire_dir(id, VnodeFlags::WRITE);
    fx.watcher.pump();

    assert_eq!(fx.take(), vec![(Action::Modified, "a.txt".to_string())]);
    let new_token = fx.watcher.entry_token(id, &fx.path("a.txt")).unwrap();
    assert_ne!(old_token, new_token);
    assert!(fx.queue.is_armed(new_token));
    assert!(!fx.queue.is_armed(old_token));
    assert_eq!(fx.watcher.open_handles(), 2);
}

#[test]
fn test_replaced_with_same_mtime_is_silent() {
    let mut fx = Fixture::new();
    write(&fx.path("a.txt"), "old");
    set_mtime(&fx.path("a.txt"), 3);
    let id = fx.watch_root();
    let old_token = fx.watcher.entry_token(id, &fx.path("a.txt")).unwrap();

    write(&fx.path("tmp"), "new");
    set_mtime(&fx.path("tmp"), 3);
    fs::rename(fx.path("tmp"), fx.path("a.txt")).unwrap();
    fx.fire_file(id, "a.txt", VnodeFlags::DELETE);
    fx.watcher.pump();

    assert!(fx.take().is_empty());
    assert_ne!(fx.watcher.entry_token(id, &fx.path("a.txt")).unwrap(), old_token);
}

#[test]
fn test_vanished_directory_removes_everything() {
    let mut fx = Fixture::new();
    let root = fx.path("watched");
    fs::create_dir(&root).unwrap();
    write(&root.join("a.txt"), "a");
    write(&root.join("b.txt"), "b");
    let id = fx.watcher.add_watch(root.clone(), fx.listener.clone()).unwrap();

    fs::remove_dir_all(&root).unwrap();
    fx.fire_dir(id, VnodeFlags::DELETE);
    fx.watcher.pump();

    assert_eq!(
        fx.take_sorted(),
        vec![
            (Action::Removed, "a.txt".to_string()),
            (Action::Removed, "b.txt".to_string()),
        ]
    );
    assert!(fx.watcher.tracked_files(id).is_empty());
    // The watch itself stays until removed
    assert_eq!(fx.watcher.watch_count(), 1);
    assert_eq!(fx.watcher.open_handles(), 1);
}

#[test]
fn test_failed_restat_defers_rescan() {
    let mut fx = Fixture::new();
    write(&fx.path("a.txt"), "a");
    let id = fx.watch_root();

    // File disappears, but only a write was signalled
    fs::remove_file(fx.path("a.txt")).unwrap();
    fx.fire_file(id, "a.txt", VnodeFlags::WRITE);
    let stats = fx.watcher.pump();
    assert_eq!(stats.rescans, 0);
    assert!(fx.take().is_empty());

    // Picked up on the next pump with no new events
    let stats = fx.watcher.pump();
    assert_eq!(stats.events, 0);
    assert_eq!(stats.rescans, 1);
    assert_eq!(fx.take(), vec![(Action::Removed, "a.txt".to_string())]);
}

#[test]
fn test_entry_state_follows_disk() {
    use std::time::{Duration, SystemTime};

    let mut fx = Fixture::new();
    let id = fx.watch_root();
    assert!(fx.watcher.watch(id).unwrap().is_empty());

    let path = fx.path("e.txt");
    write(&path, "e");
    set_mtime(&path, 4);
    fx.fire_dir(id, VnodeFlags::WRITE);
    fx.watcher.pump();

    let watch = fx.watcher.watch(id).unwrap();
    assert!(!watch.is_empty());
    let entry = watch.entry(&path).unwrap();
    assert_eq!(entry.watch_id(), id);
    assert_eq!(entry.path(), path);
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    assert_eq!(entry.modified(), base + Duration::from_secs(4));

    set_mtime(&path, 9);
    fx.fire_file(id, "e.txt", VnodeFlags::WRITE);
    fx.watcher.pump();
    let entry = fx.watcher.watch(id).unwrap().entry(&path).unwrap();
    assert_eq!(entry.modified(), base + Duration::from_secs(9));
}
