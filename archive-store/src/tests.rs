use crate::ArchiveStore;
use archiver_core::{CoreError, PersistOutcome, Post, StorageError};
use chrono::NaiveDate;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_store() -> (TempDir, ArchiveStore) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = ArchiveStore::new(dir.path());
    (dir, store)
}

fn post(id: &str, day: u32) -> Post {
    Post::new(id, "alice", NaiveDate::from_ymd_opt(2024, 5, day).unwrap())
        .with_field("text", format!("post {id}"))
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_path_is_deterministic() {
    let (dir, store) = setup_test_store();
    let post = post("1001", 2);

    let expected = dir
        .path()
        .join("alice")
        .join("2024-05-02")
        .join("2024-05-02 1001.json");
    assert_eq!(store.path_for(&post).unwrap(), expected);
    assert_eq!(store.path_for(&post).unwrap(), expected);
}

#[test]
fn test_persist_writes_full_record() {
    let (_dir, store) = setup_test_store();
    let post = post("1001", 2).with_field("likes", 12);

    assert_eq!(store.persist_if_new(&post).unwrap(), PersistOutcome::Written);

    let content = fs::read_to_string(store.path_for(&post).unwrap()).unwrap();
    let stored: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(stored["id"], "1001");
    assert_eq!(stored["username"], "alice");
    assert_eq!(stored["datestamp"], "2024-05-02");
    assert_eq!(stored["text"], "post 1001");
    assert_eq!(stored["likes"], 12);
}

#[test]
fn test_persist_is_idempotent() {
    let (dir, store) = setup_test_store();
    let post = post("1001", 2);

    assert_eq!(store.persist_if_new(&post).unwrap(), PersistOutcome::Written);
    assert_eq!(store.persist_if_new(&post).unwrap(), PersistOutcome::Skipped);

    let day_dir = dir.path().join("alice").join("2024-05-02");
    assert_eq!(entries(&day_dir), vec!["2024-05-02 1001.json".to_string()]);
}

#[test]
fn test_existing_file_is_never_overwritten() {
    let (_dir, store) = setup_test_store();
    let original = post("1001", 2);
    store.persist_if_new(&original).unwrap();
    let path = store.path_for(&original).unwrap();
    let before = fs::read(&path).unwrap();

    let edited = original.clone().with_field("text", "edited later");
    assert_eq!(
        store.persist_if_new(&edited).unwrap(),
        PersistOutcome::Skipped
    );
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_missing_date_directory_is_created() {
    let (dir, store) = setup_test_store();
    store.persist_if_new(&post("1001", 2)).unwrap();

    let next_day = post("1002", 3);
    let day_dir = dir.path().join("alice").join("2024-05-03");
    assert!(!day_dir.exists());

    assert_eq!(
        store.persist_if_new(&next_day).unwrap(),
        PersistOutcome::Written
    );
    assert!(day_dir.is_dir());
    assert!(store.contains(&next_day).unwrap());
}

#[test]
fn test_output_root_is_created_on_demand() {
    let (dir, _) = setup_test_store();
    let store = ArchiveStore::new(dir.path().join("nested").join("archive"));

    assert_eq!(
        store.persist_if_new(&post("7", 1)).unwrap(),
        PersistOutcome::Written
    );
    assert!(dir.path().join("nested/archive/alice/2024-05-01").is_dir());
}

#[test]
fn test_no_staging_files_left_behind() {
    let (dir, store) = setup_test_store();
    for id in ["1", "2", "3"] {
        store.persist_if_new(&post(id, 9)).unwrap();
    }

    let day_dir = dir.path().join("alice").join("2024-05-09");
    assert_eq!(
        entries(&day_dir),
        vec![
            "2024-05-09 1.json".to_string(),
            "2024-05-09 2.json".to_string(),
            "2024-05-09 3.json".to_string()
        ]
    );
}

#[test]
fn test_unsafe_path_components_are_rejected() {
    let (dir, store) = setup_test_store();
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    for (id, username) in [("../escape", "alice"), ("1", ".."), ("1", ""), ("a/b", "alice")] {
        let post = Post::new(id, username, date);
        let result = store.persist_if_new(&post);
        assert!(
            matches!(
                result,
                Err(CoreError::Storage(StorageError::InvalidPathComponent { .. }))
            ),
            "expected rejection for id={id:?} username={username:?}"
        );
    }
    assert!(entries(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_unwritable_root_is_a_storage_error() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, _) = setup_test_store();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

    // Root ignores permission bits; nothing to assert in that case.
    if fs::write(locked.join("write-check"), b"x").is_ok() {
        return;
    }

    let store = ArchiveStore::new(&locked);
    let result = store.persist_if_new(&post("1", 1));
    assert!(matches!(
        result,
        Err(CoreError::Storage(StorageError::CreateDir { .. }))
    ));

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
}

#[cfg(unix)]
#[test]
fn test_publish_collision_is_skipped() {
    let (dir, store) = setup_test_store();
    let post = post("1001", 2);
    let day_dir = dir.path().join("alice").join("2024-05-02");
    fs::create_dir_all(&day_dir).unwrap();

    // A dangling link fails the existence check but still occupies the name.
    let target = store.path_for(&post).unwrap();
    std::os::unix::fs::symlink(dir.path().join("nowhere.json"), &target).unwrap();
    assert!(!target.exists());

    assert_eq!(store.persist_if_new(&post).unwrap(), PersistOutcome::Skipped);

    assert!(fs::symlink_metadata(&target)
        .unwrap()
        .file_type()
        .is_symlink());
    assert!(!dir.path().join("nowhere.json").exists());
    assert_eq!(entries(&day_dir), vec!["2024-05-02 1001.json".to_string()]);
}
