mod common;

use std::collections::BTreeSet;

use binvcs::*;
use common::{table, write_file};
use serde_json::json;

fn set(paths: &[&str]) -> BTreeSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[test]
fn open_without_create_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = Repo::open(dir.path(), OpenOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = Repo::init(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn init_creates_layout() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repo::init(dir.path()).unwrap();
    assert!(repo.repo_dir().join(STATE_DIR).is_dir());
    assert!(repo.repo_dir().join(SESSION_DIR).is_dir());
    assert!(repo.chain().is_empty());

    // Opening again without `create` works now.
    Repo::open(dir.path(), OpenOptions::default()).unwrap();
}

#[test]
fn capture_tracks_versions() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "tex/wood.png", b"wood v1");
    write_file(dir.path(), "scene.blend", b"scene");
    let mut repo = Repo::init(dir.path()).unwrap();

    let first = repo.capture("alice", Metadata::new()).unwrap();
    assert!(first.created);
    assert_eq!(first.revision, 1);
    assert_eq!(first.changes.added, set(&["scene.blend", "tex/wood.png"]));

    write_file(dir.path(), "tex/wood.png", b"wood v2");
    let second = repo.capture("alice", Metadata::new()).unwrap();
    assert!(second.created);
    assert_eq!(second.revision, 2);
    assert_eq!(second.changes.modified, set(&["tex/wood.png"]));
    assert_eq!(second.changes.unchanged, set(&["scene.blend"]));

    let session = repo.session("alice").unwrap();
    assert_eq!(
        session.detail_file_version(None, None).unwrap(),
        table(&[("scene.blend", 1), ("tex/wood.png", 2)])
    );
    assert_eq!(repo.chain().len(), 2);
}

#[test]
fn capture_unchanged_reuses_tail() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"a");
    let mut repo = Repo::init(dir.path()).unwrap();

    let first = repo.capture("alice", Metadata::new()).unwrap();
    let again = repo.capture("alice", Metadata::new()).unwrap();
    assert!(!again.created);
    assert_eq!(again.state_id, first.state_id);
    assert_eq!(again.revision, 1);
    assert!(again.changes.is_empty());

    // A second session joins the tail state instead of duplicating it.
    let mut message = Metadata::new();
    message.insert("message".into(), json!("review pass"));
    let bob = repo.capture("bob", message).unwrap();
    assert!(!bob.created);
    assert_eq!(bob.state_id, first.state_id);
    assert_eq!(bob.revision, 1);

    let tail = repo.chain().state(&first.state_id).unwrap();
    assert_eq!(tail.session_list(), ["alice".to_string(), "bob".to_string()]);
    assert_eq!(tail.data()["message"], json!("review pass"));
    assert_eq!(repo.chain().len(), 1);
}

#[test]
fn capture_is_visible_to_other_handles() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"a");
    let mut one = Repo::init(dir.path()).unwrap();
    let mut two = Repo::open(dir.path(), OpenOptions::default()).unwrap();

    one.capture("alice", Metadata::new()).unwrap();
    write_file(dir.path(), "a.bin", b"b");
    let capture = two.capture("bob", Metadata::new()).unwrap();

    assert!(capture.created);
    assert_eq!(two.chain().len(), 2);
    one.reload().unwrap();
    assert_eq!(one.chain().all_state_id(), two.chain().all_state_id());
}

#[test]
fn status_and_diff_see_captures_from_other_handles() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"a");
    let reader = Repo::init(dir.path()).unwrap();
    let mut writer = Repo::open(dir.path(), OpenOptions::default()).unwrap();

    let first = writer.capture("alice", Metadata::new()).unwrap();
    assert!(reader.status("alice").unwrap().is_empty());

    write_file(dir.path(), "a.bin", b"b");
    let second = writer.capture("alice", Metadata::new()).unwrap();
    let d = reader.diff(&first.state_id, &second.state_id).unwrap();
    assert_eq!(d.modified, set(&["a.bin"]));

    // The cached chain only moves on reload.
    assert!(reader.chain().is_empty());
}

#[test]
fn status_reports_uncaptured_changes() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"a");
    write_file(dir.path(), "b.bin", b"b");
    let mut repo = Repo::init(dir.path()).unwrap();

    assert_eq!(repo.status("alice").unwrap().added, set(&["a.bin", "b.bin"]));

    repo.capture("alice", Metadata::new()).unwrap();
    assert!(repo.status("alice").unwrap().is_empty());

    write_file(dir.path(), "a.bin", b"changed");
    std::fs::remove_file(dir.path().join("b.bin")).unwrap();
    write_file(dir.path(), "c/d.bin", b"new");

    let status = repo.status("alice").unwrap();
    assert_eq!(status.modified, set(&["a.bin"]));
    assert_eq!(status.removed, set(&["b.bin"]));
    assert_eq!(status.added, set(&["c/d.bin"]));
}

#[test]
fn diff_between_captures() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"a");
    let mut repo = Repo::init(dir.path()).unwrap();
    let first = repo.capture("alice", Metadata::new()).unwrap();

    write_file(dir.path(), "b.bin", b"b");
    let second = repo.capture("alice", Metadata::new()).unwrap();

    let d = repo.diff(&first.state_id, &second.state_id).unwrap();
    assert_eq!(d.added, set(&["b.bin"]));
    assert_eq!(d.unchanged, set(&["a.bin"]));
}

#[test]
fn ignore_file_and_exclude_patterns() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), IGNORE_FILE, b"*.tmp\ncache/\n");
    write_file(dir.path(), "keep.png", b"k");
    write_file(dir.path(), "scratch.tmp", b"s");
    write_file(dir.path(), "cache/blob", b"c");
    write_file(dir.path(), "render/out.exr", b"r");

    let options = OpenOptions {
        create: true,
        exclude: vec!["render/".to_string()],
        ..Default::default()
    };
    let repo = Repo::open(dir.path(), options).unwrap();
    let scanned: BTreeSet<String> = repo.scan().unwrap().into_keys().collect();
    assert!(scanned.contains("keep.png"));
    assert!(!scanned.contains("scratch.tmp"));
    assert!(!scanned.contains("cache/blob"));
    assert!(!scanned.contains("render/out.exr"));
    assert!(!scanned.iter().any(|p| p.starts_with(REPO_DIR)));
}

#[test]
fn sessions_are_listed_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.bin", b"a");
    let mut repo = Repo::init(dir.path()).unwrap();
    assert!(repo.sessions().unwrap().is_empty());

    repo.capture("zoe", Metadata::new()).unwrap();
    repo.capture("adam", Metadata::new()).unwrap();
    assert_eq!(repo.sessions().unwrap(), vec!["adam", "zoe"]);
}

#[test]
fn invalid_session_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = Repo::init(dir.path()).unwrap();
    assert!(matches!(
        repo.capture("../escape", Metadata::new()),
        Err(Error::InvalidName(_))
    ));
    assert!(matches!(repo.session(".hidden"), Err(Error::InvalidName(_))));
}
