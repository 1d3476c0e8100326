mod common;

use std::collections::BTreeSet;

use binvcs::*;
use common::ws;

fn tree(entries: &[(&str, &str)]) -> ContentTree {
    ContentTree::build(&ws(entries)).unwrap()
}

fn set(paths: &[&str]) -> BTreeSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

// ---------------------------------------------------------------------------
// build / search
// ---------------------------------------------------------------------------

#[test]
fn build_nests_directories() {
    let t = tree(&[("tex/wood.png", "h1"), ("tex/metal/iron.png", "h2"), ("scene.blend", "h3")]);

    let tex = t.search("tex");
    assert_eq!(tex.len(), 1);
    assert!(tex[0].is_dir());
    assert_eq!(tex[0].children.len(), 2);

    assert_eq!(t.get("tex/metal/iron.png"), Some("h2"));
    assert_eq!(t.get("scene.blend"), Some("h3"));
    assert_eq!(t.get("tex"), None);
    assert_eq!(t.len(), 3);
}

#[test]
fn search_root_and_missing() {
    let t = tree(&[("a/b", "h")]);
    let root = t.search("");
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].children.len(), 1);

    assert!(t.search("a/c").is_empty());
    assert!(t.search("a/b/c").is_empty());
    assert!(t.search("../a").is_empty());
}

#[test]
fn build_rejects_file_used_as_directory() {
    let err = ContentTree::build(&ws(&[("a", "h1"), ("a/b", "h2")])).unwrap_err();
    assert!(matches!(err, Error::MalformedPath(_)));

    let err = ContentTree::build(&ws(&[("a/b", "h2"), ("a", "h1")])).unwrap_err();
    assert!(matches!(err, Error::MalformedPath(_)));
}

#[test]
fn build_rejects_parent_segments() {
    let err = ContentTree::build(&ws(&[("../outside.bin", "h")])).unwrap_err();
    assert!(matches!(err, Error::InvalidPath(_)));
}

#[test]
fn empty_workspace_is_empty_tree() {
    let t = tree(&[]);
    assert!(t.is_empty());
    assert_eq!(t, ContentTree::new());
    assert!(t.leaves().is_empty());
}

// ---------------------------------------------------------------------------
// round trip
// ---------------------------------------------------------------------------

#[test]
fn workspace_hash_round_trips() {
    let original = ws(&[("a/x.png", "h1"), ("a/y/z.obj", "h2"), ("b.txt", "h3")]);
    let t = ContentTree::build(&original).unwrap();
    assert_eq!(t.to_workspace_hash(), original);
    assert_eq!(ContentTree::build(&t.to_workspace_hash()).unwrap(), t);
}

#[test]
fn files_round_trip() {
    let t = tree(&[("a/x.png", "h1"), ("b.txt", "h3")]);
    let files = t.to_files();
    assert_eq!(files.get("a/x.png").map(String::as_str), Some("h1"));
    assert_eq!(ContentTree::from_files(&files).unwrap(), t);
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

#[test]
fn diff_categorizes_every_path() {
    let old = tree(&[("a", "h1"), ("b", "h2"), ("dir/c", "h3"), ("dir/d", "h4")]);
    let new = tree(&[("a", "h1"), ("b", "h9"), ("dir/d", "h4"), ("dir/e", "h5")]);

    let d = old.diff(&new);
    assert_eq!(d.unchanged, set(&["a", "dir/d"]));
    assert_eq!(d.modified, set(&["b"]));
    assert_eq!(d.removed, set(&["dir/c"]));
    assert_eq!(d.added, set(&["dir/e"]));

    // Every path of either side lands in exactly one category.
    let union: BTreeSet<String> = old
        .leaves()
        .into_iter()
        .chain(new.leaves())
        .map(|(p, _)| p)
        .collect();
    assert_eq!(d.total() + d.unchanged.len(), union.len());
}

#[test]
fn diff_against_self_is_all_unchanged() {
    let t = tree(&[("a", "h1"), ("x/y", "h2")]);
    let d = t.diff(&t);
    assert!(d.is_empty());
    assert_eq!(d.unchanged, set(&["a", "x/y"]));
}

#[test]
fn diff_from_empty_is_all_added() {
    let t = tree(&[("a", "h1"), ("x/y", "h2")]);
    let d = ContentTree::new().diff(&t);
    assert_eq!(d.added, set(&["a", "x/y"]));
    assert!(d.removed.is_empty() && d.modified.is_empty() && d.unchanged.is_empty());

    let back = t.diff(&ContentTree::new());
    assert_eq!(back.removed, set(&["a", "x/y"]));
}

#[test]
fn diff_file_replaced_by_directory() {
    let old = tree(&[("model", "h1")]);
    let new = tree(&[("model/mesh.obj", "h2"), ("model/tex.png", "h3")]);

    let d = old.diff(&new);
    assert_eq!(d.removed, set(&["model"]));
    assert_eq!(d.added, set(&["model/mesh.obj", "model/tex.png"]));

    let d = new.diff(&old);
    assert_eq!(d.added, set(&["model"]));
    assert_eq!(d.removed, set(&["model/mesh.obj", "model/tex.png"]));
}

#[test]
fn diff_actions_skip_unchanged() {
    let old = tree(&[("a", "h1"), ("b", "h2")]);
    let new = tree(&[("a", "h1"), ("b", "h3"), ("c", "h4")]);
    let actions = old.diff(&new).actions();
    assert_eq!(
        actions,
        vec![
            ChangeAction::new(ChangeKind::Modified, "b"),
            ChangeAction::new(ChangeKind::Added, "c"),
        ]
    );
}

// ---------------------------------------------------------------------------
// glob
// ---------------------------------------------------------------------------

#[test]
fn glob_matches_leaves() {
    let t = tree(&[
        ("tex/wood.png", "h1"),
        ("tex/metal/iron.png", "h2"),
        ("tex/notes.txt", "h3"),
        ("scene.blend", "h4"),
    ]);
    assert_eq!(t.glob("tex/*.png"), vec!["tex/wood.png"]);
    assert_eq!(t.glob("**/*.png"), vec!["tex/metal/iron.png", "tex/wood.png"]);
    assert_eq!(t.glob("*.blend"), vec!["scene.blend"]);
    assert!(t.glob("*.fbx").is_empty());
}
