use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::paths;
use crate::types::{FileHash, StateDiff, WorkspaceHash};

/// One node of a [`ContentTree`].
///
/// A node with `data` is a file leaf holding its content hash; a node
/// without `data` is a directory. The two are never mixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub data: Option<String>,
    pub children: BTreeMap<String, Node>,
}

impl Node {
    fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
            children: BTreeMap::new(),
        }
    }

    fn leaf(name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Some(hash.into()),
            children: BTreeMap::new(),
        }
    }

    /// Whether this node is a file leaf.
    pub fn is_leaf(&self) -> bool {
        self.data.is_some()
    }

    /// Whether this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.data.is_none()
    }
}

/// A path-segment trie mapping full relative paths to content hashes.
///
/// Built once from a [`WorkspaceHash`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTree {
    root: Node,
}

impl Default for ContentTree {
    fn default() -> Self {
        Self {
            root: Node::dir(""),
        }
    }
}

impl ContentTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the trie from a workspace hash.
    ///
    /// Paths are normalized before insertion (map keys are advisory; the
    /// record's `relative_path` is authoritative).
    ///
    /// # Errors
    /// Returns [`Error::InvalidPath`] for empty or `..` paths, and
    /// [`Error::MalformedPath`] when one path is both a file and an ancestor
    /// directory of another, or when two entries normalize to the same path.
    pub fn build(workspace_hash: &WorkspaceHash) -> Result<Self> {
        let mut tree = Self::new();
        for entry in workspace_hash.values() {
            tree.insert(&entry.relative_path, &entry.hash)?;
        }
        Ok(tree)
    }

    /// Build the trie from a plain `path -> hash` map, the shape states are
    /// persisted in.
    pub fn from_files(files: &BTreeMap<String, String>) -> Result<Self> {
        let mut tree = Self::new();
        for (path, hash) in files {
            tree.insert(path, hash)?;
        }
        Ok(tree)
    }

    fn insert(&mut self, raw_path: &str, hash: &str) -> Result<()> {
        let path = paths::normalize_path(raw_path)?;
        if paths::is_root_path(&path) {
            return Err(Error::invalid_path(format!(
                "file path must not be root: {:?}",
                raw_path
            )));
        }

        let segments: Vec<&str> = path.split('/').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(Error::invalid_path(raw_path)),
        };

        let mut node = &mut self.root;
        for (i, seg) in parents.iter().enumerate() {
            let child = node
                .children
                .entry(seg.to_string())
                .or_insert_with(|| Node::dir(*seg));
            if child.is_leaf() {
                return Err(Error::malformed_path(format!(
                    "{:?} is a file but {:?} needs it as a directory",
                    segments[..=i].join("/"),
                    path
                )));
            }
            node = child;
        }

        if let Some(existing) = node.children.get(*last) {
            let msg = if existing.is_dir() {
                format!("{:?} is a directory and cannot also be a file", path)
            } else {
                format!("{:?} appears more than once", path)
            };
            return Err(Error::malformed_path(msg));
        }
        node.children.insert(last.to_string(), Node::leaf(*last, hash));
        Ok(())
    }

    /// The root directory node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Nodes matching an exact path: the leaf or directory at `path`, or
    /// nothing. The root path returns the root node. Invalid paths match
    /// nothing.
    pub fn search(&self, path: &str) -> Vec<&Node> {
        let path = match paths::normalize_path(path) {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };
        if paths::is_root_path(&path) {
            return vec![&self.root];
        }

        let mut node = &self.root;
        for seg in path.split('/') {
            match node.children.get(seg) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }
        vec![node]
    }

    /// Content hash of the file at `path`, if it is a leaf.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.search(path)
            .into_iter()
            .next()
            .and_then(|n| n.data.as_deref())
    }

    /// All `(full_path, hash)` leaves in path order.
    pub fn leaves(&self) -> Vec<(String, &str)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, "", &mut out);
        out
    }

    /// Number of file leaves.
    pub fn len(&self) -> usize {
        count_leaves(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Flatten back into a workspace hash; `build` of the result equals
    /// `self`.
    pub fn to_workspace_hash(&self) -> WorkspaceHash {
        self.leaves()
            .into_iter()
            .map(|(path, hash)| (path.clone(), FileHash::new(path, hash)))
            .collect()
    }

    /// Flatten into the persisted `path -> hash` shape.
    pub fn to_files(&self) -> BTreeMap<String, String> {
        self.leaves()
            .into_iter()
            .map(|(path, hash)| (path, hash.to_string()))
            .collect()
    }

    /// Partition both trees' leaf paths, `self` being the older side: paths
    /// only in `other` are added, only in `self` removed, in both with equal
    /// hash unchanged, otherwise modified.
    pub fn diff(&self, other: &ContentTree) -> StateDiff {
        let mut diff = StateDiff::new();
        diff_dirs(&self.root, &other.root, "", &mut diff);
        diff
    }

    /// File paths matching a `/`-separated glob; `**` spans zero or more
    /// directories. Results are sorted.
    pub fn glob(&self, pattern: &str) -> Vec<String> {
        let segments: Vec<&str> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let mut results = Vec::new();
        glob_recursive(&self.root, &segments, "", &mut results);
        results.sort();
        results.dedup();
        results
    }
}

fn collect_leaves<'a>(node: &'a Node, prefix: &str, out: &mut Vec<(String, &'a str)>) {
    for (name, child) in &node.children {
        let full = paths::join(prefix, name);
        match &child.data {
            Some(hash) => out.push((full, hash.as_str())),
            None => collect_leaves(child, &full, out),
        }
    }
}

fn count_leaves(node: &Node) -> usize {
    node.children
        .values()
        .map(|c| if c.is_leaf() { 1 } else { count_leaves(c) })
        .sum()
}

fn mark_all(node: &Node, prefix: &str, into: &mut std::collections::BTreeSet<String>) {
    if node.is_leaf() {
        into.insert(prefix.to_string());
        return;
    }
    for (name, child) in &node.children {
        mark_all(child, &paths::join(prefix, name), into);
    }
}

fn diff_dirs(old: &Node, new: &Node, prefix: &str, diff: &mut StateDiff) {
    for (name, o) in &old.children {
        let full = paths::join(prefix, name);
        match new.children.get(name) {
            None => mark_all(o, &full, &mut diff.removed),
            Some(n) => match (&o.data, &n.data) {
                (Some(oh), Some(nh)) => {
                    if oh == nh {
                        diff.unchanged.insert(full);
                    } else {
                        diff.modified.insert(full);
                    }
                }
                (None, None) => diff_dirs(o, n, &full, diff),
                // File became a directory or the reverse.
                _ => {
                    mark_all(o, &full, &mut diff.removed);
                    mark_all(n, &full, &mut diff.added);
                }
            },
        }
    }
    for (name, n) in &new.children {
        if !old.children.contains_key(name) {
            mark_all(n, &paths::join(prefix, name), &mut diff.added);
        }
    }
}

fn glob_recursive(node: &Node, segments: &[&str], prefix: &str, results: &mut Vec<String>) {
    let Some((seg, rest)) = segments.split_first() else {
        return;
    };

    if *seg == "**" {
        // Zero directories, then one more level at a time.
        glob_recursive(node, rest, prefix, results);
        for (name, child) in &node.children {
            if child.is_dir() && !name.starts_with('.') {
                glob_recursive(child, segments, &paths::join(prefix, name), results);
            }
        }
        return;
    }

    let candidates: Vec<(&String, &Node)> = if crate::glob::has_magic(seg) {
        node.children
            .iter()
            .filter(|(name, _)| crate::glob::glob_match(seg, name))
            .collect()
    } else {
        node.children.get_key_value(*seg).into_iter().collect()
    };

    for (name, child) in candidates {
        let full = paths::join(prefix, name);
        if rest.is_empty() {
            if child.is_leaf() {
                results.push(full);
            }
        } else if child.is_dir() {
            glob_recursive(child, rest, &full, results);
        }
    }
}
