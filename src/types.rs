use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

/// Repository directory created inside the workspace root.
pub const REPO_DIR: &str = ".binvcs";
/// Sub-directory of [`REPO_DIR`] holding one record per state.
pub const STATE_DIR: &str = "state";
/// Sub-directory of [`REPO_DIR`] holding one record per session.
pub const SESSION_DIR: &str = "session";
/// Chain order file inside [`REPO_DIR`].
pub const CHAIN_FILE: &str = "chain.json";
/// Advisory lock file inside [`REPO_DIR`].
pub const LOCK_FILE: &str = "binvcs.lock";
/// Gitignore-style exclude file read from the workspace root.
pub const IGNORE_FILE: &str = ".binvcsignore";

// ---------------------------------------------------------------------------
// WorkspaceHash
// ---------------------------------------------------------------------------

/// Content identity of a single workspace file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHash {
    pub relative_path: String,
    pub hash: String,
}

impl FileHash {
    pub fn new(relative_path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            hash: hash.into(),
        }
    }
}

/// Snapshot of "what exists now": relative path to content identity.
pub type WorkspaceHash = BTreeMap<String, FileHash>;

/// Build a [`WorkspaceHash`] from `(relative_path, hash)` pairs.
///
/// ```rust
/// let w = binvcs::workspace_hash_of([("a.bin", "H1"), ("tex/b.png", "H2")]);
/// assert_eq!(w["tex/b.png"].hash, "H2");
/// ```
pub fn workspace_hash_of<I, P, H>(entries: I) -> WorkspaceHash
where
    I: IntoIterator<Item = (P, H)>,
    P: Into<String>,
    H: Into<String>,
{
    entries
        .into_iter()
        .map(|(p, h)| {
            let fh = FileHash::new(p, h);
            (fh.relative_path.clone(), fh)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// StateDiff
// ---------------------------------------------------------------------------

/// Category of a path in a [`StateDiff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// A single change between two trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeAction {
    pub kind: ChangeKind,
    pub path: String,
}

impl ChangeAction {
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

impl PartialOrd for ChangeAction {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChangeAction {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path.cmp(&other.path)
    }
}

/// Partition of the union of two trees' leaf paths.
///
/// Every leaf path of either tree lands in exactly one set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
}

impl StateDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when nothing was added, removed, or modified.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Number of changed paths (added + removed + modified).
    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Which category `path` falls in, if it belongs to either tree.
    pub fn kind_of(&self, path: &str) -> Option<ChangeKind> {
        if self.added.contains(path) {
            Some(ChangeKind::Added)
        } else if self.removed.contains(path) {
            Some(ChangeKind::Removed)
        } else if self.modified.contains(path) {
            Some(ChangeKind::Modified)
        } else if self.unchanged.contains(path) {
            Some(ChangeKind::Unchanged)
        } else {
            None
        }
    }

    /// Sorted list of change actions (unchanged paths are omitted).
    pub fn actions(&self) -> Vec<ChangeAction> {
        let mut out = Vec::with_capacity(self.total());
        for p in &self.added {
            out.push(ChangeAction::new(ChangeKind::Added, p.as_str()));
        }
        for p in &self.removed {
            out.push(ChangeAction::new(ChangeKind::Removed, p.as_str()));
        }
        for p in &self.modified {
            out.push(ChangeAction::new(ChangeKind::Modified, p.as_str()));
        }
        out.sort();
        out
    }
}

// ---------------------------------------------------------------------------
// OpenOptions
// ---------------------------------------------------------------------------

/// Options for opening or creating a [`Repo`](crate::Repo).
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Create the repository directory if it doesn't exist.
    pub create: bool,
    /// Extra gitignore-style exclude patterns for workspace scans.
    pub exclude: Vec<String>,
    /// Additional exclude file to load.
    pub exclude_from: Option<PathBuf>,
    /// Read [`IGNORE_FILE`] from the workspace root.
    pub use_ignore_file: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create: false,
            exclude: Vec::new(),
            exclude_from: None,
            use_ignore_file: true,
        }
    }
}
