use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths;
use crate::persist;
use crate::tree::ContentTree;
use crate::types::WorkspaceHash;

/// Free-form metadata attached to a state (message, author, tool, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// On-disk shape of a state. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub timestamp: String,
    pub session_list: Vec<String>,
    pub data: Metadata,
    pub files: BTreeMap<String, String>,
}

/// Current UTC time as a sortable string.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

/// One snapshot of the workspace.
///
/// The tree, timestamp, session list, and metadata only change through
/// [`State::update`]. `previous`/`next` hold neighbor ids resolved against
/// the owning [`StateChain`](crate::StateChain) and change only through
/// [`State::set_next`] / [`State::set_previous`].
#[derive(Debug, Clone)]
pub struct State {
    state_id: String,
    state_file: PathBuf,
    state_tree: ContentTree,
    timestamp: String,
    session_list: Vec<String>,
    data: Metadata,
    previous: Option<String>,
    next: Option<String>,
}

impl State {
    fn empty(location: &Path) -> Result<Self> {
        Ok(Self {
            state_id: paths::id_from_location(location)?,
            state_file: location.to_path_buf(),
            state_tree: ContentTree::new(),
            timestamp: String::new(),
            session_list: Vec::new(),
            data: Metadata::new(),
            previous: None,
            next: None,
        })
    }

    /// Create and persist a new state at `location`.
    ///
    /// # Errors
    /// Returns [`Error::KeyExists`] if a record already exists there and
    /// [`Error::InvalidName`] for a bad location name or session id. Nothing
    /// is written on error.
    pub fn create(
        location: impl AsRef<Path>,
        content_tree: ContentTree,
        session_ids: &[&str],
        metadata: Metadata,
    ) -> Result<Self> {
        let location = location.as_ref();
        let mut state = Self::empty(location)?;
        if location.exists() {
            return Err(Error::key_exists(format!(
                "state already exists: {}",
                location.display()
            )));
        }

        merge_sessions(&mut state.session_list, session_ids)?;
        state.state_tree = content_tree;
        state.data = metadata;
        state.timestamp = now_timestamp();
        state.save()?;

        log::info!(
            "created state {} ({} files, sessions {:?})",
            state.state_id,
            state.state_tree.len(),
            state.session_list
        );
        Ok(state)
    }

    /// Load a persisted state.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if there is no record at `location` and
    /// [`Error::CorruptState`] if the record lacks `timestamp`,
    /// `session_list`, `data`, or `files`, lists a session twice, or holds
    /// colliding paths.
    pub fn load(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        let mut state = Self::empty(location)?;

        let value: serde_json::Value = persist::load_json(location)?;
        let corrupt = |what: String| Error::corrupt_state(format!("{}: {}", location.display(), what));
        let record: StateRecord =
            serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;

        let mut sessions = Vec::with_capacity(record.session_list.len());
        for id in &record.session_list {
            if sessions.contains(id) {
                return Err(corrupt(format!("session {:?} listed twice", id)));
            }
            sessions.push(id.clone());
        }

        state.state_tree =
            ContentTree::from_files(&record.files).map_err(|e| corrupt(e.to_string()))?;
        state.timestamp = record.timestamp;
        state.session_list = sessions;
        state.data = record.data;
        Ok(state)
    }

    /// Load the state at `location` if it exists, otherwise return an empty,
    /// unsaved state bound to that location.
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        if location.exists() {
            Self::load(location)
        } else {
            Self::empty(location)
        }
    }

    /// Rebuild the tree from `workspace_hash`, merge `session_ids` (first
    /// appearance order kept) and `metadata`, refresh the timestamp, and
    /// persist.
    ///
    /// Either the new record is fully saved and `self` reflects it, or an
    /// error is returned and both `self` and the file are unchanged.
    pub fn update(
        &mut self,
        workspace_hash: &WorkspaceHash,
        session_ids: &[&str],
        metadata: Metadata,
    ) -> Result<()> {
        let tree = ContentTree::build(workspace_hash)?;
        let mut sessions = self.session_list.clone();
        merge_sessions(&mut sessions, session_ids)?;
        let mut data = self.data.clone();
        data.extend(metadata);

        let record = StateRecord {
            timestamp: now_timestamp(),
            session_list: sessions,
            data,
            files: tree.to_files(),
        };
        persist::save_json(&record, &self.state_file)?;

        self.state_tree = tree;
        self.timestamp = record.timestamp;
        self.session_list = record.session_list;
        self.data = record.data;
        log::info!(
            "updated state {} (sessions {:?})",
            self.state_id,
            self.session_list
        );
        Ok(())
    }

    /// Write this state's record to its location.
    pub fn save(&self) -> Result<()> {
        persist::save_json(&self.to_record(), &self.state_file)
    }

    /// The persisted shape of this state.
    pub fn to_record(&self) -> StateRecord {
        StateRecord {
            timestamp: self.timestamp.clone(),
            session_list: self.session_list.clone(),
            data: self.data.clone(),
            files: self.state_tree.to_files(),
        }
    }

    /// Flatten the tree back into a workspace hash.
    pub fn to_workspace_hash(&self) -> WorkspaceHash {
        self.state_tree.to_workspace_hash()
    }

    /// Link `other` after `self`. Existing links on the touched sides are
    /// replaced.
    pub fn set_next(&mut self, other: &mut State) {
        self.next = Some(other.state_id.clone());
        other.previous = Some(self.state_id.clone());
    }

    /// Link `other` before `self`.
    pub fn set_previous(&mut self, other: &mut State) {
        other.set_next(self);
    }

    pub(crate) fn clear_previous(&mut self) {
        self.previous = None;
    }

    pub(crate) fn clear_next(&mut self) {
        self.next = None;
    }

    pub fn state_id(&self) -> &str {
        &self.state_id
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn state_tree(&self) -> &ContentTree {
        &self.state_tree
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn session_list(&self) -> &[String] {
        &self.session_list
    }

    pub fn data(&self) -> &Metadata {
        &self.data
    }

    /// Id of the preceding state in the chain.
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    /// Id of the following state in the chain.
    pub fn next(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// Whether `session_id` produced or touched this state.
    pub fn has_session(&self, session_id: &str) -> bool {
        self.session_list.iter().any(|s| s == session_id)
    }
}

fn merge_sessions(into: &mut Vec<String>, session_ids: &[&str]) -> Result<()> {
    for id in session_ids {
        paths::validate_name(id)?;
    }
    for id in session_ids {
        if !into.iter().any(|s| s == id) {
            into.push(id.to_string());
        }
    }
    Ok(())
}
