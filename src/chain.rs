use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::persist;
use crate::state::{Metadata, State};
use crate::tree::ContentTree;
use crate::types::{StateDiff, WorkspaceHash, CHAIN_FILE, STATE_DIR};

/// On-disk chain order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChainRecord {
    states: Vec<String>,
}

/// The append-only history of every [`State`] in a repository.
///
/// The chain owns its states in creation order; each state's
/// `previous`/`next` ids point at its neighbors here. States are never
/// removed or reordered.
#[derive(Debug, Clone)]
pub struct StateChain {
    repo_dir: PathBuf,
    states: Vec<State>,
    index: HashMap<String, usize>,
}

impl StateChain {
    /// An empty chain rooted at `repo_dir` (nothing is read or written).
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            states: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Load the chain persisted under `repo_dir`, linking states in order.
    /// A repository without a chain file yields an empty chain.
    ///
    /// # Errors
    /// Returns [`Error::CorruptState`] if the chain file is unreadable as a
    /// chain, names a state twice, or names a state with no record.
    pub fn open(repo_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut chain = Self::new(repo_dir);
        let chain_file = chain.chain_file();
        if !chain_file.exists() {
            return Ok(chain);
        }

        let value: serde_json::Value = persist::load_json(&chain_file)?;
        let record: ChainRecord = serde_json::from_value(value).map_err(|e| {
            Error::corrupt_state(format!("{}: {}", chain_file.display(), e))
        })?;

        for id in &record.states {
            if chain.index.contains_key(id) {
                return Err(Error::corrupt_state(format!(
                    "state {:?} appears twice in chain",
                    id
                )));
            }
            let state = match State::load(chain.state_path(id)) {
                Ok(state) => state,
                Err(Error::NotFound(_)) => {
                    return Err(Error::corrupt_state(format!(
                        "chain references missing state {:?}",
                        id
                    )))
                }
                Err(e) => return Err(e),
            };
            chain.push_linked(state);
        }

        log::debug!("opened chain with {} states", chain.len());
        Ok(chain)
    }

    /// Repository directory this chain lives in.
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Storage location for the state named `state_id`.
    pub fn state_path(&self, state_id: &str) -> PathBuf {
        self.repo_dir.join(STATE_DIR).join(state_id)
    }

    fn chain_file(&self) -> PathBuf {
        self.repo_dir.join(CHAIN_FILE)
    }

    /// State ids in chain order.
    pub fn all_state_id(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.state_id()).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, state_id: &str) -> Option<&State> {
        self.index.get(state_id).map(|&i| &self.states[i])
    }

    /// Like [`get`](Self::get), but a missing id is an error.
    pub fn state(&self, state_id: &str) -> Result<&State> {
        self.get(state_id)
            .ok_or_else(|| Error::not_found(format!("state {:?}", state_id)))
    }

    pub fn first(&self) -> Option<&State> {
        self.states.first()
    }

    pub fn last(&self) -> Option<&State> {
        self.states.last()
    }

    /// Walk the chain from the first state along `next` links.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            chain: self,
            cursor: self.first(),
        }
    }

    /// Diff `s1` (older) against `s2` (newer).
    pub fn compare_state(&self, s1: &State, s2: &State) -> StateDiff {
        s1.state_tree().diff(s2.state_tree())
    }

    /// [`compare_state`](Self::compare_state) by id.
    pub fn compare(&self, id1: &str, id2: &str) -> Result<StateDiff> {
        Ok(self.compare_state(self.state(id1)?, self.state(id2)?))
    }

    /// Append a persisted state after the current tail and record the new
    /// order.
    ///
    /// # Errors
    /// Returns [`Error::KeyExists`] if the id is already in the chain,
    /// [`Error::InvalidPath`] if the state is not stored in this
    /// repository's state directory, and [`Error::NotFound`] if it was never
    /// saved. The chain is unchanged on error.
    pub fn append(&mut self, state: State) -> Result<&State> {
        let id = state.state_id().to_string();
        if self.index.contains_key(&id) {
            return Err(Error::key_exists(format!("state {:?} already in chain", id)));
        }
        if state.state_file() != self.state_path(&id) {
            return Err(Error::invalid_path(format!(
                "state {} is stored outside {}",
                state.state_file().display(),
                self.repo_dir.join(STATE_DIR).display()
            )));
        }
        if !state.state_file().exists() {
            return Err(Error::not_found(format!("state {:?} was never saved", id)));
        }

        let mut record = ChainRecord {
            states: self.states.iter().map(|s| s.state_id().to_string()).collect(),
        };
        record.states.push(id.clone());
        persist::save_json(&record, &self.chain_file())?;

        self.push_linked(state);
        log::info!("appended state {} (chain length {})", id, self.len());
        Ok(&self.states[self.states.len() - 1])
    }

    /// Snapshot `workspace_hash` into a new state named `s<N>` and append it.
    pub fn commit(
        &mut self,
        workspace_hash: &WorkspaceHash,
        session_ids: &[&str],
        metadata: Metadata,
    ) -> Result<&State> {
        let tree = ContentTree::build(workspace_hash)?;
        let id = self.next_state_id();
        let state = State::create(self.state_path(&id), tree, session_ids, metadata)?;
        self.append(state)
    }

    /// Apply [`State::update`] to a state already in the chain.
    ///
    /// Sessions derive versions from the content of the states they list,
    /// so only states no session lists yet may change content here; others
    /// accept new sessions and metadata only.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for an unknown id and [`Error::Integrity`]
    /// when `workspace_hash` differs from the content of a state that
    /// already lists sessions.
    pub fn update_state(
        &mut self,
        state_id: &str,
        workspace_hash: &WorkspaceHash,
        session_ids: &[&str],
        metadata: Metadata,
    ) -> Result<&State> {
        let i = *self
            .index
            .get(state_id)
            .ok_or_else(|| Error::not_found(format!("state {:?}", state_id)))?;
        let state = &self.states[i];
        if !state.session_list().is_empty()
            && &ContentTree::build(workspace_hash)? != state.state_tree()
        {
            return Err(Error::integrity(format!(
                "state {:?} is used by sessions {:?}; its content cannot change",
                state_id,
                state.session_list()
            )));
        }
        self.states[i].update(workspace_hash, session_ids, metadata)?;
        Ok(&self.states[i])
    }

    fn next_state_id(&self) -> String {
        let mut n = self.states.len();
        loop {
            let id = format!("s{}", n);
            if !self.index.contains_key(&id) && !self.state_path(&id).exists() {
                return id;
            }
            n += 1;
        }
    }

    fn push_linked(&mut self, mut state: State) {
        state.clear_previous();
        state.clear_next();
        let i = self.states.len();
        self.index.insert(state.state_id().to_string(), i);
        self.states.push(state);
        if i > 0 {
            let (tail, new) = self.pair_mut(i - 1, i);
            tail.set_next(new);
        }
    }

    /// Two distinct states, mutably. `a < b` is required.
    fn pair_mut(&mut self, a: usize, b: usize) -> (&mut State, &mut State) {
        let (left, right) = self.states.split_at_mut(b);
        (&mut left[a], &mut right[0])
    }
}

/// Iterator over a [`StateChain`] following `next` links.
pub struct Iter<'a> {
    chain: &'a StateChain,
    cursor: Option<&'a State>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a State;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = current.next().and_then(|id| self.chain.get(id));
        Some(current)
    }
}

impl<'a> IntoIterator for &'a StateChain {
    type Item = &'a State;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
