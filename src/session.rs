//! Per-session revision numbering and per-file version derivation.
//!
//! A session sees only the states whose session list names it. The i-th
//! such state in chain order is revision `i` (1-based). For every revision
//! the session records a version counter per file path:
//!
//! - unchanged since the previous revision: same version (1 if untracked);
//! - modified: previous version + 1;
//! - added: one more than the version it had in the nearest earlier
//!   revision that contained it, or 1 if it never appeared before;
//! - removed: no entry.
//!
//! Revisions are only ever appended, so repeated syncs over a growing chain
//! leave earlier results untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chain::StateChain;
use crate::error::{Error, Result};
use crate::paths;
use crate::persist;
use crate::types::StateDiff;

/// Version counter per relative path for one revision.
pub type VersionTable = BTreeMap<String, u32>;

/// On-disk shape of a session. Revision keys serialize as decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub revision: BTreeMap<u32, String>,
    pub detail_version: BTreeMap<u32, VersionTable>,
}

const REVISION_KEY: &str = "revision";
const DETAIL_VERSION_KEY: &str = "detail_version";

/// A named participant's view of the state chain.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: String,
    session_file: PathBuf,
    revision_data: BTreeMap<u32, String>,
    detail_version_data: BTreeMap<u32, VersionTable>,
}

impl Session {
    /// A fresh, unsaved session bound to `location`.
    pub fn new(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        Ok(Self {
            session_id: paths::id_from_location(location)?,
            session_file: location.to_path_buf(),
            revision_data: BTreeMap::new(),
            detail_version_data: BTreeMap::new(),
        })
    }

    /// Bind to `location`, loading its record if one exists.
    ///
    /// A record missing either top-level key leaves the session empty.
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        let mut session = Self::new(location)?;
        if session.session_file.exists() && !session.load()? {
            log::warn!(
                "session record {} is incomplete; starting empty",
                session.session_file.display()
            );
        }
        Ok(session)
    }

    /// Replace in-memory data with the persisted record.
    ///
    /// Returns `Ok(false)` without touching `self` when the record lacks
    /// `revision` or `detail_version`.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if there is no record,
    /// [`Error::Json`] if it is not JSON, and [`Error::CorruptState`] if its
    /// revisions are not dense from 1 or a version table has no revision.
    pub fn load(&mut self) -> Result<bool> {
        let value: serde_json::Value = persist::load_json(&self.session_file)?;
        let has_keys = value
            .as_object()
            .map(|o| o.contains_key(REVISION_KEY) && o.contains_key(DETAIL_VERSION_KEY))
            .unwrap_or(false);
        if !has_keys {
            return Ok(false);
        }

        let corrupt =
            |what: String| Error::corrupt_state(format!("{}: {}", self.session_file.display(), what));
        let record: SessionRecord =
            serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;

        for (expected, rev) in (1u32..).zip(record.revision.keys()) {
            if *rev != expected {
                return Err(corrupt(format!("revision {} follows a gap", rev)));
            }
        }
        if let Some(rev) = record
            .detail_version
            .keys()
            .find(|r| !record.revision.contains_key(r))
        {
            return Err(corrupt(format!("versions recorded for unknown revision {}", rev)));
        }
        for (rev, table) in &record.detail_version {
            if let Some(path) = table.iter().find(|(_, v)| **v == 0).map(|(p, _)| p) {
                return Err(corrupt(format!(
                    "{:?} has version 0 in revision {}",
                    path, rev
                )));
            }
        }

        self.revision_data = record.revision;
        self.detail_version_data = record.detail_version;
        Ok(true)
    }

    /// Persist revision and version data together.
    pub fn save(&self) -> Result<()> {
        let record = SessionRecord {
            revision: self.revision_data.clone(),
            detail_version: self.detail_version_data.clone(),
        };
        persist::save_json(&record, &self.session_file)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    /// Revision number → state id.
    pub fn revision_data(&self) -> &BTreeMap<u32, String> {
        &self.revision_data
    }

    /// Revision number → per-path versions.
    pub fn detail_version_data(&self) -> &BTreeMap<u32, VersionTable> {
        &self.detail_version_data
    }

    /// All revision numbers, ascending.
    pub fn all_revision(&self) -> Vec<u32> {
        self.revision_data.keys().copied().collect()
    }

    /// Highest revision, or 0 when the session has none.
    pub fn latest_revision(&self) -> u32 {
        self.revision_data.keys().next_back().copied().unwrap_or(0)
    }

    /// State id behind `revision`.
    pub fn state_id(&self, revision: u32) -> Option<&str> {
        self.revision_data.get(&revision).map(String::as_str)
    }

    /// Revision number of `state_id` in this session, if it contributed.
    pub fn revision_of(&self, state_id: &str) -> Option<u32> {
        self.revision_data
            .iter()
            .find(|(_, id)| id.as_str() == state_id)
            .map(|(rev, _)| *rev)
    }

    /// Assign revisions to states of this session not seen yet, derive their
    /// version tables, and persist. Returns the newly computed revisions.
    ///
    /// Nothing in memory or on disk changes unless the whole sync succeeds.
    ///
    /// # Errors
    /// Returns [`Error::Integrity`] if already-assigned revisions disagree
    /// with the chain (states removed or reordered) or a modified path has
    /// no version in the previous revision, and [`Error::NotFound`] if a
    /// recorded state id is missing from the chain.
    pub fn sync_from_state_chain(&mut self, chain: &StateChain) -> Result<Vec<u32>> {
        let revisions = self.assign_revisions(chain)?;

        let mut versions = self.detail_version_data.clone();
        let mut computed = Vec::new();
        for (&rev, state_id) in &revisions {
            if versions.contains_key(&rev) {
                continue;
            }
            let current = chain.state(state_id)?;
            let previous = if rev == 1 {
                current
            } else {
                let prev_id = revisions.get(&(rev - 1)).ok_or_else(|| {
                    Error::integrity(format!("revision {} has no predecessor", rev))
                })?;
                chain.state(prev_id)?
            };
            let diff = chain.compare_state(previous, current);
            let table = derive_versions(&versions, rev, &diff)?;
            versions.insert(rev, table);
            computed.push(rev);
        }

        let record = SessionRecord {
            revision: revisions,
            detail_version: versions,
        };
        persist::save_json(&record, &self.session_file)?;
        self.revision_data = record.revision;
        self.detail_version_data = record.detail_version;

        if !computed.is_empty() {
            log::info!(
                "session {}: derived revisions {:?} (latest {})",
                self.session_id,
                computed,
                self.latest_revision()
            );
        }
        Ok(computed)
    }

    /// Existing revisions plus any trailing ones the chain now provides.
    fn assign_revisions(&self, chain: &StateChain) -> Result<BTreeMap<u32, String>> {
        let contributed: Vec<&str> = chain
            .iter()
            .filter(|s| s.has_session(&self.session_id))
            .map(|s| s.state_id())
            .collect();

        if contributed.len() < self.revision_data.len() {
            return Err(Error::integrity(format!(
                "session {} has {} revisions but the chain holds only {} of its states",
                self.session_id,
                self.revision_data.len(),
                contributed.len()
            )));
        }

        let mut revisions = self.revision_data.clone();
        for (rev, state_id) in (1u32..).zip(contributed) {
            match revisions.get(&rev) {
                Some(known) if known != state_id => {
                    return Err(Error::integrity(format!(
                        "session {} revision {} is state {:?} but the chain now yields {:?}",
                        self.session_id, rev, known, state_id
                    )));
                }
                Some(_) => {}
                None => {
                    revisions.insert(rev, state_id.to_string());
                }
            }
        }
        Ok(revisions)
    }

    /// Version table for `revision` (latest when `None`), optionally
    /// narrowed to one path. An empty path means no filter; a path absent
    /// from that revision yields an empty table.
    ///
    /// # Errors
    /// Returns [`Error::RevisionNotFound`] if no table exists for the
    /// revision and [`Error::InvalidPath`] for a path with `..` segments.
    pub fn detail_file_version(
        &self,
        revision: Option<u32>,
        relative_path: Option<&str>,
    ) -> Result<VersionTable> {
        let revision = revision.unwrap_or_else(|| self.latest_revision());
        let table = self
            .detail_version_data
            .get(&revision)
            .ok_or(Error::RevisionNotFound(revision))?;

        match relative_path.filter(|p| !p.is_empty()) {
            None => Ok(table.clone()),
            Some(path) => {
                let path = paths::normalize_path(path)?;
                Ok(table
                    .get_key_value(&path)
                    .map(|(k, v)| (k.clone(), *v))
                    .into_iter()
                    .collect())
            }
        }
    }

    /// Version of `relative_path` at every revision, `None` where the file
    /// did not exist.
    pub fn file_history(&self, relative_path: &str) -> Result<Vec<(u32, Option<u32>)>> {
        let path = paths::normalize_path(relative_path)?;
        Ok(self
            .detail_version_data
            .iter()
            .map(|(rev, table)| (*rev, table.get(&path).copied()))
            .collect())
    }
}

/// Version table for `rev` given the tables of all earlier revisions.
fn derive_versions(
    history: &BTreeMap<u32, VersionTable>,
    rev: u32,
    diff: &StateDiff,
) -> Result<VersionTable> {
    let empty = VersionTable::new();
    let prev = history.get(&(rev - 1)).unwrap_or(&empty);
    let mut table = VersionTable::new();

    for path in &diff.unchanged {
        table.insert(path.clone(), prev.get(path).copied().unwrap_or(1));
    }

    for path in &diff.modified {
        let v = prev.get(path).ok_or_else(|| {
            Error::integrity(format!(
                "{:?} modified in revision {} but has no version in revision {}",
                path,
                rev,
                rev - 1
            ))
        })?;
        table.insert(path.clone(), bump(*v, path, rev)?);
    }

    for path in &diff.added {
        let v = match last_known_version(history, rev, path) {
            Some(v) => bump(v, path, rev)?,
            None => 1,
        };
        table.insert(path.clone(), v);
    }

    Ok(table)
}

fn bump(version: u32, path: &str, rev: u32) -> Result<u32> {
    version.checked_add(1).ok_or_else(|| {
        Error::integrity(format!(
            "version of {:?} overflows in revision {}",
            path, rev
        ))
    })
}

/// Nearest version of `path` strictly before `rev`, scanning backward.
fn last_known_version(history: &BTreeMap<u32, VersionTable>, rev: u32, path: &str) -> Option<u32> {
    let mut r = rev - 1;
    while r > 0 {
        if let Some(v) = history.get(&r).and_then(|t| t.get(path)) {
            return Some(*v);
        }
        r -= 1;
    }
    None
}
