use std::path::{Path, PathBuf};

use crate::chain::StateChain;
use crate::error::{Error, Result};
use crate::exclude::ExcludeFilter;
use crate::hashing;
use crate::lock::with_repo_lock;
use crate::paths;
use crate::session::Session;
use crate::state::Metadata;
use crate::tree::ContentTree;
use crate::types::{OpenOptions, StateDiff, WorkspaceHash, REPO_DIR, SESSION_DIR, STATE_DIR};

/// Outcome of [`Repo::capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// State that now holds the workspace content.
    pub state_id: String,
    /// The session's revision number for that state.
    pub revision: u32,
    /// `true` if a new state was appended, `false` if the chain tail already
    /// matched the workspace and was reused.
    pub created: bool,
    /// Changes since the session's previous revision (everything is added
    /// for a session's first capture).
    pub changes: StateDiff,
}

/// A workspace together with its `.binvcs` repository.
///
/// Mutating operations hold the repository lock and re-read the chain
/// first. [`status`](Self::status) and [`diff`](Self::diff) read the chain
/// from disk as well, so several `Repo` handles on one workspace stay
/// consistent. Only [`chain`](Self::chain) returns the cached copy.
#[derive(Debug)]
pub struct Repo {
    workspace: PathBuf,
    repo_dir: PathBuf,
    filter: ExcludeFilter,
    chain: StateChain,
}

impl Repo {
    /// Open the repository of `workspace`, creating it when
    /// `options.create` is set.
    pub fn open(workspace: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let workspace = workspace.as_ref().to_path_buf();
        if !workspace.is_dir() {
            return Err(Error::not_found(format!(
                "workspace not found: {}",
                workspace.display()
            )));
        }

        let repo_dir = workspace.join(REPO_DIR);
        if !repo_dir.exists() {
            if !options.create {
                return Err(Error::not_found(format!(
                    "repository not found: {}",
                    repo_dir.display()
                )));
            }
            for sub in [STATE_DIR, SESSION_DIR] {
                let dir = repo_dir.join(sub);
                std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            }
            log::info!("initialized repository in {}", repo_dir.display());
        }

        let filter = ExcludeFilter::for_workspace(&workspace, &options)?;
        let chain = StateChain::open(&repo_dir)?;
        Ok(Self {
            workspace,
            repo_dir,
            filter,
            chain,
        })
    }

    /// Create (or open) the repository of `workspace` with default options.
    pub fn init(workspace: impl AsRef<Path>) -> Result<Self> {
        Self::open(
            workspace,
            OpenOptions {
                create: true,
                ..Default::default()
            },
        )
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// The state chain as of the last open, reload, or capture by this
    /// handle.
    pub fn chain(&self) -> &StateChain {
        &self.chain
    }

    /// Re-read the chain from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.chain = StateChain::open(&self.repo_dir)?;
        Ok(())
    }

    /// Hash the live workspace.
    pub fn scan(&self) -> Result<WorkspaceHash> {
        hashing::hash_workspace(&self.workspace, &self.filter)
    }

    /// Storage location of session `session_id`.
    pub fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        paths::validate_name(session_id)?;
        Ok(self.repo_dir.join(SESSION_DIR).join(session_id))
    }

    /// Open session `session_id` (empty if it has never captured).
    pub fn session(&self, session_id: &str) -> Result<Session> {
        Session::open(self.session_path(session_id)?)
    }

    /// Names of all persisted sessions, sorted.
    pub fn sessions(&self) -> Result<Vec<String>> {
        let dir = self.repo_dir.join(SESSION_DIR);
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&dir, e)),
        };

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if paths::validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Snapshot the workspace for `session_id` and bring the session up to
    /// date.
    ///
    /// When the workspace content equals the chain tail, the tail is updated
    /// in place (merging the session id and `metadata`) instead of appending
    /// a duplicate state.
    pub fn capture(&mut self, session_id: &str, metadata: Metadata) -> Result<Capture> {
        paths::validate_name(session_id)?;
        let repo_dir = self.repo_dir.clone();

        with_repo_lock(&repo_dir, || {
            self.chain = StateChain::open(&repo_dir)?;
            let workspace_hash = self.scan()?;
            let tree = ContentTree::build(&workspace_hash)?;
            let mut session = self.session(session_id)?;
            let before = session
                .state_id(session.latest_revision())
                .map(str::to_string);

            let tail = self
                .chain
                .last()
                .filter(|tail| tail.state_tree() == &tree)
                .map(|tail| (tail.state_id().to_string(), tail.has_session(session_id)));

            let (state_id, created) = match tail {
                Some((id, has_session)) => {
                    if !has_session || !metadata.is_empty() {
                        self.chain
                            .update_state(&id, &workspace_hash, &[session_id], metadata)?;
                    }
                    (id, false)
                }
                None => {
                    let state = self.chain.commit(&workspace_hash, &[session_id], metadata)?;
                    (state.state_id().to_string(), true)
                }
            };

            session.sync_from_state_chain(&self.chain)?;
            let revision = session.revision_of(&state_id).ok_or_else(|| {
                Error::integrity(format!(
                    "state {:?} missing from session {}",
                    state_id, session_id
                ))
            })?;

            let empty = ContentTree::new();
            let old_tree = match &before {
                Some(id) => self.chain.state(id)?.state_tree(),
                None => &empty,
            };
            let changes = old_tree.diff(self.chain.state(&state_id)?.state_tree());

            Ok(Capture {
                state_id,
                revision,
                created,
                changes,
            })
        })
    }

    /// Changes in the live workspace since the session's latest revision.
    pub fn status(&self, session_id: &str) -> Result<StateDiff> {
        let chain = StateChain::open(&self.repo_dir)?;
        let session = self.session(session_id)?;
        let current = ContentTree::build(&self.scan()?)?;
        let empty = ContentTree::new();
        let base = match session.state_id(session.latest_revision()) {
            Some(id) => chain.state(id)?.state_tree(),
            None => &empty,
        };
        Ok(base.diff(&current))
    }

    /// Diff two states by id.
    pub fn diff(&self, id1: &str, id2: &str) -> Result<StateDiff> {
        StateChain::open(&self.repo_dir)?.compare(id1, id2)
    }
}
