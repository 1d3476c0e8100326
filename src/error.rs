use std::path::PathBuf;

/// All errors produced by binvcs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("revision not found: {0}")]
    RevisionNotFound(u32),

    #[error("corrupt state: {0}")]
    CorruptState(String),

    #[error("malformed path: {0}")]
    MalformedPath(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("key already exists: {0}")]
    KeyExists(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("repository locked: {0}")]
    Locked(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn corrupt_state(msg: impl Into<String>) -> Self {
        Self::CorruptState(msg.into())
    }

    pub fn malformed_path(path: impl Into<String>) -> Self {
        Self::MalformedPath(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    pub fn key_exists(key: impl Into<String>) -> Self {
        Self::KeyExists(key.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn locked(msg: impl Into<String>) -> Self {
        Self::Locked(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.into().display(), err),
        ))
    }

    /// `true` for [`Error::RevisionNotFound`].
    pub fn is_revision_not_found(&self) -> bool {
        matches!(self, Self::RevisionNotFound(_))
    }
}
