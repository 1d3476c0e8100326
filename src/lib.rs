//! A lightweight version-control engine for binary workspaces.
//!
//! `binvcs` captures point-in-time snapshots of a directory tree as content
//! hashes per file, links them into an append-only history, diffs any two
//! snapshots, and derives a per-file version counter for each participant
//! (session) that survives deletion and re-addition of files. Content is
//! compared by hash only, never by bytes.
//!
//! # Key types
//!
//! - [`ContentTree`] — path-segment trie of `relative path -> hash` with a
//!   categorized [`StateDiff`].
//! - [`State`] — one immutable snapshot plus metadata and chain links.
//! - [`StateChain`] — the ordered history owning every state.
//! - [`Session`] — renumbers the states it contributed to as revisions
//!   `1..n` and tracks per-file versions across them.
//! - [`Repo`] — ties workspace scanning, the chain, and sessions together
//!   under a repository lock.
//!
//! # Quick example
//!
//! ```rust,no_run
//! use binvcs::{Metadata, Repo};
//!
//! let mut repo = Repo::init("/work/game-assets").unwrap();
//! let capture = repo.capture("review", Metadata::new()).unwrap();
//!
//! let session = repo.session("review").unwrap();
//! let versions = session.detail_file_version(Some(capture.revision), None).unwrap();
//! for (path, version) in versions {
//!     println!("{path} v{version}");
//! }
//! ```

pub mod chain;
pub mod error;
pub mod exclude;
pub mod glob;
pub mod hashing;
pub mod lock;
pub mod paths;
pub mod persist;
pub mod repo;
pub mod session;
pub mod state;
pub mod tree;
pub mod types;

// Re-export primary public types at crate root.
pub use chain::StateChain;
pub use error::{Error, Result};
pub use exclude::ExcludeFilter;
pub use hashing::hash_workspace;
pub use repo::{Capture, Repo};
pub use session::{Session, SessionRecord, VersionTable};
pub use state::{Metadata, State, StateRecord};
pub use tree::{ContentTree, Node};
pub use types::*;
