use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::exclude::ExcludeFilter;
use crate::paths;
use crate::types::{FileHash, WorkspaceHash, REPO_DIR};

/// Hash every file under `root`, returning relative path → content hash.
///
/// Directories are traversed (the repository directory [`REPO_DIR`] and
/// anything `filter` excludes are pruned); symlinks are hashed by their
/// target text and never followed. Hashes are lowercase hex SHA-256.
///
/// # Errors
/// Returns [`Error::NotFound`] if `root` does not exist or is not a
/// directory, and [`Error::Io`] if an entry cannot be read.
pub fn hash_workspace(root: &Path, filter: &ExcludeFilter) -> Result<WorkspaceHash> {
    if !root.is_dir() {
        return Err(Error::not_found(format!(
            "workspace not found: {}",
            root.display()
        )));
    }

    if filter.active() {
        log::debug!("scanning {} with exclude rules", root.display());
    }
    let mut out = WorkspaceHash::new();
    walk_disk(root, root, filter, &mut out)?;
    log::debug!("hashed {} files under {}", out.len(), root.display());
    Ok(out)
}

/// Hash a single file's content.
pub fn hash_file(path: &Path) -> Result<String> {
    let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(hash_bytes(&data))
}

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn walk_disk(
    root: &Path,
    dir: &Path,
    filter: &ExcludeFilter,
    out: &mut WorkspaceHash,
) -> Result<()> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    for entry in read_dir {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let meta = std::fs::symlink_metadata(&path).map_err(|e| Error::io(&path, e))?;

        let rel = match relative_posix(root, &path) {
            Some(rel) => rel,
            None => {
                log::warn!("skipping non-UTF-8 path {}", path.display());
                continue;
            }
        };

        if meta.is_dir() {
            if rel == REPO_DIR || filter.is_excluded(&rel, true) {
                log::debug!("pruned directory {}", rel);
                continue;
            }
            walk_disk(root, &path, filter, out)?;
            continue;
        }

        if filter.is_excluded(&rel, false) {
            continue;
        }

        let hash = if meta.file_type().is_symlink() {
            let target = std::fs::read_link(&path).map_err(|e| Error::io(&path, e))?;
            hash_bytes(target.to_string_lossy().as_bytes())
        } else {
            hash_file(&path)?
        };
        out.insert(rel.clone(), FileHash::new(rel, hash));
    }
    Ok(())
}

fn relative_posix(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    let joined = parts?.join("/");
    paths::normalize_path(&joined).ok()
}
