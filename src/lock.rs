use std::fs::OpenOptions;
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};
use crate::types::LOCK_FILE;

const LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Acquire an advisory file lock on the repository, execute `f`, then release.
///
/// Creates `<repo_dir>/binvcs.lock` and takes an exclusive `fs2` lock on it,
/// retrying with exponential backoff for up to 30 seconds. Serializes state
/// appends, state updates, and session syncs across processes.
///
/// # Errors
/// Returns [`Error::Locked`] if the lock cannot be acquired within the
/// timeout, or whatever `f` returns.
pub fn with_repo_lock<F, T>(repo_dir: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let lock_path = repo_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    let started = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => break,
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                if started.elapsed() >= LOCK_TIMEOUT {
                    return Err(Error::locked(format!(
                        "{} still held after {:?}",
                        lock_path.display(),
                        LOCK_TIMEOUT
                    )));
                }
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(e) => return Err(Error::io(&lock_path, e)),
        }
    }
    log::debug!("acquired {}", lock_path.display());

    let result = f();
    if let Err(e) = FileExt::unlock(&file) {
        log::warn!("failed to release {}: {}", lock_path.display(), e);
    }
    result
}
