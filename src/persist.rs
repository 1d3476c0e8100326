//! JSON load/save primitives for state, session, and chain records.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Read and parse a JSON record.
///
/// # Errors
/// Returns [`Error::NotFound`] if the file does not exist, [`Error::Io`] for
/// other read failures, and [`Error::Json`] if the content does not parse
/// into `T`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    log::debug!("reading {}", path.display());
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(path.display().to_string()));
        }
        Err(e) => return Err(Error::io(path, e)),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
///
/// The record is written to a sibling `<name>.tmp` file, flushed, and then
/// renamed over the target, so readers see either the old or the new
/// content. Parent directories are created as needed.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    log::debug!("writing {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let content = serde_json::to_string_pretty(value)?;
    let temp_path = temp_path_for(path);

    let written = (|| -> std::io::Result<()> {
        let mut f = fs::File::create(&temp_path)?;
        f.write_all(content.as_bytes())?;
        f.sync_all()
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::io(&temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::io(path, e)
    })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
