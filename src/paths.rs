use std::path::Path;

use crate::error::{Error, Result};

/// Normalize a workspace-relative path: strip leading/trailing slashes,
/// convert backslashes, reject `..` segments, and collapse repeated
/// slashes and `.` markers.
///
/// An empty input returns an empty string (root).
///
/// # Arguments
/// * `path` - The raw path string to normalize.
///
/// # Errors
/// Returns [`Error::InvalidPath`] if the path contains `..` segments or
/// collapses to nothing.
pub fn normalize_path(path: &str) -> Result<String> {
    if path.is_empty() {
        return Ok(String::new());
    }

    let posix = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for seg in posix.split('/') {
        if seg.is_empty() {
            continue;
        }
        if seg == ".." {
            return Err(Error::invalid_path(format!(
                "path segment '{}' is not allowed in {:?}",
                seg, path,
            )));
        }
        if seg == "." {
            continue;
        }
        segments.push(seg);
    }

    if segments.is_empty() {
        if posix.bytes().all(|b| b == b'/') {
            return Ok(String::new());
        }
        return Err(Error::invalid_path("path must not be empty"));
    }

    Ok(segments.join("/"))
}

/// Returns `true` when the path refers to the root of the tree
/// (empty string or only slashes).
pub fn is_root_path(path: &str) -> bool {
    path.is_empty() || path.chars().all(|c| c == '/')
}

/// Join a prefix and a child name with `/`, treating an empty prefix as root.
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Validate a state or session identifier.
///
/// Identifiers double as file names inside the repository, so they must be
/// a single path component: no separators, no control characters, not
/// `.`/`..`, no leading `.`, and no `.tmp` suffix (reserved for atomic
/// writes).
///
/// # Errors
/// Returns [`Error::InvalidName`] if the name violates any rule.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name("name must not be empty"));
    }

    for ch in name.chars() {
        if ch == '/' || ch == '\\' || ch == ':' || ch.is_control() {
            return Err(Error::invalid_name(format!(
                "name {:?} contains invalid character: {:?}",
                name, ch,
            )));
        }
    }

    if name.starts_with('.') {
        return Err(Error::invalid_name(format!(
            "name {:?} must not start with '.'",
            name
        )));
    }

    if name.ends_with(".tmp") {
        return Err(Error::invalid_name(format!(
            "name {:?} must not end with '.tmp'",
            name
        )));
    }

    Ok(())
}

/// Derive an identifier from the name component of a storage location.
///
/// # Errors
/// Returns [`Error::InvalidName`] if the location has no usable file name.
pub fn id_from_location(location: &Path) -> Result<String> {
    let name = location
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::invalid_name(format!(
                "storage location has no file name: {}",
                location.display()
            ))
        })?;
    validate_name(name)?;
    Ok(name.to_string())
}
