use std::path::{Path, PathBuf};

use binvcs::*;

#[allow(dead_code)]
pub fn ws(entries: &[(&str, &str)]) -> WorkspaceHash {
    workspace_hash_of(entries.iter().copied())
}

#[allow(dead_code)]
pub fn repo_dir(dir: &Path) -> PathBuf {
    dir.join(REPO_DIR)
}

#[allow(dead_code)]
pub fn commit(chain: &mut StateChain, entries: &[(&str, &str)], sessions: &[&str]) -> String {
    chain
        .commit(&ws(entries), sessions, Metadata::new())
        .unwrap()
        .state_id()
        .to_string()
}

#[allow(dead_code)]
pub fn write_file(root: &Path, rel: &str, data: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, data).unwrap();
}

#[allow(dead_code)]
pub fn table(entries: &[(&str, u32)]) -> VersionTable {
    entries.iter().map(|(p, v)| (p.to_string(), *v)).collect()
}
