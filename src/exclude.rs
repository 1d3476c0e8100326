//! Gitignore-style exclude filter for workspace scans.
//!
//! Patterns containing `/` are anchored to the full relative path, others
//! match the basename. `!` re-includes, a trailing `/` restricts a pattern
//! to directories, and the last matching rule wins.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::glob::fnmatch;
use crate::types::{OpenOptions, IGNORE_FILE};

#[derive(Debug, Clone)]
struct Rule {
    raw: String,
    negated: bool,
    dir_only: bool,
    anchored: bool,
}

impl Rule {
    fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let (negated, rest) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (dir_only, pat) = match rest.strip_suffix('/') {
            Some(pat) => (true, pat),
            None => (false, rest),
        };
        let anchored = pat.contains('/');
        let pat = pat.trim_start_matches('/');
        if pat.is_empty() {
            return None;
        }

        Some(Self {
            raw: pat.to_string(),
            negated,
            dir_only,
            anchored,
        })
    }

    fn matches(&self, rel_path: &str) -> bool {
        if self.anchored {
            fnmatch(&self.raw, rel_path)
        } else {
            let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
            fnmatch(&self.raw, basename)
        }
    }
}

/// Gitignore-style exclude filter applied by
/// [`hash_workspace`](crate::hashing::hash_workspace).
///
/// Matching has no dotfile protection, so `*.tmp` also matches `.cache.tmp`.
///
/// # Example
///
/// ```rust
/// use binvcs::ExcludeFilter;
///
/// let mut f = ExcludeFilter::new();
/// f.add_patterns(&["*.blend1", "!keep.blend1"]);
///
/// assert!(f.is_excluded("scene.blend1", false));
/// assert!(!f.is_excluded("keep.blend1", false));
/// assert!(!f.is_excluded("textures/wood.png", false));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    rules: Vec<Rule>,
}

impl ExcludeFilter {
    /// Create an empty filter that excludes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the filter a repository scan uses: inline patterns from
    /// `options`, then `options.exclude_from`, then the workspace's
    /// [`IGNORE_FILE`] when enabled.
    ///
    /// # Errors
    /// Returns an error only if an exclude file exists but cannot be read.
    pub fn for_workspace(workspace: &Path, options: &OpenOptions) -> Result<Self> {
        let mut filter = Self::new();
        filter.add_patterns(&options.exclude);
        if let Some(path) = &options.exclude_from {
            filter.load_from_file(path)?;
        }
        if options.use_ignore_file {
            filter.load_from_file(&workspace.join(IGNORE_FILE))?;
        }
        Ok(filter)
    }

    /// Add patterns; blank lines and `#` comments are skipped.
    pub fn add_patterns<S: AsRef<str>>(&mut self, patterns: &[S]) {
        self.rules
            .extend(patterns.iter().filter_map(|p| Rule::parse(p.as_ref())));
    }

    /// Load patterns from a file, one per line. A missing file is not an
    /// error.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let lines: Vec<&str> = contents.lines().map(str::trim_end).collect();
        let before = self.rules.len();
        self.add_patterns(&lines);
        log::debug!(
            "loaded {} exclude patterns from {}",
            self.rules.len() - before,
            path.display()
        );
        Ok(())
    }

    /// Return `true` if `rel_path` (forward-slash separated) should be
    /// skipped. Directory-only rules are ignored when `is_dir` is `false`.
    pub fn is_excluded(&self, rel_path: &str, is_dir: bool) -> bool {
        let mut excluded = false;
        for rule in &self.rules {
            if rule.dir_only && !is_dir {
                continue;
            }
            if rule.matches(rel_path) {
                excluded = !rule.negated;
            }
        }
        excluded
    }

    /// `true` if at least one rule is loaded.
    pub fn active(&self) -> bool {
        !self.rules.is_empty()
    }
}
