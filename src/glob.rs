//! Shell-style wildcard matching for path segments.
//!
//! `*` matches any run of characters, `?` exactly one, and `[...]` one
//! character from a set (`[a-z]`, negated with `[!...]` or `[^...]`). An
//! unclosed `[` matches itself.

/// Match `pattern` against one path segment.
///
/// Dotfiles (names starting with `.`) are excluded unless the pattern
/// explicitly starts with `.`.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    if name.starts_with('.') && !pattern.starts_with('.') {
        return false;
    }
    fnmatch(pattern, name)
}

/// `true` if the segment contains a wildcard and cannot be looked up directly.
pub fn has_magic(segment: &str) -> bool {
    segment.contains(&['*', '?', '['][..])
}

/// Wildcard match without dotfile protection.
pub(crate) fn fnmatch(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = name.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it currently absorbs up to.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        let width = match pat.get(p).copied() {
            Some('*') => {
                star = Some((p, t));
                p += 1;
                continue;
            }
            Some('?') => Some(1),
            Some('[') => match class_match(&pat[p..], text[t]) {
                Some((true, width)) => Some(width),
                Some((false, _)) => None,
                None => (text[t] == '[').then_some(1),
            },
            Some(c) => (c == text[t]).then_some(1),
            None => None,
        };

        if let Some(width) = width {
            p += width;
            t += 1;
            continue;
        }

        match star {
            Some((star_p, star_t)) => {
                star = Some((star_p, star_t + 1));
                p = star_p + 1;
                t = star_t + 1;
            }
            None => return false,
        }
    }

    pat[p..].iter().all(|&c| c == '*')
}

/// Match `c` against the bracket expression at the start of `pat`.
///
/// Returns whether it matched and the expression's width, or `None` when
/// the bracket is never closed.
fn class_match(pat: &[char], c: char) -> Option<(bool, usize)> {
    let mut i = 1;
    let negated = matches!(pat.get(i), Some(&'!') | Some(&'^'));
    if negated {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    while let Some(&lo) = pat.get(i) {
        // A `]` right after the opening bracket is a literal member.
        if lo == ']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;

        match (pat.get(i + 1), pat.get(i + 2)) {
            (Some(&'-'), Some(&hi)) if hi != ']' => {
                matched |= lo <= c && c <= hi;
                i += 3;
            }
            _ => {
                matched |= lo == c;
                i += 1;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star() {
        assert!(glob_match("*", "albedo.png"));
        assert!(glob_match("*.png", "albedo.png"));
        assert!(!glob_match("*.png", "albedo.exr"));
        assert!(glob_match("a*o.png", "albedo.png"));
        assert!(glob_match("*_*_*.exr", "shot_010_beauty.exr"));
    }

    #[test]
    fn test_question() {
        assert!(glob_match("lod?.bin", "lod0.bin"));
        assert!(!glob_match("lod?.bin", "lod.bin"));
    }

    #[test]
    fn test_class() {
        assert!(glob_match("lod[0-3].bin", "lod2.bin"));
        assert!(!glob_match("lod[0-3].bin", "lod7.bin"));
        assert!(glob_match("lod[!0-3].bin", "lod7.bin"));
        assert!(glob_match("[abc]*.png", "beam.png"));
        assert!(glob_match("[]x]", "]"));
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        assert!(glob_match("take[1", "take[1"));
        assert!(!glob_match("take[1", "take1"));
    }

    #[test]
    fn test_dotfile_guard() {
        assert!(!glob_match("*", ".binvcsignore"));
        assert!(glob_match(".*", ".binvcsignore"));
        assert!(fnmatch("*", ".binvcsignore"));
    }

    #[test]
    fn test_has_magic() {
        assert!(has_magic("*.png"));
        assert!(has_magic("lod?"));
        assert!(has_magic("lod[12]"));
        assert!(!has_magic("textures"));
    }
}
