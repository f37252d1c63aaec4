//! Locating the project's pattern repository file.

use std::path::{Path, PathBuf};

/// File name of the pattern repository inside `.claude/rules`.
pub const PATTERNS_FILE_NAME: &str = "learned-patterns.md";

/// Finds `learned-patterns.md` for a working directory.
///
/// Walks from `start` up through its ancestors and picks the first one that
/// already has a `.claude/rules` directory. Falls back to
/// `start/.claude/rules/learned-patterns.md` when none does. The file itself
/// need not exist yet.
pub fn discover_patterns_file(start: &Path) -> PathBuf {
    start
        .ancestors()
        .map(rules_dir)
        .find(|dir| dir.is_dir())
        .unwrap_or_else(|| rules_dir(start))
        .join(PATTERNS_FILE_NAME)
}

fn rules_dir(root: &Path) -> PathBuf {
    root.join(".claude").join("rules")
}
