//! Goal classification for tool invocations.
//!
//! A goal hash groups attempts that pursue the same underlying task so a
//! failure can be correlated with a later success. Well-known multi-step
//! workflows (git push, npm install, ...) collapse to a fixed vocabulary;
//! everything else falls back to a short content digest.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Length of the hex digest embedded in content-hashed goals.
const DIGEST_LEN: usize = 8;

static NPM_RUN_SCRIPT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"npm run (\S+)").ok());

/// Commands treated as bulk file operations.
const FILE_OP_COMMANDS: &[&str] = &["mkdir", "touch", "rm", "cp", "mv"];

/// Stable label grouping operations that pursue the same goal.
///
/// Examples: `git_push`, `npm_run_build`, `read_5d41402a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalHash(String);

impl GoalHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Classifies a tool invocation. Total and deterministic.
    pub fn compute(tool: &str, operation: &str) -> Self {
        Self(compute_goal_hash(tool, operation))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lesson category implied by the hash prefix.
    ///
    /// Used when no failure template matched the recorded errors.
    #[must_use]
    pub fn category_hint(&self) -> &'static str {
        let hash = self.0.as_str();
        if hash.starts_with("git_") {
            "Git"
        } else if hash.starts_with("npm_") {
            "NPM"
        } else if ["read_", "write_", "edit_", "file_"]
            .iter()
            .any(|prefix| hash.starts_with(prefix))
        {
            "FileSystem"
        } else {
            "General"
        }
    }
}

impl fmt::Display for GoalHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GoalHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for GoalHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes the goal hash for a `(tool, operation)` pair.
pub fn compute_goal_hash(tool: &str, operation: &str) -> String {
    match tool {
        "Bash" => classify_shell_command(operation),
        "Read" => format!("read_{}", short_digest(operation)),
        "Write" => format!("write_{}", short_digest(operation)),
        "Edit" | "MultiEdit" => format!("edit_{}", short_digest(operation)),
        "Glob" => "glob_search".to_string(),
        "Grep" => "grep_search".to_string(),
        _ => format!(
            "{}_{}",
            tool.to_lowercase(),
            short_digest(&format!("{tool}:{operation}"))
        ),
    }
}

fn classify_shell_command(command: &str) -> String {
    let has = |needle: &str| command.contains(needle);

    if has("git push") || has("git pull") {
        return "git_push".to_string();
    }
    if has("git remote") {
        return "git_remote".to_string();
    }
    if has("git checkout") || has("git branch") {
        return "git_branch".to_string();
    }
    if has("git clone") {
        return "git_clone".to_string();
    }

    if has("npm install") || has("npm ci") {
        return "npm_install".to_string();
    }
    if has("npm test") || has("npm run test") {
        return "npm_test".to_string();
    }
    if has("npm run typecheck") || has("tsc") {
        return "npm_typecheck".to_string();
    }
    if has("npm run") {
        let script = NPM_RUN_SCRIPT
            .as_ref()
            .and_then(|re| re.captures(command))
            .and_then(|caps| caps.get(1));
        if let Some(script) = script {
            return format!("npm_run_{}", script.as_str());
        }
    }

    if has("python") || has("pip") {
        return "python_exec".to_string();
    }

    if FILE_OP_COMMANDS.iter().any(|cmd| has(cmd)) {
        return "file_ops".to_string();
    }

    format!("bash_{}", short_digest(command))
}

/// First eight hex characters of the MD5 digest of `text`.
fn short_digest(text: &str) -> String {
    let hex = format!("{:x}", md5::compute(text.as_bytes()));
    hex.get(..DIGEST_LEN).unwrap_or(&hex).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_push_and_pull_share_goal() {
        for command in [
            "git push",
            "git push -u origin main",
            "cd repo && git push --force-with-lease",
            "git pull --rebase",
        ] {
            assert_eq!(compute_goal_hash("Bash", command), "git_push", "{command}");
        }
    }

    #[test]
    fn test_git_sub_operations() {
        assert_eq!(compute_goal_hash("Bash", "git remote add origin x"), "git_remote");
        assert_eq!(compute_goal_hash("Bash", "git checkout -b feat"), "git_branch");
        assert_eq!(compute_goal_hash("Bash", "git branch -a"), "git_branch");
        assert_eq!(compute_goal_hash("Bash", "git clone https://x/y"), "git_clone");
    }

    #[test]
    fn test_npm_operations() {
        assert_eq!(compute_goal_hash("Bash", "npm ci"), "npm_install");
        assert_eq!(compute_goal_hash("Bash", "npm install lodash"), "npm_install");
        assert_eq!(compute_goal_hash("Bash", "npm run test -- --watch"), "npm_test");
        assert_eq!(compute_goal_hash("Bash", "npx tsc --noEmit"), "npm_typecheck");
        assert_eq!(compute_goal_hash("Bash", "npm run build"), "npm_run_build");
        assert_eq!(compute_goal_hash("Bash", "npm run lint:fix"), "npm_run_lint:fix");
    }

    #[test]
    fn test_python_and_file_ops() {
        assert_eq!(compute_goal_hash("Bash", "python3 manage.py migrate"), "python_exec");
        assert_eq!(compute_goal_hash("Bash", "pip install requests"), "python_exec");
        assert_eq!(compute_goal_hash("Bash", "mkdir -p src/lib"), "file_ops");
    }

    #[test]
    fn test_unrecognized_commands_hash_by_content() {
        let a = compute_goal_hash("Bash", "cargo build");
        let b = compute_goal_hash("Bash", "cargo build");
        let c = compute_goal_hash("Bash", "cargo doc");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("bash_"));
        assert_eq!(a.len(), "bash_".len() + DIGEST_LEN);
    }

    #[test]
    fn test_file_tools_hash_by_path() {
        let first = compute_goal_hash("Read", "/src/main.rs");
        assert_eq!(first, compute_goal_hash("Read", "/src/main.rs"));
        assert_ne!(first, compute_goal_hash("Read", "/src/lib.rs"));
        assert!(first.starts_with("read_"));
        assert!(compute_goal_hash("Write", "/a").starts_with("write_"));
        assert!(compute_goal_hash("Edit", "/a").starts_with("edit_"));
    }

    #[test]
    fn test_search_tools_collapse() {
        assert_eq!(compute_goal_hash("Glob", "**/*.rs"), "glob_search");
        assert_eq!(compute_goal_hash("Grep", "fn main"), "grep_search");
    }

    #[test]
    fn test_default_tool_hash() {
        let hash = compute_goal_hash("WebFetch", "https://example.com");
        assert!(hash.starts_with("webfetch_"));
        assert_ne!(hash, compute_goal_hash("WebSearch", "https://example.com"));
    }

    #[test]
    fn test_known_digest_value() {
        // md5("hello") = 5d41402abc4b2a76b9719d911017c592
        assert_eq!(short_digest("hello"), "5d41402a");
    }

    #[test]
    fn test_category_hint() {
        assert_eq!(GoalHash::new("git_push").category_hint(), "Git");
        assert_eq!(GoalHash::new("npm_run_build").category_hint(), "NPM");
        assert_eq!(GoalHash::new("read_abcd1234").category_hint(), "FileSystem");
        assert_eq!(GoalHash::new("file_ops").category_hint(), "FileSystem");
        assert_eq!(GoalHash::new("python_exec").category_hint(), "General");
    }
}
