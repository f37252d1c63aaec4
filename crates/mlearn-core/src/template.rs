//! Known failure templates and indicator matching.
//!
//! Each template carries a curated remediation lesson. Error text is
//! matched by case-insensitive substring containment of indicator
//! keywords; a template needs at least [`MIN_INDICATOR_MATCHES`] distinct
//! indicators before it is considered a match.

use serde::Serialize;

/// Minimum number of distinct indicators that must appear in the error text.
pub const MIN_INDICATOR_MATCHES: usize = 2;

/// A curated failure category with its remediation lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub key: &'static str,
    pub category: &'static str,
    pub title: &'static str,
    pub lesson: &'static str,
    pub indicators: &'static [&'static str],
}

impl Template {
    /// Counts how many of this template's indicators occur in `error_lower`.
    ///
    /// `error_lower` must already be lowercased.
    fn indicator_matches(&self, error_lower: &str) -> usize {
        self.indicators
            .iter()
            .filter(|indicator| error_lower.contains(&indicator.to_lowercase()))
            .count()
    }
}

/// Result of matching error text against the template table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateMatch {
    pub key: &'static str,
    pub category: &'static str,
    pub title: &'static str,
    pub lesson: &'static str,
    /// Number of indicators found (diagnostic only)
    pub match_count: usize,
}

/// Template table, checked in declaration order.
pub const TEMPLATES: &[Template] = &[
    Template {
        key: "git_push",
        category: "Git",
        title: "Verify Remote Before Push",
        lesson: "Before running `git push`, verify the remote is configured with \
                 `git remote -v`. If no remote exists, add one with \
                 `git remote add origin <url>`.",
        indicators: &[
            "origin",
            "remote",
            "does not appear",
            "permission denied",
            "fatal:",
            "rejected",
        ],
    },
    Template {
        key: "git_auth",
        category: "Git",
        title: "Check GitHub Authentication",
        lesson: "Run `gh auth status` to verify GitHub CLI authentication before \
                 git operations that require credentials.",
        indicators: &[
            "gh auth",
            "credential",
            "401",
            "authentication",
            "could not read Username",
            "Permission denied",
        ],
    },
    Template {
        key: "git_branch",
        category: "Git",
        title: "Verify Branch Status Before Checkout",
        lesson: "Before checking out or creating branches, run `git branch -a` to \
                 see existing local and remote branches.",
        indicators: &[
            "already exists",
            "did not match any",
            "not a valid ref",
            "cannot checkout",
            "branch -d",
        ],
    },
    Template {
        key: "npm_install",
        category: "NPM",
        title: "Check Node Modules Permissions",
        lesson: "If npm install fails, try: (1) Delete node_modules and \
                 package-lock.json, (2) Run `npm cache clean --force`, \
                 (3) Run `npm install` again.",
        indicators: &[
            "EACCES",
            "permission denied",
            "ENOENT",
            "npm ERR!",
            "could not resolve",
            "peer dep",
        ],
    },
    Template {
        key: "npm_script",
        category: "NPM",
        title: "Verify npm Scripts Exist",
        lesson: "Before running `npm run <script>`, check available scripts with \
                 `npm run` or look at package.json scripts section.",
        indicators: &[
            "npm run",
            "script not found",
            "missing script",
            "command not found",
            "exit code",
        ],
    },
    Template {
        key: "npm_typecheck",
        category: "TypeScript",
        title: "Check Type Definitions Before Property Access",
        lesson: "Before accessing properties on objects, verify the type definition \
                 includes that property. Use optional chaining (`?.`) for potentially \
                 undefined properties.",
        indicators: &[
            "Property",
            "does not exist on type",
            "Type error",
            "Cannot find name",
            "is not assignable",
            "TS2",
        ],
    },
    Template {
        key: "file_not_found",
        category: "FileSystem",
        title: "Verify File Exists Before Operations",
        lesson: "Before reading or modifying a file, verify it exists. Use `ls` or \
                 the Glob tool to check file paths.",
        indicators: &[
            "no such file",
            "ENOENT",
            "file not found",
            "cannot open",
            "does not exist",
        ],
    },
    Template {
        key: "supabase_query",
        category: "Supabase",
        title: "Verify Table Schema Before Queries",
        lesson: "Before querying Supabase tables, verify the table exists and \
                 check column names in the schema. Use `.select()` to specify \
                 only the columns you need.",
        indicators: &[
            "relation",
            "does not exist",
            "column",
            "supabase",
            "PGRST",
            "postgrest",
            "row level security",
        ],
    },
    Template {
        key: "python_import",
        category: "Python",
        title: "Verify Python Dependencies",
        lesson: "Before importing Python modules, ensure they are installed. \
                 Check requirements.txt or run `pip list` to see installed packages.",
        indicators: &[
            "ModuleNotFoundError",
            "ImportError",
            "No module named",
            "cannot import",
        ],
    },
    Template {
        key: "path_not_found",
        category: "FileSystem",
        title: "Create Parent Directories First",
        lesson: "Before creating files in nested directories, ensure parent \
                 directories exist. Use `mkdir -p` to create parent directories.",
        indicators: &[
            "directory not found",
            "no such directory",
            "mkdir",
            "ENOENT",
            "not a directory",
        ],
    },
];

/// Matches error text against the template table.
///
/// The first template (in table order) with at least
/// [`MIN_INDICATOR_MATCHES`] indicators wins. Returns `None` for empty text
/// or when no template clears the threshold.
pub fn match_template(error_text: &str) -> Option<TemplateMatch> {
    if error_text.trim().is_empty() {
        return None;
    }

    let error_lower = error_text.to_lowercase();

    TEMPLATES.iter().find_map(|template| {
        let match_count = template.indicator_matches(&error_lower);
        (match_count >= MIN_INDICATOR_MATCHES).then(|| TemplateMatch {
            key: template.key,
            category: template.category,
            title: template.title,
            lesson: template.lesson,
            match_count,
        })
    })
}

/// Returns the first template match across several error messages.
pub fn match_any<'a, I>(error_messages: I) -> Option<TemplateMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    error_messages.into_iter().find_map(match_template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_indicator_never_matches() {
        // "rejected" is a git_push indicator, and nothing else in the text is
        assert_eq!(match_template("the request was rejected"), None);
        assert_eq!(match_template("ModuleNotFoundError"), None);
    }

    #[test]
    fn test_two_indicators_match() {
        let matched = match_template("ModuleNotFoundError: No module named 'requests'")
            .expect("python import template");
        assert_eq!(matched.key, "python_import");
        assert_eq!(matched.category, "Python");
        assert_eq!(matched.match_count, 2);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let matched = match_template("MODULENOTFOUNDERROR: NO MODULE NAMED foo").unwrap();
        assert_eq!(matched.key, "python_import");
    }

    #[test]
    fn test_git_remote_error() {
        let matched = match_template(
            "fatal: 'origin' does not appear to be a git repository\n\
             fatal: Could not read from remote repository.",
        )
        .unwrap();
        assert_eq!(matched.key, "git_push");
        assert_eq!(matched.title, "Verify Remote Before Push");
        assert!(matched.match_count >= 3);
    }

    #[test]
    fn test_first_template_in_order_wins() {
        // Clears both git_push (remote, rejected) and git_auth (credential, authentication)
        let matched = match_template(
            "remote: authentication failed, credential rejected",
        )
        .unwrap();
        assert_eq!(matched.key, "git_push");
    }

    #[test]
    fn test_typescript_error() {
        let matched = match_template(
            "error TS2339: Property 'foo' does not exist on type 'Bar'.",
        )
        .unwrap();
        assert_eq!(matched.category, "TypeScript");
    }

    #[test]
    fn test_empty_text_never_matches() {
        assert_eq!(match_template(""), None);
        assert_eq!(match_template("   "), None);
    }

    #[test]
    fn test_match_any_takes_first_matching_message() {
        let messages = ["boom", "npm ERR! code EACCES", "no such file, ENOENT"];
        let matched = match_any(messages.iter().copied()).unwrap();
        assert_eq!(matched.key, "npm_install");
    }

    #[test]
    fn test_template_table_is_well_formed() {
        for template in TEMPLATES {
            assert!(
                template.indicators.len() >= MIN_INDICATOR_MATCHES,
                "{} has too few indicators",
                template.key
            );
            assert!(!template.lesson.is_empty());
        }
    }
}
