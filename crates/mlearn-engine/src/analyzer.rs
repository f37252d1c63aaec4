//! End-of-session analysis: promoting learning opportunities to lessons.
//!
//! For each opportunity, highest confidence first:
//!
//! 1. skip it if confidence is below the promotion threshold
//! 2. stop creating entries once the per-session cap of new lessons is
//!    reached
//! 3. resolve category, title and lesson from the failure templates, or
//!    fall back to a generic lesson keyed by goal hash
//! 4. bump the trigger count of an existing entry; if there is none,
//!    write a new one
//!
//! The session's state is then deleted and stale sessions are swept.
//! Failures on individual opportunities are logged and skipped.

use mlearn_core::{match_any, LearningOpportunity, PatternEntry, SessionId};
use mlearn_protocol::AnalysisReport;
use tracing::{debug, info, warn};

use crate::config::LearningConfig;
use crate::error::Result;
use crate::repository::PatternRepository;
use crate::store::SessionStore;

/// Promotion thresholds for the analyzer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerSettings {
    pub min_confidence: f64,
    pub max_patterns_per_session: usize,
    pub cleanup_max_age_hours: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::from(&LearningConfig::default())
    }
}

impl From<&LearningConfig> for AnalyzerSettings {
    fn from(config: &LearningConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            max_patterns_per_session: config.max_patterns_per_session,
            cleanup_max_age_hours: config.cleanup_max_age_hours,
        }
    }
}

/// Category, title and lesson text chosen for an opportunity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLesson {
    pub category: String,
    pub title: String,
    pub lesson: String,
    /// True if a failure template supplied the lesson
    pub from_template: bool,
}

/// Picks the lesson for an opportunity.
///
/// The first recorded error message that matches a template decides.
/// Without a match the category comes from the goal hash prefix.
pub fn resolve_lesson(opportunity: &LearningOpportunity) -> ResolvedLesson {
    if let Some(matched) = match_any(opportunity.error_messages.iter().map(String::as_str)) {
        return ResolvedLesson {
            category: matched.category.to_string(),
            title: matched.title.to_string(),
            lesson: matched.lesson.to_string(),
            from_template: true,
        };
    }

    ResolvedLesson {
        category: opportunity.goal_hash.category_hint().to_string(),
        title: format!("Retry Pattern: {}", opportunity.goal_hash),
        lesson: format!(
            "This operation required {} retries to succeed. \
             Consider verifying prerequisites before attempting this operation.",
            opportunity.failures
        ),
        from_template: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Promotion {
    Created,
    Updated,
}

/// Turns a finished session's opportunities into repository entries.
#[derive(Debug, Clone)]
pub struct SessionAnalyzer {
    store: SessionStore,
    repository: PatternRepository,
    settings: AnalyzerSettings,
}

impl SessionAnalyzer {
    pub fn new(
        store: SessionStore,
        repository: PatternRepository,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            store,
            repository,
            settings,
        }
    }

    pub fn repository(&self) -> &PatternRepository {
        &self.repository
    }

    /// Analyzes one session.
    ///
    /// Errors are only returned when the repository cannot be created;
    /// everything after that degrades to logged warnings.
    pub fn analyze(&self, session_id: &SessionId) -> Result<AnalysisReport> {
        let state = self.store.load(session_id);
        let mut report = AnalysisReport::new(session_id.clone());

        if !state.has_opportunities() {
            debug!(session_id = %session_id, "No learning opportunities");
            report.cleaned_sessions = self.sweep();
            return Ok(report);
        }

        self.repository.ensure_exists()?;

        let mut created = 0;
        for opportunity in state.opportunities_by_confidence() {
            if opportunity.confidence < self.settings.min_confidence {
                debug!(
                    goal = %opportunity.goal_hash,
                    confidence = opportunity.confidence,
                    "Below promotion threshold"
                );
                report.skipped += 1;
                continue;
            }
            if created >= self.settings.max_patterns_per_session {
                report.skipped += 1;
                continue;
            }

            match self.promote(opportunity) {
                Ok(Promotion::Created) => {
                    report.created += 1;
                    created += 1;
                }
                Ok(Promotion::Updated) => report.updated += 1,
                Err(e) => warn!(
                    goal = %opportunity.goal_hash,
                    error = %e,
                    "Failed to promote learning opportunity"
                ),
            }
        }

        if let Err(e) = self.store.delete(session_id) {
            warn!(session_id = %session_id, error = %e, "Failed to delete session state");
        }
        report.cleaned_sessions = self.sweep();

        report.total_patterns = self.repository.count().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to count patterns");
            0
        });

        info!(
            session_id = %session_id,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "Session analyzed"
        );
        Ok(report)
    }

    fn promote(&self, opportunity: &LearningOpportunity) -> Result<Promotion> {
        let resolved = resolve_lesson(opportunity);

        // false when no entry with this key exists yet
        if self
            .repository
            .update_trigger_count(&resolved.category, &resolved.title)?
        {
            debug!(
                category = %resolved.category,
                title = %resolved.title,
                from_template = resolved.from_template,
                "Known pattern seen again"
            );
            return Ok(Promotion::Updated);
        }

        let from_template = resolved.from_template;

        let entry = PatternEntry::new(
            resolved.category,
            resolved.title,
            resolved.lesson,
            opportunity.confidence,
            opportunity.failures,
        );
        info!(pattern = %entry.key(), from_template, "New pattern learned");
        self.repository.write_pattern(entry)?;
        Ok(Promotion::Created)
    }

    fn sweep(&self) -> usize {
        self.store
            .cleanup_older_than_hours(self.settings.cleanup_max_age_hours)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Session cleanup failed");
                0
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlearn_core::GoalHash;

    fn opportunity(goal: &str, failures: u32, errors: &[&str]) -> LearningOpportunity {
        LearningOpportunity {
            goal_hash: GoalHash::new(goal),
            failures,
            success_command: String::new(),
            error_messages: errors.iter().map(|e| e.to_string()).collect(),
            confidence: 0.7,
        }
    }

    #[test]
    fn test_resolve_from_template() {
        let resolved = resolve_lesson(&opportunity(
            "git_push",
            2,
            &["fatal: 'origin' does not appear to be a git repository"],
        ));
        assert!(resolved.from_template);
        assert_eq!(resolved.category, "Git");
        assert_eq!(resolved.title, "Verify Remote Before Push");
    }

    #[test]
    fn test_resolve_generic_fallback() {
        let resolved = resolve_lesson(&opportunity("npm_run_build", 3, &["oops"]));
        assert!(!resolved.from_template);
        assert_eq!(resolved.category, "NPM");
        assert_eq!(resolved.title, "Retry Pattern: npm_run_build");
        assert!(resolved.lesson.starts_with("This operation required 3 retries"));
    }

    #[test]
    fn test_resolve_generic_categories() {
        let category = |goal| resolve_lesson(&opportunity(goal, 1, &[])).category;
        assert_eq!(category("git_branch"), "Git");
        assert_eq!(category("read_1234abcd"), "FileSystem");
        assert_eq!(category("write_1234abcd"), "FileSystem");
        assert_eq!(category("bash_1234abcd"), "General");
    }

    #[test]
    fn test_settings_from_config() {
        let settings = AnalyzerSettings::default();
        assert!((settings.min_confidence - 0.6).abs() < f64::EPSILON);
        assert_eq!(settings.max_patterns_per_session, 5);
        assert_eq!(settings.cleanup_max_age_hours, 24);
    }
}
