//! Report messages emitted after analysis.

use mlearn_core::SessionId;
use serde::{Deserialize, Serialize};

/// Outcome of analyzing one session.
///
/// Informational only: nothing downstream depends on these numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub session_id: SessionId,
    /// New pattern entries written
    pub created: usize,
    /// Existing entries whose trigger count was incremented
    pub updated: usize,
    /// Opportunities below the confidence threshold or past the session cap
    pub skipped: usize,
    /// Entries in the repository after this run
    pub total_patterns: usize,
    /// Stale session state files removed by the cleanup sweep
    pub cleaned_sessions: usize,
}

impl AnalysisReport {
    /// Creates an empty report for a session.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }

    /// Returns true if the repository changed.
    pub fn has_changes(&self) -> bool {
        self.created > 0 || self.updated > 0
    }

    /// Human-readable summary lines, empty when nothing changed.
    pub fn summary_lines(&self) -> Vec<String> {
        if !self.has_changes() {
            return Vec::new();
        }

        let mut lines = vec![format!(
            "\u{26a1} Learned {} new pattern(s) this session.",
            self.created
        )];
        if self.updated > 0 {
            lines.push(format!("   Updated {} existing pattern(s).", self.updated));
        }
        lines.push(format!("   Total patterns: {}", self.total_patterns));
        lines.push("   Run `mlearn patterns` to view.".to_string());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_summary_without_changes() {
        let report = AnalysisReport::new(SessionId::new("s1"));
        assert!(!report.has_changes());
        assert!(report.summary_lines().is_empty());
    }

    #[test]
    fn test_summary_lines() {
        let report = AnalysisReport {
            session_id: SessionId::new("s1"),
            created: 2,
            updated: 1,
            skipped: 0,
            total_patterns: 7,
            cleaned_sessions: 0,
        };
        let lines = report.summary_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Learned 2 new pattern(s)"));
        assert_eq!(lines[1], "   Updated 1 existing pattern(s).");
        assert_eq!(lines[2], "   Total patterns: 7");
    }

    #[test]
    fn test_summary_omits_update_line() {
        let report = AnalysisReport {
            created: 1,
            total_patterns: 1,
            ..AnalysisReport::new(SessionId::new("s1"))
        };
        let lines = report.summary_lines();
        assert_eq!(lines.len(), 3);
        assert!(!lines.iter().any(|l| l.contains("Updated")));
    }

    #[test]
    fn test_report_serializes() {
        let report = AnalysisReport::new(SessionId::new("s1"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["created"], 0);
    }
}
