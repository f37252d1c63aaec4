//! Session domain entities and retry-pattern detection.

use crate::confidence::calculate_confidence;
use crate::goal::GoalHash;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Unique identifier for a Claude Code session.
///
/// Usually the UUID from the hook payload or `CLAUDE_SESSION_ID`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesizes an id from a local timestamp (`YYYYmmdd_HHMMSS`).
    ///
    /// Used when the host environment does not provide one.
    pub fn from_timestamp(now: DateTime<Local>) -> Self {
        Self(now.format("%Y%m%d_%H%M%S").to_string())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a filesystem-safe form of the id.
    ///
    /// Characters outside `[A-Za-z0-9_-]` become `_`, so the mapping from id
    /// to state file name is deterministic and never escapes the state dir.
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Limits
// ============================================================================

/// Bounds applied while recording tool results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionLimits {
    /// How many recent results are consulted for retry detection
    pub history_window: usize,
    /// Maximum characters kept from operation and error text
    pub max_text_len: usize,
    /// Maximum error messages retained per opportunity
    pub max_error_messages: usize,
}

impl DetectionLimits {
    pub const DEFAULT_HISTORY_WINDOW: usize = 20;
    pub const DEFAULT_MAX_TEXT_LEN: usize = 500;
    pub const DEFAULT_MAX_ERROR_MESSAGES: usize = 5;
}

impl Default for DetectionLimits {
    fn default() -> Self {
        Self {
            history_window: Self::DEFAULT_HISTORY_WINDOW,
            max_text_len: Self::DEFAULT_MAX_TEXT_LEN,
            max_error_messages: Self::DEFAULT_MAX_ERROR_MESSAGES,
        }
    }
}

/// Truncates `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text.get(..byte_idx).unwrap_or(text).to_string(),
        None => text.to_string(),
    }
}

// ============================================================================
// Records
// ============================================================================

/// One observed tool invocation. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool (e.g., "Bash", "Read", "Write")
    pub tool: String,
    /// Command or operation text, length-capped
    pub command: String,
    pub success: bool,
    /// Error output, length-capped
    #[serde(default)]
    pub error: Option<String>,
    pub goal_hash: GoalHash,
    pub timestamp: DateTime<Utc>,
}

impl ToolResult {
    /// Builds a record, classifying the goal on the full operation text
    /// before capping stored text at `max_text_len` characters.
    pub fn new(
        tool: &str,
        operation: &str,
        success: bool,
        error: Option<&str>,
        max_text_len: usize,
    ) -> Self {
        Self {
            tool: tool.to_string(),
            command: truncate_chars(operation, max_text_len),
            success,
            error: error
                .filter(|e| !e.is_empty())
                .map(|e| truncate_chars(e, max_text_len)),
            goal_hash: GoalHash::compute(tool, operation),
            timestamp: Utc::now(),
        }
    }
}

/// A detected failure(s)-then-success sequence under one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningOpportunity {
    pub goal_hash: GoalHash,
    /// Cumulative failures preceding recoveries of this goal
    pub failures: u32,
    /// Operation text of the most recent successful attempt
    pub success_command: String,
    /// Oldest-first, capped at `DetectionLimits::max_error_messages`
    pub error_messages: Vec<String>,
    pub confidence: f64,
}

// ============================================================================
// Session Aggregate
// ============================================================================

/// Per-session tool history and detected learning opportunities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub tool_history: Vec<ToolResult>,
    #[serde(default)]
    pub learning_opportunities: Vec<LearningOpportunity>,
}

impl SessionState {
    /// Creates an empty session starting now.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            tool_history: Vec::new(),
            learning_opportunities: Vec::new(),
        }
    }

    /// Appends a tool result and, on success, checks for a retry pattern.
    ///
    /// Every failure sharing the result's goal hash among the most recent
    /// `history_window` results (including this one) counts toward the
    /// retry. An existing opportunity for the goal accumulates failures and
    /// error messages and keeps the higher confidence. Returns the created
    /// or updated opportunity.
    pub fn record(
        &mut self,
        result: ToolResult,
        limits: &DetectionLimits,
    ) -> Option<&LearningOpportunity> {
        let goal = result.goal_hash.clone();
        let success = result.success;
        let success_command = result.command.clone();
        self.tool_history.push(result);

        if !success {
            return None;
        }

        let window_start = self.tool_history.len().saturating_sub(limits.history_window);
        let window = self.tool_history.get(window_start..).unwrap_or_default();
        let earlier = window.split_last().map(|(_, rest)| rest).unwrap_or_default();

        let failures: Vec<&ToolResult> = earlier
            .iter()
            .filter(|t| t.goal_hash == goal && !t.success)
            .collect();
        if failures.is_empty() {
            return None;
        }

        let failure_count = failures.len();
        let error_messages: Vec<String> = failures
            .iter()
            .filter_map(|t| t.error.clone())
            .collect();
        let confidence = calculate_confidence(failure_count, &error_messages);

        debug!(
            goal = %goal,
            failures = failure_count,
            confidence,
            "Retry pattern detected"
        );

        let index = match self
            .learning_opportunities
            .iter()
            .position(|o| o.goal_hash == goal)
        {
            Some(index) => {
                if let Some(existing) = self.learning_opportunities.get_mut(index) {
                    existing.failures = existing
                        .failures
                        .saturating_add(u32::try_from(failure_count).unwrap_or(u32::MAX));
                    existing.success_command = success_command;
                    existing.error_messages.extend(error_messages);
                    existing.error_messages.truncate(limits.max_error_messages);
                    existing.confidence = existing.confidence.max(confidence);
                }
                index
            }
            None => {
                let mut error_messages = error_messages;
                error_messages.truncate(limits.max_error_messages);
                self.learning_opportunities.push(LearningOpportunity {
                    goal_hash: goal,
                    failures: u32::try_from(failure_count).unwrap_or(u32::MAX),
                    success_command,
                    error_messages,
                    confidence,
                });
                self.learning_opportunities.len() - 1
            }
        };

        self.learning_opportunities.get(index)
    }

    /// Learning opportunities ordered by confidence, highest first.
    ///
    /// The sort is stable: ties keep their detection order.
    pub fn opportunities_by_confidence(&self) -> Vec<&LearningOpportunity> {
        let mut sorted: Vec<&LearningOpportunity> = self.learning_opportunities.iter().collect();
        sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        sorted
    }

    /// Returns true if nothing was learned in this session.
    pub fn has_opportunities(&self) -> bool {
        !self.learning_opportunities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bash(command: &str, success: bool, error: Option<&str>) -> ToolResult {
        ToolResult::new("Bash", command, success, error, DetectionLimits::DEFAULT_MAX_TEXT_LEN)
    }

    fn fresh() -> SessionState {
        SessionState::new(SessionId::new("test-session"))
    }

    #[test]
    fn test_session_id_file_stem() {
        assert_eq!(SessionId::new("8e11bfb5-7dc2").file_stem(), "8e11bfb5-7dc2");
        assert_eq!(SessionId::new("../etc/passwd").file_stem(), "___etc_passwd");
    }

    #[test]
    fn test_session_id_from_timestamp() {
        use chrono::TimeZone;
        let when = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(SessionId::from_timestamp(when).as_str(), "20260304_050607");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_tool_result_caps_text_but_hashes_full_command() {
        let long = format!("git push {}", "x".repeat(1000));
        let result = ToolResult::new("Bash", &long, false, Some(&"e".repeat(900)), 500);
        assert_eq!(result.command.chars().count(), 500);
        assert_eq!(result.error.as_deref().map(str::len), Some(500));
        assert_eq!(result.goal_hash.as_str(), "git_push");
    }

    #[test]
    fn test_empty_error_is_dropped() {
        let result = bash("ls", false, Some(""));
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_retry_detection_two_failures() {
        let limits = DetectionLimits::default();
        let mut state = fresh();

        assert!(state.record(bash("git push", false, Some("fatal: no remote")), &limits).is_none());
        assert!(state.record(bash("git push origin", false, Some("rejected")), &limits).is_none());
        let opp = state
            .record(bash("git push -u origin main", true, None), &limits)
            .cloned()
            .expect("opportunity");

        assert_eq!(state.learning_opportunities.len(), 1);
        assert_eq!(opp.goal_hash.as_str(), "git_push");
        assert_eq!(opp.failures, 2);
        assert_eq!(opp.success_command, "git push -u origin main");
        assert_eq!(opp.error_messages, vec!["fatal: no remote", "rejected"]);
        // 0.6 for two failures, +0.1 because "fatal: no remote" matches a template
        assert!((opp.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_success_without_failure_is_not_learned() {
        let limits = DetectionLimits::default();
        let mut state = fresh();
        assert!(state.record(bash("git push", true, None), &limits).is_none());
        assert!(state.learning_opportunities.is_empty());
        assert_eq!(state.tool_history.len(), 1);
    }

    #[test]
    fn test_failures_of_other_goals_are_ignored() {
        let limits = DetectionLimits::default();
        let mut state = fresh();
        state.record(bash("npm install", false, Some("npm ERR!")), &limits);
        assert!(state.record(bash("git push", true, None), &limits).is_none());
    }

    #[test]
    fn test_recurrence_updates_single_opportunity() {
        let limits = DetectionLimits::default();
        let mut state = fresh();

        state.record(bash("git push", false, Some("first")), &limits);
        state.record(bash("git push", true, None), &limits);
        state.record(bash("git pull", false, Some("second")), &limits);
        state.record(bash("git pull", false, Some("third")), &limits);
        let opp = state.record(bash("git pull", true, None), &limits).cloned().unwrap();

        // second recovery sees all three failures still in the window: 1 + 3
        assert_eq!(state.learning_opportunities.len(), 1);
        assert_eq!(opp.failures, 4);
        assert_eq!(opp.success_command, "git pull");
        assert_eq!(opp.error_messages, vec!["first", "first", "second", "third"]);
        // max(0.5, 0.7)
        assert!((opp.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_alternating_failures_reach_promotion_confidence() {
        let limits = DetectionLimits::default();
        let mut state = fresh();
        state.record(bash("git push", false, Some("a")), &limits);
        state.record(bash("git push", true, None), &limits);
        state.record(bash("git push", false, Some("b")), &limits);
        let opp = state.record(bash("git push", true, None), &limits).cloned().unwrap();

        assert_eq!(opp.failures, 3);
        assert_eq!(opp.error_messages, vec!["a", "a", "b"]);
        assert!((opp.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_success_counts_window_failures_again() {
        let limits = DetectionLimits::default();
        let mut state = fresh();
        state.record(bash("git push", false, None), &limits);
        state.record(bash("git push", true, None), &limits);
        assert!(state.record(bash("git push", true, None), &limits).is_some());
        assert_eq!(state.learning_opportunities.len(), 1);
        assert_eq!(state.learning_opportunities.first().map(|o| o.failures), Some(2));
    }

    #[test]
    fn test_failures_outside_window_are_forgotten() {
        let limits = DetectionLimits {
            history_window: 3,
            ..DetectionLimits::default()
        };
        let mut state = fresh();
        state.record(bash("git push", false, None), &limits);
        state.record(bash("ls", true, None), &limits);
        state.record(bash("pwd", true, None), &limits);
        assert!(state.record(bash("git push", true, None), &limits).is_none());
    }

    #[test]
    fn test_error_messages_are_capped() {
        let limits = DetectionLimits::default();
        let mut state = fresh();
        for i in 0..8 {
            state.record(bash("npm install", false, Some(&format!("err {i}"))), &limits);
        }
        let opp = state.record(bash("npm install", true, None), &limits).unwrap();
        assert_eq!(opp.failures, 8);
        assert_eq!(opp.error_messages.len(), limits.max_error_messages);
        assert_eq!(opp.error_messages.first().map(String::as_str), Some("err 0"));
    }

    #[test]
    fn test_opportunities_sorted_by_confidence_stable() {
        let mut state = fresh();
        for (goal, confidence) in [("a", 0.6), ("b", 0.8), ("c", 0.6), ("d", 0.7)] {
            state.learning_opportunities.push(LearningOpportunity {
                goal_hash: GoalHash::new(goal),
                failures: 2,
                success_command: String::new(),
                error_messages: Vec::new(),
                confidence,
            });
        }
        let order: Vec<&str> = state
            .opportunities_by_confidence()
            .iter()
            .map(|o| o.goal_hash.as_str())
            .collect();
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_state_serde_round_trip() {
        let limits = DetectionLimits::default();
        let mut state = fresh();
        state.record(bash("git push", false, Some("rejected")), &limits);
        state.record(bash("git push", true, None), &limits);

        let json = serde_json::to_string(&state).unwrap();
        let restored: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }
}
