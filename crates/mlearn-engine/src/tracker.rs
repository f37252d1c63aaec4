//! Recording tool events into session state.
//!
//! One call per hook invocation: load the session, append the result,
//! detect a retry pattern, save.

use mlearn_core::{DetectionLimits, GoalHash, LearningOpportunity, SessionId, ToolResult};
use mlearn_protocol::{parse_tool_event, ToolEvent};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::SessionStore;

/// What a single tracked event produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackOutcome {
    pub session_id: SessionId,
    pub goal_hash: GoalHash,
    /// The opportunity created or updated by this event, if it was a recovery
    pub opportunity: Option<LearningOpportunity>,
}

/// Appends tool results to per-session state.
#[derive(Debug, Clone)]
pub struct EventTracker {
    store: SessionStore,
    limits: DetectionLimits,
}

impl EventTracker {
    pub fn new(store: SessionStore, limits: DetectionLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Records one normalized event under `session_id`.
    pub fn track(&self, session_id: &SessionId, event: &ToolEvent) -> Result<TrackOutcome> {
        let mut state = self.store.load(session_id);

        let result = ToolResult::new(
            &event.tool,
            &event.operation,
            event.success,
            event.error.as_deref(),
            self.limits.max_text_len,
        );
        let goal_hash = result.goal_hash.clone();

        let opportunity = state.record(result, &self.limits).cloned();
        if let Some(opp) = &opportunity {
            info!(
                session_id = %session_id,
                goal = %opp.goal_hash,
                failures = opp.failures,
                confidence = opp.confidence,
                "Learning opportunity recorded"
            );
        }

        self.store.save(&state)?;

        Ok(TrackOutcome {
            session_id: session_id.clone(),
            goal_hash,
            opportunity,
        })
    }

    /// Parses a raw hook payload and records it.
    ///
    /// The payload's own session id wins over `fallback`. Empty, malformed
    /// or non-tool payloads are nothing to track and yield `Ok(None)`.
    pub fn track_payload(
        &self,
        fallback: &SessionId,
        payload: &str,
    ) -> Result<Option<TrackOutcome>> {
        let event = match parse_tool_event(payload) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("Payload carries no tool event, nothing to track");
                return Ok(None);
            }
            Err(e) => {
                debug!(error = %e, "Ignoring malformed payload");
                return Ok(None);
            }
        };

        let session_id = event.session_id.clone().unwrap_or_else(|| fallback.clone());
        self.track(&session_id, &event).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (tempfile::TempDir, EventTracker) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = EventTracker::new(SessionStore::new(dir.path()), DetectionLimits::default());
        (dir, tracker)
    }

    fn event(operation: &str, success: bool, error: Option<&str>) -> ToolEvent {
        ToolEvent {
            session_id: None,
            tool: "Bash".to_string(),
            operation: operation.to_string(),
            success,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_track_persists_between_calls() {
        let (_dir, tracker) = tracker();
        let id = SessionId::new("s1");

        let first = tracker.track(&id, &event("npm install", false, Some("EACCES"))).unwrap();
        assert_eq!(first.goal_hash.as_str(), "npm_install");
        assert!(first.opportunity.is_none());

        let second = tracker.track(&id, &event("npm install", true, None)).unwrap();
        let opp = second.opportunity.expect("recovery detected");
        assert_eq!(opp.failures, 1);

        let state = tracker.store().load(&id);
        assert_eq!(state.tool_history.len(), 2);
        assert_eq!(state.learning_opportunities.len(), 1);
    }

    #[test]
    fn test_payload_session_id_wins() {
        let (_dir, tracker) = tracker();
        let payload = r#"{"session_id": "from-payload", "tool": "Bash", "command": "ls"}"#;
        let outcome = tracker
            .track_payload(&SessionId::new("fallback"), payload)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.session_id, SessionId::new("from-payload"));
        assert!(tracker.store().path_for(&outcome.session_id).exists());
    }

    #[test]
    fn test_malformed_payload_is_ignored() {
        let (dir, tracker) = tracker();
        let fallback = SessionId::new("s1");
        assert!(tracker.track_payload(&fallback, "{ nope").unwrap().is_none());
        assert!(tracker.track_payload(&fallback, "").unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
