//! Hook event types from Claude Code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hook events mlearn subscribes to.
///
/// Tool events feed the tracker, stop events trigger session analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HookEventType {
    /// After a tool completes execution
    PostToolUse,

    /// After a tool invocation failed
    PostToolUseFailure,

    /// Claude finished responding
    Stop,
}

impl HookEventType {
    /// Returns true if this event carries a tool outcome.
    pub fn is_tool_event(&self) -> bool {
        matches!(self, Self::PostToolUse | Self::PostToolUseFailure)
    }

    /// Returns true if the event itself reports a failed tool call.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PostToolUseFailure)
    }

    /// Parses from a hook event name string.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "PostToolUse" => Some(Self::PostToolUse),
            "PostToolUseFailure" => Some(Self::PostToolUseFailure),
            "Stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for HookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostToolUse => write!(f, "PostToolUse"),
            Self::PostToolUseFailure => write!(f, "PostToolUseFailure"),
            Self::Stop => write!(f, "Stop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_event_parsing() {
        assert_eq!(
            HookEventType::from_event_name("PostToolUseFailure"),
            Some(HookEventType::PostToolUseFailure)
        );
        assert_eq!(HookEventType::from_event_name("PreToolUse"), None);
        assert_eq!(HookEventType::from_event_name("SessionEnd"), None);
    }

    #[test]
    fn test_hook_event_classification() {
        assert!(HookEventType::PostToolUse.is_tool_event());
        assert!(!HookEventType::Stop.is_tool_event());
        assert!(HookEventType::PostToolUseFailure.is_failure());
        assert!(!HookEventType::PostToolUse.is_failure());
    }

    #[test]
    fn test_hook_event_display_round_trips_name() {
        for event in [
            HookEventType::PostToolUse,
            HookEventType::PostToolUseFailure,
            HookEventType::Stop,
        ] {
            assert_eq!(HookEventType::from_event_name(&event.to_string()), Some(event));
        }
    }
}
