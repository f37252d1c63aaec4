//! Parsing Claude Code hook payloads.
//!
//! Two payload shapes are accepted on stdin:
//!
//! - the flat form `{tool, command, input, result, error, success}`
//! - the native hook form `{session_id, hook_event_name, tool_name,
//!   tool_input, tool_response}`
//!
//! Both normalize into a [`ToolEvent`].

use mlearn_core::{truncate_chars, HookEventType, SessionId};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Characters of result text used as the operation when nothing better exists.
const RESULT_FALLBACK_LEN: usize = 100;

/// `tool_input` keys that identify what a tool operated on, by priority.
const OPERATION_KEYS: &[&str] = &[
    "command",
    "file_path",
    "notebook_path",
    "path",
    "pattern",
    "url",
    "query",
];

/// Errors while decoding a hook payload.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload was not valid JSON for a tool event
    #[error("Invalid hook payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Raw hook payload. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawToolEvent {
    // === Native hook fields ===
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,

    // === Flat form ===
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub success: Option<bool>,
}

/// A normalized tool outcome ready for tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEvent {
    /// Session id carried by the payload, if any
    pub session_id: Option<SessionId>,
    pub tool: String,
    /// Command for shell tools, path for file tools, etc.
    pub operation: String,
    pub success: bool,
    pub error: Option<String>,
}

impl RawToolEvent {
    /// Parses the hook event type.
    pub fn event_type(&self) -> Option<HookEventType> {
        self.hook_event_name
            .as_deref()
            .and_then(HookEventType::from_event_name)
    }

    /// Returns the session ID, if the payload carries a non-empty one.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SessionId::new)
    }

    /// Normalizes into a [`ToolEvent`].
    ///
    /// Returns `None` for payloads that are not tool outcomes, such as a
    /// `Stop` event routed to the tracker by mistake.
    pub fn into_tool_event(self) -> Option<ToolEvent> {
        let event_type = self.event_type();
        if self.hook_event_name.is_some() && !event_type.is_some_and(|t| t.is_tool_event()) {
            return None;
        }

        let session_id = self.session_id();
        let tool = non_empty(self.tool.as_deref())
            .or_else(|| non_empty(self.tool_name.as_deref()))
            .unwrap_or("Unknown")
            .to_string();

        let response = self.result.as_ref().or(self.tool_response.as_ref());
        let operation = self.operation(response);

        let reported_failure = event_type.is_some_and(|t| t.is_failure())
            || self.tool_response.as_ref().is_some_and(response_indicates_failure);
        let success = self.success.unwrap_or(!reported_failure);

        let error = self
            .error
            .as_ref()
            .and_then(value_text)
            .or_else(|| {
                if success {
                    None
                } else {
                    self.tool_response.as_ref().and_then(response_error_text)
                }
            });

        Some(ToolEvent {
            session_id,
            tool,
            operation,
            success,
            error,
        })
    }

    fn operation(&self, response: Option<&Value>) -> String {
        if let Some(command) = non_empty(self.command.as_deref()) {
            return command.to_string();
        }
        if let Some(input) = self.input.as_ref().and_then(Value::as_str) {
            if !input.is_empty() {
                return input.to_string();
            }
        }
        let structured = self
            .tool_input
            .as_ref()
            .or(self.input.as_ref())
            .and_then(operation_from_input);
        if let Some(operation) = structured {
            return operation;
        }
        response
            .and_then(value_text)
            .map(|text| truncate_chars(&text, RESULT_FALLBACK_LEN))
            .unwrap_or_default()
    }
}

/// Parses a stdin payload into a tool event.
///
/// Empty input is `Ok(None)`: there is nothing to track.
pub fn parse_tool_event(input: &str) -> Result<Option<ToolEvent>, ProtocolError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    let raw: RawToolEvent = serde_json::from_str(input)?;
    Ok(raw.into_tool_event())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Text form of a JSON value: strings verbatim, objects as compact JSON.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn operation_from_input(input: &Value) -> Option<String> {
    let object = input.as_object()?;
    OPERATION_KEYS.iter().find_map(|key| {
        object
            .get(*key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn response_indicates_failure(response: &Value) -> bool {
    let Some(object) = response.as_object() else {
        return false;
    };
    let flag = |key: &str| object.get(key).and_then(Value::as_bool);
    let exit_code = ["exit_code", "exitCode"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_i64));

    flag("is_error") == Some(true)
        || flag("success") == Some(false)
        || exit_code.is_some_and(|code| code != 0)
}

fn response_error_text(response: &Value) -> Option<String> {
    match response {
        Value::Object(object) => ["stderr", "error", "message"]
            .iter()
            .find_map(|key| object.get(*key).and_then(value_text)),
        other => value_text(other),
    }
}
