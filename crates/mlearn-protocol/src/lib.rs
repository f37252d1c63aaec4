//! mlearn Protocol - Hook payloads in, reports out
//!
//! This crate decodes the JSON that Claude Code hooks write to stdin and
//! defines the advisory reports the `mlearn` binary prints.

pub mod message;
pub mod parse;

pub use message::AnalysisReport;
pub use parse::{parse_tool_event, ProtocolError, RawToolEvent, ToolEvent};
