//! mlearn Core - Retry pattern learning domain
//!
//! This crate provides the pure domain logic shared by the engine and the
//! `mlearn` binary: goal classification, failure templates, confidence
//! scoring, session state with retry detection, and the learned-pattern
//! document model. Nothing here touches the filesystem.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod confidence;
pub mod error;
pub mod goal;
pub mod hook;
pub mod pattern;
pub mod session;
pub mod template;

// Re-exports for convenience
pub use confidence::{calculate_confidence, confidence_percent, MAX_CONFIDENCE};
pub use error::{DomainError, DomainResult};
pub use goal::{compute_goal_hash, GoalHash};
pub use hook::HookEventType;
pub use pattern::{PatternDocument, PatternEntry, PatternSummary, DOCUMENT_HEADER};
pub use session::{
    truncate_chars, DetectionLimits, LearningOpportunity, SessionId, SessionState, ToolResult,
};
pub use template::{match_any, match_template, Template, TemplateMatch, TEMPLATES};
