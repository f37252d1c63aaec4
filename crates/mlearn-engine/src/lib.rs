//! mlearn Engine - Session tracking, pattern repository and analysis
//!
//! This crate provides the stateful side of mlearn:
//! - `store` - Per-session JSON state files
//! - `repository` - The shared Markdown pattern repository
//! - `tracker` - Recording tool events and detecting retries
//! - `analyzer` - Promoting opportunities to lessons at session end
//! - `config` - TOML configuration with environment overrides
//!
//! # Architecture
//!
//! ```text
//!  PostToolUse hook                         Stop hook
//!        │                                      │
//!        ▼                                      ▼
//! ┌──────────────┐  state_<id>.json   ┌─────────────────┐
//! │ EventTracker │───────────────────▶│ SessionAnalyzer │
//! └──────┬───────┘                    └────────┬────────┘
//!        │                                     │
//!        ▼                                     ▼
//! ┌──────────────┐                    ┌───────────────────┐
//! │ SessionStore │                    │ PatternRepository │
//! └──────────────┘                    │ learned-patterns  │
//!                                     └───────────────────┘
//! ```
//!
//! Each hook invocation is its own short-lived process: load, mutate, save.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Corrupt or missing state degrades to an empty session

pub mod analyzer;
pub mod config;
pub mod discovery;
pub mod error;
mod fsutil;
pub mod repository;
pub mod store;
pub mod tracker;

use std::path::Path;

pub use analyzer::{resolve_lesson, AnalyzerSettings, ResolvedLesson, SessionAnalyzer};
pub use config::{default_state_dir, LearningConfig};
pub use discovery::{discover_patterns_file, PATTERNS_FILE_NAME};
pub use error::{Result, StoreError};
pub use repository::PatternRepository;
pub use store::{SessionListing, SessionStore};
pub use tracker::{EventTracker, TrackOutcome};

/// All engine components, wired from one configuration.
#[derive(Debug, Clone)]
pub struct Learner {
    pub tracker: EventTracker,
    pub analyzer: SessionAnalyzer,
    pub store: SessionStore,
    pub repository: PatternRepository,
}

impl Learner {
    /// Builds the components for a hook running in `cwd`.
    ///
    /// The pattern file is the configured one, else discovered upward
    /// from `cwd`.
    pub fn from_config(config: &LearningConfig, cwd: &Path) -> Result<Self> {
        let store = SessionStore::new(config.resolved_state_dir()?);
        let patterns_file = config
            .patterns_file
            .clone()
            .unwrap_or_else(|| discover_patterns_file(cwd));
        let repository = PatternRepository::new(patterns_file);

        Ok(Self {
            tracker: EventTracker::new(store.clone(), config.detection_limits()),
            analyzer: SessionAnalyzer::new(
                store.clone(),
                repository.clone(),
                AnalyzerSettings::from(config),
            ),
            store,
            repository,
        })
    }
}
