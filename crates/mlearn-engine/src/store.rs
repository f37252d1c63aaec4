//! Per-session state persistence.
//!
//! Each session is one JSON file, `state_<id>.json`, in the state directory.
//! Hook processes are short-lived, so the store is a thin load/save layer
//! with no in-memory cache.
//!
//! Loading never fails: a missing file is a fresh session and a corrupt
//! one is logged and replaced by a fresh session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use mlearn_core::{SessionId, SessionState};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::fsutil::write_atomic;

const STATE_PREFIX: &str = "state_";
const STATE_SUFFIX: &str = ".json";

/// A stored session, as listed by [`SessionStore::list_sessions`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionListing {
    pub session_id: SessionId,
    pub path: PathBuf,
    pub modified: DateTime<Local>,
    pub tool_results: usize,
    pub opportunities: usize,
}

/// File-backed session state store.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Creates a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state file for a session.
    pub fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.dir
            .join(format!("{STATE_PREFIX}{}{STATE_SUFFIX}", session_id.file_stem()))
    }

    /// Loads a session, or starts a fresh one.
    pub fn load(&self, session_id: &SessionId) -> SessionState {
        let path = self.path_for(session_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(session_id = %session_id, "No stored state, starting fresh");
                return SessionState::new(session_id.clone());
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Unreadable session state, starting fresh"
                );
                return SessionState::new(session_id.clone());
            }
        };

        match serde_json::from_str::<SessionState>(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt session state, starting fresh");
                SessionState::new(session_id.clone())
            }
        }
    }

    /// Persists a session, replacing any previous state atomically.
    pub fn save(&self, state: &SessionState) -> Result<()> {
        let path = self.path_for(&state.session_id);
        let content = serde_json::to_string_pretty(state)?;
        write_atomic(&path, &content)?;
        debug!(
            session_id = %state.session_id,
            results = state.tool_history.len(),
            "Session state saved"
        );
        Ok(())
    }

    /// Deletes a session's state. Returns false if there was none.
    pub fn delete(&self, session_id: &SessionId) -> Result<bool> {
        let path = self.path_for(session_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(session_id = %session_id, "Session state deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Lists stored sessions, most recently modified first.
    ///
    /// Unreadable files are skipped with a warning.
    pub fn list_sessions(&self) -> Result<Vec<SessionListing>> {
        let mut listings = Vec::new();
        for path in self.state_files()? {
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable state file");
                    continue;
                }
            };
            let state = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str::<SessionState>(&c).map_err(|e| e.to_string()));
            match state {
                Ok(state) => listings.push(SessionListing {
                    session_id: state.session_id,
                    path,
                    modified: DateTime::<Local>::from(modified),
                    tool_results: state.tool_history.len(),
                    opportunities: state.learning_opportunities.len(),
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping corrupt state file"),
            }
        }
        listings.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(listings)
    }

    /// Removes state files last modified more than `max_age` ago.
    ///
    /// Returns the number removed. Per-file failures are logged and skipped.
    pub fn cleanup_older_than(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for path in self.state_files()? {
            let age = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(|modified| now.duration_since(modified).unwrap_or_default());
            match age {
                Ok(age) if age > max_age => match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove stale state")
                    }
                },
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to stat state file"),
            }
        }

        if removed > 0 {
            info!(removed, "Cleaned up stale session state");
        }
        Ok(removed)
    }

    /// Removes state files older than `hours` hours.
    pub fn cleanup_older_than_hours(&self, hours: u64) -> Result<usize> {
        self.cleanup_older_than(Duration::from_secs(hours.saturating_mul(3600)))
    }

    fn state_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_state_file(path))
            .collect())
    }
}

fn is_state_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with(STATE_PREFIX) && name.ends_with(STATE_SUFFIX))
}
