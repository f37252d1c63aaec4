//! Learning configuration.
//!
//! Loaded from TOML (`$MLEARN_CONFIG`, else `~/.mason/learning/config.toml`).
//! Every field has a default, so a missing or partial file is fine. An
//! invalid file is reported as a warning and defaults are used.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mlearn_core::DetectionLimits;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MLEARN_CONFIG";
/// Environment variable overriding the session state directory.
pub const STATE_DIR_ENV: &str = "MLEARN_STATE_DIR";
/// Environment variable overriding the pattern repository path.
pub const PATTERNS_FILE_ENV: &str = "MLEARN_PATTERNS_FILE";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Returns `~/.mason/learning`, the default per-user state directory.
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mason").join("learning"))
}

/// Tunables for tracking and analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Where per-session state files live
    pub state_dir: Option<PathBuf>,
    /// Explicit pattern repository; discovered from the working dir if unset
    pub patterns_file: Option<PathBuf>,
    /// Recent results consulted for retry detection
    pub history_window: usize,
    /// Character cap on stored command and error text
    pub max_text_len: usize,
    /// Error messages kept per learning opportunity
    pub max_error_messages: usize,
    /// Opportunities below this confidence are not promoted
    pub min_confidence: f64,
    /// Maximum lessons promoted per analyzed session
    pub max_patterns_per_session: usize,
    /// Session state files older than this are purged
    pub cleanup_max_age_hours: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            patterns_file: None,
            history_window: DetectionLimits::DEFAULT_HISTORY_WINDOW,
            max_text_len: DetectionLimits::DEFAULT_MAX_TEXT_LEN,
            max_error_messages: DetectionLimits::DEFAULT_MAX_ERROR_MESSAGES,
            min_confidence: 0.6,
            max_patterns_per_session: 5,
            cleanup_max_age_hours: 24,
        }
    }
}

impl LearningConfig {
    /// Loads configuration for a hook invocation. Never fails.
    ///
    /// Reads the config file, then applies `MLEARN_STATE_DIR` and
    /// `MLEARN_PATTERNS_FILE` overrides.
    pub fn load() -> Self {
        let path = env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| default_state_dir().map(|dir| dir.join(CONFIG_FILE_NAME)));

        let config = match path {
            Some(path) => Self::from_file(&path).unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring invalid config, using defaults");
                Self::default()
            }),
            None => Self::default(),
        };

        config.with_overrides(
            env::var_os(STATE_DIR_ENV).map(PathBuf::from),
            env::var_os(PATTERNS_FILE_ENV).map(PathBuf::from),
        )
    }

    /// Reads a TOML config file. A missing file yields defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        toml::from_str(&content).map_err(|source| StoreError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies explicit location overrides.
    #[must_use]
    pub fn with_overrides(
        mut self,
        state_dir: Option<PathBuf>,
        patterns_file: Option<PathBuf>,
    ) -> Self {
        if let Some(dir) = state_dir.filter(|p| !p.as_os_str().is_empty()) {
            self.state_dir = Some(dir);
        }
        if let Some(file) = patterns_file.filter(|p| !p.as_os_str().is_empty()) {
            self.patterns_file = Some(file);
        }
        self
    }

    /// Resolves the session state directory.
    pub fn resolved_state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_state_dir().ok_or(StoreError::NoHomeDir),
        }
    }

    /// Limits used while recording tool results.
    pub fn detection_limits(&self) -> DetectionLimits {
        DetectionLimits {
            history_window: self.history_window.max(1),
            max_text_len: self.max_text_len,
            max_error_messages: self.max_error_messages,
        }
    }
}
