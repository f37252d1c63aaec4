//! The durable, human-readable pattern repository.
//!
//! Backed by one Markdown file (see [`mlearn_core::PatternDocument`]). Every
//! mutation reads the whole document, changes one entry and writes the whole
//! document back atomically. Entries it does not change keep their text.
//!
//! Concurrent writers are not coordinated: analysis runs once per session
//! end, and two sessions finishing at the same instant may lose one update.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mlearn_core::{PatternDocument, PatternEntry, PatternSummary};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::fsutil::write_atomic;

/// Pattern repository at a fixed file path.
#[derive(Debug, Clone)]
pub struct PatternRepository {
    path: PathBuf,
}

impl PatternRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file with the standard header if it does not exist.
    ///
    /// Returns true if the file was created.
    pub fn ensure_exists(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        write_atomic(&self.path, &PatternDocument::empty().render())?;
        info!(path = %self.path.display(), "Created pattern repository");
        Ok(true)
    }

    /// Reads and parses the document. A missing or blank file is empty.
    pub fn load(&self) -> Result<PatternDocument> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(PatternDocument::empty()),
            Ok(text) => Ok(PatternDocument::parse(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PatternDocument::empty()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn store(&self, document: &PatternDocument) -> Result<()> {
        write_atomic(&self.path, &document.render())
    }

    /// True if an entry with this category and title already exists.
    pub fn is_duplicate(&self, category: &str, title: &str) -> Result<bool> {
        Ok(self.load()?.contains(category, title))
    }

    /// Appends a new entry.
    ///
    /// Does not check for duplicates; callers try
    /// [`Self::update_trigger_count`] first.
    pub fn write_pattern(&self, entry: PatternEntry) -> Result<()> {
        let mut document = self.load()?;
        debug!(pattern = %entry.key(), "Writing new pattern");
        document.push(entry);
        self.store(&document)
    }

    /// Bumps an existing entry's trigger count by one.
    ///
    /// Returns false, leaving the file untouched, if no such entry exists.
    pub fn update_trigger_count(&self, category: &str, title: &str) -> Result<bool> {
        let mut document = self.load()?;
        match document.increment_triggers(category, title) {
            Some(count) => {
                debug!(category, title, count, "Pattern trigger count updated");
                self.store(&document)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of entries in the repository.
    pub fn count(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn summary(&self) -> Result<PatternSummary> {
        Ok(self.load()?.summary())
    }

    /// Resets the file to just the standard header.
    pub fn clear(&self) -> Result<()> {
        self.store(&PatternDocument::empty())?;
        info!(path = %self.path.display(), "Pattern repository cleared");
        Ok(())
    }
}
