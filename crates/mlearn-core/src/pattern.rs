//! Learned pattern entries and their Markdown document form.
//!
//! The pattern repository is a human-readable Markdown file that doubles as
//! agent-facing documentation, and people edit it by hand. Parsing keeps the
//! source lines of every entry; an entry that is never changed renders back
//! exactly as it was read, and a trigger update rewrites only that field:
//!
//! ```text
//! ### Git: Verify Remote Before Push
//!
//! **Confidence**: 70% | **Triggers**: 3 | **Retries**: 2 | **Learned**: 2026-01-15
//!
//! Before running `git push`, verify the remote ...
//!
//! ---
//! ```

use crate::confidence::confidence_percent;
use crate::error::{DomainError, DomainResult};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Header written to a fresh (or cleared) pattern document.
pub const DOCUMENT_HEADER: &str = "# Learned Patterns

Automatically extracted from observed retry patterns. Updated after each session.

These patterns help Claude avoid common mistakes by learning from previous errors.

---
";

const HEADING_PREFIX: &str = "### ";
const ENTRY_SEPARATOR: &str = "---";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Pattern Entry
// ============================================================================

/// One durable lesson. `(category, title)` is unique within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub category: String,
    pub title: String,
    pub lesson: String,
    pub confidence_pct: u8,
    /// Times this lesson's pattern has been observed, never decreases
    pub trigger_count: u32,
    /// Failures behind the retry that first produced this lesson
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    pub learned: NaiveDate,
}

impl PatternEntry {
    /// Creates a first-occurrence entry learned today.
    pub fn new(
        category: impl Into<String>,
        title: impl Into<String>,
        lesson: impl Into<String>,
        confidence: f64,
        retries: u32,
    ) -> Self {
        Self {
            category: category.into(),
            title: title.into(),
            lesson: lesson.into(),
            confidence_pct: confidence_percent(confidence),
            trigger_count: 1,
            retries: Some(retries),
            learned: Local::now().date_naive(),
        }
    }

    /// Returns the `Category: Title` identifier.
    pub fn key(&self) -> String {
        format!("{}: {}", self.category, self.title)
    }

    pub fn matches(&self, category: &str, title: &str) -> bool {
        self.category == category && self.title == title
    }

    /// Renders the metadata line.
    pub fn metadata_line(&self) -> String {
        let mut line = format!(
            "**Confidence**: {}% | **Triggers**: {}",
            self.confidence_pct, self.trigger_count
        );
        if let Some(retries) = self.retries {
            line.push_str(&format!(" | **Retries**: {retries}"));
        }
        line.push_str(&format!(" | **Learned**: {}", self.learned.format(DATE_FORMAT)));
        line
    }

    /// Renders this entry as a Markdown block.
    pub fn render(&self) -> String {
        format!(
            "\n{HEADING_PREFIX}{}\n\n{}\n\n{}\n\n{ENTRY_SEPARATOR}\n",
            self.key(),
            self.metadata_line(),
            self.lesson.trim()
        )
    }
}

/// Fields read from a metadata line. Each one is read on its own, so one
/// unreadable field does not discard the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Metadata {
    confidence_pct: Option<u8>,
    trigger_count: Option<u32>,
    retries: Option<u32>,
    learned: Option<NaiveDate>,
}

fn parse_metadata(line: &str) -> Metadata {
    let mut metadata = Metadata::default();

    for part in line.trim().split('|') {
        let Some((key, value)) = part.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().trim_matches('*') {
            "Confidence" => metadata.confidence_pct = readable(parse_percent(value)),
            "Triggers" => metadata.trigger_count = readable(parse_number("triggers", value)),
            "Retries" => metadata.retries = readable(parse_number("retries", value)),
            "Learned" => {
                metadata.learned = readable(
                    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
                        DomainError::ParseError {
                            field: "learned".to_string(),
                            reason: e.to_string(),
                        }
                    }),
                )
            }
            _ => {}
        }
    }

    metadata
}

fn readable<T>(result: DomainResult<T>) -> Option<T> {
    result
        .map_err(|e| warn!(error = %e, "Ignoring unreadable metadata field"))
        .ok()
}

fn is_metadata_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("**Confidence**") || trimmed.contains("**Triggers**")
}

/// Accepts `70%` as well as hand-written fractions like `70.5%`.
fn parse_percent(value: &str) -> DomainResult<u8> {
    let pct = value.trim_end_matches('%').trim();
    pct.parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .map(|p| confidence_percent(p / 100.0))
        .ok_or_else(|| DomainError::InvalidFieldValue {
            field: "confidence".to_string(),
            value: value.to_string(),
            expected: "percentage".to_string(),
        })
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> DomainResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| DomainError::InvalidFieldValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "non-negative integer".to_string(),
        })
}

/// Rewrites the `Triggers` field of a metadata line, leaving the rest as is.
fn with_trigger_count(line: &str, count: u32) -> String {
    let mut found = false;
    let mut parts = Vec::new();

    for part in line.split('|') {
        let is_triggers = part
            .split_once(':')
            .is_some_and(|(key, _)| key.trim().trim_matches('*') == "Triggers");
        if !is_triggers || found {
            parts.push(part.to_string());
            continue;
        }
        found = true;
        let lead = part
            .get(..part.len() - part.trim_start().len())
            .unwrap_or_default();
        let trail = part.get(part.trim_end().len()..).unwrap_or_default();
        parts.push(format!("{lead}**Triggers**: {count}{trail}"));
    }

    if found {
        parts.join("|")
    } else {
        format!("{} | **Triggers**: {count}", line.trim_end())
    }
}

/// Splits `Category: Title`. The category cannot contain a colon.
fn split_heading(heading: &str) -> Option<(&str, &str)> {
    let (category, title) = heading.split_once(": ")?;
    let (category, title) = (category.trim(), title.trim());
    if category.is_empty() || category.contains(':') || title.is_empty() {
        return None;
    }
    Some((category, title))
}

// ============================================================================
// Pattern Document
// ============================================================================

/// The lines an entry was parsed from: its heading through the line before
/// the next heading, including any hand-written text after the separator.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EntrySource {
    lines: Vec<String>,
    metadata_index: Option<usize>,
}

impl EntrySource {
    fn set_trigger_count(&mut self, count: u32, metadata_line: String) {
        match self.metadata_index.and_then(|i| self.lines.get_mut(i)) {
            Some(line) => *line = with_trigger_count(line, count),
            None => {
                let at = self.lines.len().min(1);
                self.lines.insert(at, metadata_line);
                self.lines.insert(at, String::new());
                self.metadata_index = Some(at + 1);
            }
        }
    }
}

/// A parsed pattern document: free-form preamble plus ordered entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDocument {
    preamble: Vec<String>,
    entries: Vec<PatternEntry>,
    /// Parallel to `entries`; `None` for entries added since parsing
    sources: Vec<Option<EntrySource>>,
}

struct EntryDraft {
    category: String,
    title: String,
    lines: Vec<String>,
}

impl EntryDraft {
    fn finish(self) -> (PatternEntry, EntrySource) {
        let metadata_index = self
            .lines
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, line)| !line.trim().is_empty())
            .filter(|(_, line)| is_metadata_line(line))
            .map(|(i, _)| i);

        let metadata = match metadata_index.and_then(|i| self.lines.get(i)) {
            Some(line) => parse_metadata(line),
            None => Metadata::default(),
        };
        let trigger_count = metadata.trigger_count.unwrap_or_else(|| {
            let error = DomainError::MalformedEntry {
                heading: format!("{}: {}", self.category, self.title),
                reason: "no readable trigger count".to_string(),
            };
            warn!(error = %error, "Counting pattern entry as triggered once");
            1
        });

        let lesson = self
            .lines
            .iter()
            .skip(metadata_index.map_or(1, |i| i + 1))
            .map(String::as_str)
            .take_while(|line| line.trim() != ENTRY_SEPARATOR)
            .collect::<Vec<_>>()
            .join("\n");

        let entry = PatternEntry {
            category: self.category,
            title: self.title,
            lesson: lesson.trim().to_string(),
            confidence_pct: metadata.confidence_pct.unwrap_or(0),
            trigger_count,
            retries: metadata.retries,
            learned: metadata.learned.unwrap_or_else(|| Local::now().date_naive()),
        };
        let source = EntrySource {
            lines: self.lines,
            metadata_index,
        };
        (entry, source)
    }
}

fn push_lines(out: &mut String, lines: &[String]) {
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
}

impl PatternDocument {
    /// Creates a document holding only the standard header.
    pub fn empty() -> Self {
        Self {
            preamble: DOCUMENT_HEADER.lines().map(str::to_string).collect(),
            entries: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Parses document text.
    ///
    /// Everything before the first `### Category: Title` heading is the
    /// preamble. Each entry runs to the next heading, so text written
    /// between entries stays with the entry above it.
    pub fn parse(text: &str) -> Self {
        let mut document = Self {
            preamble: Vec::new(),
            entries: Vec::new(),
            sources: Vec::new(),
        };
        let mut draft: Option<EntryDraft> = None;

        for line in text.lines() {
            if let Some((category, title)) =
                line.strip_prefix(HEADING_PREFIX).and_then(split_heading)
            {
                if let Some(done) = draft.take() {
                    document.push_parsed(done);
                }
                draft = Some(EntryDraft {
                    category: category.to_string(),
                    title: title.to_string(),
                    lines: vec![line.to_string()],
                });
            } else if let Some(current) = draft.as_mut() {
                current.lines.push(line.to_string());
            } else {
                document.preamble.push(line.to_string());
            }
        }

        if let Some(done) = draft.take() {
            document.push_parsed(done);
        }
        document
    }

    fn push_parsed(&mut self, draft: EntryDraft) {
        let (entry, source) = draft.finish();
        self.entries.push(entry);
        self.sources.push(Some(source));
    }

    /// Renders the whole document.
    pub fn render(&self) -> String {
        let mut out = String::new();
        push_lines(&mut out, &self.preamble);
        for (entry, source) in self.entries.iter().zip(&self.sources) {
            match source {
                Some(source) => push_lines(&mut out, &source.lines),
                None => out.push_str(&entry.render()),
            }
        }
        out
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, category: &str, title: &str) -> bool {
        self.find(category, title).is_some()
    }

    pub fn find(&self, category: &str, title: &str) -> Option<&PatternEntry> {
        self.entries.iter().find(|e| e.matches(category, title))
    }

    /// Appends an entry at the end of the document.
    ///
    /// Does not check for duplicates; callers check [`Self::contains`] first.
    pub fn push(&mut self, entry: PatternEntry) {
        self.entries.push(entry);
        self.sources.push(None);
    }

    /// Increments the trigger count of one entry by exactly one.
    ///
    /// Only that entry's `Triggers` field changes in the rendered text.
    /// Returns the new count, or `None` if no such entry exists.
    pub fn increment_triggers(&mut self, category: &str, title: &str) -> Option<u32> {
        let index = self.entries.iter().position(|e| e.matches(category, title))?;
        let entry = self.entries.get_mut(index)?;
        entry.trigger_count = entry.trigger_count.saturating_add(1);
        let count = entry.trigger_count;

        if let Some(Some(source)) = self.sources.get_mut(index) {
            source.set_trigger_count(count, entry.metadata_line());
        }
        Some(count)
    }

    /// Counts by category, plus the `Category: Title` list.
    pub fn summary(&self) -> PatternSummary {
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &self.entries {
            *by_category.entry(entry.category.clone()).or_default() += 1;
        }
        PatternSummary {
            total: self.entries.len(),
            by_category,
            entries: self.entries.iter().map(PatternEntry::key).collect(),
        }
    }
}

impl Default for PatternDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// Overview of a pattern document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    /// `Category: Title` identifiers in document order
    pub entries: Vec<String>,
}
