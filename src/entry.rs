use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{JournalError, Result};

/// Column A: submission timestamp
pub const COL_TIMESTAMP: usize = 1;
/// Column B: writer's name or identifier
pub const COL_IDENTIFIER: usize = 2;
/// Column C: the diary text as written or dictated
pub const COL_RAW_TEXT: usize = 3;
/// Column D is kept empty for compatibility with the existing sheet layout.
pub const COL_UNUSED: usize = 4;
/// Column E: keywords extracted after the `TEMAS:` marker
pub const COL_THEMES: usize = 5;
/// Column F: analytical summary; empty means "pending analysis"
pub const COL_SUMMARY: usize = 6;

/// Number of positional cells in a journal row.
pub const ROW_WIDTH: usize = COL_SUMMARY;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Marker the model is asked to put before the keyword list.
pub const THEMES_MARKER: &str = "TEMAS:";

/// Themes value written when the model response carries no marker.
pub const NO_THEMES: &str = "No detectados";

/// One diary submission, persisted as one spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: String,
    pub identifier: String,
    pub raw_text: String,
    pub themes: String,
    pub summary: String,
}

impl JournalEntry {
    /// Create a new entry stamped with the current local time.
    ///
    /// # Arguments
    /// * `identifier` - Name or identifier typed by the writer
    /// * `raw_text` - Diary text
    /// * `max_chars` - Upper bound on the text length, in characters
    ///
    /// # Errors
    /// * `JournalError::Validation` if either field is blank or the text is too long
    pub fn new(identifier: &str, raw_text: &str, max_chars: usize) -> Result<Self> {
        validate_submission(identifier, raw_text, max_chars)?;
        Ok(JournalEntry {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            identifier: identifier.trim().to_string(),
            raw_text: raw_text.to_string(),
            themes: String::new(),
            summary: String::new(),
        })
    }

    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        self.summary = analysis.summary;
        self.themes = analysis.themes;
        self
    }

    /// Positional cells `[A, B, C, D, E, F]` as appended to the sheet.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.identifier.clone(),
            self.raw_text.clone(),
            String::new(),
            self.themes.clone(),
            self.summary.clone(),
        ]
    }

    /// Rebuild an entry from a sheet row. Short rows are padded with empty cells.
    pub fn from_row(row: &[String]) -> Self {
        JournalEntry {
            timestamp: cell(row, COL_TIMESTAMP).to_string(),
            identifier: cell(row, COL_IDENTIFIER).to_string(),
            raw_text: cell(row, COL_RAW_TEXT).to_string(),
            themes: cell(row, COL_THEMES).to_string(),
            summary: cell(row, COL_SUMMARY).to_string(),
        }
    }
}

/// Check the two user-supplied fields of a submission.
pub fn validate_submission(identifier: &str, raw_text: &str, max_chars: usize) -> Result<()> {
    if identifier.trim().is_empty() || raw_text.trim().is_empty() {
        return Err(JournalError::Validation(
            "Por favor, completá tu nombre y escribe un registro antes de enviar.".to_string(),
        ));
    }
    let len = raw_text.chars().count();
    if len > max_chars {
        return Err(JournalError::Validation(format!(
            "El registro tiene {len} caracteres; el límite es {max_chars}."
        )));
    }
    Ok(())
}

/// Value of a 1-based column, or "" when the row is shorter.
pub fn cell(row: &[String], col: usize) -> &str {
    col.checked_sub(1)
        .and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

/// Where a sheet row is in its life: created, waiting for analysis, or done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No diary text; nothing to analyze.
    Empty,
    PendingAnalysis,
    Analyzed,
}

impl EntryState {
    pub fn of(row: &[String]) -> Self {
        if cell(row, COL_RAW_TEXT).is_empty() {
            EntryState::Empty
        } else if cell(row, COL_SUMMARY).is_empty() {
            EntryState::PendingAnalysis
        } else {
            EntryState::Analyzed
        }
    }
}

/// A model response split into its summary and its keyword list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub summary: String,
    pub themes: String,
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    // Tolerates "**TEMAS:**", "**TEMAS**:" and "TEMAS :". Leading asterisks
    // only count when they touch the word, so "**bold** TEMAS:" keeps its bold.
    MARKER.get_or_init(|| Regex::new(r"(?:\*\*)?TEMAS[ \t]*\**[ \t]*:[ \t]*\**").unwrap())
}

impl Analysis {
    /// Split a free-text response on the first `TEMAS:` marker.
    ///
    /// Text before the marker is the summary; text after it, up to any
    /// further marker, is the themes.
    /// Without a marker the whole response is the summary and the themes are
    /// `NO_THEMES`.
    pub fn from_response(text: &str) -> Self {
        match marker_regex().find(text) {
            Some(m) => {
                let rest = &text[m.end()..];
                let themes = match marker_regex().find(rest) {
                    Some(next) => &rest[..next.start()],
                    None => rest,
                }
                .trim();
                Analysis {
                    summary: text[..m.start()].trim().to_string(),
                    themes: if themes.is_empty() {
                        NO_THEMES.to_string()
                    } else {
                        themes.to_string()
                    },
                }
            }
            None => Analysis {
                summary: text.trim().to_string(),
                themes: NO_THEMES.to_string(),
            },
        }
    }
}

/// Convert a 1-based column number to its letter name (1 -> A, 27 -> AA).
pub fn column_letter(col: usize) -> String {
    let mut name = String::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    name
}

/// A1 name of a 1-based cell position.
pub fn cell_name(row: usize, col: usize) -> String {
    format!("{}{}", column_letter(col), row)
}
