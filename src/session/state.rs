//! Per-session state

use chrono::{DateTime, Utc};

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
    /// The answer is an error string rather than a model reply
    pub is_error: bool,
    pub asked_at: DateTime<Utc>,
}

/// Everything one user session has produced so far
#[derive(Debug, Clone)]
pub struct SessionState {
    id: String,
    created_at: DateTime<Utc>,
    pub(crate) document_text: String,
    pub(crate) filled_text: String,
    pub(crate) filled_is_error: bool,
    pub(crate) last_extraction_error: Option<String>,
    history: Vec<QaEntry>,
}

impl SessionState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            document_text: String::new(),
            filled_text: String::new(),
            filled_is_error: false,
            last_extraction_error: None,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// OCR output for the uploaded document (empty until a successful upload)
    pub fn document_text(&self) -> &str {
        &self.document_text
    }

    /// Latest fill result, which may be an error string
    pub fn filled_text(&self) -> &str {
        &self.filled_text
    }

    /// The filled text is an error string rather than a model reply
    pub fn filled_is_error(&self) -> bool {
        self.filled_is_error
    }

    /// Error reported by the most recent failed extraction, if any
    pub fn last_extraction_error(&self) -> Option<&str> {
        self.last_extraction_error.as_deref()
    }

    pub fn has_document(&self) -> bool {
        !self.document_text.is_empty()
    }

    pub fn is_filled(&self) -> bool {
        !self.filled_text.is_empty()
    }

    /// Q&A entries in the order they were asked
    pub fn history(&self) -> &[QaEntry] {
        &self.history
    }

    /// Q&A entries most recent first, for display
    pub fn history_newest_first(&self) -> impl Iterator<Item = &QaEntry> {
        self.history.iter().rev()
    }

    pub(crate) fn push_answer(&mut self, entry: QaEntry) -> &QaEntry {
        self.history.push(entry);
        &self.history[self.history.len() - 1]
    }
}
