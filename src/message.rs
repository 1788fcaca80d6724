//! Commit message types, extraction, validation and styling.

pub mod extract;
pub mod style;
pub mod validate;
pub mod vocabulary;

use serde::Serialize;

pub use extract::{extract_commit_message, parse_title_body};
pub use style::{apply_style, StyleOptions};
pub use validate::{TypeCheck, ValidationError, Validator, MAX_TITLE_LENGTH};
pub use vocabulary::TypeVocabulary;

/// Final output of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    /// Single-line conventional commit title.
    pub message: String,
    /// Detailed-mode body, if any.
    pub body: Option<String>,
}

impl CommitResult {
    /// Creates a result from a title and optional body.
    pub fn new(message: impl Into<String>, body: Option<String>) -> Self {
        Self {
            message: message.into(),
            body,
        }
    }

    /// Renders the full commit message: title, blank line, body.
    pub fn format(&self) -> String {
        match self.body.as_deref() {
            Some(body) if !body.trim().is_empty() => format!("{}\n\n{}", self.message, body),
            _ => self.message.clone(),
        }
    }

    /// Applies `style` to the title.
    pub fn styled(mut self, style: &StyleOptions) -> Self {
        if !style.is_plain() {
            self.message = apply_style(&self.message, style);
        }
        self
    }
}
