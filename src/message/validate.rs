//! Structural validation of conventional commit titles.

use thiserror::Error;
use tracing::debug;

use super::vocabulary::TypeVocabulary;

/// Titles must be strictly shorter than this many characters.
pub const MAX_TITLE_LENGTH: usize = 72;

/// Reasons a candidate title is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is too long.
    #[error("commit title is {length} characters; it must be shorter than {MAX_TITLE_LENGTH}")]
    TooLong {
        /// Character count of the rejected title.
        length: usize,
    },

    /// No `:` between type and description.
    #[error("commit title has no `type: description` separator")]
    MissingSeparator,

    /// Nothing before the separator.
    #[error("commit type is empty")]
    EmptyType,

    /// Type is not a single word.
    #[error("commit type `{0}` is not a single word")]
    MalformedType(String),

    /// Nothing after the separator.
    #[error("commit description is empty")]
    EmptyDescription,

    /// Type outside the vocabulary (strict mode only).
    #[error("commit type `{0}` is not in the type vocabulary")]
    UnknownType(String),
}

/// How types outside the vocabulary are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeCheck {
    /// Accept unknown types when the rest of the structure is well-formed.
    #[default]
    Permissive,
    /// Reject unknown types.
    Strict,
}

/// Validates candidate titles against a type vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    vocabulary: &'a TypeVocabulary,
    type_check: TypeCheck,
}

impl<'a> Validator<'a> {
    /// Creates a validator over `vocabulary`.
    pub fn new(vocabulary: &'a TypeVocabulary, type_check: TypeCheck) -> Self {
        Self {
            vocabulary,
            type_check,
        }
    }

    /// Checks `title` for conventional commit shape.
    pub fn validate(&self, title: &str) -> Result<(), ValidationError> {
        let length = title.chars().count();
        if length >= MAX_TITLE_LENGTH {
            return Err(ValidationError::TooLong { length });
        }

        let (head, description) = title
            .split_once(':')
            .ok_or(ValidationError::MissingSeparator)?;

        if head.trim().is_empty() {
            return Err(ValidationError::EmptyType);
        }
        if description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription);
        }

        let commit_type = commit_type(head);
        if commit_type.is_empty() {
            return Err(ValidationError::EmptyType);
        }
        if !commit_type
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::MalformedType(commit_type.to_string()));
        }

        if !self.vocabulary.contains(commit_type) {
            match self.type_check {
                TypeCheck::Strict => {
                    return Err(ValidationError::UnknownType(commit_type.to_string()));
                }
                TypeCheck::Permissive => {
                    debug!(commit_type, "Accepting commit type outside the vocabulary");
                }
            }
        }

        Ok(())
    }

    /// Returns true if `title` passes [`validate`](Self::validate).
    pub fn is_valid(&self, title: &str) -> bool {
        self.validate(title).is_ok()
    }
}

/// Extracts the bare type from a title head such as `feat(api)!`.
pub fn commit_type(head: &str) -> &str {
    let head = head.trim();
    let head = head.strip_suffix('!').unwrap_or(head);
    match head.find('(') {
        Some(open) if head.ends_with(')') => head[..open].trim(),
        _ => head,
    }
}
