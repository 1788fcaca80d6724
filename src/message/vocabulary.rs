//! Commit type vocabulary: type name to human-readable description.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Embedded default vocabulary.
pub const DEFAULT_TYPES_YAML: &str = include_str!("../templates/commit_types.yaml");

/// Mapping of commit type name to description.
///
/// Ordered by type name so prompts render deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeVocabulary {
    types: BTreeMap<String, String>,
}

impl TypeVocabulary {
    /// Loads the embedded default vocabulary.
    pub fn builtin() -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(DEFAULT_TYPES_YAML)
    }

    /// Parses a serialized `{"type": "description"}` JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Builds a vocabulary from `(type, description)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            types: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns true if no types are defined.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Number of types defined.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if `commit_type` is a known type.
    pub fn contains(&self, commit_type: &str) -> bool {
        self.types.contains_key(commit_type)
    }

    /// Iterates `(type, description)` pairs in type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the vocabulary as a bullet list for prompts.
    pub fn render(&self) -> String {
        self.iter()
            .map(|(name, description)| format!("- {name}: {description}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn builtin_vocabulary_parses() {
        let vocabulary = TypeVocabulary::builtin().unwrap();
        assert_eq!(vocabulary.len(), 11);
        assert!(vocabulary.contains("feat"));
        assert!(vocabulary.contains("revert"));
        assert!(!vocabulary.contains("feature"));
    }

    #[test]
    fn from_json_object() {
        let vocabulary =
            TypeVocabulary::from_json(r#"{"fix": "Bug fix", "feat": "New feature"}"#).unwrap();
        assert_eq!(vocabulary.len(), 2);
        assert!(vocabulary.contains("fix"));
    }

    #[test]
    fn from_json_rejects_non_object() {
        assert!(TypeVocabulary::from_json(r#"["feat", "fix"]"#).is_err());
    }

    #[test]
    fn empty_json_object_is_empty() {
        assert!(TypeVocabulary::from_json("{}").unwrap().is_empty());
    }

    #[test]
    fn render_is_sorted_by_type() {
        let vocabulary = TypeVocabulary::from_pairs([("fix", "Bug fix"), ("docs", "Docs")]);
        assert_eq!(vocabulary.render(), "- docs: Docs\n- fix: Bug fix");
    }
}
