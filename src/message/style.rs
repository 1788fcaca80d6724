//! Optional decoration of validated titles: gitmoji prefixes and scopes.

use super::validate::commit_type;

/// Post-validation styling applied to the final title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleOptions {
    /// Prefix the title with the gitmoji for its type.
    pub emoji: bool,
    /// Force this scope into the title, replacing any scope the model chose.
    pub scope: Option<String>,
}

impl StyleOptions {
    /// Returns true if no styling is requested.
    pub fn is_plain(&self) -> bool {
        !self.emoji && self.scope.is_none()
    }
}

/// Gitmoji for a conventional commit type.
pub fn emoji_for(commit_type: &str) -> Option<&'static str> {
    let emoji = match commit_type {
        "feat" => "✨",
        "fix" => "🐛",
        "docs" => "📝",
        "style" => "💄",
        "refactor" => "♻️",
        "perf" => "⚡",
        "test" => "✅",
        "build" => "📦",
        "ci" => "👷",
        "chore" => "🔧",
        "revert" => "⏪",
        _ => return None,
    };
    Some(emoji)
}

/// Applies `style` to a title of the form `type(scope)!: description`.
///
/// Titles without a separator are returned unchanged.
pub fn apply_style(title: &str, style: &StyleOptions) -> String {
    let Some((head, description)) = title.split_once(':') else {
        return title.to_string();
    };

    let ty = commit_type(head);
    let head = match style.scope.as_deref().map(str::trim) {
        Some(scope) if !scope.is_empty() => {
            let bang = if head.trim_end().ends_with('!') { "!" } else { "" };
            format!("{ty}({scope}){bang}")
        }
        _ => head.trim().to_string(),
    };

    let styled = format!("{head}:{description}");
    match emoji_for(ty) {
        Some(emoji) if style.emoji => format!("{emoji} {styled}"),
        _ => styled,
    }
}
