//! Recovering a commit title from free-form model output.

use super::validate::{Validator, MAX_TITLE_LENGTH};
use super::CommitResult;

/// Marker introducing the title in detailed-mode output.
const TITLE_MARKER: &str = "title:";
/// Marker introducing the body in detailed-mode output.
const BODY_MARKER: &str = "body:";

/// Extracts the most plausible commit title from raw model output.
///
/// Strategies, in order:
/// 1. the first line that, after trimming whitespace and backticks, passes
///    `validator`;
/// 2. the first non-blank line that is neither a comment nor a code fence,
///    returned trimmed;
/// 3. the whole trimmed text, if it is a single short line with at least
///    one token outside comments and fences;
/// 4. the empty string.
///
/// The result is a fixed point: extracting from an extracted title yields
/// the same title.
pub fn extract_commit_message(raw: &str, validator: &Validator<'_>) -> String {
    for line in raw.lines() {
        let cleaned = clean_line(line);
        if cleaned.is_empty() || is_comment(cleaned) || is_fence_marker(line.trim()) {
            continue;
        }
        if validator.is_valid(cleaned) {
            return cleaned.to_string();
        }
    }

    if let Some(line) = raw.lines().map(str::trim).find(|line| {
        let cleaned = clean_line(line);
        !cleaned.is_empty() && !is_comment(cleaned) && !is_fence_marker(line)
    }) {
        return line.to_string();
    }

    let trimmed = raw.trim();
    let has_content = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !is_comment(line) && !is_fence_marker(line))
        .flat_map(str::split_whitespace)
        .any(|token| !token.chars().all(|c| c == '`'));
    if has_content && !trimmed.contains('\n') && trimmed.chars().count() <= MAX_TITLE_LENGTH {
        return trimmed.to_string();
    }

    String::new()
}

/// Splits detailed-mode output into title and body.
///
/// Expects a line starting with `Title:` followed by a line starting with
/// `Body:`; the body is every non-blank line after the `Body:` marker
/// (including any text on the marker line itself), joined by newlines.
/// Without a `Title:` marker the whole trimmed input becomes the message
/// and the body is empty.
pub fn parse_title_body(raw: &str) -> CommitResult {
    let lines: Vec<&str> = raw.lines().collect();

    let Some((title_index, title)) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| strip_marker(line, TITLE_MARKER).map(|rest| (i, rest)))
    else {
        return CommitResult::new(raw.trim(), None);
    };
    let title = clean_line(title).to_string();

    let mut body_lines = Vec::new();
    let mut in_body = false;
    for line in &lines[title_index + 1..] {
        if !in_body {
            if let Some(rest) = strip_marker(line, BODY_MARKER) {
                in_body = true;
                let rest = rest.trim();
                if !rest.is_empty() {
                    body_lines.push(rest);
                }
            }
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || is_fence_marker(trimmed) {
            continue;
        }
        body_lines.push(trimmed);
    }

    let body = if body_lines.is_empty() {
        None
    } else {
        Some(body_lines.join("\n"))
    };
    CommitResult::new(title, body)
}

/// Trims any mix of whitespace and backticks from both ends.
fn clean_line(line: &str) -> &str {
    line.trim_matches(|c: char| c == '`' || c.is_whitespace())
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#')
}

/// A line like "```" or "```text".
fn is_fence_marker(line: &str) -> bool {
    line.strip_prefix("```")
        .is_some_and(|rest| !rest.contains(char::is_whitespace))
}

/// Case-insensitive prefix match returning the remainder of the line.
fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    let head = trimmed.get(..marker.len())?;
    head.eq_ignore_ascii_case(marker)
        .then(|| &trimmed[marker.len()..])
}
