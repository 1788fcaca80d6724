//! Whole-diff preparation for the non-chunking path.

use std::borrow::Cow;

use tracing::debug;

/// Default byte budget for whole-diff truncation.
pub const DEFAULT_TRUNCATE_BUDGET: usize = 50_000;

/// Leading lines always kept by [`truncate_diff`].
pub const DEFAULT_HEADER_LINES: usize = 12;

/// Diffs shorter than this after trimming get a clarifying note.
pub const MIN_MEANINGFUL_DIFF: usize = 10;

/// Room left for the omission marker.
const MARKER_RESERVE: usize = 64;

const SMALL_DIFF_NOTE: &str = "[Note: this diff is very small. It may only change whitespace, \
                               file modes or file names.]";

/// Appends a clarifying note to diffs below `min_size` trimmed bytes.
pub fn prepare_diff(diff: &str, min_size: usize) -> Cow<'_, str> {
    if diff.trim().len() >= min_size {
        return Cow::Borrowed(diff);
    }
    debug!(diff_len = diff.len(), min_size, "Annotating very small diff");
    let separator = if diff.ends_with('\n') { "\n" } else { "\n\n" };
    Cow::Owned(format!("{diff}{separator}{SMALL_DIFF_NOTE}"))
}

/// Cuts `diff` to about `budget` bytes.
///
/// Keeps the first `header_lines` lines and a line-aligned tail, joined by
/// a marker stating how many bytes were omitted. Diffs within budget are
/// returned unchanged.
pub fn truncate_diff(diff: &str, budget: usize, header_lines: usize) -> Cow<'_, str> {
    if diff.len() <= budget {
        return Cow::Borrowed(diff);
    }

    let head_len: usize = diff
        .split_inclusive('\n')
        .take(header_lines)
        .map(str::len)
        .sum();

    let tail_budget = budget.saturating_sub(head_len + MARKER_RESERVE);
    let tail_start = line_start_at_or_after(diff, diff.len() - tail_budget.min(diff.len()))
        .max(head_len);

    let omitted = tail_start - head_len;
    if omitted == 0 {
        return Cow::Borrowed(diff);
    }

    debug!(
        original_len = diff.len(),
        budget, omitted, "Truncating diff"
    );

    let head = &diff[..head_len];
    let tail = &diff[tail_start..];
    let newline = if head.is_empty() || head.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    Cow::Owned(format!(
        "{head}{newline}... [{omitted} bytes omitted] ...\n{tail}"
    ))
}

/// First line start at or after byte `pos`.
fn line_start_at_or_after(text: &str, pos: usize) -> usize {
    if pos == 0 || text.as_bytes().get(pos - 1) == Some(&b'\n') {
        return pos;
    }
    text.as_bytes()[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(text.len(), |offset| pos + offset + 1)
}
