//! Unified diff parsing and compact synopsis generation.

use std::fmt;

use tracing::debug;

/// Marker that begins a per-file section in unified diff output.
pub const FILE_HEADER_MARKER: &str = "diff --git ";

/// Marker that begins a hunk within a file diff.
const HUNK_MARKER: &str = "@@";

/// Compressed text is only used when it is below this share of the
/// original, in percent.
const COMPRESSION_THRESHOLD_PERCENT: usize = 90;

/// Sign of one diff body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSign {
    /// `+` line.
    Added,
    /// `-` line.
    Removed,
    /// Unchanged context line.
    Context,
}

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLine {
    /// Line classification.
    pub sign: ChangeSign,
    /// Line text without the sign character.
    pub content: String,
}

/// How a file was changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileStatus {
    /// New file.
    Added,
    /// Removed file.
    Deleted,
    /// Moved, possibly with edits.
    Renamed,
    /// Edited in place.
    #[default]
    Modified,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "Added",
            Self::Deleted => "Deleted",
            Self::Renamed => "Renamed",
            Self::Modified => "Modified",
        })
    }
}

/// All changes to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Source path with the `a/` prefix stripped.
    pub path: String,
    /// Added, deleted, renamed or modified.
    pub status: FileStatus,
    /// Hunk body lines in order.
    pub lines: Vec<ChangeLine>,
}

impl FileChange {
    fn new(path: String) -> Self {
        Self {
            path,
            status: FileStatus::Modified,
            lines: Vec::new(),
        }
    }

    /// Number of `+` lines.
    pub fn additions(&self) -> usize {
        self.count(ChangeSign::Added)
    }

    /// Number of `-` lines.
    pub fn removals(&self) -> usize {
        self.count(ChangeSign::Removed)
    }

    fn count(&self, sign: ChangeSign) -> usize {
        self.lines.iter().filter(|l| l.sign == sign).count()
    }

    /// Net delta: `+N`, `-N`, or `=` when additions equal removals.
    pub fn delta(&self) -> String {
        let (added, removed) = (self.additions(), self.removals());
        match added.cmp(&removed) {
            std::cmp::Ordering::Greater => format!("+{}", added - removed),
            std::cmp::Ordering::Less => format!("-{}", removed - added),
            std::cmp::Ordering::Equal => "=".to_string(),
        }
    }
}

/// Size bookkeeping and synopsis for one diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Byte length of the input diff.
    pub original_size: usize,
    /// Byte length of the text sent downstream.
    pub summary_size: usize,
    /// Per-file changes in diff order.
    pub files: Vec<FileChange>,
    /// Human-readable synopsis.
    pub summary: String,
}

impl DiffSummary {
    /// Returns true if the downstream text is smaller than the input.
    pub fn is_compressed(&self) -> bool {
        self.summary_size < self.original_size
    }

    /// Context note telling the model the diff was condensed.
    pub fn disclosure(&self) -> Option<String> {
        self.is_compressed().then(|| {
            format!(
                "The diff was condensed from {} to {} bytes: context lines were removed and a per-file synopsis was added.",
                self.original_size, self.summary_size
            )
        })
    }
}

/// Output of [`summarize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizedDiff {
    /// Size bookkeeping and synopsis.
    pub summary: DiffSummary,
    /// Text to use downstream: the original or the condensed form.
    pub diff: String,
}

/// Extracts the source path from a `diff --git a/x b/x` header line.
pub fn header_path(line: &str) -> Option<String> {
    let rest = line.strip_prefix(FILE_HEADER_MARKER)?;
    let source = match rest.rfind(" b/") {
        Some(pos) => &rest[..pos],
        None => rest.split_whitespace().next().unwrap_or(rest),
    };
    let source = source.trim();
    let source = source.strip_prefix("a/").unwrap_or(source);
    (!source.is_empty()).then(|| source.to_string())
}

/// Paths of every file header in `text`, in first-seen order.
pub fn affected_paths(text: &str) -> Vec<String> {
    text.lines().filter_map(header_path).collect()
}

struct Parsed {
    files: Vec<FileChange>,
    condensed: String,
}

fn parse(diff: &str) -> Parsed {
    let mut files: Vec<FileChange> = Vec::new();
    let mut condensed = String::new();
    let mut in_hunk = false;

    for line in diff.lines() {
        if line.starts_with(FILE_HEADER_MARKER) {
            in_hunk = false;
            if let Some(path) = header_path(line) {
                files.push(FileChange::new(path));
            }
            push_line(&mut condensed, line);
            continue;
        }

        let Some(file) = files.last_mut() else {
            continue;
        };

        if line.starts_with(HUNK_MARKER) {
            in_hunk = true;
            push_line(&mut condensed, line);
            continue;
        }

        if !in_hunk {
            if line.starts_with("new file mode") {
                file.status = FileStatus::Added;
            } else if line.starts_with("deleted file mode") {
                file.status = FileStatus::Deleted;
            } else if line.starts_with("rename to ") || line.starts_with("rename from ") {
                file.status = FileStatus::Renamed;
            }
            if !line.starts_with("index ") {
                push_line(&mut condensed, line);
            }
            continue;
        }

        let (sign, content) = match line.as_bytes().first() {
            Some(b'+') => (ChangeSign::Added, &line[1..]),
            Some(b'-') => (ChangeSign::Removed, &line[1..]),
            Some(b' ') => (ChangeSign::Context, &line[1..]),
            None => (ChangeSign::Context, ""),
            _ => continue,
        };
        if sign != ChangeSign::Context {
            push_line(&mut condensed, line);
        }
        file.lines.push(ChangeLine {
            sign,
            content: content.to_string(),
        });
    }

    Parsed { files, condensed }
}

fn push_line(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}

/// Renders the per-file synopsis.
///
/// `Modified: src/lib.rs (+5)` per file, prefixed by a file count when
/// more than one file changed.
pub fn synopsis(files: &[FileChange]) -> String {
    let mut out = String::new();
    if files.len() > 1 {
        out.push_str(&format!("{} files changed:\n", files.len()));
    }
    for file in files {
        out.push_str(&format!("{}: {} ({})\n", file.status, file.path, file.delta()));
    }
    out
}

/// Parses `diff` and decides what text to send downstream.
///
/// Diffs within `budget` bytes are kept verbatim. Larger diffs are replaced
/// by the synopsis plus a condensed diff (file headers, hunk headers and
/// changed lines only) when that is materially smaller.
pub fn summarize(diff: &str, budget: usize) -> SummarizedDiff {
    let original_size = diff.len();
    let Parsed { files, condensed } = parse(diff);
    let summary = synopsis(&files);

    let verbatim = |files: Vec<FileChange>, summary: String| SummarizedDiff {
        summary: DiffSummary {
            original_size,
            summary_size: original_size,
            files,
            summary,
        },
        diff: diff.to_string(),
    };

    if original_size <= budget || files.is_empty() {
        debug!(
            original_size,
            file_count = files.len(),
            "Using diff verbatim"
        );
        return verbatim(files, summary);
    }

    let optimized = format!("{summary}\n{condensed}");
    if optimized.len() * 100 >= original_size * COMPRESSION_THRESHOLD_PERCENT {
        debug!(
            original_size,
            optimized_size = optimized.len(),
            "Condensed diff is not materially smaller, using verbatim"
        );
        return verbatim(files, summary);
    }

    debug!(
        original_size,
        summary_size = optimized.len(),
        file_count = files.len(),
        "Compressed diff"
    );
    SummarizedDiff {
        summary: DiffSummary {
            original_size,
            summary_size: optimized.len(),
            files,
            summary,
        },
        diff: optimized,
    }
}
