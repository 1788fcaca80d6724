//! Line-preserving splitting of oversized diffs.

/// Default chunk budget in bytes, about 6,000 tokens at 4 bytes per token.
pub const DEFAULT_CHUNK_BUDGET: usize = 24_000;

/// A size-bounded contiguous slice of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the chunk sequence.
    pub index: usize,
    /// Chunk text; lines keep their terminators.
    pub text: String,
}

/// Splits `diff` into chunks of at most `budget` bytes.
///
/// Lines are never split: a line that alone exceeds the budget becomes its
/// own oversized chunk. Concatenating the chunks in order reproduces
/// `diff` exactly. Input within the budget comes back as a single chunk.
/// The result is never empty.
pub fn chunk_diff(diff: &str, budget: usize) -> Vec<Chunk> {
    if diff.len() <= budget {
        return vec![Chunk {
            index: 0,
            text: diff.to_string(),
        }];
    }

    let mut chunks = Vec::with_capacity(diff.len() / budget.max(1) + 1);
    let mut current = String::new();

    for line in diff.split_inclusive('\n') {
        if !current.is_empty() && current.len() + line.len() > budget {
            chunks.push(Chunk {
                index: chunks.len(),
                text: std::mem::take(&mut current),
            });
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            text: current,
        });
    }

    chunks
}
