//! Diff summarization, chunking and truncation.

pub mod chunk;
pub mod summary;
pub mod truncate;

pub use chunk::{chunk_diff, Chunk, DEFAULT_CHUNK_BUDGET};
pub use summary::{
    affected_paths, summarize, ChangeLine, ChangeSign, DiffSummary, FileChange, FileStatus,
    SummarizedDiff,
};
pub use truncate::{prepare_diff, truncate_diff};
