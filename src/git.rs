//! Staged diff rendering and committing.

use std::path::Path;

use anyhow::{Context, Result};
use git2::{DiffFormat, ErrorCode, Oid, Repository, Tree};
use tracing::debug;

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Opens the repository containing the current directory.
    pub fn open() -> Result<Self> {
        let repo = Repository::discover(".").context("Not in a git repository")?;

        Ok(Self { repo })
    }

    /// Opens the repository at `path`.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path).context("Failed to open git repository")?;

        Ok(Self { repo })
    }

    /// Access to the underlying `git2::Repository`.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// HEAD's tree, or `None` before the first commit.
    fn head_tree(&self) -> Result<Option<Tree<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(
                head.peel_to_tree().context("Failed to resolve HEAD tree")?,
            )),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e).context("Failed to get HEAD reference"),
        }
    }

    /// Renders HEAD → index as a unified patch.
    ///
    /// Before the first commit the index is diffed against an empty tree.
    pub fn staged_diff(&self) -> Result<String> {
        let head_tree = self.head_tree()?;
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)
            .context("Failed to diff index against HEAD")?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            let content = String::from_utf8_lossy(line.content());
            match line.origin() {
                origin @ ('+' | '-' | ' ') => {
                    patch.push(origin);
                    patch.push_str(&content);
                }
                _ => patch.push_str(&content),
            }
            true
        })
        .context("Failed to format diff")?;

        debug!(diff_size = patch.len(), "Rendered staged diff");
        Ok(patch)
    }

    /// Commits the index with `message` on top of HEAD.
    pub fn commit(&self, message: &str) -> Result<Oid> {
        let mut index = self.repo.index().context("Failed to read index")?;
        let tree_oid = index.write_tree().context("Failed to write index tree")?;
        let tree = self
            .repo
            .find_tree(tree_oid)
            .context("Failed to find index tree")?;
        let signature = self
            .repo
            .signature()
            .context("Failed to determine commit signature (set user.name and user.email)")?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit().context("Failed to resolve HEAD commit")?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e).context("Failed to get HEAD reference"),
        };
        let parents: Vec<_> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .context("Failed to create commit")?;

        debug!(commit = %oid, "Created commit");
        Ok(oid)
    }
}
