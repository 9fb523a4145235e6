//! Candidate commit enumeration.

use tracing::{debug, instrument};

use crate::Repository;
use crate::error::Result;

/// Remote branches tried, in order, when looking for the branch point.
const BASE_CANDIDATES: &[&str] = &["origin/main", "origin/master", "main", "master"];

/// A commit that hunks may be absorbed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full commit hash.
    pub sha: String,
    /// Full commit message, trailing whitespace trimmed.
    pub message: String,
    /// Patch against the first parent, or against the empty tree for a root commit.
    pub diff: String,
}

impl CommitInfo {
    /// First line of the message.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Abbreviated hash for display.
    #[must_use]
    pub fn short_sha(&self) -> &str {
        self.sha.get(..8).unwrap_or(&self.sha)
    }

    /// Files touched by this commit (post-change paths), in diff order.
    #[must_use]
    pub fn changed_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for line in self.diff.lines() {
            let Some(paths) = line.strip_prefix("diff --git ") else {
                continue;
            };
            if let Some((_, b)) = paths.split_once(" b/") {
                if !files.contains(&b) {
                    files.push(b);
                }
            }
        }
        files
    }
}

impl Repository {
    /// Load message and diff for a single commit.
    ///
    /// # Errors
    /// Returns error if the commit can't be read.
    pub fn commit_info(&self, sha: &str) -> Result<CommitInfo> {
        let message = self.run(&["log", "-1", "--format=%B", sha])?;
        let diff = self.run(&[
            "diff-tree",
            "-p",
            "-M",
            "--no-color",
            "--no-commit-id",
            "--root",
            sha,
        ])?;

        Ok(CommitInfo {
            sha: sha.to_string(),
            message: message.trim_end().to_string(),
            diff,
        })
    }

    /// Commits reachable from `to` but not from `from`, oldest first.
    ///
    /// With `from = None` every ancestor of `to` is included, down to and
    /// including the root commit.
    ///
    /// # Errors
    /// Returns error if rev-list fails or a commit can't be read.
    #[instrument(skip(self))]
    pub fn commit_range(&self, from: Option<&str>, to: &str) -> Result<Vec<CommitInfo>> {
        let range = from.map_or_else(|| to.to_string(), |from| format!("{from}..{to}"));
        let output = self.run(&["rev-list", "--reverse", &range])?;
        self.load_commits(&output)
    }

    /// The last `depth` commits on HEAD, oldest first.
    ///
    /// # Errors
    /// Returns error if rev-list fails.
    #[instrument(skip(self))]
    pub fn commits_at_depth(&self, depth: usize) -> Result<Vec<CommitInfo>> {
        let max = format!("--max-count={depth}");
        let output = self.run(&["rev-list", &max, "HEAD"])?;
        let mut shas: Vec<&str> = output.lines().filter(|l| !l.is_empty()).collect();
        shas.reverse();
        shas.into_iter().map(|sha| self.commit_info(sha)).collect()
    }

    /// Where the current branch forked from its base.
    ///
    /// Tries `origin/main`, `origin/master`, then local `main`/`master`.
    /// A base whose merge-base is HEAD itself is skipped. `None` means no
    /// usable base exists and history should be walked to the root.
    ///
    /// # Errors
    /// Returns error if HEAD can't be resolved.
    pub fn branch_point(&self) -> Result<Option<String>> {
        let head = self.head_commit()?;
        let current = self.current_branch().ok();

        for candidate in BASE_CANDIDATES {
            if current.as_deref() == Some(*candidate) {
                continue;
            }
            if self.rev_parse(candidate)?.is_none() {
                continue;
            }
            let output = self.run_raw(&["merge-base", candidate, "HEAD"], None)?;
            if !output.status.success() {
                continue;
            }
            let base = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if base.is_empty() || base == head {
                continue;
            }
            debug!(candidate, base = %base, "found branch point");
            return Ok(Some(base));
        }

        Ok(None)
    }

    /// Commits since the branch point, or the whole history if there is none.
    ///
    /// # Errors
    /// Returns error if history can't be walked.
    pub fn commits_from_branch_point(&self) -> Result<Vec<CommitInfo>> {
        let base = self.branch_point()?;
        self.commit_range(base.as_deref(), "HEAD")
    }

    /// Commits not yet on the branch's `origin` counterpart.
    ///
    /// Falls back to [`Repository::commits_from_branch_point`] when the
    /// branch has never been pushed.
    ///
    /// # Errors
    /// Returns error if history can't be walked.
    pub fn unpushed_commits(&self) -> Result<Vec<CommitInfo>> {
        let branch = self.current_branch()?;
        let upstream = format!("refs/remotes/origin/{branch}");
        if self.rev_parse(&upstream)?.is_some() {
            return self.commit_range(Some(&upstream), "HEAD");
        }
        self.commits_from_branch_point()
    }

    /// Parent of `sha`, or `None` for a root commit.
    ///
    /// # Errors
    /// Returns error if `sha` doesn't resolve.
    pub fn parent_of(&self, sha: &str) -> Result<Option<String>> {
        self.rev_parse(&format!("{sha}^"))
    }

    fn load_commits(&self, rev_list: &str) -> Result<Vec<CommitInfo>> {
        rev_list
            .lines()
            .filter(|l| !l.is_empty())
            .map(|sha| self.commit_info(sha))
            .collect()
    }
}
