//! Conflict prediction on a throwaway branch.

use git2::Oid;
use tracing::{debug, instrument, warn};

use crate::Repository;
use crate::error::Result;
use crate::repository::command_error;

/// Outcome of a simulated replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictPrediction {
    /// Whether any replay step stopped on a conflict.
    pub has_conflicts: bool,
    /// Unmerged paths from the first conflicting step.
    pub files: Vec<String>,
}

/// A branch that only lives for the duration of a scope.
///
/// Created at HEAD and checked out on construction. On drop, any rebase in
/// progress is aborted, the original branch is checked out again and the
/// disposable branch is force-deleted. Cleanup failures are logged, never
/// raised.
#[derive(Debug)]
pub struct DisposableBranch<'repo> {
    repo: &'repo Repository,
    name: String,
    original: String,
}

impl<'repo> DisposableBranch<'repo> {
    /// Create `name` at HEAD and switch to it.
    ///
    /// # Errors
    /// Returns error if HEAD is detached or the branch can't be created.
    pub fn create(repo: &'repo Repository, name: impl Into<String>) -> Result<Self> {
        let original = repo.current_branch()?;
        let name = name.into();
        repo.run(&["checkout", "--quiet", "-b", &name])?;
        debug!(branch = %name, from = %original, "created disposable branch");
        Ok(Self {
            repo,
            name,
            original,
        })
    }

    /// Name of the disposable branch.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Branch that will be restored on drop.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }
}

impl Drop for DisposableBranch<'_> {
    fn drop(&mut self) {
        if self.repo.is_rebasing() {
            if let Err(e) = self.repo.run(&["rebase", "--abort"]) {
                warn!(error = %e, "failed to abort rebase on disposable branch");
            }
        }
        if let Err(e) = self.repo.checkout(&self.original) {
            warn!(branch = %self.original, error = %e, "failed to restore original branch");
        }
        if let Err(e) = self.repo.delete_branch(&self.name) {
            warn!(branch = %self.name, error = %e, "failed to delete disposable branch");
        }
    }
}

impl Repository {
    /// Replay the current branch onto each candidate in turn and report the
    /// first conflict.
    ///
    /// Runs on a [`DisposableBranch`]. Local changes are stashed for the
    /// duration and restored with their staged/unstaged split intact, so the
    /// user's branch, index and working tree are left as they were.
    ///
    /// # Errors
    /// Returns error if the disposable branch can't be created, a rebase
    /// fails for a reason other than a conflict, or local changes can't be
    /// restored (they remain on the stash list in that case).
    #[instrument(skip(self, commits), fields(commits = commits.len()))]
    pub fn predict_conflicts(&self, commits: &[Oid]) -> Result<ConflictPrediction> {
        if commits.is_empty() {
            return Ok(ConflictPrediction::default());
        }

        // `rebase --autostash` alone would hand staged work back unstaged.
        let parked = self.stash_push("sorb conflict prediction", false)?;
        let prediction = self.replay_on_disposable_branch(commits);
        if let Some(stash) = parked {
            self.stash_pop(&stash, true)?;
        }
        prediction
    }

    fn replay_on_disposable_branch(&self, commits: &[Oid]) -> Result<ConflictPrediction> {
        let name = format!("sorb-predict-{}", std::process::id());
        let _branch = DisposableBranch::create(self, name)?;

        for commit in commits {
            let sha = commit.to_string();
            let args = ["rebase", "--quiet", "--autostash", sha.as_str()];
            let output = self.run_raw(&args, None)?;
            if output.status.success() {
                continue;
            }
            if !self.is_rebasing() {
                return Err(command_error(&args, &output));
            }

            let unmerged = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
            let files: Vec<String> = unmerged
                .lines()
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            debug!(commit = %sha, ?files, "replay stopped on conflict");
            return Ok(ConflictPrediction {
                has_conflicts: true,
                files,
            });
        }

        Ok(ConflictPrediction::default())
    }
}
