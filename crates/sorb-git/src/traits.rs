//! Trait abstractions for git operations.
//!
//! This module defines the `GitOps` trait which abstracts the git operations
//! the absorb pipeline needs, enabling dependency injection and testability.

use std::path::Path;

use git2::Oid;

use crate::{BackupRef, CommitInfo, ConflictPrediction, Hunk, Repository, Result};

/// Trait for git repository operations.
///
/// This trait abstracts git operations, allowing for:
/// - Dependency injection in services
/// - Mock implementations for testing undo and apply failure paths
///
/// All methods are synchronous; every call is a blocking git invocation.
#[allow(clippy::missing_errors_doc)]
pub trait GitOps {
    // === Repository Info ===

    /// Path to the working tree root.
    fn root(&self) -> &Path;

    /// Path to the .git directory.
    fn git_dir(&self) -> &Path;

    /// Get the current branch name.
    ///
    /// Returns an error if HEAD is detached.
    fn current_branch(&self) -> Result<String>;

    /// Full SHA of HEAD.
    fn head_commit(&self) -> Result<String>;

    /// Check if a rebase is in progress.
    fn is_rebasing(&self) -> bool;

    /// Parent of a commit, `None` for a root commit.
    fn parent_of(&self, sha: &str) -> Result<Option<String>>;

    // === Working Directory ===

    /// Check if there are staged changes.
    fn has_staged_changes(&self) -> Result<bool>;

    /// Check for unstaged or untracked work.
    fn has_unstaged_changes(&self) -> Result<bool>;

    /// Parse the staged diff into hunks.
    fn staged_hunks(&self) -> Result<Vec<Hunk>>;

    /// Paths with staged changes, both sides of a rename included.
    fn staged_files(&self) -> Result<Vec<String>>;

    /// Stage `paths` as they are in the working tree.
    fn stage_paths(&self, paths: &[String]) -> Result<()>;

    /// Unstage everything.
    fn unstage_all(&self) -> Result<()>;

    /// Checkout a branch.
    fn checkout(&self, branch: &str) -> Result<()>;

    /// `git reset --mixed <target>`.
    fn reset_mixed(&self, target: &str) -> Result<()>;

    /// Commit the index.
    fn commit(&self, message: &str) -> Result<String>;

    // === Candidate Commits ===

    /// Commits not yet pushed to `origin`.
    fn unpushed_commits(&self) -> Result<Vec<CommitInfo>>;

    /// Commits since the branch forked from its base.
    fn commits_from_branch_point(&self) -> Result<Vec<CommitInfo>>;

    /// The last `depth` commits.
    fn commits_at_depth(&self, depth: usize) -> Result<Vec<CommitInfo>>;

    // === Absorb ===

    /// Stage `hunks` in the index, leaving the working tree alone.
    fn apply_hunks(&self, hunks: &[Hunk]) -> Result<()>;

    /// Stage `hunks` and commit them as `fixup! <target>`.
    fn apply_as_fixup(&self, hunks: &[Hunk], target: &str) -> Result<Oid>;

    /// Simulate replaying onto each commit.
    fn predict_conflicts(&self, commits: &[Oid]) -> Result<ConflictPrediction>;

    /// Fold fixup commits with an autosquash rebase.
    fn autosquash_rebase(&self, onto: Option<&str>) -> Result<()>;

    // === Backups ===

    /// Create a backup ref at HEAD.
    fn create_backup_ref(&self, timestamp: i64) -> Result<String>;

    /// List backup refs.
    fn list_backup_refs(&self) -> Result<Vec<BackupRef>>;

    /// Check if a ref exists.
    fn ref_exists(&self, name: &str) -> Result<bool>;

    /// Delete a ref.
    fn delete_ref(&self, name: &str) -> Result<()>;

    /// Stash local changes.
    fn stash_push(&self, message: &str, keep_index: bool) -> Result<Option<String>>;

    /// Restore a stash by commit.
    fn stash_pop(&self, sha: &str, restore_index: bool) -> Result<()>;
}

impl GitOps for Repository {
    fn root(&self) -> &Path {
        Self::root(self)
    }

    fn git_dir(&self) -> &Path {
        Self::git_dir(self)
    }

    fn current_branch(&self) -> Result<String> {
        Self::current_branch(self)
    }

    fn head_commit(&self) -> Result<String> {
        Self::head_commit(self)
    }

    fn is_rebasing(&self) -> bool {
        Self::is_rebasing(self)
    }

    fn parent_of(&self, sha: &str) -> Result<Option<String>> {
        Self::parent_of(self, sha)
    }

    fn has_staged_changes(&self) -> Result<bool> {
        Self::has_staged_changes(self)
    }

    fn has_unstaged_changes(&self) -> Result<bool> {
        Self::has_unstaged_changes(self)
    }

    fn staged_hunks(&self) -> Result<Vec<Hunk>> {
        Self::staged_hunks(self)
    }

    fn staged_files(&self) -> Result<Vec<String>> {
        Self::staged_files(self)
    }

    fn stage_paths(&self, paths: &[String]) -> Result<()> {
        Self::stage_paths(self, paths)
    }

    fn unstage_all(&self) -> Result<()> {
        Self::unstage_all(self)
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        Self::checkout(self, branch)
    }

    fn reset_mixed(&self, target: &str) -> Result<()> {
        Self::reset_mixed(self, target)
    }

    fn commit(&self, message: &str) -> Result<String> {
        Self::commit(self, message)
    }

    fn unpushed_commits(&self) -> Result<Vec<CommitInfo>> {
        Self::unpushed_commits(self)
    }

    fn commits_from_branch_point(&self) -> Result<Vec<CommitInfo>> {
        Self::commits_from_branch_point(self)
    }

    fn commits_at_depth(&self, depth: usize) -> Result<Vec<CommitInfo>> {
        Self::commits_at_depth(self, depth)
    }

    fn apply_hunks(&self, hunks: &[Hunk]) -> Result<()> {
        Self::apply_hunks(self, hunks)
    }

    fn apply_as_fixup(&self, hunks: &[Hunk], target: &str) -> Result<Oid> {
        Self::apply_as_fixup(self, hunks, target)
    }

    fn predict_conflicts(&self, commits: &[Oid]) -> Result<ConflictPrediction> {
        Self::predict_conflicts(self, commits)
    }

    fn autosquash_rebase(&self, onto: Option<&str>) -> Result<()> {
        Self::autosquash_rebase(self, onto)
    }

    fn create_backup_ref(&self, timestamp: i64) -> Result<String> {
        Self::create_backup_ref(self, timestamp)
    }

    fn list_backup_refs(&self) -> Result<Vec<BackupRef>> {
        Self::list_backup_refs(self)
    }

    fn ref_exists(&self, name: &str) -> Result<bool> {
        Self::ref_exists(self, name)
    }

    fn delete_ref(&self, name: &str) -> Result<()> {
        Self::delete_ref(self, name)
    }

    fn stash_push(&self, message: &str, keep_index: bool) -> Result<Option<String>> {
        Self::stash_push(self, message, keep_index)
    }

    fn stash_pop(&self, sha: &str, restore_index: bool) -> Result<()> {
        Self::stash_pop(self, sha, restore_index)
    }
}
