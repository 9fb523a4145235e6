//! Repository wrapper providing high-level git operations.
//!
//! Read-only queries go through git2. Anything that mutates the index, the
//! working tree or history shells out to `git` so that hooks, config and
//! stderr diagnostics behave exactly as they do for the user.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use git2::{BranchType, RepositoryState};
use tracing::debug;

use crate::error::{Error, Result};

/// High-level wrapper around a git repository.
///
/// Every subprocess is scoped to [`Repository::root`]; nothing depends on
/// the process working directory after [`Repository::open`].
pub struct Repository {
    inner: git2::Repository,
    root: PathBuf,
}

impl Repository {
    /// Open a repository at the given path.
    ///
    /// # Errors
    /// Returns error if no repository found at path or any parent, or if the
    /// repository is bare.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = git2::Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::NotARepository
            } else {
                Error::Git2(e)
            }
        })?;
        let root = inner.workdir().ok_or(Error::BareRepository)?.to_path_buf();
        Ok(Self { inner, root })
    }

    /// Open the repository containing the current directory.
    ///
    /// # Errors
    /// Returns error if not inside a git repository.
    pub fn open_current() -> Result<Self> {
        Self::open(".")
    }

    /// Path to the working tree root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the .git directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    /// Get the current repository state.
    #[must_use]
    pub fn state(&self) -> RepositoryState {
        self.inner.state()
    }

    /// Check if there's a rebase in progress.
    #[must_use]
    pub fn is_rebasing(&self) -> bool {
        matches!(
            self.state(),
            RepositoryState::Rebase
                | RepositoryState::RebaseInteractive
                | RepositoryState::RebaseMerge
        )
    }

    // === Branch operations ===

    /// Get the name of the current branch.
    ///
    /// # Errors
    /// Returns error if HEAD is detached.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.inner.head()?;
        if !head.is_branch() {
            return Err(Error::DetachedHead);
        }

        head.shorthand()
            .map(String::from)
            .ok_or(Error::DetachedHead)
    }

    /// Check if HEAD is detached.
    ///
    /// # Errors
    /// Returns error if HEAD cannot be read.
    pub fn head_detached(&self) -> Result<bool> {
        Ok(self.inner.head_detached()?)
    }

    /// Full SHA of the commit HEAD points at.
    ///
    /// # Errors
    /// Returns error if HEAD is unborn.
    pub fn head_commit(&self) -> Result<String> {
        let commit = self.inner.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    /// Check if a branch exists.
    #[must_use]
    pub fn branch_exists(&self, name: &str) -> bool {
        self.inner.find_branch(name, BranchType::Local).is_ok()
    }

    /// Resolve a revision to a full SHA, or `None` if it doesn't exist.
    ///
    /// # Errors
    /// Returns error if git cannot be spawned.
    pub fn rev_parse(&self, rev: &str) -> Result<Option<String>> {
        let output = self.run_raw(&["rev-parse", "--verify", "--quiet", rev], None)?;
        if output.status.success() {
            Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ))
        } else {
            Ok(None)
        }
    }

    /// Checkout a branch, carrying local changes along.
    ///
    /// # Errors
    /// Returns error if checkout fails.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", branch])?;
        Ok(())
    }

    /// Force-delete a local branch.
    ///
    /// # Errors
    /// Returns error if deletion fails.
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        self.run(&["branch", "-D", name])?;
        Ok(())
    }

    // === Working directory state ===

    /// Check if there are staged changes.
    ///
    /// # Errors
    /// Returns error if the diff check fails.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let args = ["diff", "--cached", "--quiet"];
        let output = self.run_raw(&args, None)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(command_error(&args, &output)),
        }
    }

    /// Check for work that isn't staged: modified tracked files or untracked files.
    ///
    /// # Errors
    /// Returns error if status fails.
    pub fn has_unstaged_changes(&self) -> Result<bool> {
        let status = self.run(&["status", "--porcelain"])?;
        Ok(status
            .lines()
            .any(|line| line.starts_with("??") || line.as_bytes().get(1).is_some_and(|c| *c != b' ')))
    }

    /// Unified diff of the staged changes with rename detection and three
    /// lines of context. Returned as bytes; file contents need not be UTF-8.
    ///
    /// # Errors
    /// Returns error if git diff fails.
    pub fn staged_diff(&self) -> Result<Vec<u8>> {
        self.run_bytes(&[
            "diff",
            "--cached",
            "--no-color",
            "--no-ext-diff",
            "-M",
            "--unified=3",
        ])
    }

    /// Paths with staged changes. A rename shows up as both its old and its
    /// new path.
    ///
    /// # Errors
    /// Returns error if git diff fails.
    pub fn staged_files(&self) -> Result<Vec<String>> {
        let output = self.run(&["diff", "--cached", "--name-only", "--no-renames"])?;
        Ok(output
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Stage `paths` exactly as they are in the working tree, deletions
    /// included.
    ///
    /// # Errors
    /// Returns error if git add fails.
    pub fn stage_paths(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "-A", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args)?;
        Ok(())
    }

    /// Unstage everything, keeping the working tree as it is.
    ///
    /// # Errors
    /// Returns error if the reset fails.
    pub fn unstage_all(&self) -> Result<()> {
        self.run(&["reset", "--quiet"])?;
        Ok(())
    }

    /// Create a commit from the index.
    ///
    /// # Errors
    /// Returns `EmptyCommitMessage` for a blank message, or the git error.
    pub fn commit(&self, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(Error::EmptyCommitMessage);
        }
        self.run(&["commit", "--quiet", "--no-verify", "-m", message])?;
        self.head_commit()
    }

    /// Move the current branch to `target`, resetting the index but keeping
    /// working tree edits.
    ///
    /// # Errors
    /// Returns error if the reset fails.
    pub fn reset_mixed(&self, target: &str) -> Result<()> {
        self.run(&["reset", "--mixed", "--quiet", target])?;
        Ok(())
    }

    // === Subprocess plumbing ===

    /// Run git, returning stdout. Non-zero exit becomes [`Error::Command`].
    pub(crate) fn run(&self, args: &[&str]) -> Result<String> {
        let stdout = self.run_bytes(args)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    /// Like [`Repository::run`], but stdout is returned undecoded.
    pub(crate) fn run_bytes(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = self.run_raw(args, None)?;
        if !output.status.success() {
            return Err(command_error(args, &output));
        }
        Ok(output.stdout)
    }

    /// Run git with `input` piped to stdin.
    pub(crate) fn run_with_stdin(&self, args: &[&str], input: &[u8]) -> Result<String> {
        let output = self.run_raw(args, Some(input))?;
        if !output.status.success() {
            return Err(command_error(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run git without interpreting the exit status.
    pub(crate) fn run_raw(&self, args: &[&str], input: Option<&[u8]>) -> Result<Output> {
        debug!(command = %args.join(" "), root = %self.root.display(), "running git");

        let mut command = self.command(args);
        let output = match input {
            None => command.stdin(Stdio::null()).output()?,
            Some(input) => {
                let mut child = command
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()?;
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(input)?;
                }
                child.wait_with_output()?
            }
        };

        if !output.status.success() {
            debug!(
                command = %args.join(" "),
                code = ?output.status.code(),
                "git exited unsuccessfully"
            );
        }
        Ok(output)
    }

    /// Build a git command rooted at the working tree.
    pub(crate) fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command.args(args).current_dir(&self.root);
        command
    }
}

/// Build an [`Error::Command`] carrying stderr verbatim.
pub(crate) fn command_error(args: &[&str], output: &Output) -> Error {
    let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
    Error::Command {
        command: args.join(" "),
        stderr,
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testutil::{commit_file, init_repo};
    use std::fs;

    #[test]
    fn test_open_outside_repository() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = Repository::open(temp.path()).unwrap_err();
        assert!(matches!(err, Error::NotARepository));
    }

    #[test]
    fn test_current_branch() {
        let (_temp, repo) = init_repo();
        assert_eq!(repo.current_branch().unwrap(), "main");
        assert!(!repo.head_detached().unwrap());
    }

    #[test]
    fn test_staged_and_unstaged_detection() {
        let (temp, repo) = init_repo();
        assert!(!repo.has_staged_changes().unwrap());
        assert!(!repo.has_unstaged_changes().unwrap());

        fs::write(temp.path().join("README.md"), "# changed\n").unwrap();
        assert!(repo.has_unstaged_changes().unwrap());
        assert!(!repo.has_staged_changes().unwrap());

        repo.run(&["add", "README.md"]).unwrap();
        assert!(repo.has_staged_changes().unwrap());
        assert!(!repo.has_unstaged_changes().unwrap());
        assert_eq!(repo.staged_files().unwrap(), vec!["README.md"]);

        fs::write(temp.path().join("scratch.txt"), "x").unwrap();
        assert!(repo.has_unstaged_changes().unwrap());
    }

    #[test]
    fn test_commit_rejects_empty_message() {
        let (_temp, repo) = init_repo();
        let err = repo.commit("   ").unwrap_err();
        assert!(matches!(err, Error::EmptyCommitMessage));
    }

    #[test]
    fn test_commit_and_rev_parse() {
        let (temp, repo) = init_repo();
        fs::write(temp.path().join("a.txt"), "a\n").unwrap();
        repo.run(&["add", "a.txt"]).unwrap();
        let sha = repo.commit("add a").unwrap();

        assert_eq!(repo.head_commit().unwrap(), sha);
        assert_eq!(repo.rev_parse("HEAD").unwrap(), Some(sha));
        assert_eq!(repo.rev_parse("refs/heads/nope").unwrap(), None);
    }

    #[test]
    fn test_command_error_carries_stderr() {
        let (_temp, repo) = init_repo();
        let err = repo.checkout("does-not-exist").unwrap_err();
        match err {
            Error::Command { command, stderr } => {
                assert_eq!(command, "checkout --quiet does-not-exist");
                assert!(stderr.contains("does-not-exist"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reset_mixed_keeps_worktree() {
        let (temp, repo) = init_repo();
        let base = repo.head_commit().unwrap();
        commit_file(&repo, "b.txt", "b\n", "add b");

        repo.reset_mixed(&base).unwrap();
        assert_eq!(repo.head_commit().unwrap(), base);
        assert!(temp.path().join("b.txt").exists());
    }
}
