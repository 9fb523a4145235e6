//! # sorb-git
//!
//! Git plumbing for sorb, built on git2-rs and the `git` binary.
//! Provides staged-diff parsing, commit range resolution, fixup commit
//! synthesis, conflict prediction on a throwaway branch, and the backup
//! refs and stashes that make an absorb undoable.

mod backup;
mod commits;
mod diff;
mod error;
mod fixup;
mod predict;
mod repository;
pub mod traits;

pub use backup::{BACKUP_NAMESPACE, BackupRef, backup_ref_name};
pub use commits::CommitInfo;
pub use diff::{Hunk, parse_diff};
pub use error::{Error, Result};
pub use fixup::build_patch;
pub use git2::Oid;
pub use predict::{ConflictPrediction, DisposableBranch};
pub use repository::Repository;
pub use traits::GitOps;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testutil {
    use std::fs;
    use std::process::Command;

    use tempfile::TempDir;

    use crate::Repository;

    /// Run git in `dir`, panicking on failure.
    pub fn git(dir: &std::path::Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// A repository on `main` with one commit containing `README.md`.
    pub fn init_repo() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        git(dir, &["init", "--quiet", "--initial-branch=main"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
        fs::write(dir.join("README.md"), "# Test\n").unwrap();
        git(dir, &["add", "README.md"]);
        git(dir, &["commit", "--quiet", "-m", "Initial commit"]);

        let repo = Repository::open(dir).unwrap();
        (temp, repo)
    }

    /// Write, stage and commit a file, returning the new HEAD.
    pub fn commit_file(repo: &Repository, path: &str, content: &str, message: &str) -> String {
        let full = repo.root().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, content).unwrap();
        git(repo.root(), &["add", path]);
        git(repo.root(), &["commit", "--quiet", "-m", message]);
        repo.head_commit().unwrap()
    }
}
