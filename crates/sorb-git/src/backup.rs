//! Backup refs and stashes.
//!
//! Backups are plain refs under [`BACKUP_NAMESPACE`], outside the branch
//! namespace so they never show up in `git branch`.

use tracing::debug;

use crate::Repository;
use crate::error::Result;

/// Ref prefix for absorb backups.
pub const BACKUP_NAMESPACE: &str = "refs/sorb-backup/";

const BACKUP_PREFIX: &str = "absorb-";

/// A backup ref found in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRef {
    /// Full ref name, e.g. `refs/sorb-backup/absorb-1700000000`.
    pub name: String,
    /// Commit the ref points at.
    pub sha: String,
    /// Creation time in unix seconds, parsed from the ref name.
    pub timestamp: Option<i64>,
}

impl BackupRef {
    fn from_name(name: &str, sha: &str) -> Self {
        let timestamp = name
            .strip_prefix(BACKUP_NAMESPACE)
            .and_then(|rest| rest.strip_prefix(BACKUP_PREFIX))
            .and_then(|ts| ts.parse().ok());
        Self {
            name: name.to_string(),
            sha: sha.to_string(),
            timestamp,
        }
    }
}

/// Full backup ref name for a creation time.
#[must_use]
pub fn backup_ref_name(timestamp: i64) -> String {
    format!("{BACKUP_NAMESPACE}{BACKUP_PREFIX}{timestamp}")
}

impl Repository {
    /// Point a new backup ref at HEAD and return its full name.
    ///
    /// # Errors
    /// Returns error if HEAD is unborn or update-ref fails.
    pub fn create_backup_ref(&self, timestamp: i64) -> Result<String> {
        let name = backup_ref_name(timestamp);
        self.run(&["update-ref", &name, "HEAD"])?;
        debug!(backup = %name, "created backup ref");
        Ok(name)
    }

    /// All backup refs, oldest first.
    ///
    /// # Errors
    /// Returns error if for-each-ref fails.
    pub fn list_backup_refs(&self) -> Result<Vec<BackupRef>> {
        let output = self.run(&[
            "for-each-ref",
            "--format=%(refname) %(objectname)",
            BACKUP_NAMESPACE,
        ])?;

        let mut refs: Vec<BackupRef> = output
            .lines()
            .filter_map(|line| line.split_once(' '))
            .map(|(name, sha)| BackupRef::from_name(name, sha))
            .collect();
        refs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.name.cmp(&b.name)));
        Ok(refs)
    }

    /// Check if a ref exists.
    ///
    /// # Errors
    /// Returns error if git can't be run.
    pub fn ref_exists(&self, name: &str) -> Result<bool> {
        Ok(self.rev_parse(name)?.is_some())
    }

    /// Delete a ref.
    ///
    /// # Errors
    /// Returns error if update-ref fails.
    pub fn delete_ref(&self, name: &str) -> Result<()> {
        self.run(&["update-ref", "-d", name])?;
        debug!(reference = %name, "deleted ref");
        Ok(())
    }

    /// Stash local changes, including untracked files.
    ///
    /// With `keep_index`, staged changes stay in the index and working tree.
    /// Returns the stash commit, or `None` when there was nothing to stash.
    ///
    /// # Errors
    /// Returns error if the stash fails.
    pub fn stash_push(&self, message: &str, keep_index: bool) -> Result<Option<String>> {
        let before = self.rev_parse("refs/stash")?;

        let mut args = vec!["stash", "push", "--quiet", "--include-untracked"];
        if keep_index {
            args.push("--keep-index");
        }
        args.extend(["-m", message]);
        self.run(&args)?;

        let after = self.rev_parse("refs/stash")?;
        if after == before {
            return Ok(None);
        }
        debug!(stash = ?after, "stashed local changes");
        Ok(after)
    }

    /// Pop a specific stash by commit, falling back to `stash apply` if it is
    /// no longer on the stash list.
    ///
    /// With `restore_index`, staged changes come back staged.
    ///
    /// # Errors
    /// Returns error if the stash doesn't apply cleanly.
    pub fn stash_pop(&self, sha: &str, restore_index: bool) -> Result<()> {
        let list = self.run(&["stash", "list", "--format=%H"])?;
        let position = list.lines().position(|line| line.trim() == sha);

        let entry = position.map(|n| format!("stash@{{{n}}}"));
        let mut args = match &entry {
            Some(_) => vec!["stash", "pop", "--quiet"],
            None => vec!["stash", "apply", "--quiet"],
        };
        if restore_index {
            args.push("--index");
        }
        args.push(entry.as_deref().unwrap_or(sha));

        self.run(&args)?;
        debug!(stash = %sha, "restored stash");
        Ok(())
    }
}
