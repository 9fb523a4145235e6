//! Backups and undo.
//!
//! A backup moves through three states:
//!
//! - no backup: no undo record exists;
//! - pending: [`create_backup`] has pointed a backup ref at HEAD but no
//!   record names it yet ([`PendingBackup`]);
//! - active: [`PendingBackup::activate`] saved the record. [`undo`] returns
//!   to the first state.
//!
//! Only one record exists at a time. Activating a new backup replaces the
//! previous record; the older ref stays until `cleanup_backups`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sorb_git::{GitOps, backup_ref_name};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::state::AbsorbState;
use crate::traits::StateStore;

/// A backup ref that no record names yet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending backup is not undoable until activated"]
pub struct PendingBackup {
    /// Full ref name.
    pub backup_ref: String,
    /// Commit the ref points at.
    pub original_head: String,
    /// Branch checked out when the backup was taken.
    pub current_branch: String,
    /// Creation time, unix seconds.
    pub timestamp: i64,
}

impl PendingBackup {
    /// Save the undo record for this backup, replacing any previous one.
    ///
    /// # Errors
    /// Returns error if the record can't be written.
    pub fn activate<S: StateStore>(self, store: &S) -> Result<AbsorbState> {
        let record = AbsorbState {
            original_head: self.original_head,
            backup_ref: self.backup_ref,
            current_branch: self.current_branch,
            timestamp: self.timestamp,
            stash_sha: None,
            operations: Vec::new(),
        };
        store.save_absorb_state(&record)?;
        debug!(backup = %record.backup_ref, "undo record saved");
        Ok(record)
    }
}

/// Point a new backup ref at HEAD.
///
/// The ref is named after `now`; if that name is taken the next free second
/// is used.
///
/// # Errors
/// Returns `DetachedHead` when no branch is checked out, or a git error.
pub fn create_backup<G: GitOps>(git: &G, now: i64) -> Result<PendingBackup> {
    let current_branch = git.current_branch()?;
    let original_head = git.head_commit()?;

    let mut timestamp = now;
    while git.ref_exists(&backup_ref_name(timestamp))? {
        timestamp += 1;
    }
    let backup_ref = git.create_backup_ref(timestamp)?;

    Ok(PendingBackup {
        backup_ref,
        original_head,
        current_branch,
        timestamp,
    })
}

/// The active undo record, if any.
///
/// # Errors
/// Returns error if a record exists but can't be read.
pub fn active_backup<S: StateStore>(store: &S) -> Result<Option<AbsorbState>> {
    match store.load_absorb_state() {
        Ok(record) => Ok(Some(record)),
        Err(Error::NothingToUndo) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Outcome of [`undo`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoReport {
    /// Branch that was restored.
    pub branch: String,
    /// Commit the branch was reset to.
    pub restored_to: String,
    /// Whether a recorded auto-stash was reapplied.
    pub stash_restored: bool,
    /// Advisory problems from the cleanup steps.
    pub warnings: Vec<String>,
}

/// Rewind the last absorb.
///
/// Checks out the recorded branch and resets it (mixed) to the backup.
/// Reapplying the stash, deleting the backup ref and deleting the record
/// always all run; their failures become warnings.
///
/// # Errors
/// Returns `NothingToUndo` without a record. A failed checkout or reset
/// returns the error and leaves the record in place for another try.
#[instrument(skip_all)]
pub fn undo<G: GitOps, S: StateStore>(git: &G, store: &S) -> Result<UndoReport> {
    let record = store.load_absorb_state()?;
    let mut report = UndoReport {
        branch: record.current_branch.clone(),
        ..UndoReport::default()
    };

    git.checkout(&record.current_branch)?;

    let backup_present = git.ref_exists(&record.backup_ref)?;
    let target = if backup_present {
        record.backup_ref.as_str()
    } else {
        report.warnings.push(format!(
            "backup ref {} is missing, resetting to {}",
            record.backup_ref, record.original_head
        ));
        record.original_head.as_str()
    };
    git.reset_mixed(target)?;
    report.restored_to.clone_from(&record.original_head);

    if let Some(stash) = &record.stash_sha {
        match git.stash_pop(stash, false) {
            Ok(()) => report.stash_restored = true,
            Err(e) => {
                warn!(stash = %stash, error = %e, "could not reapply auto-stash");
                report.warnings.push(format!(
                    "could not restore stashed changes: {e} (try `git stash apply {stash}`)"
                ));
            }
        }
    }

    if backup_present {
        if let Err(e) = git.delete_ref(&record.backup_ref) {
            warn!(backup = %record.backup_ref, error = %e, "could not delete backup ref");
            report
                .warnings
                .push(format!("could not delete {}: {e}", record.backup_ref));
        }
    }

    if let Err(e) = store.clear_absorb_state() {
        warn!(error = %e, "could not delete undo record");
        report
            .warnings
            .push(format!("could not delete undo record: {e}"));
    }

    Ok(report)
}

/// A backup ref as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    /// Full ref name.
    pub name: String,
    /// Commit it points at.
    pub sha: String,
    /// Creation time from the ref name.
    pub created: Option<DateTime<Utc>>,
    /// Whether the undo record names this ref.
    pub active: bool,
}

/// All backup refs, oldest first.
///
/// # Errors
/// Returns error if refs can't be listed or the undo record can't be read.
pub fn list_backups<G: GitOps, S: StateStore>(git: &G, store: &S) -> Result<Vec<BackupEntry>> {
    let active = active_backup(store)?.map(|record| record.backup_ref);
    let entries = git
        .list_backup_refs()?
        .into_iter()
        .map(|backup| BackupEntry {
            active: active.as_deref() == Some(backup.name.as_str()),
            created: backup
                .timestamp
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            name: backup.name,
            sha: backup.sha,
        })
        .collect();
    Ok(entries)
}

/// Outcome of [`cleanup_backups`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Refs that were deleted.
    pub deleted: Vec<String>,
    /// The active backup, left alone.
    pub kept: Option<String>,
    /// Refs that could not be deleted.
    pub warnings: Vec<String>,
}

/// Delete every backup ref except the active one.
///
/// # Errors
/// Returns error if refs can't be listed or the undo record can't be read.
#[instrument(skip_all)]
pub fn cleanup_backups<G: GitOps, S: StateStore>(git: &G, store: &S) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();
    for entry in list_backups(git, store)? {
        if entry.active {
            report.kept = Some(entry.name);
            continue;
        }
        match git.delete_ref(&entry.name) {
            Ok(()) => report.deleted.push(entry.name),
            Err(e) => {
                warn!(backup = %entry.name, error = %e, "could not delete backup ref");
                report
                    .warnings
                    .push(format!("could not delete {}: {e}", entry.name));
            }
        }
    }
    Ok(report)
}
