//! Turning accepted assignments into fixup commits.
//!
//! [`apply_assignments`] does the git work for one response. [`execute`]
//! wraps it with the auto-stash of unstaged work, the backup ref and undo
//! record taken once the fixups exist, and the optional commit of leftover
//! hunks.

use std::collections::HashSet;

use sorb_git::{CommitInfo, GitOps, Hunk, Oid};
use sorb_oracle::AbsorbResponse;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::traits::StateStore;
use crate::undo;

/// Stash message for unstaged work parked during an absorb.
pub const AUTO_STASH_MESSAGE: &str = "sorb absorb auto-stash";

/// A fixup commit that was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixupRecord {
    /// Commit the fixup targets.
    pub target: String,
    /// The new `fixup!` commit.
    pub commit: Oid,
    /// Number of hunks it carries.
    pub hunks: usize,
}

/// A target whose fixup could not be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTarget {
    /// Commit that was targeted.
    pub target: String,
    /// Why it failed.
    pub error: String,
}

/// What [`apply_assignments`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Fixups in creation order.
    pub fixups: Vec<FixupRecord>,
    /// Targets that failed; their hunks were re-staged.
    pub failed: Vec<FailedTarget>,
    /// Hunks put back into the index (unmatched plus failed targets).
    pub restaged: usize,
    /// Staged files with no text hunks (binary files, pure renames, mode
    /// changes). They are staged again as they were.
    pub restaged_paths: Vec<String>,
    /// Set when re-staging failed; those hunks remain only in the
    /// auto-stash or the backup.
    pub restage_warning: Option<String>,
}

impl ApplyReport {
    /// Whether any fixup was created.
    #[must_use]
    pub fn changed_history(&self) -> bool {
        !self.fixups.is_empty()
    }
}

/// Create one fixup commit per distinct target of `response`.
///
/// The index is cleared first. Targets are processed in the order they
/// first appear; a failed target doesn't stop the others. Afterwards the
/// unmatched hunks, those of failed targets, and staged files that had no
/// hunks at all are staged again.
///
/// # Errors
/// Returns error only if the staged paths can't be listed or the index
/// can't be cleared. Per-target and re-staging failures are reported in
/// the [`ApplyReport`].
#[instrument(skip_all, fields(
    assignments = response.assignments.len(),
    unmatched = response.unmatched.len()
))]
pub fn apply_assignments<G: GitOps>(git: &G, response: &AbsorbResponse) -> Result<ApplyReport> {
    let covered: HashSet<&str> = response
        .assignments
        .iter()
        .map(|a| &a.hunk)
        .chain(&response.unmatched)
        .flat_map(|h| [h.file_path.as_str(), h.old_path.as_str()])
        .collect();
    let hunkless: Vec<String> = git
        .staged_files()?
        .into_iter()
        .filter(|path| !covered.contains(path.as_str()))
        .collect();

    git.unstage_all()?;

    let mut report = ApplyReport::default();
    let mut leftover: Vec<Hunk> = response.unmatched.clone();

    for target in response.targets() {
        let hunks = response.hunks_for(target);
        match git.apply_as_fixup(&hunks, target) {
            Ok(commit) => {
                debug!(target, %commit, hunks = hunks.len(), "fixup created");
                report.fixups.push(FixupRecord {
                    target: target.to_string(),
                    commit,
                    hunks: hunks.len(),
                });
            }
            Err(e) => {
                warn!(target, error = %e, "fixup failed");
                report.failed.push(FailedTarget {
                    target: target.to_string(),
                    error: e.to_string(),
                });
                leftover.extend(hunks);
            }
        }
    }

    if !leftover.is_empty() {
        report.restaged = leftover.len();
        if let Err(e) = git.apply_hunks(&leftover) {
            warn!(error = %e, "re-staging leftover hunks failed");
            report.restage_warning = Some(e.to_string());
        }
    }

    if !hunkless.is_empty() {
        debug!(paths = ?hunkless, "re-staging files without hunks");
        match git.stage_paths(&hunkless) {
            Ok(()) => report.restaged_paths = hunkless,
            Err(e) => {
                warn!(error = %e, "re-staging files without hunks failed");
                let message = format!("{}: {e}", hunkless.join(", "));
                report.restage_warning = Some(match report.restage_warning.take() {
                    Some(previous) => format!("{previous}; {message}"),
                    None => message,
                });
            }
        }
    }

    Ok(report)
}

/// Options for [`execute`].
#[derive(Debug, Clone, Default)]
pub struct AbsorbOptions {
    /// Commit the leftover staged hunks with this message.
    pub message: Option<String>,
    /// Current time, unix seconds. Names the backup ref.
    pub now: i64,
}

/// What [`execute`] did.
#[derive(Debug, Clone, Default)]
pub struct AbsorbOutcome {
    /// The fixup stage.
    pub report: ApplyReport,
    /// Backup ref for `sorb undo`. `None` when nothing changed and the
    /// backup was dropped.
    pub backup_ref: Option<String>,
    /// Regular commit made from leftover hunks.
    pub new_commit: Option<String>,
    /// Auto-stash that could not be popped; `sorb undo` reapplies it.
    pub stash_left: Option<String>,
    /// Advisory problems.
    pub warnings: Vec<String>,
}

/// Run a full absorb of `response`.
///
/// Unstaged work is stashed, the fixups are created, and then the backup
/// ref is pointed at the post-fixup HEAD. `sorb undo` therefore reverses
/// the leftover commit and any later autosquash, not the fixups.
///
/// # Errors
/// Returns `EmptyCommitMessage` before touching anything if `message` is
/// blank, or an error from clearing the index or creating the backup. The
/// auto-stash is popped again before such an error is returned.
#[instrument(skip_all, fields(targets = response.targets().len()))]
pub fn execute<G: GitOps, S: StateStore>(
    git: &G,
    store: &S,
    response: &AbsorbResponse,
    options: &AbsorbOptions,
) -> Result<AbsorbOutcome> {
    if options.message.as_deref().is_some_and(|m| m.trim().is_empty()) {
        return Err(sorb_git::Error::EmptyCommitMessage.into());
    }

    let stash = if git.has_unstaged_changes()? {
        let stash = git.stash_push(AUTO_STASH_MESSAGE, true)?;
        if let Some(sha) = &stash {
            debug!(stash = %sha, "parked unstaged work");
        }
        stash
    } else {
        None
    };

    let report = match apply_assignments(git, response) {
        Ok(report) => report,
        Err(e) => {
            restore_stash(git, stash.as_deref());
            return Err(e);
        }
    };

    let backup = undo::create_backup(git, options.now).and_then(|pending| pending.activate(store));
    let mut record = match backup {
        Ok(record) => record,
        Err(e) => {
            restore_stash(git, stash.as_deref());
            return Err(e);
        }
    };
    record.stash_sha.clone_from(&stash);
    let mut outcome = AbsorbOutcome {
        report,
        backup_ref: Some(record.backup_ref.clone()),
        ..AbsorbOutcome::default()
    };

    for fixup in &outcome.report.fixups {
        record.operations.push(format!(
            "fixup {} -> {} ({} hunks)",
            fixup.commit,
            fixup.target,
            fixup.hunks
        ));
    }
    store.save_absorb_state(&record)?;
    if let Some(warning) = &outcome.report.restage_warning {
        outcome
            .warnings
            .push(format!("could not re-stage leftover hunks: {warning}"));
    }

    if let Some(message) = &options.message {
        if git.has_staged_changes()? {
            match git.commit(message) {
                Ok(sha) => {
                    record.operations.push(format!("commit {sha}"));
                    outcome.new_commit = Some(sha);
                }
                Err(e) => outcome
                    .warnings
                    .push(format!("could not commit leftover hunks: {e}")),
            }
        }
    }

    if let Some(sha) = stash {
        match git.stash_pop(&sha, false) {
            Ok(()) => record.stash_sha = None,
            Err(e) => {
                warn!(stash = %sha, error = %e, "auto-stash pop failed");
                outcome.warnings.push(format!(
                    "could not restore unstaged changes (stash {sha}): {e}"
                ));
                outcome.stash_left = Some(sha);
            }
        }
    }

    let changed = outcome.report.changed_history() || outcome.new_commit.is_some();
    if changed || record.stash_sha.is_some() {
        store.save_absorb_state(&record)?;
    } else {
        debug!("nothing absorbed, dropping backup");
        if let Err(e) = store.clear_absorb_state() {
            outcome.warnings.push(format!("could not clear undo record: {e}"));
        }
        if let Err(e) = git.delete_ref(&record.backup_ref) {
            outcome
                .warnings
                .push(format!("could not delete {}: {e}", record.backup_ref));
        }
        outcome.backup_ref = None;
    }

    Ok(outcome)
}

/// Best-effort pop of the auto-stash when `execute` bails out.
fn restore_stash<G: GitOps>(git: &G, stash: Option<&str>) {
    if let Some(sha) = stash {
        if let Err(e) = git.stash_pop(sha, false) {
            warn!(stash = %sha, error = %e, "could not restore auto-stash");
        }
    }
}

/// Targets of `response` that name a full commit id, for conflict
/// prediction. Unresolved ids are skipped.
#[must_use]
pub fn conflict_candidates(response: &AbsorbResponse) -> Vec<Oid> {
    response
        .targets()
        .into_iter()
        .filter(|t| t.len() == 40)
        .filter_map(|t| Oid::from_str(t).ok())
        .collect()
}

/// Base for the autosquash rebase after fixups for `targets`.
///
/// The oldest target is picked by its position in `candidates` (oldest
/// first). Returns its parent, or `None` to rebase from the root.
///
/// # Errors
/// Returns error if the parent lookup fails.
pub fn autosquash_base<G: GitOps>(
    git: &G,
    targets: &[&str],
    candidates: &[CommitInfo],
) -> Result<Option<String>> {
    let oldest = candidates
        .iter()
        .find(|c| targets.contains(&c.sha.as_str()))
        .map(|c| c.sha.as_str())
        .or_else(|| targets.first().copied());

    match oldest {
        Some(sha) => Ok(git.parent_of(sha)?),
        None => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::State;
    use crate::testutil::{commit_file, git, init_repo};
    use sorb_git::Repository;
    use sorb_oracle::HunkAssignment;
    use std::fs;

    fn assign(hunk: &Hunk, target: &str) -> HunkAssignment {
        HunkAssignment {
            hunk: hunk.clone(),
            commit_sha: target.to_string(),
            commit_message: String::new(),
            confidence: 0.9,
            reasoning: String::new(),
            alternatives: vec![],
        }
    }

    /// C1 adds a.txt, C2 adds c.txt; then a.txt grows two lines and b.txt
    /// appears, both staged.
    fn two_file_scenario() -> (tempfile::TempDir, Repository, String, String) {
        let (temp, repo) = init_repo();
        let c1 = commit_file(&repo, "a.txt", "one\ntwo\n", "fix a");
        let c2 = commit_file(&repo, "c.txt", "c\n", "add b");
        fs::write(repo.root().join("a.txt"), "one\ntwo\nthree\nfour\n").unwrap();
        fs::write(repo.root().join("b.txt"), "bee\n").unwrap();
        git(repo.root(), &["add", "a.txt", "b.txt"]);
        (temp, repo, c1, c2)
    }

    fn fixup_subjects(repo: &Repository, count: usize) -> Vec<String> {
        let range = format!("-{count}");
        git(repo.root(), &["log", &range, "--format=%s"])
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_two_file_scenario_creates_two_fixups() {
        let (_temp, repo, c1, c2) = two_file_scenario();
        let hunks = repo.staged_hunks().unwrap();
        assert_eq!(hunks.len(), 2);

        let a = hunks.iter().find(|h| h.file_path == "a.txt").unwrap();
        let b = hunks.iter().find(|h| h.file_path == "b.txt").unwrap();
        let response = AbsorbResponse {
            assignments: vec![assign(a, &c1), assign(b, &c2)],
            ..AbsorbResponse::default()
        };

        let report = apply_assignments(&repo, &response).unwrap();
        assert_eq!(report.fixups.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(report.restaged, 0);
        assert!(!repo.has_staged_changes().unwrap());
        assert!(!repo.has_unstaged_changes().unwrap());
        assert_eq!(
            fixup_subjects(&repo, 2),
            vec!["fixup! add b", "fixup! fix a"]
        );
        assert_eq!(report.fixups[0].target, c1);
        let first_fixup = repo.parent_of(&repo.head_commit().unwrap()).unwrap();
        assert_eq!(Some(report.fixups[0].commit.to_string()), first_fixup);
    }

    #[test]
    fn test_unmatched_hunks_are_restaged() {
        let (_temp, repo, c1, _c2) = two_file_scenario();
        let hunks = repo.staged_hunks().unwrap();
        let a = hunks.iter().find(|h| h.file_path == "a.txt").unwrap();
        let b = hunks.iter().find(|h| h.file_path == "b.txt").unwrap();
        let response = AbsorbResponse {
            assignments: vec![assign(a, &c1)],
            unmatched: vec![b.clone()],
            model: None,
        };

        let report = apply_assignments(&repo, &response).unwrap();
        assert_eq!(report.fixups.len(), 1);
        assert_eq!(report.restaged, 1);
        assert!(report.restage_warning.is_none());
        assert_eq!(repo.staged_files().unwrap(), vec!["b.txt"]);
    }

    #[test]
    fn test_failed_target_continues_and_restages() {
        let (_temp, repo, _c1, c2) = two_file_scenario();
        let hunks = repo.staged_hunks().unwrap();
        let a = hunks.iter().find(|h| h.file_path == "a.txt").unwrap();
        let b = hunks.iter().find(|h| h.file_path == "b.txt").unwrap();
        let bogus = "0123456789abcdef0123456789abcdef01234567";
        let response = AbsorbResponse {
            assignments: vec![assign(a, bogus), assign(b, &c2)],
            ..AbsorbResponse::default()
        };

        let report = apply_assignments(&repo, &response).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].target, bogus);
        assert_eq!(report.fixups.len(), 1);
        assert_eq!(report.fixups[0].target, c2);
        assert_eq!(report.restaged, 1);
        assert_eq!(repo.staged_files().unwrap(), vec!["a.txt"]);
        assert_eq!(
            fs::read_to_string(repo.root().join("a.txt")).unwrap(),
            "one\ntwo\nthree\nfour\n"
        );
    }

    #[test]
    fn test_binary_file_is_restaged() {
        let (_temp, repo, c1, _c2) = two_file_scenario();
        fs::write(repo.root().join("logo.bin"), [0u8, 159, 146, 150, 0, 1]).unwrap();
        git(repo.root(), &["add", "logo.bin"]);

        let hunks = repo.staged_hunks().unwrap();
        assert_eq!(hunks.len(), 2);
        let a = hunks.iter().find(|h| h.file_path == "a.txt").unwrap();
        let b = hunks.iter().find(|h| h.file_path == "b.txt").unwrap();
        let response = AbsorbResponse {
            assignments: vec![assign(a, &c1)],
            unmatched: vec![b.clone()],
            model: None,
        };

        let report = apply_assignments(&repo, &response).unwrap();
        assert_eq!(report.fixups.len(), 1);
        assert_eq!(report.restaged_paths, vec!["logo.bin"]);
        assert!(report.restage_warning.is_none());
        assert_eq!(repo.staged_files().unwrap(), vec!["b.txt", "logo.bin"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_change_is_restaged() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, repo, c1, _c2) = two_file_scenario();
        let script = repo.root().join("c.txt");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        git(repo.root(), &["add", "c.txt"]);

        let hunks = repo.staged_hunks().unwrap();
        let response = AbsorbResponse {
            assignments: hunks.iter().map(|h| assign(h, &c1)).collect(),
            ..AbsorbResponse::default()
        };

        let report = apply_assignments(&repo, &response).unwrap();
        assert_eq!(report.restaged_paths, vec!["c.txt"]);
        let summary = git(repo.root(), &["diff", "--cached", "--summary"]);
        assert!(summary.contains("mode change 100644 => 100755 c.txt"), "{summary}");
    }

    #[test]
    fn test_execute_keeps_unstaged_work_and_records_undo() {
        let (_temp, repo, c1, c2) = two_file_scenario();
        fs::write(repo.root().join("c.txt"), "c\nlocal edit\n").unwrap();
        fs::write(repo.root().join("scratch.txt"), "notes\n").unwrap();

        let hunks = repo.staged_hunks().unwrap();
        let response = AbsorbResponse {
            assignments: vec![
                assign(&hunks[0], if hunks[0].file_path == "a.txt" { &c1 } else { &c2 }),
                assign(&hunks[1], if hunks[1].file_path == "a.txt" { &c1 } else { &c2 }),
            ],
            ..AbsorbResponse::default()
        };

        let store = State::new(repo.git_dir());
        let outcome = execute(
            &repo,
            &store,
            &response,
            &AbsorbOptions {
                message: None,
                now: 1_700_000_000,
            },
        )
        .unwrap();

        assert_eq!(outcome.report.fixups.len(), 2);
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert!(outcome.stash_left.is_none());
        assert_eq!(
            outcome.backup_ref.as_deref(),
            Some("refs/sorb-backup/absorb-1700000000")
        );
        assert_eq!(
            fs::read_to_string(repo.root().join("c.txt")).unwrap(),
            "c\nlocal edit\n"
        );
        assert!(repo.root().join("scratch.txt").exists());
        assert!(!repo.has_staged_changes().unwrap());

        let record = store.load_absorb_state().unwrap();
        assert_eq!(record.original_head, repo.head_commit().unwrap());
        assert_eq!(record.current_branch, "main");
        assert_eq!(record.stash_sha, None);
        assert_eq!(record.operations.len(), 2);
        assert!(record.operations[0].starts_with("fixup "));
    }

    #[test]
    fn test_execute_commits_leftovers_with_message() {
        let (_temp, repo, c1, _c2) = two_file_scenario();
        let hunks = repo.staged_hunks().unwrap();
        let a = hunks.iter().find(|h| h.file_path == "a.txt").unwrap();
        let b = hunks.iter().find(|h| h.file_path == "b.txt").unwrap();
        let response = AbsorbResponse {
            assignments: vec![assign(a, &c1)],
            unmatched: vec![b.clone()],
            model: None,
        };

        let store = State::new(repo.git_dir());
        let outcome = execute(
            &repo,
            &store,
            &response,
            &AbsorbOptions {
                message: Some("add bee".to_string()),
                now: 1_700_000_000,
            },
        )
        .unwrap();

        assert!(outcome.new_commit.is_some());
        assert_eq!(fixup_subjects(&repo, 2), vec!["add bee", "fixup! fix a"]);
        assert!(!repo.has_staged_changes().unwrap());
        let record = store.load_absorb_state().unwrap();
        assert!(record.operations[1].starts_with("commit "));
    }

    #[test]
    fn test_backup_captures_post_fixup_head() {
        let (_temp, repo, c1, _c2) = two_file_scenario();
        let before = repo.head_commit().unwrap();
        let hunks = repo.staged_hunks().unwrap();
        let a = hunks.iter().find(|h| h.file_path == "a.txt").unwrap();
        let b = hunks.iter().find(|h| h.file_path == "b.txt").unwrap();
        let response = AbsorbResponse {
            assignments: vec![assign(a, &c1)],
            unmatched: vec![b.clone()],
            model: None,
        };

        let store = State::new(repo.git_dir());
        let outcome = execute(
            &repo,
            &store,
            &response,
            &AbsorbOptions {
                message: Some("add bee".to_string()),
                now: 1_700_000_000,
            },
        )
        .unwrap();

        let fixup = outcome.report.fixups[0].commit.to_string();
        let backup = outcome.backup_ref.unwrap();
        let backup_sha = git(repo.root(), &["rev-parse", &backup]).trim().to_string();
        assert_ne!(backup_sha, before);
        assert_eq!(backup_sha, fixup);
        assert_eq!(store.load_absorb_state().unwrap().original_head, fixup);

        // Undo drops the leftover commit but keeps the fixup.
        crate::undo::undo(&repo, &store).unwrap();
        assert_eq!(repo.head_commit().unwrap(), fixup);
        assert_eq!(fixup_subjects(&repo, 1), vec!["fixup! fix a"]);
        assert!(repo.root().join("b.txt").exists());
    }

    #[test]
    fn test_execute_rejects_blank_message_before_changes() {
        let (_temp, repo, c1, _c2) = two_file_scenario();
        let hunks = repo.staged_hunks().unwrap();
        let response = AbsorbResponse {
            assignments: vec![assign(&hunks[0], &c1)],
            ..AbsorbResponse::default()
        };
        let head = repo.head_commit().unwrap();

        let store = State::new(repo.git_dir());
        let err = execute(
            &repo,
            &store,
            &response,
            &AbsorbOptions {
                message: Some("  ".to_string()),
                now: 1,
            },
        )
        .unwrap_err();

        assert!(matches!(
            err,
            crate::Error::Git(sorb_git::Error::EmptyCommitMessage)
        ));
        assert_eq!(repo.head_commit().unwrap(), head);
        assert!(!store.has_absorb_state());
        assert!(repo.list_backup_refs().unwrap().is_empty());
        assert_eq!(repo.staged_files().unwrap().len(), 2);
    }

    #[test]
    fn test_execute_without_changes_drops_backup() {
        let (_temp, repo, _c1, _c2) = two_file_scenario();
        let hunks = repo.staged_hunks().unwrap();
        let response = AbsorbResponse {
            unmatched: hunks,
            ..AbsorbResponse::default()
        };

        let store = State::new(repo.git_dir());
        let outcome = execute(
            &repo,
            &store,
            &response,
            &AbsorbOptions {
                message: None,
                now: 42,
            },
        )
        .unwrap();

        assert!(outcome.backup_ref.is_none());
        assert!(!store.has_absorb_state());
        assert!(repo.list_backup_refs().unwrap().is_empty());
        assert_eq!(repo.staged_files().unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_conflict_candidates_skip_unresolved() {
        let full = "0123456789abcdef0123456789abcdef01234567";
        let response = AbsorbResponse {
            assignments: vec![
                assign(&Hunk::default(), full),
                assign(&Hunk::default(), "abc1234"),
                assign(&Hunk::default(), full),
            ],
            ..AbsorbResponse::default()
        };
        let candidates = conflict_candidates(&response);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].to_string(), full);
    }

    #[test]
    fn test_autosquash_base_uses_oldest_target() {
        let (_temp, repo, c1, c2) = two_file_scenario();
        let candidates = repo.commits_from_branch_point().unwrap();

        let base = autosquash_base(&repo, &[c2.as_str(), c1.as_str()], &candidates).unwrap();
        assert_eq!(base, repo.parent_of(&c1).unwrap());

        let root = repo.commits_at_depth(3).unwrap()[0].sha.clone();
        let base = autosquash_base(&repo, &[root.as_str()], &candidates).unwrap();
        assert_eq!(base, None);
    }
}
