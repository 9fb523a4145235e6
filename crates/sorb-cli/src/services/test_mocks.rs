//! Mock implementations for testing services.
//!
//! These mocks implement the traits from sorb-git and sorb-core
//! to enable unit testing of service logic without real git repos.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use sorb_core::config::Config;
use sorb_core::state::AbsorbState;
use sorb_core::{Error as CoreError, Result as CoreResult, StateStore};
use sorb_git::{
    BackupRef, CommitInfo, ConflictPrediction, Error as GitError, GitOps, Hunk, Oid,
    Result as GitResult, backup_ref_name,
};

pub fn commit(sha: &str, message: &str) -> CommitInfo {
    CommitInfo {
        sha: sha.to_string(),
        message: message.to_string(),
        diff: String::new(),
    }
}

fn command_failed(command: &str) -> GitError {
    GitError::Command {
        command: command.to_string(),
        stderr: "mock failure".to_string(),
    }
}

/// Mock implementation of `GitOps` for testing.
pub struct MockGitOps {
    pub root: PathBuf,
    pub current_branch: RefCell<Option<String>>,
    pub head: RefCell<String>,
    pub is_rebasing: RefCell<bool>,
    pub has_staged_changes: RefCell<bool>,
    pub has_unstaged_changes: RefCell<bool>,
    pub hunks: RefCell<Vec<Hunk>>,
    /// Staged paths that have no text hunks.
    pub hunkless_paths: RefCell<Vec<String>>,
    pub history: RefCell<Vec<CommitInfo>>,
    pub branch_point_history: RefCell<Option<Vec<CommitInfo>>>,
    pub parents: RefCell<HashMap<String, Option<String>>>,
    pub refs: RefCell<BTreeMap<String, String>>,
    pub failing_targets: RefCell<HashSet<String>>,
    pub prediction: RefCell<ConflictPrediction>,
    /// Every mutating call, in order.
    pub calls: RefCell<Vec<String>>,
}

impl Default for MockGitOps {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGitOps {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/mock/repo"),
            current_branch: RefCell::new(Some("main".to_string())),
            head: RefCell::new("f".repeat(40)),
            is_rebasing: RefCell::new(false),
            has_staged_changes: RefCell::new(false),
            has_unstaged_changes: RefCell::new(false),
            hunks: RefCell::new(Vec::new()),
            hunkless_paths: RefCell::new(Vec::new()),
            history: RefCell::new(Vec::new()),
            branch_point_history: RefCell::new(None),
            parents: RefCell::new(HashMap::new()),
            refs: RefCell::new(BTreeMap::new()),
            failing_targets: RefCell::new(HashSet::new()),
            prediction: RefCell::new(ConflictPrediction::default()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_hunkless_path(self, path: &str) -> Self {
        self.hunkless_paths.borrow_mut().push(path.to_string());
        self
    }

    pub fn with_staged_changes(self, has_staged: bool) -> Self {
        *self.has_staged_changes.borrow_mut() = has_staged;
        self
    }

    pub fn with_unstaged_changes(self, has_unstaged: bool) -> Self {
        *self.has_unstaged_changes.borrow_mut() = has_unstaged;
        self
    }

    pub fn with_detached_head(self) -> Self {
        *self.current_branch.borrow_mut() = None;
        self
    }

    pub fn with_rebase_in_progress(self) -> Self {
        *self.is_rebasing.borrow_mut() = true;
        self
    }

    /// History oldest first; each commit's parent is the one before it.
    pub fn with_history(self, commits: Vec<CommitInfo>) -> Self {
        {
            let mut parents = self.parents.borrow_mut();
            let mut previous = None;
            for c in &commits {
                parents.insert(c.sha.clone(), previous.clone());
                previous = Some(c.sha.clone());
            }
        }
        *self.history.borrow_mut() = commits;
        self
    }

    /// Commits since the branch point, when it differs from the full history.
    pub fn with_branch_point_history(self, commits: Vec<CommitInfo>) -> Self {
        *self.branch_point_history.borrow_mut() = Some(commits);
        self
    }

    pub fn with_failing_target(self, sha: &str) -> Self {
        self.failing_targets.borrow_mut().insert(sha.to_string());
        self
    }

    pub fn with_prediction(self, prediction: ConflictPrediction) -> Self {
        *self.prediction.borrow_mut() = prediction;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl GitOps for MockGitOps {
    fn root(&self) -> &Path {
        &self.root
    }

    fn git_dir(&self) -> &Path {
        &self.root
    }

    fn current_branch(&self) -> GitResult<String> {
        self.current_branch
            .borrow()
            .clone()
            .ok_or(GitError::DetachedHead)
    }

    fn head_commit(&self) -> GitResult<String> {
        Ok(self.head.borrow().clone())
    }

    fn is_rebasing(&self) -> bool {
        *self.is_rebasing.borrow()
    }

    fn parent_of(&self, sha: &str) -> GitResult<Option<String>> {
        self.parents
            .borrow()
            .get(sha)
            .cloned()
            .ok_or_else(|| command_failed("rev-parse"))
    }

    fn has_staged_changes(&self) -> GitResult<bool> {
        Ok(*self.has_staged_changes.borrow())
    }

    fn has_unstaged_changes(&self) -> GitResult<bool> {
        Ok(*self.has_unstaged_changes.borrow())
    }

    fn staged_hunks(&self) -> GitResult<Vec<Hunk>> {
        Ok(self.hunks.borrow().clone())
    }

    fn staged_files(&self) -> GitResult<Vec<String>> {
        let mut paths: Vec<String> = self
            .hunks
            .borrow()
            .iter()
            .map(|h| h.file_path.clone())
            .collect();
        paths.extend(self.hunkless_paths.borrow().iter().cloned());
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    fn stage_paths(&self, paths: &[String]) -> GitResult<()> {
        self.record(format!("stage {}", paths.join(",")));
        Ok(())
    }

    fn unstage_all(&self) -> GitResult<()> {
        self.record("unstage_all");
        *self.has_staged_changes.borrow_mut() = false;
        Ok(())
    }

    fn checkout(&self, branch: &str) -> GitResult<()> {
        self.record(format!("checkout {branch}"));
        *self.current_branch.borrow_mut() = Some(branch.to_string());
        Ok(())
    }

    fn reset_mixed(&self, target: &str) -> GitResult<()> {
        self.record(format!("reset {target}"));
        Ok(())
    }

    fn commit(&self, message: &str) -> GitResult<String> {
        self.record(format!("commit {message}"));
        *self.has_staged_changes.borrow_mut() = false;
        Ok("c".repeat(40))
    }

    fn unpushed_commits(&self) -> GitResult<Vec<CommitInfo>> {
        Ok(self.history.borrow().clone())
    }

    fn commits_from_branch_point(&self) -> GitResult<Vec<CommitInfo>> {
        Ok(self
            .branch_point_history
            .borrow()
            .clone()
            .unwrap_or_else(|| self.history.borrow().clone()))
    }

    fn commits_at_depth(&self, depth: usize) -> GitResult<Vec<CommitInfo>> {
        let history = self.history.borrow();
        let skip = history.len().saturating_sub(depth);
        Ok(history[skip..].to_vec())
    }

    fn apply_hunks(&self, hunks: &[Hunk]) -> GitResult<()> {
        self.record(format!("apply {}", hunks.len()));
        *self.has_staged_changes.borrow_mut() = true;
        Ok(())
    }

    fn apply_as_fixup(&self, hunks: &[Hunk], target: &str) -> GitResult<Oid> {
        if self.failing_targets.borrow().contains(target) {
            self.record(format!("fixup {target} failed"));
            return Err(command_failed("commit"));
        }
        self.record(format!("fixup {target} {}", hunks.len()));
        let fixup = "d".repeat(40);
        *self.head.borrow_mut() = fixup.clone();
        Ok(Oid::from_str(&fixup)?)
    }

    fn predict_conflicts(&self, commits: &[Oid]) -> GitResult<ConflictPrediction> {
        self.record(format!("predict {}", commits.len()));
        Ok(self.prediction.borrow().clone())
    }

    fn autosquash_rebase(&self, onto: Option<&str>) -> GitResult<()> {
        self.record(format!("autosquash {}", onto.unwrap_or("--root")));
        Ok(())
    }

    fn create_backup_ref(&self, timestamp: i64) -> GitResult<String> {
        let name = backup_ref_name(timestamp);
        self.record(format!("backup {name}"));
        self.refs
            .borrow_mut()
            .insert(name.clone(), self.head.borrow().clone());
        Ok(name)
    }

    fn list_backup_refs(&self) -> GitResult<Vec<BackupRef>> {
        Ok(self
            .refs
            .borrow()
            .iter()
            .map(|(name, sha)| BackupRef {
                name: name.clone(),
                sha: sha.clone(),
                timestamp: None,
            })
            .collect())
    }

    fn ref_exists(&self, name: &str) -> GitResult<bool> {
        Ok(self.refs.borrow().contains_key(name))
    }

    fn delete_ref(&self, name: &str) -> GitResult<()> {
        self.record(format!("delete {name}"));
        self.refs.borrow_mut().remove(name);
        Ok(())
    }

    fn stash_push(&self, message: &str, keep_index: bool) -> GitResult<Option<String>> {
        self.record(format!("stash push {message} keep_index={keep_index}"));
        Ok(Some("5".repeat(40)))
    }

    fn stash_pop(&self, sha: &str, restore_index: bool) -> GitResult<()> {
        self.record(format!("stash pop {sha} index={restore_index}"));
        Ok(())
    }
}

/// In-memory `StateStore`.
#[derive(Default)]
pub struct MockStateStore {
    pub config: RefCell<Config>,
    pub absorb_state: RefCell<Option<AbsorbState>>,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MockStateStore {
    fn sorb_dir(&self) -> &Path {
        Path::new("/mock/repo/.git/sorb")
    }

    fn load_config(&self) -> CoreResult<Config> {
        Ok(self.config.borrow().clone())
    }

    fn save_config(&self, config: &Config) -> CoreResult<()> {
        *self.config.borrow_mut() = config.clone();
        Ok(())
    }

    fn has_absorb_state(&self) -> bool {
        self.absorb_state.borrow().is_some()
    }

    fn load_absorb_state(&self) -> CoreResult<AbsorbState> {
        self.absorb_state
            .borrow()
            .clone()
            .ok_or(CoreError::NothingToUndo)
    }

    fn save_absorb_state(&self, state: &AbsorbState) -> CoreResult<()> {
        *self.absorb_state.borrow_mut() = Some(state.clone());
        Ok(())
    }

    fn clear_absorb_state(&self) -> CoreResult<()> {
        *self.absorb_state.borrow_mut() = None;
        Ok(())
    }
}
