//! Absorb service: candidate selection, oracle setup and fixup execution.
//!
//! This module orchestrates the absorb workflow, separated from CLI
//! presentation concerns.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sorb_core::absorb::{self, AbsorbOptions, AbsorbOutcome};
use sorb_core::{Backend, Config, OracleConfig, RangeMode, StateStore};
use sorb_git::{CommitInfo, ConflictPrediction, GitOps, Hunk};
use sorb_oracle::{
    AbsorbRequest, AbsorbResponse, CommandOracle, HttpOracle, Oracle, Strategy,
};
use tracing::debug;

use crate::commands::AbsorbArgs;

/// Which commits the oracle may pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateRange {
    /// The last N commits.
    Depth(usize),
    /// Every commit since the branch point.
    BranchPoint,
    /// Commits not on the upstream branch.
    Unpushed,
}

/// Effective absorb settings after merging config, environment and flags.
#[derive(Debug, Clone)]
pub struct AbsorbSettings {
    pub strategy: Strategy,
    pub confidence: f64,
    pub range: CandidateRange,
    pub model: Option<String>,
    pub autosquash: bool,
}

impl AbsorbSettings {
    /// Flags win over the config file.
    pub fn resolve(config: &Config, args: &AbsorbArgs) -> Result<Self> {
        let confidence = args.confidence.unwrap_or(config.absorb.confidence);
        if !(0.0..=1.0).contains(&confidence) {
            bail!("--confidence must be between 0.0 and 1.0 (got {confidence})");
        }

        let range = match (args.depth, args.to_branch_point) {
            (Some(0), _) => bail!("--depth must be at least 1"),
            (Some(depth), _) => CandidateRange::Depth(depth),
            (None, true) => CandidateRange::BranchPoint,
            (None, false) => match config.absorb.range {
                RangeMode::Unpushed => CandidateRange::Unpushed,
                RangeMode::BranchPoint => CandidateRange::BranchPoint,
            },
        };

        Ok(Self {
            strategy: args.strategy.unwrap_or(config.absorb.strategy),
            confidence,
            range,
            model: args.model.clone().or_else(|| config.oracle.model.clone()),
            autosquash: args.rebase || config.absorb.autosquash,
        })
    }

    /// Build the oracle request for `hunks` against `commits`.
    pub fn request(&self, hunks: Vec<Hunk>, commits: Vec<CommitInfo>) -> AbsorbRequest {
        AbsorbRequest {
            hunks,
            commits,
            strategy: self.strategy,
            confidence_threshold: self.confidence,
            model: self.model.clone(),
        }
    }
}

/// The configured oracle backend.
pub enum OracleBackend {
    Command(CommandOracle),
    Http(HttpOracle),
}

impl OracleBackend {
    /// Build the backend named by `config`.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        match config.backend {
            Backend::Command => Ok(Self::Command(
                CommandOracle::new(&config.command, config.args.clone()).with_timeout(timeout),
            )),
            Backend::Http => {
                let endpoint = config
                    .endpoint
                    .as_deref()
                    .context("oracle.endpoint is required for the http backend")?;
                let oracle = HttpOracle::from_env(endpoint, &config.api_key_env)
                    .context("Could not set up the http oracle")?;
                Ok(Self::Http(oracle.with_timeout(timeout)))
            }
        }
    }
}

impl Oracle for OracleBackend {
    fn name(&self) -> &str {
        match self {
            Self::Command(oracle) => oracle.name(),
            Self::Http(oracle) => oracle.name(),
        }
    }

    async fn complete(&self, prompt: &str, model: Option<&str>) -> sorb_oracle::Result<String> {
        match self {
            Self::Command(oracle) => oracle.complete(prompt, model).await,
            Self::Http(oracle) => oracle.complete(prompt, model).await,
        }
    }
}

/// Service for absorb operations.
pub struct AbsorbService<'a, G: GitOps, S: StateStore> {
    git: &'a G,
    store: &'a S,
}

impl<'a, G: GitOps, S: StateStore> AbsorbService<'a, G, S> {
    /// Create a new absorb service.
    pub const fn new(git: &'a G, store: &'a S) -> Self {
        Self { git, store }
    }

    /// Refuse to run mid-rebase, on a detached HEAD or with nothing staged.
    pub fn check_ready(&self) -> Result<()> {
        if self.git.is_rebasing() {
            bail!("A rebase is in progress. Finish it with `git rebase --continue` or `--abort` first.");
        }
        self.git.current_branch()?;
        if !self.git.has_staged_changes()? {
            bail!("No staged changes to absorb. Stage changes with `git add` first.");
        }
        Ok(())
    }

    /// Staged hunks, in diff order.
    pub fn staged_hunks(&self) -> Result<Vec<Hunk>> {
        let hunks = self.git.staged_hunks()?;
        if hunks.is_empty() {
            bail!("No staged hunks to absorb (only mode or binary changes are staged).");
        }
        Ok(hunks)
    }

    /// Candidate target commits, oldest first.
    pub fn candidates(&self, range: CandidateRange) -> Result<Vec<CommitInfo>> {
        let commits = match range {
            CandidateRange::Depth(depth) => self.git.commits_at_depth(depth)?,
            CandidateRange::BranchPoint => self.git.commits_from_branch_point()?,
            CandidateRange::Unpushed => self.git.unpushed_commits()?,
        };
        debug!(?range, count = commits.len(), "collected candidate commits");
        Ok(commits)
    }

    /// Simulate the autosquash replay for the response's targets.
    pub fn predict(&self, response: &AbsorbResponse) -> Result<ConflictPrediction> {
        let candidates = absorb::conflict_candidates(response);
        if candidates.is_empty() {
            return Ok(ConflictPrediction::default());
        }
        Ok(self.git.predict_conflicts(&candidates)?)
    }

    /// Create the fixups. Leftover hunks are committed with `message` when
    /// one is given.
    pub fn apply(&self, response: &AbsorbResponse, message: Option<String>) -> Result<AbsorbOutcome> {
        let options = AbsorbOptions {
            message,
            now: chrono::Utc::now().timestamp(),
        };
        Ok(absorb::execute(self.git, self.store, response, &options)?)
    }

    /// Rebase with `--autosquash` from just before the oldest target.
    /// Returns the base used, `None` meaning the root.
    pub fn autosquash(
        &self,
        response: &AbsorbResponse,
        candidates: &[CommitInfo],
    ) -> Result<Option<String>> {
        let base = self.autosquash_base(response, candidates)?;
        self.git.autosquash_rebase(base.as_deref())?;
        Ok(base)
    }

    /// Base [`Self::autosquash`] would use.
    pub fn autosquash_base(
        &self,
        response: &AbsorbResponse,
        candidates: &[CommitInfo],
    ) -> Result<Option<String>> {
        Ok(absorb::autosquash_base(
            self.git,
            &response.targets(),
            candidates,
        )?)
    }
}
