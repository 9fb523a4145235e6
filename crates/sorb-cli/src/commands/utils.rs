use anyhow::{Context, Result, bail};
use sorb_core::{Config, State};
use sorb_git::Repository;

use crate::output;

/// Helper to open repo and state.
pub fn open_repo_and_state() -> Result<(Repository, State)> {
    let repo = Repository::open_current().context("Not inside a git repository")?;
    let state = State::new(repo.git_dir());
    Ok((repo, state))
}

/// Load `.git/sorb/config.toml` and apply `SORB_*` environment overrides.
pub fn load_config(state: &State) -> Result<Config> {
    let mut config = state
        .load_config()
        .with_context(|| format!("Could not read {}", state.config_path().display()))?;
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// Ensure the repository is not in detached HEAD state.
/// If detached, prints the detached-HEAD error message and returns an error.
pub fn ensure_on_branch(repo: &Repository) -> Result<()> {
    if repo.head_detached()? {
        output::error_detached_head();
        bail!("");
    }
    Ok(())
}
