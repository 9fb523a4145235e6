//! `sorb undo` command - Revert the last absorb.

use anyhow::Result;
use sorb_core::undo;

use crate::commands::utils;
use crate::output;

/// Run the undo command.
pub fn run() -> Result<()> {
    let (repo, state) = utils::open_repo_and_state()?;

    let report = undo::undo(&repo, &state)?;

    output::success(&format!(
        "Restored {} to {}",
        report.branch,
        output::short_sha(&report.restored_to)
    ));
    if report.stash_restored {
        output::info("Reapplied the unstaged changes saved during absorb");
    }
    for warning in &report.warnings {
        output::warn(warning);
    }

    Ok(())
}
