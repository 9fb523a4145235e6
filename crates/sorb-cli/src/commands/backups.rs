//! `sorb backups` commands - Inspect and prune absorb backups.

use anyhow::{Context, Result};
use sorb_core::undo::{self, BackupEntry};

use crate::commands::utils;
use crate::output;

/// List backup refs, newest last.
pub fn list(json: bool) -> Result<()> {
    let (repo, state) = utils::open_repo_and_state()?;
    let backups = undo::list_backups(&repo, &state)?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&backups).context("Failed to serialize backups")?;
        output::essential(&rendered);
        return Ok(());
    }

    if backups.is_empty() {
        output::info("No backups");
        return Ok(());
    }
    for backup in &backups {
        output::essential(&describe(backup));
    }
    Ok(())
}

fn describe(backup: &BackupEntry) -> String {
    let created = backup.created.map_or_else(
        || "unknown time".to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    let marker = if backup.active { "  (undo target)" } else { "" };
    format!(
        "{}  {}  {created}{marker}",
        output::short_sha(&backup.sha),
        backup.name
    )
}

/// Delete every backup except the one `sorb undo` would use.
pub fn cleanup() -> Result<()> {
    let (repo, state) = utils::open_repo_and_state()?;
    let report = undo::cleanup_backups(&repo, &state)?;

    for warning in &report.warnings {
        output::warn(warning);
    }
    if report.deleted.is_empty() {
        output::info("No backups to delete");
    } else {
        output::success(&format!("Deleted {} backup(s)", report.deleted.len()));
    }
    if let Some(kept) = &report.kept {
        output::detail(&format!("  Kept {kept} for `sorb undo`"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_describe_marks_active() {
        colored::control::set_override(false);
        let entry = BackupEntry {
            name: "refs/sorb-backup/absorb-1700000000".to_string(),
            sha: "0123456789abcdef0123456789abcdef01234567".to_string(),
            created: DateTime::from_timestamp(1_700_000_000, 0),
            active: true,
        };
        assert_eq!(
            describe(&entry),
            "01234567  refs/sorb-backup/absorb-1700000000  2023-11-14 22:13:20 UTC  (undo target)"
        );

        let entry = BackupEntry {
            created: None,
            active: false,
            ..entry
        };
        assert!(describe(&entry).ends_with("unknown time"));
    }
}
