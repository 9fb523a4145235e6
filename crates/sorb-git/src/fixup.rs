//! Patch synthesis and fixup commits.
//!
//! Hunks are turned back into a standalone patch, one file header per
//! touched file, and applied to the index alone with `git apply --cached`.
//! The working tree is never rewritten, so a patch that doesn't apply costs
//! nothing: the edit is still on disk.

use std::io::Write as _;

use git2::Oid;
use tracing::{debug, instrument};

use crate::Repository;
use crate::diff::Hunk;
use crate::error::{Error, Result};
use crate::repository::command_error;

/// Build a patch for `hunks`, grouping them by file in first-appearance order.
///
/// Hunk bodies are copied byte for byte from [`Hunk::raw`].
#[must_use]
pub fn build_patch(hunks: &[Hunk]) -> Vec<u8> {
    let mut patch = Vec::new();
    for group in group_by_file(hunks) {
        let first = group[0];
        write_file_header(&mut patch, first);
        for hunk in group {
            patch.extend_from_slice(&hunk.raw);
        }
    }
    patch
}

fn write_file_header(patch: &mut Vec<u8>, hunk: &Hunk) {
    let old = if hunk.old_path.is_empty() {
        &hunk.file_path
    } else {
        &hunk.old_path
    };
    let new = &hunk.file_path;

    let _ = writeln!(patch, "diff --git a/{old} b/{new}");
    if hunk.is_new {
        patch.extend_from_slice(b"new file mode 100644\n");
    } else if hunk.is_deleted {
        patch.extend_from_slice(b"deleted file mode 100644\n");
    } else if hunk.is_renamed {
        let _ = writeln!(patch, "rename from {old}");
        let _ = writeln!(patch, "rename to {new}");
    }

    if hunk.is_new {
        patch.extend_from_slice(b"--- /dev/null\n");
    } else {
        let _ = writeln!(patch, "--- a/{old}");
    }
    if hunk.is_deleted {
        patch.extend_from_slice(b"+++ /dev/null\n");
    } else {
        let _ = writeln!(patch, "+++ b/{new}");
    }
}

fn group_by_file(hunks: &[Hunk]) -> Vec<Vec<&Hunk>> {
    let mut groups: Vec<Vec<&Hunk>> = Vec::new();
    for hunk in hunks {
        match groups
            .iter_mut()
            .find(|g| g[0].file_path == hunk.file_path)
        {
            Some(group) => group.push(hunk),
            None => groups.push(vec![hunk]),
        }
    }
    for group in &mut groups {
        group.sort_by_key(|h| (h.old_start, h.new_start));
    }
    groups
}

impl Repository {
    /// Stage `hunks` on top of whatever the index holds.
    ///
    /// Only the index changes. `git apply` is all-or-nothing, so on error
    /// the index is as it was and the working tree was never touched.
    ///
    /// # Errors
    /// Returns `NoHunks` for an empty slice, or the git error if the patch
    /// doesn't apply.
    pub fn apply_hunks(&self, hunks: &[Hunk]) -> Result<()> {
        if hunks.is_empty() {
            return Err(Error::NoHunks);
        }

        let patch = build_patch(hunks);
        debug!(bytes = patch.len(), files = group_by_file(hunks).len(), "applying patch");
        self.run_with_stdin(&["apply", "--cached", "--whitespace=nowarn", "-"], &patch)?;
        Ok(())
    }

    /// Apply `hunks` and commit them as `fixup! <target>`.
    ///
    /// The index must hold nothing else. On a failed commit the index is
    /// cleared again so later targets start clean.
    ///
    /// # Errors
    /// Returns error if the hunks don't apply or the commit fails.
    #[instrument(skip(self, hunks), fields(hunks = hunks.len()))]
    pub fn apply_as_fixup(&self, hunks: &[Hunk], target: &str) -> Result<Oid> {
        self.apply_hunks(hunks)?;

        let fixup = format!("--fixup={target}");
        if let Err(e) = self.run(&["commit", "--quiet", "--no-verify", &fixup]) {
            let _ = self.unstage_all();
            return Err(e);
        }

        let head = self.head_commit()?;
        debug!(fixup = %head, "created fixup commit");
        Ok(Oid::from_str(&head)?)
    }

    /// Squash pending `fixup!` commits with an autosquash rebase.
    ///
    /// `onto = None` rebases from the root. A failed rebase is aborted
    /// before the error is returned.
    ///
    /// # Errors
    /// Returns error if the rebase fails.
    #[instrument(skip(self))]
    pub fn autosquash_rebase(&self, onto: Option<&str>) -> Result<()> {
        let mut args = vec!["rebase", "-i", "--autosquash", "--autostash"];
        args.push(onto.unwrap_or("--root"));

        let output = self
            .command(&args)
            .env("GIT_SEQUENCE_EDITOR", "true")
            .env("GIT_EDITOR", "true")
            .output()?;

        if !output.status.success() {
            let err = command_error(&args, &output);
            if self.is_rebasing() {
                let _ = self.run(&["rebase", "--abort"]);
            }
            return Err(err);
        }
        Ok(())
    }
}
