//! Unified diff parsing.
//!
//! Turns `git diff --cached` output into an ordered list of [`Hunk`]s that
//! carry everything needed to describe them to the oracle and to rebuild a
//! standalone patch later.

use std::fmt;

use crate::Repository;
use crate::error::{Error, Result};

/// A single `@@` hunk from a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hunk {
    /// File path after the change, relative to the repository root.
    pub file_path: String,
    /// File path before the change. Differs from `file_path` for renames.
    pub old_path: String,
    /// The file is created by this diff.
    pub is_new: bool,
    /// The file is removed by this diff.
    pub is_deleted: bool,
    /// The file is renamed by this diff.
    pub is_renamed: bool,

    /// The `@@ ... @@` line, verbatim.
    pub header: String,
    /// Header plus body, newline terminated, decoded for display. Bytes
    /// that aren't UTF-8 show up as U+FFFD here.
    pub content: String,
    /// Header plus body exactly as git printed it. Patches are rebuilt from
    /// this, so CRLF endings and non-UTF-8 text survive.
    pub raw: Vec<u8>,
    /// Body lines with their prefix character. A CRLF file keeps its `\r`.
    pub lines: Vec<String>,

    /// Starting line in the original file (1-indexed).
    pub old_start: u32,
    /// Number of lines in the original file.
    pub old_lines: u32,
    /// Starting line in the new file (1-indexed).
    pub new_start: u32,
    /// Number of lines in the new file.
    pub new_lines: u32,

    /// Context lines before the first change, prefix stripped.
    pub context_before: Vec<String>,
    /// Added lines, prefix stripped.
    pub added: Vec<String>,
    /// Removed lines, prefix stripped.
    pub removed: Vec<String>,
    /// Context lines after the first change, prefix stripped.
    pub context_after: Vec<String>,
}

impl Hunk {
    /// Whether the hunk adds or removes anything.
    ///
    /// A hunk made only of context can't be absorbed anywhere.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Short label for the file-level change kind.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        if self.is_new {
            "new"
        } else if self.is_deleted {
            "deleted"
        } else if self.is_renamed {
            "renamed"
        } else {
            "modified"
        }
    }

    /// Display path, showing `old -> new` for renames.
    #[must_use]
    pub fn display_path(&self) -> String {
        if self.is_renamed && self.old_path != self.file_path {
            format!("{} -> {}", self.old_path, self.file_path)
        } else {
            self.file_path.clone()
        }
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (+{} -{})",
            self.display_path(),
            self.added.len(),
            self.removed.len()
        )
    }
}

impl Repository {
    /// Get the staged diff as a list of hunks.
    ///
    /// # Errors
    /// Returns error if git diff fails or its output can't be parsed.
    pub fn staged_hunks(&self) -> Result<Vec<Hunk>> {
        parse_diff(self.staged_diff()?)
    }
}

/// Per-file header state carried across hunks.
#[derive(Default)]
struct FileState {
    path: String,
    old_path: String,
    is_new: bool,
    is_deleted: bool,
    is_renamed: bool,
}

/// A hunk being filled, with the line budget its header promised.
struct OpenHunk {
    hunk: Hunk,
    old_remaining: u32,
    new_remaining: u32,
}

impl OpenHunk {
    const fn exhausted(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    fn push(&mut self, raw: &[u8], line: &str) {
        let hunk = &mut self.hunk;
        hunk.raw.extend_from_slice(raw);
        hunk.raw.push(b'\n');
        hunk.content.push_str(line);
        hunk.content.push('\n');
        hunk.lines.push(line.to_string());

        if let Some(rest) = line.strip_prefix('+') {
            self.new_remaining = self.new_remaining.saturating_sub(1);
            hunk.added.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('-') {
            self.old_remaining = self.old_remaining.saturating_sub(1);
            hunk.removed.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix(' ') {
            self.old_remaining = self.old_remaining.saturating_sub(1);
            self.new_remaining = self.new_remaining.saturating_sub(1);
            if hunk.added.is_empty() && hunk.removed.is_empty() {
                hunk.context_before.push(rest.to_string());
            } else {
                hunk.context_after.push(rest.to_string());
            }
        } else if line.is_empty() {
            // Some tools strip the trailing space off empty context lines.
            self.old_remaining = self.old_remaining.saturating_sub(1);
            self.new_remaining = self.new_remaining.saturating_sub(1);
            if hunk.added.is_empty() && hunk.removed.is_empty() {
                hunk.context_before.push(String::new());
            } else {
                hunk.context_after.push(String::new());
            }
        }
    }
}

/// Parse a unified diff into hunks, in the order they appear.
///
/// Lines are split on `\n` alone. Everything else, including a trailing
/// `\r` and bytes that aren't valid UTF-8, is kept in [`Hunk::raw`].
///
/// File headers (`diff --git`, `index`, mode lines, `---`/`+++`) are consumed
/// as metadata and never end up in a hunk body. Pure renames and binary
/// changes have no `@@` section and therefore yield no hunks.
///
/// # Errors
/// Returns [`Error::DiffParse`] on a malformed `@@` header. Nothing is
/// returned for the rest of the diff in that case.
pub fn parse_diff(diff: impl AsRef<[u8]>) -> Result<Vec<Hunk>> {
    let diff = diff.as_ref();
    let diff = diff.strip_suffix(b"\n").unwrap_or(diff);
    let mut hunks = Vec::new();
    let mut file = FileState::default();
    let mut open: Option<OpenHunk> = None;

    if diff.is_empty() {
        return Ok(hunks);
    }

    for (idx, raw) in diff.split(|&b| b == b'\n').enumerate() {
        let decoded = String::from_utf8_lossy(raw);
        let line = decoded.as_ref();

        // Body lines first: a removed line reading "-- foo" shows up as
        // "--- foo" and must not be mistaken for a file header.
        if let Some(current) = open.as_mut() {
            if !current.exhausted() && !line.starts_with("@@") && !line.starts_with("diff --git ")
            {
                current.push(raw, line);
                continue;
            }
            if line.starts_with('\\') {
                current.push(raw, line);
                continue;
            }
        }

        if let Some(paths) = line.strip_prefix("diff --git ") {
            flush(&mut open, &mut hunks);
            file = FileState::default();
            if let Some((a, b)) = paths.split_once(" b/") {
                file.old_path = a.strip_prefix("a/").unwrap_or(a).to_string();
                file.path = b.to_string();
            }
        } else if line.starts_with("@@") {
            flush(&mut open, &mut hunks);
            let (old_start, old_lines, new_start, new_lines) =
                parse_hunk_header(line).map_err(|message| Error::DiffParse {
                    line: idx + 1,
                    message,
                })?;
            open = Some(OpenHunk {
                hunk: Hunk {
                    file_path: file.path.clone(),
                    old_path: file.old_path.clone(),
                    is_new: file.is_new,
                    is_deleted: file.is_deleted,
                    is_renamed: file.is_renamed,
                    header: line.to_string(),
                    content: format!("{line}\n"),
                    raw: [raw, b"\n".as_slice()].concat(),
                    old_start,
                    old_lines,
                    new_start,
                    new_lines,
                    ..Hunk::default()
                },
                old_remaining: old_lines,
                new_remaining: new_lines,
            });
        } else if line.starts_with("new file mode") {
            file.is_new = true;
        } else if line.starts_with("deleted file mode") {
            file.is_deleted = true;
        } else if let Some(from) = line.strip_prefix("rename from ") {
            file.is_renamed = true;
            file.old_path = from.to_string();
        } else if let Some(to) = line.strip_prefix("rename to ") {
            file.is_renamed = true;
            file.path = to.to_string();
        }
    }

    flush(&mut open, &mut hunks);
    Ok(hunks)
}

fn flush(open: &mut Option<OpenHunk>, hunks: &mut Vec<Hunk>) {
    if let Some(current) = open.take() {
        hunks.push(current.hunk);
    }
}

/// Parse `@@ -a[,b] +c[,d] @@ ...` into `(a, b, c, d)`.
fn parse_hunk_header(header: &str) -> std::result::Result<(u32, u32, u32, u32), String> {
    let inner = header
        .strip_prefix("@@")
        .and_then(|rest| rest.find("@@").map(|end| &rest[..end]))
        .ok_or_else(|| format!("invalid hunk header: {header}"))?;

    let fields: Vec<&str> = inner.split_whitespace().collect();
    let [old, new] = fields.as_slice() else {
        return Err(format!("invalid hunk range: {}", inner.trim()));
    };

    let old = old
        .strip_prefix('-')
        .ok_or_else(|| format!("old range must start with '-': {old}"))?;
    let new = new
        .strip_prefix('+')
        .ok_or_else(|| format!("new range must start with '+': {new}"))?;

    let (old_start, old_lines) = parse_range(old)?;
    let (new_start, new_lines) = parse_range(new)?;
    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str) -> std::result::Result<(u32, u32), String> {
    let number = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| format!("invalid line number '{s}' in range '{range}'"))
    };

    match range.split_once(',') {
        Some((start, count)) => Ok((number(start)?, number(count)?)),
        None => Ok((number(range)?, 1)),
    }
}
