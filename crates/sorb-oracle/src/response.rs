//! Reply parsing and validation.
//!
//! The oracle's JSON is never trusted as-is: indices are bounds-checked,
//! commit ids are resolved against the candidates, confidences clamped, and
//! every hunk ends up in exactly one of the two output lists.

use serde::Deserialize;
use sorb_git::CommitInfo;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{
    AbsorbRequest, AbsorbResponse, AlternativeAssignment, HunkAssignment, Strategy,
    clamp_confidence,
};

/// Shortest commit id prefix that is matched against candidates.
const MIN_PREFIX_LEN: usize = 4;

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    assignments: Vec<RawAssignment>,
    #[serde(default, alias = "unmatched_hunks")]
    unmatched: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct RawAssignment {
    hunk_index: i64,
    #[serde(default)]
    commit_sha: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    alternatives: Vec<RawAlternative>,
}

#[derive(Debug, Deserialize)]
struct RawAlternative {
    #[serde(default)]
    commit_sha: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

/// Parse and validate an oracle reply against the request it answers.
///
/// # Errors
/// Returns [`Error::Parse`] if no JSON object can be recovered from `reply`.
pub fn parse_response(reply: &str, request: &AbsorbRequest) -> Result<AbsorbResponse> {
    let raw = decode(reply)?;
    Ok(normalize(raw, request))
}

fn decode(reply: &str) -> Result<RawResponse> {
    let text = unwrap_fence(reply.trim());

    let strict_err = match serde_json::from_str::<RawResponse>(text) {
        Ok(raw) => return Ok(raw),
        Err(e) => e,
    };
    debug!(error = %strict_err, "strict parse failed, scanning for a JSON object");

    let Some(object) = outermost_object(text) else {
        return Err(Error::Parse(format!("no JSON object found ({strict_err})")));
    };
    serde_json::from_str(object).map_err(|e| Error::Parse(e.to_string()))
}

/// Strip a surrounding ```` ``` ```` / ```` ```json ```` fence.
fn unwrap_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Find the first balanced `{ ... }` region, ignoring braces inside strings.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize(raw: RawResponse, request: &AbsorbRequest) -> AbsorbResponse {
    let hunks = &request.hunks;
    let mut claimed = vec![false; hunks.len()];
    let mut absorbed = vec![false; hunks.len()];
    let mut assignments = Vec::new();

    for entry in raw.assignments {
        let Some(index) = usize::try_from(entry.hunk_index)
            .ok()
            .filter(|i| *i < hunks.len())
        else {
            debug!(index = entry.hunk_index, "dropping out-of-range hunk index");
            continue;
        };
        if claimed[index] {
            debug!(index, "dropping duplicate assignment");
            continue;
        }
        claimed[index] = true;

        let hunk = &hunks[index];
        let confidence = clamp_confidence(entry.confidence);
        if !hunk.has_changes() || entry.commit_sha.trim().is_empty() {
            continue;
        }
        if request.strategy == Strategy::BestMatch && confidence < request.confidence_threshold {
            debug!(index, confidence, "below threshold, leaving unmatched");
            continue;
        }

        let (commit_sha, commit_message) = resolve(&entry.commit_sha, &request.commits);
        let alternatives = entry
            .alternatives
            .into_iter()
            .filter(|alt| !alt.commit_sha.trim().is_empty())
            .map(|alt| {
                let (commit_sha, commit_message) = resolve(&alt.commit_sha, &request.commits);
                AlternativeAssignment {
                    commit_sha,
                    commit_message,
                    confidence: clamp_confidence(alt.confidence),
                    reasoning: alt.reasoning,
                }
            })
            .collect();

        absorbed[index] = true;
        assignments.push(HunkAssignment {
            hunk: hunk.clone(),
            commit_sha,
            commit_message,
            confidence,
            reasoning: entry.reasoning,
            alternatives,
        });
    }

    // Anything not absorbed is unmatched, whether the reply said so,
    // demoted it, or never mentioned it.
    let unmatched = hunks
        .iter()
        .zip(&absorbed)
        .filter(|(_, absorbed)| !**absorbed)
        .map(|(hunk, _)| hunk.clone())
        .collect();

    AbsorbResponse {
        assignments,
        unmatched,
        model: None,
    }
}

/// Resolve a (possibly abbreviated) id to `(full sha, summary)`.
///
/// Ids that match no candidate are kept verbatim with an empty summary.
fn resolve(id: &str, commits: &[CommitInfo]) -> (String, String) {
    let id = id.trim();
    if id.len() >= MIN_PREFIX_LEN {
        let needle = id.to_ascii_lowercase();
        if let Some(commit) = commits
            .iter()
            .find(|c| c.sha.to_ascii_lowercase().starts_with(&needle))
        {
            return (commit.sha.clone(), commit.summary().to_string());
        }
    }
    debug!(id, "commit id did not resolve to a candidate");
    (id.to_string(), String::new())
}
