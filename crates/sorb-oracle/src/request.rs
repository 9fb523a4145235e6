//! Prompt rendering.

use std::fmt::Write as _;

use crate::types::{AbsorbRequest, Strategy};

const SUMMARY_WIDTH: usize = 72;

const RESPONSE_SHAPE: &str = r#"{
  "assignments": [
    {
      "hunk_index": 0,
      "commit_sha": "<commit id as listed above>",
      "confidence": 0.9,
      "reasoning": "<one sentence>",
      "alternatives": [
        { "commit_sha": "<commit id>", "confidence": 0.5, "reasoning": "<one sentence>" }
      ]
    }
  ],
  "unmatched": [1]
}"#;

/// Render the request into the text sent to the oracle.
///
/// Hunks are numbered from 0 and that number is what the reply must use
/// as `hunk_index`.
#[must_use]
pub fn render_prompt(request: &AbsorbRequest) -> String {
    let mut out = String::new();

    out.push_str(
        "Match each staged diff hunk below to the earlier commit it belongs to, \
         so it can be folded into that commit as a fixup.\n\
         Judge by file paths, the code being touched, and what each commit message says it did.\n\n",
    );

    match request.strategy {
        Strategy::BestMatch => {
            let _ = writeln!(
                out,
                "Strategy: best-match. Pick the single best commit per hunk. \
                 Only assign a hunk when your confidence is at least {:.2}; \
                 otherwise list it as unmatched.\n",
                request.confidence_threshold
            );
        }
        Strategy::Interactive => {
            let _ = writeln!(
                out,
                "Strategy: interactive. A reviewer will confirm every assignment. \
                 When more than one commit is plausible, list the others as alternatives. \
                 Confidence threshold for reference: {:.2}.\n",
                request.confidence_threshold
            );
        }
    }

    out.push_str("## Commits (oldest first)\n");
    for commit in &request.commits {
        let _ = writeln!(
            out,
            "\n{} {}",
            commit.short_sha(),
            truncate(commit.summary(), SUMMARY_WIDTH)
        );
        let files = commit.changed_files();
        if !files.is_empty() {
            out.push_str("  files:\n");
            for file in files {
                let _ = writeln!(out, "  - {file}");
            }
        }
    }

    out.push_str("\n## Hunks\n");
    for (index, hunk) in request.hunks.iter().enumerate() {
        let _ = writeln!(out, "\n### hunk {index}");
        let _ = writeln!(out, "file: {}", hunk.file_path);
        if hunk.is_renamed {
            let _ = writeln!(out, "status: renamed from {}", hunk.old_path);
        } else {
            let _ = writeln!(out, "status: {}", hunk.status());
        }
        out.push_str("```diff\n");
        out.push_str(&hunk.content);
        out.push_str("```\n");
    }

    out.push_str(
        "\n## Answer\n\
         Reply with a single JSON object and nothing else, shaped like this:\n\
         ```json\n",
    );
    out.push_str(RESPONSE_SHAPE);
    out.push_str(
        "\n```\n\
         Every hunk index must appear exactly once, either in `assignments` or in `unmatched`. \
         Confidence is a number from 0.0 to 1.0.\n",
    );

    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}
