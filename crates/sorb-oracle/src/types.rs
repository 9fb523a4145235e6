//! Request and response types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sorb_git::{CommitInfo, Hunk};

/// How the oracle's proposals are turned into assignments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Keep every proposal and let a reviewer decide.
    #[default]
    Interactive,
    /// Keep only proposals at or above the confidence threshold.
    BestMatch,
}

impl Strategy {
    /// Config/CLI spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::BestMatch => "best-match",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive" => Ok(Self::Interactive),
            "best-match" | "best_match" => Ok(Self::BestMatch),
            other => Err(format!(
                "unknown strategy '{other}' (expected 'interactive' or 'best-match')"
            )),
        }
    }
}

/// Everything the oracle needs to propose assignments.
#[derive(Debug, Clone)]
pub struct AbsorbRequest {
    /// Hunks to place, in staged-diff order. Indices into this list are what
    /// the oracle answers with.
    pub hunks: Vec<Hunk>,
    /// Candidate target commits, oldest first.
    pub commits: Vec<CommitInfo>,
    /// Assignment strategy.
    pub strategy: Strategy,
    /// Minimum confidence under [`Strategy::BestMatch`].
    pub confidence_threshold: f64,
    /// Model override passed through to the backend.
    pub model: Option<String>,
}

/// A secondary candidate commit for a hunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeAssignment {
    /// Target commit id, full SHA when it could be resolved.
    pub commit_sha: String,
    /// First line of the commit message, empty when unresolved.
    pub commit_message: String,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Oracle's explanation.
    pub reasoning: String,
}

/// A hunk mapped onto a target commit.
#[derive(Debug, Clone, PartialEq)]
pub struct HunkAssignment {
    /// The hunk being absorbed.
    pub hunk: Hunk,
    /// Target commit id, full SHA when it could be resolved.
    pub commit_sha: String,
    /// First line of the target's message, empty when unresolved.
    pub commit_message: String,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Oracle's explanation.
    pub reasoning: String,
    /// Other plausible targets, best first.
    pub alternatives: Vec<AlternativeAssignment>,
}

impl HunkAssignment {
    /// Abbreviated target id for display.
    #[must_use]
    pub fn short_sha(&self) -> &str {
        self.commit_sha.get(..8).unwrap_or(&self.commit_sha)
    }
}

/// The oracle's answer, validated.
///
/// Every hunk of the request is in exactly one of `assignments` and
/// `unmatched`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbsorbResponse {
    /// Hunks with a target commit.
    pub assignments: Vec<HunkAssignment>,
    /// Hunks left where they are, in request order.
    pub unmatched: Vec<Hunk>,
    /// Model or backend that produced the answer.
    pub model: Option<String>,
}

impl AbsorbResponse {
    /// Distinct target commits in the order they first appear.
    #[must_use]
    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        for assignment in &self.assignments {
            if !targets.contains(&assignment.commit_sha.as_str()) {
                targets.push(&assignment.commit_sha);
            }
        }
        targets
    }

    /// Hunks assigned to `target`, in assignment order.
    #[must_use]
    pub fn hunks_for(&self, target: &str) -> Vec<Hunk> {
        self.assignments
            .iter()
            .filter(|a| a.commit_sha == target)
            .map(|a| a.hunk.clone())
            .collect()
    }

    /// Number of hunks across both lists.
    #[must_use]
    pub fn total_hunks(&self) -> usize {
        self.assignments.len() + self.unmatched.len()
    }
}

/// Clamp a confidence into [0.0, 1.0], mapping NaN to 0.
#[must_use]
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
