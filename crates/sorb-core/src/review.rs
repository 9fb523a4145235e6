//! Reviewer-facing state over a proposed set of assignments.
//!
//! [`ReviewState`] is a plain value: every operation is a transition on it
//! and nothing here touches the repository. A front end renders
//! [`ReviewState::current`] and [`ReviewState::mode`] and calls the
//! transition matching the user's key or menu choice.

use std::collections::BTreeSet;

use sorb_oracle::{AbsorbResponse, AlternativeAssignment, HunkAssignment};

use crate::error::{Error, Result};

/// Where the reviewer is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReviewMode {
    /// Stepping through assignments.
    #[default]
    Reviewing,
    /// Choosing among the current assignment's alternatives.
    ///
    /// Cursor 0 keeps the current target; `n` picks alternative `n - 1`.
    ViewingAlternatives {
        /// Highlighted entry.
        cursor: usize,
    },
    /// The reviewer accepted the assignments.
    Accepted,
    /// The reviewer backed out.
    Cancelled,
}

impl ReviewMode {
    /// Whether no more transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Cancelled)
    }
}

/// Review session over an [`AbsorbResponse`].
#[derive(Debug, Clone)]
pub struct ReviewState {
    response: AbsorbResponse,
    current: usize,
    mode: ReviewMode,
    modified: BTreeSet<usize>,
}

impl ReviewState {
    /// Start reviewing `response` at its first assignment.
    #[must_use]
    pub const fn new(response: AbsorbResponse) -> Self {
        Self {
            response,
            current: 0,
            mode: ReviewMode::Reviewing,
            modified: BTreeSet::new(),
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> ReviewMode {
        self.mode
    }

    /// Index of the assignment under review.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// The assignment under review, if any remain.
    #[must_use]
    pub fn current(&self) -> Option<&HunkAssignment> {
        self.response.assignments.get(self.current)
    }

    /// The response as edited so far.
    #[must_use]
    pub const fn response(&self) -> &AbsorbResponse {
        &self.response
    }

    /// Whether the reviewer retargeted assignment `index`.
    #[must_use]
    pub fn is_modified(&self, index: usize) -> bool {
        self.modified.contains(&index)
    }

    /// Number of retargeted assignments.
    #[must_use]
    pub fn modified_count(&self) -> usize {
        self.modified.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.mode.is_terminal() {
            Err(Error::ReviewFinished)
        } else {
            Ok(())
        }
    }

    /// Move to the next assignment. No-op at the end or outside
    /// [`ReviewMode::Reviewing`].
    ///
    /// # Errors
    /// Returns `ReviewFinished` once accepted or cancelled.
    pub fn next(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.mode == ReviewMode::Reviewing && self.current + 1 < self.response.assignments.len()
        {
            self.current += 1;
        }
        Ok(())
    }

    /// Move to the previous assignment. No-op at the start or outside
    /// [`ReviewMode::Reviewing`].
    ///
    /// # Errors
    /// Returns `ReviewFinished` once accepted or cancelled.
    pub fn previous(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.mode == ReviewMode::Reviewing {
            self.current = self.current.saturating_sub(1);
        }
        Ok(())
    }

    /// Open the alternatives of the current assignment.
    ///
    /// Returns whether the view opened; it doesn't when there are no
    /// alternatives.
    ///
    /// # Errors
    /// Returns `ReviewFinished` once accepted or cancelled.
    pub fn show_alternatives(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let has_alternatives = self.current().is_some_and(|a| !a.alternatives.is_empty());
        if self.mode == ReviewMode::Reviewing && has_alternatives {
            self.mode = ReviewMode::ViewingAlternatives { cursor: 0 };
            return Ok(true);
        }
        Ok(false)
    }

    /// Move the alternatives cursor up, stopping at 0.
    ///
    /// # Errors
    /// Returns `ReviewFinished` once accepted or cancelled.
    pub fn move_alternative_cursor_up(&mut self) -> Result<()> {
        self.ensure_open()?;
        if let ReviewMode::ViewingAlternatives { cursor } = &mut self.mode {
            *cursor = cursor.saturating_sub(1);
        }
        Ok(())
    }

    /// Move the alternatives cursor down, stopping at the last alternative.
    ///
    /// # Errors
    /// Returns `ReviewFinished` once accepted or cancelled.
    pub fn move_alternative_cursor_down(&mut self) -> Result<()> {
        self.ensure_open()?;
        let available = self.current().map_or(0, |a| a.alternatives.len());
        if let ReviewMode::ViewingAlternatives { cursor } = &mut self.mode {
            if *cursor < available {
                *cursor += 1;
            }
        }
        Ok(())
    }

    /// Retarget the current assignment.
    ///
    /// `choice` 0 keeps the current target, `n` takes alternative `n - 1`
    /// in place of the primary one. The alternatives list is left as it is.
    /// Returns to [`ReviewMode::Reviewing`].
    ///
    /// # Errors
    /// Returns `InvalidAlternative` for a choice past the list (the mode is
    /// left unchanged), or `ReviewFinished`.
    pub fn select_alternative(&mut self, choice: usize) -> Result<()> {
        self.ensure_open()?;
        let Some(assignment) = self.response.assignments.get_mut(self.current) else {
            self.mode = ReviewMode::Reviewing;
            return Ok(());
        };
        let available = assignment.alternatives.len();
        if choice > available {
            return Err(Error::InvalidAlternative {
                index: choice,
                available,
            });
        }

        if choice > 0 {
            let AlternativeAssignment {
                commit_sha,
                commit_message,
                confidence,
                reasoning,
            } = assignment.alternatives[choice - 1].clone();
            assignment.commit_sha = commit_sha;
            assignment.commit_message = commit_message;
            assignment.confidence = confidence;
            assignment.reasoning = reasoning;
            self.modified.insert(self.current);
        }
        self.mode = ReviewMode::Reviewing;
        Ok(())
    }

    /// Take the alternative under the cursor. Outside the alternatives view
    /// this keeps the current target.
    ///
    /// # Errors
    /// Returns `ReviewFinished` once accepted or cancelled.
    pub fn select_at_cursor(&mut self) -> Result<()> {
        match self.mode {
            ReviewMode::ViewingAlternatives { cursor } => self.select_alternative(cursor),
            _ => self.select_alternative(0),
        }
    }

    /// Leave the alternatives view without changes.
    ///
    /// # Errors
    /// Returns `ReviewFinished` once accepted or cancelled.
    pub fn close_alternatives(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.mode = ReviewMode::Reviewing;
        Ok(())
    }

    /// Drop the current assignment; its hunk joins the unmatched list.
    ///
    /// The cursor stays put, or moves back one when the last assignment was
    /// removed.
    ///
    /// # Errors
    /// Returns `ReviewFinished` once accepted or cancelled.
    pub fn unassign(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.mode != ReviewMode::Reviewing || self.current >= self.response.assignments.len() {
            return Ok(());
        }

        let removed = self.response.assignments.remove(self.current);
        self.response.unmatched.push(removed.hunk);

        self.modified = std::mem::take(&mut self.modified)
            .into_iter()
            .filter(|&i| i != self.current)
            .map(|i| if i > self.current { i - 1 } else { i })
            .collect();

        let remaining = self.response.assignments.len();
        if self.current >= remaining {
            self.current = remaining.saturating_sub(1);
        }
        Ok(())
    }

    /// Accept the assignments as they stand.
    ///
    /// # Errors
    /// Returns `ReviewFinished` if already accepted or cancelled.
    pub fn accept(&mut self) -> Result<Option<AbsorbResponse>> {
        self.ensure_open()?;
        self.mode = ReviewMode::Accepted;
        Ok(Some(self.response.clone()))
    }

    /// Abandon the review.
    ///
    /// # Errors
    /// Returns `ReviewFinished` if already accepted or cancelled.
    pub fn cancel(&mut self) -> Result<Option<AbsorbResponse>> {
        self.ensure_open()?;
        self.mode = ReviewMode::Cancelled;
        Ok(None)
    }
}
