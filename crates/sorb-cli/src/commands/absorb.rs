//! `sorb absorb` command - Turn staged hunks into fixup commits.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result, bail};
use inquire::{Confirm, InquireError, Select};
use sorb_core::{AbsorbOutcome, ReviewMode, ReviewState};
use sorb_oracle::{AbsorbResponse, HunkAssignment, Strategy};

use crate::commands::AbsorbArgs;
use crate::commands::utils;
use crate::output;
use crate::services::{AbsorbService, AbsorbSettings, OracleBackend};

/// Run the absorb command.
#[allow(clippy::too_many_lines)]
pub fn run(args: &AbsorbArgs) -> Result<()> {
    let (repo, state) = utils::open_repo_and_state()?;
    utils::ensure_on_branch(&repo)?;

    let config = utils::load_config(&state)?;
    let settings = AbsorbSettings::resolve(&config, args)?;
    let service = AbsorbService::new(&repo, &state);
    service.check_ready()?;

    let hunks = service.staged_hunks()?;
    let candidates = service.candidates(settings.range)?;
    if candidates.is_empty() {
        bail!(
            "No candidate commits to absorb into. Try `--depth <N>` or `--to-branch-point`."
        );
    }
    output::info(&format!(
        "Analyzing {} hunk(s) against {} commit(s)",
        hunks.len(),
        candidates.len()
    ));

    let oracle = OracleBackend::from_config(&config.oracle)?;
    let request = settings.request(hunks, candidates.clone());
    let response = ask_oracle(&oracle, &request)?;

    print_assignments(&response);

    if response.assignments.is_empty() {
        output::warn("No hunk could be matched to a commit");
        return Ok(());
    }

    if args.dry_run {
        output::info("Dry run - no changes made");
        return Ok(());
    }

    let interactive = settings.strategy == Strategy::Interactive
        && !args.yes
        && console::Term::stdout().is_term();
    let response = if interactive {
        let Some(reviewed) = review(response)? else {
            output::info("Absorb cancelled");
            return Ok(());
        };
        if reviewed.assignments.is_empty() {
            output::info("Every hunk was unassigned - nothing to absorb");
            return Ok(());
        }
        reviewed
    } else {
        response
    };

    let prediction = service.predict(&response)?;
    if prediction.has_conflicts {
        output::warn("Squashing these fixups is likely to conflict in:");
        for file in &prediction.files {
            output::detail(&format!("  {file}"));
        }
        if !args.yes {
            if !console::Term::stdout().is_term() {
                bail!("Conflicts predicted. Re-run with --yes to absorb anyway.");
            }
            let proceed = Confirm::new("Create the fixups anyway?")
                .with_default(false)
                .prompt()
                .context("Confirmation cancelled")?;
            if !proceed {
                output::info("Absorb cancelled");
                return Ok(());
            }
        }
    }

    let message = if args.no_new_commit {
        None
    } else {
        args.message.clone()
    };
    let outcome = service.apply(&response, message)?;
    print_outcome(&outcome);

    if settings.autosquash && !outcome.report.fixups.is_empty() {
        match service.autosquash(&response, &candidates) {
            Ok(_) => output::success("Squashed the fixups into their targets"),
            Err(e) => {
                output::warn(&format!("Autosquash failed: {e}"));
                let base = service
                    .autosquash_base(&response, &candidates)
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "--root".to_string());
                output::detail(&format!(
                    "  Finish manually with `git rebase -i --autosquash {base}`"
                ));
            }
        }
    } else if !outcome.report.fixups.is_empty() {
        output::info("Run `git rebase -i --autosquash` to apply the fixups");
    }

    if outcome.backup_ref.is_some() {
        output::detail("  Undo with `sorb undo`");
    }

    Ok(())
}

/// Run the oracle on a fresh runtime, giving up on Ctrl-C.
fn ask_oracle(
    oracle: &OracleBackend,
    request: &sorb_oracle::AbsorbRequest,
) -> Result<AbsorbResponse> {
    let rt = tokio::runtime::Runtime::new()?;
    let spinner = output::spinner("Asking the oracle");
    let result = rt.block_on(async {
        tokio::select! {
            response = sorb_oracle::analyze(oracle, request) => {
                response.context("Oracle analysis failed")
            }
            _ = tokio::signal::ctrl_c() => bail!("Interrupted - no changes made"),
        }
    });
    spinner.finish_and_clear();
    result
}

/// Print the proposal grouped by target commit, in first-seen order.
fn print_assignments(response: &AbsorbResponse) {
    let mut by_target: BTreeMap<usize, Vec<&HunkAssignment>> = BTreeMap::new();
    let targets = response.targets();
    for assignment in &response.assignments {
        let position = targets
            .iter()
            .position(|t| *t == assignment.commit_sha)
            .unwrap_or(targets.len());
        by_target.entry(position).or_default().push(assignment);
    }

    if !response.assignments.is_empty() {
        output::info(&format!(
            "{} hunk(s) matched to {} commit(s):",
            response.assignments.len(),
            targets.len()
        ));
    }
    for assignments in by_target.values() {
        let first = assignments[0];
        output::detail(&format!(
            "  {} {}",
            output::short_sha(&first.commit_sha),
            describe_message(&first.commit_message)
        ));
        for assignment in assignments {
            output::detail(&format!(
                "    → {} {}",
                assignment.hunk,
                output::confidence(assignment.confidence)
            ));
        }
    }

    if !response.unmatched.is_empty() {
        output::info(&format!(
            "{} hunk(s) left unmatched:",
            response.unmatched.len()
        ));
        for hunk in &response.unmatched {
            output::detail(&format!("    {hunk}"));
        }
    }
}

fn describe_message(message: &str) -> &str {
    if message.is_empty() {
        "(unknown commit)"
    } else {
        message
    }
}

/// Print what the fixup stage did.
fn print_outcome(outcome: &AbsorbOutcome) {
    let report = &outcome.report;
    if !report.fixups.is_empty() {
        output::success(&format!("Created {} fixup commit(s)", report.fixups.len()));
        for fixup in &report.fixups {
            output::detail(&format!(
                "  {} → {} ({} hunk(s))",
                output::short_sha(&fixup.commit.to_string()),
                output::short_sha(&fixup.target),
                fixup.hunks
            ));
        }
    }
    for failed in &report.failed {
        output::warn(&format!(
            "Could not absorb into {}: {}",
            output::short_sha(&failed.target),
            failed.error
        ));
    }
    if let Some(sha) = &outcome.new_commit {
        output::success(&format!(
            "Committed leftover hunks as {}",
            output::short_sha(sha)
        ));
    } else if report.restaged > 0 {
        output::info(&format!("{} hunk(s) left staged", report.restaged));
    }
    if !report.restaged_paths.is_empty() && outcome.new_commit.is_none() {
        output::info(&format!(
            "Left staged without absorbing (no text hunks): {}",
            report.restaged_paths.join(", ")
        ));
    }
    for warning in &outcome.warnings {
        output::warn(warning);
    }
    if let Some(stash) = &outcome.stash_left {
        output::detail(&format!(
            "  Your unstaged changes are in stash {}; `sorb undo` reapplies it",
            output::short_sha(stash)
        ));
    }
}

/// Actions offered while stepping through assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewAction {
    AcceptAll,
    Next,
    Previous,
    Alternatives,
    Unassign,
    Cancel,
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AcceptAll => "Accept all",
            Self::Next => "Next hunk",
            Self::Previous => "Previous hunk",
            Self::Alternatives => "Choose another commit",
            Self::Unassign => "Leave this hunk unmatched",
            Self::Cancel => "Cancel",
        };
        f.write_str(label)
    }
}

fn review_actions(review: &ReviewState) -> Vec<ReviewAction> {
    let index = review.current_index();
    let total = review.response().assignments.len();
    let mut actions = vec![ReviewAction::AcceptAll];
    if index + 1 < total {
        actions.push(ReviewAction::Next);
    }
    if index > 0 {
        actions.push(ReviewAction::Previous);
    }
    if review.current().is_some_and(|a| !a.alternatives.is_empty()) {
        actions.push(ReviewAction::Alternatives);
    }
    if total > 0 {
        actions.push(ReviewAction::Unassign);
    }
    actions.push(ReviewAction::Cancel);
    actions
}

/// Walk the reviewer through the assignments. `None` means cancelled.
fn review(response: AbsorbResponse) -> Result<Option<AbsorbResponse>> {
    let mut review = ReviewState::new(response);
    loop {
        match review.mode() {
            ReviewMode::Reviewing => {
                show_current(&review);
                let action = Select::new("Action:", review_actions(&review))
                    .prompt_skippable()
                    .context("Review aborted")?
                    .unwrap_or(ReviewAction::Cancel);
                match action {
                    ReviewAction::AcceptAll => return Ok(review.accept()?),
                    ReviewAction::Next => review.next()?,
                    ReviewAction::Previous => review.previous()?,
                    ReviewAction::Alternatives => {
                        review.show_alternatives()?;
                    }
                    ReviewAction::Unassign => review.unassign()?,
                    ReviewAction::Cancel => return Ok(review.cancel()?),
                }
            }
            ReviewMode::ViewingAlternatives { cursor } => {
                let Some(current) = review.current() else {
                    review.close_alternatives()?;
                    continue;
                };
                let mut options = vec![format!(
                    "Keep {} {} ({})",
                    current.short_sha(),
                    describe_message(&current.commit_message),
                    output::confidence(current.confidence)
                )];
                options.extend(current.alternatives.iter().map(|alt| {
                    format!(
                        "{} {} ({}) {}",
                        alt.commit_sha.get(..8).unwrap_or(&alt.commit_sha),
                        describe_message(&alt.commit_message),
                        output::confidence(alt.confidence),
                        alt.reasoning
                    )
                }));
                match Select::new("Target commit:", options)
                    .with_starting_cursor(cursor)
                    .raw_prompt()
                {
                    Ok(choice) => pick_alternative(&mut review, choice.index)?,
                    Err(InquireError::OperationCanceled) => review.close_alternatives()?,
                    Err(e) => return Err(anyhow::Error::from(e).context("Review aborted")),
                }
            }
            ReviewMode::Accepted | ReviewMode::Cancelled => return Ok(None),
        }
    }
}

/// Walk the alternatives cursor to the entry picked in the menu and take it.
fn pick_alternative(review: &mut ReviewState, index: usize) -> sorb_core::Result<()> {
    while let ReviewMode::ViewingAlternatives { cursor } = review.mode() {
        match cursor.cmp(&index) {
            Ordering::Less => review.move_alternative_cursor_down()?,
            Ordering::Greater => review.move_alternative_cursor_up()?,
            Ordering::Equal => break,
        }
        if review.mode() == (ReviewMode::ViewingAlternatives { cursor }) {
            break;
        }
    }
    review.select_at_cursor()
}

fn show_current(review: &ReviewState) {
    let Some(assignment) = review.current() else {
        output::info("No assignments left");
        return;
    };
    let total = review.response().assignments.len();
    let index = review.current_index();

    output::hr();
    let edited = if review.is_modified(index) {
        " (changed)"
    } else {
        ""
    };
    output::info(&format!(
        "Hunk {}/{}: {} [{}]{edited}",
        index + 1,
        total,
        assignment.hunk,
        assignment.hunk.status()
    ));
    output::detail(&format!(
        "  → {} {} {}",
        output::short_sha(&assignment.commit_sha),
        describe_message(&assignment.commit_message),
        output::confidence(assignment.confidence)
    ));
    if !assignment.reasoning.is_empty() {
        output::detail(&format!("  {}", assignment.reasoning));
    }
    output::hunk(&assignment.hunk.content);
    output::hr();
}
