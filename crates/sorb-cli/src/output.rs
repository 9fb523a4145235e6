//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print the detached HEAD error message with guidance (always to stderr).
pub fn error_detached_head() {
    error("Cannot absorb in detached HEAD state.");
    eprintln!();
    eprintln!("Fixup commits need a branch to land on. To fix this:");
    eprintln!("  1. Create a new branch: git checkout -b <branch-name>");
    eprintln!("  2. Or return to an existing branch: git checkout <branch-name>");
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
///
/// Use for indented detail lines that accompany info or warn messages.
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Print essential machine-readable output (always prints).
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Short commit id for display.
#[must_use]
pub fn short_sha(sha: &str) -> String {
    sha.get(..8).unwrap_or(sha).yellow().to_string()
}

/// Confidence as a colored percentage.
#[must_use]
pub fn confidence(value: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = (value.clamp(0.0, 1.0) * 100.0).round() as u8;
    let text = format!("{percent}%");
    if value >= 0.8 {
        text.green().to_string()
    } else if value >= 0.5 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

/// Print a hunk body with added/removed lines colored (suppressed in quiet
/// mode).
pub fn hunk(content: &str) {
    if is_quiet() {
        return;
    }
    for line in content.lines() {
        if line.starts_with("@@") {
            println!("    {}", line.cyan());
        } else if line.starts_with('+') {
            println!("    {}", line.green());
        } else if line.starts_with('-') {
            println!("    {}", line.red());
        } else {
            println!("    {}", line.dimmed());
        }
    }
}

/// Spinner on stderr while a long call runs. Hidden in quiet mode and when
/// stderr is not a terminal.
#[must_use]
pub fn spinner(msg: &str) -> ProgressBar {
    if is_quiet() || !console::Term::stderr().is_term() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg} {elapsed:.dim}") {
        bar.set_style(style);
    }
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Print a horizontal line (suppressed in quiet mode).
pub fn hr() {
    if !is_quiet() {
        println!("{}", "─".repeat(50).dimmed());
    }
}
