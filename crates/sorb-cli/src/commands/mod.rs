//! Command-line interface definition and command handlers.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use sorb_oracle::Strategy;

pub mod absorb;
pub mod backups;
pub mod completions;
pub mod undo;
pub mod utils;

/// sorb - absorb staged changes into the commits they belong to.
#[derive(Parser)]
#[command(name = "sorb", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Only print errors and essential output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log git and oracle calls to stderr (same as `SORB_LOG=debug`).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Turn staged hunks into fixup commits for the commits they belong to.
    #[command(visible_alias = "ab")]
    Absorb(AbsorbArgs),

    /// Revert the last absorb.
    Undo,

    /// Inspect or remove absorb backups.
    #[command(subcommand)]
    Backups(BackupsCommand),

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options for `sorb absorb`.
#[derive(Args, Debug, Default, Clone)]
pub struct AbsorbArgs {
    /// Skip the review and the conflict confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Show the proposed assignments without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Consider only the last N commits.
    #[arg(long, value_name = "N", conflicts_with = "to_branch_point")]
    pub depth: Option<usize>,

    /// Consider every commit since the branch point.
    #[arg(long)]
    pub to_branch_point: bool,

    /// Model passed to the oracle.
    #[arg(long)]
    pub model: Option<String>,

    /// How proposals are accepted.
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<Strategy>,

    /// Minimum confidence for best-match (0.0 - 1.0).
    #[arg(long, value_name = "C")]
    pub confidence: Option<f64>,

    /// Squash the fixups with an autosquash rebase afterwards.
    #[arg(long)]
    pub rebase: bool,

    /// Leave unmatched hunks staged instead of committing them.
    #[arg(long, conflicts_with = "message")]
    pub no_new_commit: bool,

    /// Commit unmatched hunks with this message.
    #[arg(short, long)]
    pub message: Option<String>,
}

fn parse_strategy(value: &str) -> Result<Strategy, String> {
    value.parse()
}

#[derive(Subcommand)]
pub enum BackupsCommand {
    /// List backup refs.
    List {
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete every backup except the one `sorb undo` would use.
    Cleanup,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_absorb_flags() {
        let cli = Cli::parse_from([
            "sorb",
            "absorb",
            "--yes",
            "--depth",
            "5",
            "--strategy",
            "best-match",
            "--confidence",
            "0.8",
            "-m",
            "leftovers",
        ]);
        let Commands::Absorb(args) = cli.command else {
            panic!("expected absorb");
        };
        assert!(args.yes);
        assert_eq!(args.depth, Some(5));
        assert_eq!(args.strategy, Some(Strategy::BestMatch));
        assert!((args.confidence.unwrap() - 0.8).abs() < f64::EPSILON);
        assert_eq!(args.message.as_deref(), Some("leftovers"));
    }

    #[test]
    fn test_conflicting_flags() {
        assert!(
            Cli::try_parse_from(["sorb", "absorb", "--depth", "2", "--to-branch-point"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["sorb", "absorb", "--no-new-commit", "-m", "x"]).is_err()
        );
        assert!(Cli::try_parse_from(["sorb", "absorb", "--strategy", "greedy"]).is_err());
    }

    #[test]
    fn test_backups_subcommands() {
        let cli = Cli::parse_from(["sorb", "backups", "list", "--json"]);
        assert!(matches!(
            cli.command,
            Commands::Backups(BackupsCommand::List { json: true })
        ));
        let cli = Cli::parse_from(["sorb", "-q", "backups", "cleanup"]);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Backups(BackupsCommand::Cleanup)));
    }
}
