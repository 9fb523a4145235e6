//! sorb CLI - Absorb staged changes into the commits they belong to.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod services;

use commands::{BackupsCommand, Cli, Commands};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_env("SORB_LOG")
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();

    output::set_quiet(cli.quiet);
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Absorb(args) => commands::absorb::run(&args),
        Commands::Undo => commands::undo::run(),
        Commands::Backups(BackupsCommand::List { json }) => commands::backups::list(json),
        Commands::Backups(BackupsCommand::Cleanup) => commands::backups::cleanup(),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        // Already reported by the command (detached HEAD).
        let message = format!("{e:#}");
        if !message.is_empty() {
            output::error(&message);
        }
        std::process::exit(1);
    }
}
