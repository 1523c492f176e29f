use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use tmod_update::update::{self, UpdateOutcome};
use tmod_update::Config;

/// `check`: installed release matches the latest one.
const EXIT_UP_TO_DATE: u8 = 0;
/// `check`: a newer release is available.
const EXIT_UPDATE_AVAILABLE: u8 = 42;
/// `update`: a new release was installed and the server can be restarted.
const EXIT_UPDATED: u8 = 88;
const EXIT_FAILURE: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "tmod-update", version)]
#[command(about = "Check for and install tModLoader server releases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults to ~/.config/tmod-update/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare installed and latest releases (exit 0 = current, 42 = update available)
    Check,

    /// Back up the server and install the latest release (exit 88 = updated, 0 = current)
    ///
    /// Exits 88 only after a new release was installed. When the installed
    /// release is already the latest nothing is changed and the exit code is 0,
    /// not 88, so schedulers should restart the server on 88 alone.
    Update,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tmod_update=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<u8> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Check => run_check_command(&config),
        Command::Update => run_update_command(&config),
    }
}

fn run_check_command(config: &Config) -> Result<u8> {
    let check = update::check_versions(config)?;
    update::print_check(&check);

    if check.update_available() {
        Ok(EXIT_UPDATE_AVAILABLE)
    } else {
        Ok(EXIT_UP_TO_DATE)
    }
}

fn run_update_command(config: &Config) -> Result<u8> {
    println!("{}", "Start check".cyan());

    match update::run_update(config)? {
        UpdateOutcome::UpToDate(check) => {
            println!(
                "\n{} Already running the latest release ({})",
                "✓".green(),
                check.installed
            );
            Ok(EXIT_UP_TO_DATE)
        }
        UpdateOutcome::Updated { from, to } => {
            println!(
                "\n{} Updated {} → {}. You can now reboot.",
                "✓".green(),
                from.to_string().dimmed(),
                to.to_string().green()
            );
            Ok(EXIT_UPDATED)
        }
    }
}
