//! Lion CLI - Command-line interface for the Lion permission engine.

mod commands;
mod error;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use error::CliError;
use lion_core::{LogLevel, PolicyConfig};

/// Exit status of a denied permission check.
const EXIT_DENIED: u8 = 2;

#[derive(Parser)]
#[command(name = "lion")]
#[command(author = "Lion Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Administer conditional permission policy for Lion bundles", long_about = None)]
struct Cli {
    /// Sets the level of verbosity
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage a conditional policy file
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },

    /// Decide a permission for a bundle
    ///
    /// Exits with status 0 when granted and 2 when denied.
    Check {
        /// Install location of the bundle
        #[arg(short, long)]
        location: String,

        /// Permission type, e.g. file or property
        #[arg(value_name = "TYPE")]
        permission_type: String,

        /// Permission name
        #[arg(value_name = "NAME", default_value = "")]
        name: String,

        /// Comma-separated actions
        #[arg(value_name = "ACTIONS", default_value = "")]
        actions: String,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Check that every entry of a policy file is well formed
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List the entries of a policy file
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Add an encoded entry to a policy file
    Add {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Entry in canonical form, e.g. '[name]{ [location "file:*"] (all) }'
        #[arg(value_name = "ENTRY")]
        entry: String,
    },

    /// Remove a named entry from a policy file
    Remove {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(value_name = "NAME")]
        name: String,
    },
}

fn main() -> ExitCode {
    // Parse command-line arguments
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Load the configuration before logging so it can set the level
    let config = match &cli.config {
        Some(path) => Some(PolicyConfig::from_file(path).map_err(CliError::from)?),
        None => None,
    };
    let base = config.as_ref().map(|c| c.log_level).unwrap_or(LogLevel::Warn);
    logging::init(base, cli.verbose);

    // Execute the command
    match cli.command {
        Commands::Policy { command } => {
            match command {
                PolicyCommands::Validate { file } => commands::policy::validate(&file)?,
                PolicyCommands::List { file } => commands::policy::list(&file)?,
                PolicyCommands::Add { file, entry } => commands::policy::add(&file, &entry)?,
                PolicyCommands::Remove { file, name } => commands::policy::remove(&file, &name)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            location,
            permission_type,
            name,
            actions,
        } => {
            let (config, path) = match (config, cli.config) {
                (Some(config), Some(path)) => (config, path),
                _ => {
                    return Err(CliError::InvalidArguments("check requires --config <FILE>".into()).into())
                }
            };
            let granted =
                commands::check::execute(&config, &path, &location, &permission_type, &name, &actions)?;
            Ok(if granted {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_DENIED)
            })
        }
    }
}
