//! LiveTransit CLI - Command-line interface
//!
//! Runs the vehicle tracker headlessly and manages the persisted line
//! selection and configuration file.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use livetransit::config::LiveConfig;
use livetransit::logging::{init_logging, LogConfig};

use commands::config::ConfigCommands;
use commands::run::RunArgs;
use commands::select::SelectCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "livetransit", version, about = "Live transit vehicle tracker")]
struct Cli {
    /// Log filter directive (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = livetransit::logging::DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll the vehicle feed and log vehicle events until Ctrl+C
    Run {
        /// Vehicle feed URL (overrides poll.api_url)
        #[arg(long)]
        api_url: Option<String>,

        /// Poll interval in milliseconds (overrides poll.interval_ms)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Trip table JSON file (overrides storage.trip_table)
        #[arg(long)]
        trip_table: Option<String>,

        /// Also write rolling log files to storage.log_dir
        #[arg(long)]
        log_to_file: bool,
    },

    /// View or change which lines and categories are shown
    #[command(subcommand)]
    Select(SelectCommands),

    /// View or change configuration settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Run {
            api_url,
            interval_ms,
            trip_table,
            log_to_file,
        } => {
            let config = LiveConfig::load()?;
            let mut log_config = LogConfig::default().with_level(&cli.log_level);
            if log_to_file {
                log_config = log_config.with_log_dir(&config.storage.log_dir);
            }
            let _log_guard = init_logging(&log_config);
            tracing::info!(version = livetransit::VERSION, "Starting livetransit");

            commands::run::run(
                RunArgs {
                    api_url,
                    interval_ms,
                    trip_table,
                },
                config,
            )
        }
        Commands::Select(command) => {
            let _log_guard = init_logging(&LogConfig::default().with_level(&cli.log_level));
            let config = LiveConfig::load()?;
            commands::select::run(command, &config)
        }
        Commands::Config(command) => commands::config::run(command),
    }
}
