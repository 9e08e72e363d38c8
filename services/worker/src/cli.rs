use clap::{Args, Parser, Subcommand};

use crate::error::WorkerError;
use crate::jobs;

#[derive(Parser, Debug)]
#[command(
    name = "exam-exchange-worker",
    about = "Run scheduled exam exchange jobs against the testing vendor",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload pending candidate demographics and exam authorizations
    Export(RetryArgs),
    /// Poll for vendor result archives and ingest them
    Import(RetryArgs),
    /// Run one export pass followed by one import pass (default command)
    Sync(RetryArgs),
}

#[derive(Args, Debug)]
pub(crate) struct RetryArgs {
    /// Maximum attempts for a retryable transport failure
    #[arg(long, default_value_t = 3)]
    pub(crate) max_attempts: u32,
    /// Base backoff delay in seconds; doubles per attempt
    #[arg(long, default_value_t = 1)]
    pub(crate) base_delay_secs: u64,
}

impl Default for RetryArgs {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1,
        }
    }
}

pub(crate) fn run() -> Result<(), WorkerError> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Sync(RetryArgs::default()));

    match command {
        Command::Export(args) => jobs::run_export(args),
        Command::Import(args) => jobs::run_import(args),
        Command::Sync(args) => jobs::run_sync(args),
    }
}
