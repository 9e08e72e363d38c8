mod cli;
mod error;
mod jobs;

use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("exam-exchange-worker: {err}");
            ExitCode::FAILURE
        }
    }
}
