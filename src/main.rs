use clap::Parser;
use std::process::ExitCode;
use tidyfold::cli::{Cli, run};
use tidyfold::output::OutputFormatter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tidyfold::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
