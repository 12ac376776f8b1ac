mod bootstrap;
mod cli;
mod paths;
mod run;

use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::parse();
    run::initialise_tracing();

    match run::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            run::report_failure(&err);
            ExitCode::FAILURE
        }
    }
}
