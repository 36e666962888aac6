mod cli;
mod logging;
mod metadata;
mod run;

use std::process::ExitCode;

fn main() -> ExitCode {
    // Must be set up before any logging, the guard flushes profiling traces on exit
    let _logging = logging::setup_logging();

    metadata::log_version_info();
    let cli = match cli::parse_args::<cli::Cli>() {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    match run::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
