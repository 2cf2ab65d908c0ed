use std::process::ExitCode;

use clap::Parser;

use shh::cli::Cli;
use shh::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            logging::report_fatal(&e);
            return ExitCode::from(e.exit_code());
        }
    };

    let coordinator = match shh::start(config).await {
        Ok(coordinator) => coordinator,
        Err(e) => {
            logging::report_fatal(&e);
            return ExitCode::from(e.exit_code());
        }
    };

    let outcome = coordinator.run().await;
    ExitCode::from(outcome.exit_code)
}
