//! VIEWGRANT handler entry point.

use std::process::ExitCode;

use clap::Parser;
use viewgrant_handler::telemetry::{init_tracing, TelemetryConfig};
use viewgrant_handler::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig::from_env();
    if let Err(e) = init_tracing(&telemetry) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match viewgrant_handler::run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Invocation failed");
            ExitCode::FAILURE
        }
    }
}
