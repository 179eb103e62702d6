//! pimcal CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use pimcal_core::{TracingConfig, init_tracing};
use tracing::{debug, error};

use pimcal_cli::cli::Cli;
use pimcal_cli::config::PimcalConfig;
use pimcal_cli::driver::{self, DriverOptions};
use pimcal_cli::error::CliResult;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = setup_tracing(&cli, &config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli, &config) {
        Ok(written) => {
            debug!(written, "Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> CliResult<PimcalConfig> {
    match cli.config {
        Some(ref path) => PimcalConfig::load_from(path),
        None => PimcalConfig::load(),
    }
}

fn setup_tracing(cli: &Cli, config: &PimcalConfig) -> CliResult<()> {
    let tracing_config = TracingConfig::for_verbosity(cli.verbose)
        .with_format(config.logging.output_format()?)
        .with_timestamp(config.logging.timestamps);
    init_tracing(tracing_config)?;
    Ok(())
}

fn run(cli: Cli, config: &PimcalConfig) -> CliResult<usize> {
    let options = DriverOptions {
        policy: config.walk_policy(cli.max_iterations)?,
        default_view_zone: config.view_zone()?,
        view_zone: cli.view_zone()?,
        input: cli.input,
        output: cli.output,
        json: cli.json,
    };
    debug!(input = %options.input.display(), "Starting driver");
    driver::run(&options)
}
