//! CLI, configuration and the previous-occurrence driver
//!
//! This crate provides the `pimcal` command-line interface.

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;

pub use cli::Cli;
pub use config::PimcalConfig;
pub use driver::{DriverOptions, run};
pub use error::{CliError, CliResult};
