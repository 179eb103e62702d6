//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;
use pimcal_core::Zone;

use crate::error::{CliError, CliResult};

/// pimcal - walk back through the occurrences of recurring incidences
#[derive(Debug, Parser)]
#[command(name = "pimcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// iCalendar file to load
    pub input: PathBuf,

    /// File receiving the occurrence dates (stderr when absent)
    pub output: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short, env = "PIMCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Maximum number of occurrences listed per incidence
    #[arg(long, env = "PIMCAL_MAX_ITERATIONS")]
    pub max_iterations: Option<usize>,

    /// Zone occurrences are shown in (IANA name, UTC, local or +hh:mm)
    #[arg(long, env = "PIMCAL_VIEW_ZONE")]
    pub view_zone: Option<String>,

    /// Write one JSON object per incidence instead of plain lines
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Parses `--view-zone`.
    pub fn view_zone(&self) -> CliResult<Option<Zone>> {
        let Some(name) = self.view_zone.as_deref() else {
            return Ok(None);
        };
        Zone::parse(name)
            .map(Some)
            .map_err(|e| CliError::InvalidArgument(format!("--view-zone {name:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_arguments() {
        let cli = Cli::try_parse_from(["pimcal", "in.ics"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("in.ics"));
        assert!(cli.output.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(!cli.json);

        let cli = Cli::try_parse_from(["pimcal", "in.ics", "out.txt"]).unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn flags() {
        let cli = Cli::try_parse_from([
            "pimcal",
            "-vv",
            "--max-iterations",
            "50",
            "--view-zone",
            "Europe/Berlin",
            "--json",
            "in.ics",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.max_iterations, Some(50));
        assert_eq!(cli.view_zone.as_deref(), Some("Europe/Berlin"));
        assert!(cli.json);
    }

    #[test]
    fn view_zone_argument() {
        let cli = Cli::try_parse_from(["pimcal", "--view-zone", "+02:00", "in.ics"]).unwrap();
        assert!(cli.view_zone().unwrap().is_some());

        let cli = Cli::try_parse_from(["pimcal", "in.ics"]).unwrap();
        assert_eq!(cli.view_zone().unwrap(), None);

        let cli = Cli::try_parse_from(["pimcal", "--view-zone", "Mars/Olympus", "in.ics"]).unwrap();
        assert!(matches!(cli.view_zone(), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["pimcal"]).is_err());
    }
}
