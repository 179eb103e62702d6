//! The previous-occurrence driver.
//!
//! Loads a calendar, then walks every incidence backwards from past its
//! last occurrence and writes each occurrence found.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use pimcal_core::{Incidence, MemoryCalendar, WalkPolicy, Zone, dump_time};
use pimcal_storage::{CalendarStorage, FileStorage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CliResult;

/// Calendar property naming the zone occurrences are shown in.
pub const VIEW_ZONE_PROPERTY: &str = "X-LIBKCAL-TESTSUITE-OUTTZ";

/// Everything a driver run needs.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub input: PathBuf,
    /// Occurrence destination; stderr when `None`.
    pub output: Option<PathBuf>,
    pub policy: WalkPolicy,
    /// Zone given on the command line.
    pub view_zone: Option<Zone>,
    /// Zone from the configuration file, used when neither the command
    /// line nor the calendar names one.
    pub default_view_zone: Option<Zone>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct WalkRecord<'a> {
    uid: &'a str,
    summary: &'a str,
    occurrences: Vec<String>,
}

/// Loads `input` into a UTC calendar.
pub fn load_calendar(input: &Path) -> CliResult<MemoryCalendar> {
    let mut calendar = MemoryCalendar::new(Zone::Utc);
    FileStorage::new(input).load(&mut calendar)?;
    Ok(calendar)
}

/// Picks the view zone: the explicit one, else the calendar's own, else
/// the fallback.
pub fn resolve_view_zone(
    calendar: &MemoryCalendar,
    explicit: Option<Zone>,
    fallback: Option<Zone>,
) -> Option<Zone> {
    if explicit.is_some() {
        return explicit;
    }
    let from_calendar = calendar
        .custom_property(VIEW_ZONE_PROPERTY)
        .and_then(|name| match Zone::parse(name) {
            Ok(zone) => Some(zone),
            Err(err) => {
                warn!(zone = name, error = %err, "Ignoring calendar view zone");
                None
            }
        });
    from_calendar.or(fallback)
}

/// Opens the occurrence destination.
///
/// A file that cannot be created is reported and replaced by stderr.
pub fn open_output(path: Option<&Path>) -> Box<dyn Write> {
    let Some(path) = path else {
        return Box::new(io::stderr());
    };
    match File::create(path) {
        Ok(file) => {
            debug!(path = %path.display(), "Opened output file");
            Box::new(BufWriter::new(file))
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Cannot open output file, writing to stderr"
            );
            Box::new(io::stderr())
        }
    }
}

/// Walks every incidence of `calendar` and writes its occurrences to
/// `out`. Returns the number of occurrences written.
pub fn write_walks<W: Write + ?Sized>(
    calendar: &MemoryCalendar,
    policy: &WalkPolicy,
    view_zone: Option<Zone>,
    json: bool,
    out: &mut W,
) -> CliResult<usize> {
    let mut written = 0;
    for incidence in calendar.incidences() {
        info!(uid = %incidence.uid(), summary = %incidence.summary(), "Walking incidence");
        let recurrence = incidence.recurrence();
        recurrence.dump();

        let occurrences = policy
            .walk(recurrence, view_zone)
            .map(|dt| dump_time(Some(&dt), view_zone));
        if json {
            let record = WalkRecord {
                uid: incidence.uid(),
                summary: incidence.summary(),
                occurrences: occurrences.collect(),
            };
            written += record.occurrences.len();
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
        } else {
            for line in occurrences {
                writeln!(out, "{line}")?;
                written += 1;
            }
        }
    }
    out.flush()?;
    Ok(written)
}

/// Runs the driver. Returns the number of occurrences written.
pub fn run(options: &DriverOptions) -> CliResult<usize> {
    let calendar = load_calendar(&options.input)?;
    let view_zone = resolve_view_zone(&calendar, options.view_zone, options.default_view_zone);
    debug!(view_zone = ?view_zone, "Resolved view zone");

    let mut out = open_output(options.output.as_deref());
    let written = write_walks(&calendar, &options.policy, view_zone, options.json, &mut *out)?;
    info!(written, "Finished");
    Ok(written)
}
